use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// Per-request timeouts override the default for slow generation calls.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client")
});

/// Process-wide client shared by the Gemini and file-download calls.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
