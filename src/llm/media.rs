use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use tracing::warn;

use crate::utils::http::get_http_client;

pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

const MEDIA_DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const MEDIA_DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// MIME type to declare for an image sent to the model: the sniffed type,
/// then the Telegram hint, then `image/jpeg`.
pub fn image_mime_type(data: &[u8], hint: Option<&str>) -> String {
    detect_mime_type(data)
        .filter(|mime| mime.starts_with("image/"))
        .or_else(|| {
            hint.map(str::trim)
                .filter(|mime| mime.starts_with("image/"))
                .map(str::to_string)
        })
        .map(|mime| normalize_image_mime(&mime))
        .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string())
}

fn normalize_image_mime(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

/// File extension for a generated image, used to name the temporary file.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match normalize_image_mime(mime_type).as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" | "image/heif" => "heic",
        _ => "jpg",
    }
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_delay(attempt: usize) -> Duration {
    Duration::from_millis(MEDIA_DOWNLOAD_BASE_DELAY_MS << attempt)
}

/// Downloads `url`, retrying transient failures. `label` is what gets logged
/// in place of the URL, which may embed the bot token.
pub async fn download_media(url: &str, label: &str) -> Result<Vec<u8>> {
    let client = get_http_client();
    let mut attempt = 0usize;
    loop {
        let last_attempt = attempt + 1 == MEDIA_DOWNLOAD_MAX_ATTEMPTS;
        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    "Failed to fetch media {label}: timeout={} connect={} status={:?} attempt={}/{}",
                    err.is_timeout(),
                    err.is_connect(),
                    err.status(),
                    attempt + 1,
                    MEDIA_DOWNLOAD_MAX_ATTEMPTS
                );
                if !should_retry_error(&err) || last_attempt {
                    return Err(anyhow!("Failed to fetch media {label}"));
                }
                tokio::time::sleep(retry_delay(attempt)).await;
                attempt += 1;
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Media download failed for {label} with status {}: {}",
                status,
                truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
            );
            if !should_retry_status(status) || last_attempt {
                return Err(anyhow!(
                    "Media download failed for {label} with status {status}"
                ));
            }
            tokio::time::sleep(retry_delay(attempt)).await;
            attempt += 1;
            continue;
        }

        match response.bytes().await {
            Ok(bytes) => return Ok(bytes.to_vec()),
            Err(err) => {
                warn!(
                    "Failed to read media bytes {label}: timeout={} attempt={}/{}",
                    err.is_timeout(),
                    attempt + 1,
                    MEDIA_DOWNLOAD_MAX_ATTEMPTS
                );
                if last_attempt {
                    return Err(anyhow!("Failed to read media bytes {label}"));
                }
                tokio::time::sleep(retry_delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}
