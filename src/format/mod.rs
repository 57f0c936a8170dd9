pub mod chunker;
pub mod markdown;

pub use chunker::{chunk_text, DEFAULT_MAX_CHUNK_LENGTH};
pub use markdown::markdown_to_telegram_v2;
