use tracing::{error, warn};

use crate::format::{chunk_text, markdown_to_telegram_v2};
use crate::handlers::gateway::{MessagingGateway, TextFormat};

pub const HELP_MESSAGE: &str = "Halo! Saya asisten AI berbasis Gemini.

Gunakan perintah:
/tanya [pertanyaan Anda]
/gambar [deskripsi gambar]

Balas pesan saya untuk melanjutkan percakapan, atau kirim foto dengan keterangan untuk mengeditnya.";
pub const GUIDANCE_MESSAGE: &str = "Silakan balas pesan sebelumnya atau gunakan perintah:
/tanya [pertanyaan Anda]
/gambar [deskripsi gambar]";
pub const FORMAT_APOLOGY: &str = "Terjadi kesalahan saat mengirim balasan (format markdown).";
pub const QUESTION_APOLOGY: &str = "Maaf, terjadi kesalahan saat memproses pertanyaan Anda.";
pub const GENERATE_APOLOGY: &str = "Terjadi kesalahan saat membuat gambar.";
pub const EDIT_APOLOGY: &str = "Terjadi kesalahan saat memproses gambar.";
pub const NO_IMAGE_MESSAGE: &str = "Maaf, tidak dapat membuat gambar.";
pub const NO_ANSWER_MESSAGE: &str = "Maaf, tidak ada jawaban.";
pub const TIMEOUT_APOLOGY: &str = "Maaf, waktu pemrosesan habis. Silakan coba lagi.";

/// Telegram's limit for one message, counted in characters after parsing.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkDelivery {
    pub delivered: usize,
    pub apologized: usize,
}

/// Sends a fixed plain-text reply.
pub async fn reply_plain(
    gateway: &dyn MessagingGateway,
    chat_id: i64,
    reply_to: i32,
    text: &str,
) -> anyhow::Result<()> {
    gateway
        .send_text(chat_id, Some(reply_to), text, TextFormat::Plain)
        .await
}

/// Sends `text` as MarkdownV2 replies, one per chunk. A chunk the gateway
/// rejects is replaced by [`FORMAT_APOLOGY`] and the remaining chunks are
/// still sent.
///
/// Chunks are sized before escaping. When escaping pushes one past
/// [`TELEGRAM_MAX_MESSAGE_LENGTH`], the unescaped chunk is sent as plain text.
pub async fn reply_in_chunks(
    gateway: &dyn MessagingGateway,
    chat_id: i64,
    reply_to: i32,
    text: &str,
    max_chunk_length: usize,
) -> ChunkDelivery {
    let mut delivery = ChunkDelivery::default();

    for (index, chunk) in chunk_text(text, max_chunk_length).iter().enumerate() {
        let safe_text = markdown_to_telegram_v2(chunk);
        if safe_text.is_empty() {
            continue;
        }

        let (payload, format) = if safe_text.chars().count() > TELEGRAM_MAX_MESSAGE_LENGTH {
            warn!(chat_id, chunk = index, "Escaped chunk too long; sending it as plain text");
            (chunk.as_str(), TextFormat::Plain)
        } else {
            (safe_text.as_str(), TextFormat::MarkdownV2)
        };

        match gateway
            .send_text(chat_id, Some(reply_to), payload, format)
            .await
        {
            Ok(()) => delivery.delivered += 1,
            Err(err) => {
                warn!(chat_id, chunk = index, ?format, "Reply chunk rejected: {err:#}");
                delivery.apologized += 1;
                if let Err(err) = reply_plain(gateway, chat_id, reply_to, FORMAT_APOLOGY).await {
                    error!(chat_id, chunk = index, "Failed to send formatting apology: {err:#}");
                }
            }
        }
    }

    delivery
}
