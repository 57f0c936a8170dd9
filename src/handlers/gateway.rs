use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, MessageId, ParseMode, ReplyParameters};

use crate::llm::media::download_media;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    MarkdownV2,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatActivity {
    Typing,
    UploadPhoto,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        format: TextFormat,
    ) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, reply_to: Option<i32>, path: &Path) -> Result<()>;

    /// Resolves a platform file id and downloads its bytes.
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;

    async fn send_activity(&self, chat_id: i64, activity: ChatActivity) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    token: String,
}

impl TelegramGateway {
    pub fn new(bot: Bot, token: impl Into<String>) -> Self {
        TelegramGateway {
            bot,
            token: token.into(),
        }
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        format: TextFormat,
    ) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text.to_string());
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }
        if format == TextFormat::MarkdownV2 {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }
        request.await.context("sendMessage failed")?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, reply_to: Option<i32>, path: &Path) -> Result<()> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file(path.to_path_buf()));
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }
        request.await.context("sendPhoto failed")?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .context("getFile failed")?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.token, file.path
        );
        download_media(&url, &format!("telegram file {file_id}")).await
    }

    async fn send_activity(&self, chat_id: i64, activity: ChatActivity) -> Result<()> {
        let action = match activity {
            ChatActivity::Typing => ChatAction::Typing,
            ChatActivity::UploadPhoto => ChatAction::UploadPhoto,
        };
        self.bot
            .send_chat_action(ChatId(chat_id), action)
            .await
            .context("sendChatAction failed")?;
        Ok(())
    }
}
