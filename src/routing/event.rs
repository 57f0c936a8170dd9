use teloxide::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
}

impl ChatKind {
    pub fn is_group_like(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Photo,
    Document,
}

/// A platform file that holds an image the bot can edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub file_id: String,
    pub source: ImageSource,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// One offered size of a photo.
#[derive(Debug, Clone)]
pub struct PhotoCandidate {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u32,
}

/// Picks the size with the most pixels, breaking ties by byte size.
pub fn largest_photo(candidates: &[PhotoCandidate]) -> Option<ImageRef> {
    candidates
        .iter()
        .max_by_key(|candidate| {
            (
                u64::from(candidate.width) * u64::from(candidate.height),
                candidate.file_size,
            )
        })
        .map(|candidate| ImageRef {
            file_id: candidate.file_id.clone(),
            source: ImageSource::Photo,
            mime_type: None,
        })
}

/// Normalized, read-only view of one inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender_id: Option<u64>,
    pub message_id: i32,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<ImageRef>,
    pub document: Option<DocumentRef>,
    /// The message this one replies to; never nested further.
    pub replied: Option<Box<IncomingEvent>>,
    pub is_bot_mentioned: bool,
    pub new_member_ids: Vec<u64>,
}

impl IncomingEvent {
    pub fn new(chat_id: i64, chat_kind: ChatKind, message_id: i32) -> Self {
        IncomingEvent {
            chat_id,
            chat_kind,
            sender_id: None,
            message_id,
            text: None,
            caption: None,
            photo: None,
            document: None,
            replied: None,
            is_bot_mentioned: false,
            new_member_ids: Vec::new(),
        }
    }

    /// Builds the event for a message, or `None` for chats the bot does not serve.
    pub fn from_message(message: &Message, bot_username: &str) -> Option<Self> {
        let mut event = Self::from_message_shallow(message, bot_username)?;
        event.replied = message
            .reply_to_message()
            .and_then(|reply| Self::from_message_shallow(reply, bot_username))
            .map(Box::new);
        Some(event)
    }

    fn from_message_shallow(message: &Message, bot_username: &str) -> Option<Self> {
        let chat_kind = if message.chat.is_private() {
            ChatKind::Private
        } else if message.chat.is_supergroup() {
            ChatKind::Supergroup
        } else if message.chat.is_group() {
            ChatKind::Group
        } else {
            return None;
        };

        let mut event = IncomingEvent::new(message.chat.id.0, chat_kind, message.id.0);
        event.sender_id = message.from.as_ref().map(|user| user.id.0);
        event.text = message.text().map(|value| value.to_string());
        event.caption = message.caption().map(|value| value.to_string());

        if let Some(sizes) = message.photo() {
            let candidates: Vec<PhotoCandidate> = sizes
                .iter()
                .map(|size| PhotoCandidate {
                    file_id: size.file.id.0.clone(),
                    width: size.width,
                    height: size.height,
                    file_size: size.file.size,
                })
                .collect();
            event.photo = largest_photo(&candidates);
        }

        if let Some(document) = message.document() {
            event.document = Some(DocumentRef {
                file_id: document.file.id.0.clone(),
                mime_type: document.mime_type.as_ref().map(|mime| mime.to_string()),
            });
        }

        if let Some(members) = message.new_chat_members() {
            event.new_member_ids = members.iter().map(|user| user.id.0).collect();
        }

        event.is_bot_mentioned = mentions(event.text.as_deref(), bot_username)
            || mentions(event.caption.as_deref(), bot_username);
        Some(event)
    }

    pub fn is_from(&self, user_id: u64) -> bool {
        self.sender_id == Some(user_id)
    }

    /// The document, when its MIME type marks it as an image.
    pub fn image_document(&self) -> Option<ImageRef> {
        let document = self.document.as_ref()?;
        let mime_type = document.mime_type.as_deref()?;
        if !mime_type.to_ascii_lowercase().starts_with("image/") {
            return None;
        }
        Some(ImageRef {
            file_id: document.file_id.clone(),
            source: ImageSource::Document,
            mime_type: Some(mime_type.to_string()),
        })
    }

    /// Photo first, then an image document.
    pub fn own_image(&self) -> Option<ImageRef> {
        self.photo.clone().or_else(|| self.image_document())
    }

    /// Caption when present, otherwise the message text.
    pub fn caption_or_text(&self) -> Option<&str> {
        non_blank(self.caption.as_deref()).or_else(|| non_blank(self.text.as_deref()))
    }

    /// Text when present, otherwise the caption; used for quoted context.
    pub fn text_or_caption(&self) -> Option<&str> {
        non_blank(self.text.as_deref()).or_else(|| non_blank(self.caption.as_deref()))
    }

    pub fn replied_text(&self) -> Option<&str> {
        self.replied.as_deref().and_then(IncomingEvent::text_or_caption)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

pub fn mention_token(bot_username: &str) -> Option<String> {
    let username = bot_username.trim().trim_start_matches('@');
    if username.is_empty() {
        None
    } else {
        Some(format!("@{username}"))
    }
}

/// Literal substring match of `@username`.
pub fn mentions(text: Option<&str>, bot_username: &str) -> bool {
    match (text, mention_token(bot_username)) {
        (Some(text), Some(token)) => text.contains(&token),
        _ => false,
    }
}

/// Removes every `@username` token and trims the rest.
pub fn strip_mention(text: &str, bot_username: &str) -> String {
    match mention_token(bot_username) {
        Some(token) => text.replace(&token, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}
