use crate::routing::event::{ChatKind, IncomingEvent};
use crate::session::SessionStore;

pub const PROMPT_SEPARATOR: &str = "\n\n";

/// Whether Session Memory may stand in for a missing reply target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFallback {
    Allowed,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    pub persona: Option<String>,
    pub prior_context: Option<String>,
}

impl ConversationContext {
    pub fn new(persona: Option<String>, prior_context: Option<String>) -> Self {
        ConversationContext {
            persona,
            prior_context,
        }
    }

    /// Persona, prior context and question joined by blank lines, in that order.
    pub fn build_prompt(&self, question: &str) -> String {
        [
            self.persona.as_deref(),
            self.prior_context.as_deref(),
            Some(question),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(PROMPT_SEPARATOR)
    }
}

/// Prior context for a question: the replied-to text first, then the sender's
/// last question (private chats only, when no replied-to text exists).
pub fn resolve_prior_context(
    event: &IncomingEvent,
    sessions: &dyn SessionStore,
    fallback: SessionFallback,
) -> Option<String> {
    if let Some(text) = event.replied_text() {
        return Some(text.trim().to_string());
    }

    if fallback == SessionFallback::Disabled || event.chat_kind != ChatKind::Private {
        return None;
    }

    let sender_id = event.sender_id?;
    sessions
        .last_question(sender_id)
        .filter(|question| !question.trim().is_empty())
}
