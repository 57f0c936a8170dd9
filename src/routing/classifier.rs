use crate::error::{require_non_empty, ValidationError};
use crate::routing::action::Action;
use crate::routing::command::{image_command_prompt, parse_command, Command, ParsedCommand};
use crate::routing::context::{resolve_prior_context, SessionFallback};
use crate::routing::event::{strip_mention, ChatKind, ImageRef, IncomingEvent};
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    pub username: String,
}

impl BotIdentity {
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        BotIdentity {
            id,
            username: username.into(),
        }
    }
}

/// Decides what to do with one event. The first matching rule wins:
///
/// 1. bot added to the chat, `/start`, `/help` → help
/// 2. `/tanya` → question; when it replies to one of the bot's messages it is
///    ignored outright and the turn gets no reply at all
/// 3. `/gambar` without any image involved → generation
/// 4. an image plus an edit trigger → edit
/// 5. a reply to one of the bot's text messages → question
/// 6. a group mention → question
/// 7. private free text → question with reply or session context, or the usage hint
/// 8. anything else → ignore
///
/// Commands addressed to another bot are always ignored. Unknown commands of
/// ours fall through to rules 4 to 8 like any other text.
///
/// Reads Session Memory but never writes it.
pub fn classify(event: &IncomingEvent, bot: &BotIdentity, sessions: &dyn SessionStore) -> Action {
    if event.new_member_ids.contains(&bot.id) {
        return Action::ShowHelp;
    }

    let command = event
        .text
        .as_deref()
        .or(event.caption.as_deref())
        .and_then(|text| parse_command(text, &bot.username));
    let attachment = resolve_attachment(event);

    match command {
        Some(ParsedCommand::Known(Command::Start | Command::Help)) => return Action::ShowHelp,
        Some(ParsedCommand::Known(Command::Tanya(arg))) => {
            return classify_explicit_question(event, bot, sessions, &arg)
        }
        Some(ParsedCommand::Known(Command::Gambar(arg))) if attachment.is_none() => {
            let prompt = strip_mention(&arg, &bot.username);
            return match require_non_empty(&prompt, ValidationError::EmptyImagePrompt) {
                Ok(prompt) => Action::GenerateImage { prompt },
                Err(err) => Action::RejectEmptyPrompt(err),
            };
        }
        Some(ParsedCommand::NotForUs) => return Action::ignore(),
        // Unknown commands get no command handling; the remaining rules treat
        // them as ordinary text.
        _ => {}
    }

    if let Some(source) = attachment {
        return match image_edit_prompt(event, bot) {
            Some(raw) => match require_non_empty(&raw, ValidationError::EmptyImagePrompt) {
                Ok(prompt) => Action::EditImage { prompt, source },
                Err(err) => Action::RejectEmptyPrompt(err),
            },
            None => Action::ignore(),
        };
    }

    let replied_to_bot_text = event
        .replied
        .as_deref()
        .is_some_and(|replied| replied.is_from(bot.id) && replied.text_or_caption().is_some());
    if replied_to_bot_text {
        let Some(text) = event.text.as_deref() else {
            return Action::ignore();
        };
        return question_action(
            &strip_mention(text, &bot.username),
            resolve_prior_context(event, sessions, SessionFallback::Disabled),
        );
    }

    if event.chat_kind.is_group_like() && event.is_bot_mentioned {
        let Some(text) = event.text.as_deref() else {
            return Action::ignore();
        };
        return question_action(
            &strip_mention(text, &bot.username),
            resolve_prior_context(event, sessions, SessionFallback::Disabled),
        );
    }

    if event.chat_kind == ChatKind::Private {
        let Some(text) = event.text.as_deref().filter(|text| !text.trim().is_empty()) else {
            return Action::ignore();
        };
        return match resolve_prior_context(event, sessions, SessionFallback::Allowed) {
            Some(prior_context) => Action::AnswerQuestion {
                question: text.trim().to_string(),
                prior_context: Some(prior_context),
            },
            None => Action::guidance(),
        };
    }

    Action::ignore()
}

fn classify_explicit_question(
    event: &IncomingEvent,
    bot: &BotIdentity,
    sessions: &dyn SessionStore,
    arg: &str,
) -> Action {
    // Replying to the bot with /tanya gets no answer; rule 5 is never
    // reached for this event.
    if event
        .replied
        .as_deref()
        .is_some_and(|replied| replied.is_from(bot.id))
    {
        return Action::ignore();
    }
    question_action(
        &strip_mention(arg, &bot.username),
        resolve_prior_context(event, sessions, SessionFallback::Disabled),
    )
}

fn question_action(question: &str, prior_context: Option<String>) -> Action {
    match require_non_empty(question, ValidationError::EmptyQuestion) {
        Ok(question) => Action::AnswerQuestion {
            question,
            prior_context,
        },
        Err(err) => Action::RejectEmptyPrompt(err),
    }
}

/// The event's own image first, then the image of the message it replies to.
fn resolve_attachment(event: &IncomingEvent) -> Option<ImageRef> {
    event
        .own_image()
        .or_else(|| event.replied.as_deref().and_then(IncomingEvent::own_image))
}

/// Raw edit prompt when one of the edit triggers applies, `None` otherwise.
fn image_edit_prompt(event: &IncomingEvent, bot: &BotIdentity) -> Option<String> {
    for text in [event.caption.as_deref(), event.text.as_deref()]
        .into_iter()
        .flatten()
    {
        if let Some(prompt) = image_command_prompt(text, &bot.username) {
            return Some(strip_mention(&prompt, &bot.username));
        }
    }

    let content = || strip_mention(event.caption_or_text().unwrap_or_default(), &bot.username);

    let replied_to_bot_image = event.replied.as_deref().is_some_and(|replied| {
        replied.is_from(bot.id) && replied.own_image().is_some()
    });
    if replied_to_bot_image {
        return Some(content());
    }

    if event.chat_kind.is_group_like() && event.is_bot_mentioned {
        return Some(content());
    }

    if event.chat_kind == ChatKind::Private {
        return Some(content());
    }

    None
}
