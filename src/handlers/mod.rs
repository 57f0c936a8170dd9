pub mod dispatch;
pub mod gateway;
pub mod responses;

use std::error::Error;

use teloxide::prelude::*;
use tracing::debug;

use crate::routing::{classify, Action, IncomingEvent};
use crate::state::AppState;

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Classifies the message and dispatches the action on its own task so slow
/// generations never hold up other updates.
pub async fn handle_message(state: AppState, message: Message) -> HandlerResult {
    let Some(event) = IncomingEvent::from_message(&message, &state.identity.username) else {
        return Ok(());
    };

    let action = classify(&event, &state.identity, state.sessions.as_ref());
    if action == Action::ignore() {
        debug!(
            chat_id = event.chat_id,
            message_id = event.message_id,
            "Ignoring message"
        );
        return Ok(());
    }

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.dispatch(action, &event).await;
    });
    Ok(())
}
