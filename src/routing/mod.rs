pub mod action;
pub mod classifier;
pub mod command;
pub mod context;
pub mod event;

pub use action::Action;
pub use classifier::{classify, BotIdentity};
pub use context::ConversationContext;
pub use event::IncomingEvent;
