use crate::error::ValidationError;
use crate::routing::event::ImageRef;

/// The single decided outcome for one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do. `send_guidance` asks for the usage hint to be sent instead.
    Ignore { send_guidance: bool },
    ShowHelp,
    AnswerQuestion {
        question: String,
        prior_context: Option<String>,
    },
    GenerateImage {
        prompt: String,
    },
    EditImage {
        prompt: String,
        source: ImageRef,
    },
    RejectEmptyPrompt(ValidationError),
}

impl Action {
    pub fn ignore() -> Self {
        Action::Ignore {
            send_guidance: false,
        }
    }

    pub fn guidance() -> Self {
        Action::Ignore {
            send_guidance: true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Ignore {
                send_guidance: false,
            } => "ignore",
            Action::Ignore {
                send_guidance: true,
            } => "guidance",
            Action::ShowHelp => "help",
            Action::AnswerQuestion { .. } => "answer_question",
            Action::GenerateImage { .. } => "generate_image",
            Action::EditImage { .. } => "edit_image",
            Action::RejectEmptyPrompt(_) => "reject_empty_prompt",
        }
    }
}
