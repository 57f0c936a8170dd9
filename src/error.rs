use std::time::Duration;

pub const EMPTY_QUESTION_MESSAGE: &str = "Pertanyaan tidak boleh kosong.";
pub const EMPTY_IMAGE_PROMPT_MESSAGE: &str = "Deskripsi gambar tidak boleh kosong.";

/// Rejected before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("image prompt is empty")]
    EmptyImagePrompt,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::EmptyQuestion => EMPTY_QUESTION_MESSAGE,
            ValidationError::EmptyImagePrompt => EMPTY_IMAGE_PROMPT_MESSAGE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("generation service failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("messaging gateway failed: {0:#}")]
    Gateway(anyhow::Error),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("temporary image resource failed: {0}")]
    Resource(#[from] std::io::Error),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout(_))
    }
}

/// Trims `value` and rejects it with `error` when nothing is left.
pub fn require_non_empty(value: &str, error: ValidationError) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(error)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_prompt_is_rejected() {
        let result = require_non_empty("  \n ", ValidationError::EmptyImagePrompt);
        assert_eq!(result, Err(ValidationError::EmptyImagePrompt));
    }

    #[test]
    fn prompt_is_trimmed_when_accepted() {
        let result = require_non_empty("  kucing oren ", ValidationError::EmptyImagePrompt);
        assert_eq!(result.as_deref(), Ok("kucing oren"));
    }

    #[test]
    fn timeout_is_reported_as_such() {
        let err = DispatchError::Timeout(Duration::from_secs(3));
        assert!(err.is_timeout());
        assert!(!DispatchError::Generation(anyhow::anyhow!("boom")).is_timeout());
    }
}
