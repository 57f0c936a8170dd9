pub mod gemini;
pub mod media;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputModality {
    Text,
    TextAndImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub modality: OutputModality,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            image: None,
            modality: OutputModality::Text,
        }
    }

    pub fn image(prompt: impl Into<String>, source: Option<InlineImage>) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            image: source,
            modality: OutputModality::TextAndImage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPart {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// Ordered parts of one generation response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub parts: Vec<OutputPart>,
    pub citations: Vec<Citation>,
}

impl GenerationOutput {
    /// Non-blank text parts joined by newlines, followed by the source list.
    pub fn answer_text(&self) -> String {
        let body = self
            .parts
            .iter()
            .filter_map(|part| match part {
                OutputPart::Text(text) if !text.trim().is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if body.trim().is_empty() || self.citations.is_empty() {
            return body;
        }

        let sources = self
            .citations
            .iter()
            .enumerate()
            .map(|(index, citation)| {
                let title = if citation.title.trim().is_empty() {
                    citation.uri.as_str()
                } else {
                    citation.title.trim()
                };
                format!("{}. [{}]({})", index + 1, title, citation.uri)
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("{body}\n\n**Sumber:**\n{sources}")
    }
}

#[cfg(test)]
impl GenerationOutput {
    pub fn from_text(text: impl Into<String>) -> Self {
        GenerationOutput {
            parts: vec![OutputPart::Text(text.into())],
            citations: Vec::new(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, OutputPart::Image { .. }))
    }
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput>;
}
