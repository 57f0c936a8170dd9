use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{
    Citation, GenerationOutput, GenerationRequest, GenerationService, OutputModality, OutputPart,
};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
        #[serde(default)]
        thought: bool,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebSource {
    uri: Option<String>,
    title: Option<String>,
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: i32,
    safety_profile: String,
    search_grounding: bool,
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Self {
        GeminiClient {
            api_key: config.gemini_api_key.trim().to_string(),
            base_url: config.gemini_base_url.clone(),
            text_model: config.gemini_text_model.clone(),
            image_model: config.gemini_image_model.clone(),
            temperature: config.gemini_temperature,
            top_k: config.gemini_top_k,
            top_p: config.gemini_top_p,
            max_output_tokens: config.gemini_max_output_tokens,
            safety_profile: config.gemini_safety_settings.clone(),
            search_grounding: config.enable_search_grounding,
        }
    }

    fn model_for(&self, modality: OutputModality) -> &str {
        match modality {
            OutputModality::Text => &self.text_model,
            OutputModality::TextAndImage => &self.image_model,
        }
    }

    fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            return text.to_string();
        }
        text.replace(&self.api_key, "[redacted]")
    }

    fn build_safety_settings(&self) -> Vec<Value> {
        let threshold = match self.safety_profile.as_str() {
            "standard" => "BLOCK_MEDIUM_AND_ABOVE",
            _ => "OFF",
        };

        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
            "HARM_CATEGORY_CIVIC_INTEGRITY",
        ]
        .iter()
        .map(|category| json!({ "category": category, "threshold": threshold }))
        .collect()
    }

    fn build_payload(&self, request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": general_purpose::STANDARD.encode(&image.bytes)
                }
            }));
        }

        let mut payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "safetySettings": self.build_safety_settings(),
        });
        let Some(object) = payload.as_object_mut() else {
            return payload;
        };

        match request.modality {
            OutputModality::Text => {
                object.insert(
                    "generationConfig".to_string(),
                    json!({
                        "temperature": self.temperature,
                        "topK": self.top_k,
                        "topP": self.top_p,
                        "maxOutputTokens": self.max_output_tokens,
                    }),
                );
                if self.search_grounding {
                    object.insert("tools".to_string(), json!([{ "google_search": {} }]));
                }
            }
            OutputModality::TextAndImage => {
                object.insert(
                    "generationConfig".to_string(),
                    json!({ "responseModalities": ["TEXT", "IMAGE"] }),
                );
            }
        }

        payload
    }

    async fn call_api(&self, model: &str, payload: &Value) -> Result<GeminiResponse> {
        if self.api_key.is_empty() {
            return Err(anyhow!("GOOGLE_API_KEY is not configured"));
        }

        let client = get_http_client();
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = model, payload = %summarize_payload(payload));
        }

        // Single attempt; failures go straight back to the caller.
        let response = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(GEMINI_REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                anyhow!("Gemini request failed: {}", err_text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = self.redact(&response.text().await.unwrap_or_default());
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput> {
        let model = self.model_for(request.modality).to_string();
        let operation = match (request.modality, request.image.is_some()) {
            (OutputModality::Text, _) => "answer_question",
            (OutputModality::TextAndImage, false) => "generate_image",
            (OutputModality::TextAndImage, true) => "edit_image",
        };
        let payload = self.build_payload(&request);
        let metadata = json!({
            "prompt_chars": request.prompt.chars().count(),
            "has_image": request.image.is_some(),
        });

        log_llm_timing("gemini", &model, operation, Some(metadata), || async {
            let response = self.call_api(&model, &payload).await?;
            let output = output_from_response(response)?;
            debug!(
                target: "llm.gemini",
                model = model.as_str(),
                parts = output.parts.len(),
                citations = output.citations.len(),
                "Gemini response parsed"
            );
            Ok(output)
        })
        .await
    }
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Payload with prompt text truncated and image data replaced by its length.
fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();
    if let Some(parts) = payload
        .pointer("/contents/0/parts")
        .and_then(|value| value.as_array())
    {
        let parts: Vec<Value> = parts
            .iter()
            .map(|part| {
                if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                    json!({ "text": truncate_for_log(text, 200) })
                } else if let Some(inline_data) = part.get("inlineData") {
                    let mime_type = inline_data
                        .get("mimeType")
                        .and_then(|value| value.as_str())
                        .unwrap_or("unknown");
                    let data_len = inline_data
                        .get("data")
                        .and_then(|value| value.as_str())
                        .map(str::len)
                        .unwrap_or(0);
                    json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
                } else {
                    json!({ "unknownPart": true })
                }
            })
            .collect();
        summary.insert("parts".to_string(), Value::Array(parts));
    }
    for key in ["generationConfig", "tools"] {
        if let Some(value) = payload.get(key) {
            summary.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn output_from_response(response: GeminiResponse) -> Result<GenerationOutput> {
    let candidates = response.candidates.unwrap_or_default();
    if candidates.is_empty() {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(anyhow!("Gemini blocked the prompt: {reason}"));
        }
    }

    let mut output = GenerationOutput::default();
    // Only the first candidate is used; Gemini returns one unless asked otherwise.
    let Some(candidate) = candidates.into_iter().next() else {
        return Ok(output);
    };

    for part in candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
    {
        match part {
            GeminiPart::Text { text, thought } => {
                if !thought && !text.trim().is_empty() {
                    output.parts.push(OutputPart::Text(text));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if !inline_data.mime_type.starts_with("image/") {
                    continue;
                }
                match general_purpose::STANDARD.decode(inline_data.data.as_bytes()) {
                    Ok(bytes) => output.parts.push(OutputPart::Image {
                        mime_type: inline_data.mime_type,
                        bytes,
                    }),
                    Err(err) => warn!("Discarding undecodable Gemini image part: {err}"),
                }
            }
            GeminiPart::Other(_) => {}
        }
    }

    let chunks = candidate
        .grounding_metadata
        .map(|metadata| metadata.grounding_chunks)
        .unwrap_or_default();
    for chunk in chunks {
        let Some(web) = chunk.web else { continue };
        let Some(uri) = web.uri.filter(|uri| !uri.trim().is_empty()) else {
            continue;
        };
        if output.citations.iter().any(|existing| existing.uri == uri) {
            continue;
        }
        output.citations.push(Citation {
            title: web.title.unwrap_or_default(),
            uri,
        });
    }

    Ok(output)
}
