use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::format::DEFAULT_MAX_CHUNK_LENGTH;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub enable_search_grounding: bool,
    pub persona_file_path: PathBuf,
    pub max_chunk_length: usize,
    pub generation_timeout_seconds: u64,
    pub session_ttl_seconds: u64,
    pub session_max_entries: usize,
    pub drop_pending_updates: bool,
    pub image_temp_dir: PathBuf,
    /// Problems found while loading, logged by [`Config::log_summary`].
    pub load_warnings: Vec<String>,
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// First non-empty value among `names`, in order.
fn env_string_any(names: &[&str], default: &str) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Normalized safety profile, plus a warning when `value` was not recognised.
fn normalize_gemini_safety_settings(value: &str) -> (String, Option<String>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ("permissive".to_string(), None);
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => ("permissive".to_string(), None),
        "standard" => ("standard".to_string(), None),
        _ => (
            "permissive".to_string(),
            Some(format!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{value}'; defaulting to permissive."
            )),
        ),
    }
}

fn loaded_label(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "missing"
    } else {
        "loaded"
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env_string_any(&["TELEGRAM_BOT_TOKEN", "BOT_TOKEN"], "");
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("TELEGRAM_BOT_TOKEN is required"));
        }

        let image_temp_dir = env::var("IMAGE_TEMP_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let mut load_warnings = Vec::new();
        let (gemini_safety_settings, safety_warning) =
            normalize_gemini_safety_settings(&env_string("GEMINI_SAFETY_SETTINGS", "permissive"));
        load_warnings.extend(safety_warning);

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string_any(&["GOOGLE_API_KEY", "GEMINI_API_KEY"], ""),
            gemini_base_url: env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            )
            .trim_end_matches('/')
            .to_string(),
            gemini_text_model: env_string("GOOGLE_MODEL_TEXT", "gemini-2.5-flash"),
            gemini_image_model: env_string(
                "GOOGLE_MODEL_IMAGE",
                "gemini-2.5-flash-image-preview",
            ),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 8192),
            gemini_safety_settings,
            enable_search_grounding: env_bool("ENABLE_SEARCH_GROUNDING", true),
            persona_file_path: PathBuf::from(env_string("PERSONA_FILE_PATH", "persona.txt")),
            max_chunk_length: env_usize("MAX_CHUNK_LENGTH", DEFAULT_MAX_CHUNK_LENGTH).max(1),
            generation_timeout_seconds: env_u64("GENERATION_TIMEOUT_SECONDS", 120).max(1),
            session_ttl_seconds: env_u64("SESSION_TTL_SECONDS", 86_400),
            session_max_entries: env_usize("SESSION_MAX_ENTRIES", 10_000).max(1),
            drop_pending_updates: env_bool("DROP_PENDING_UPDATES", true),
            image_temp_dir,
            load_warnings,
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        if self.session_ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session_ttl_seconds))
        }
    }

    /// Logs which secrets are present and which models are selected, never the secrets.
    pub fn log_summary(&self) {
        info!(
            "Configuration: bot_token={} gemini_api_key={} text_model={} image_model={} search_grounding={} persona_file={}",
            loaded_label(&self.bot_token),
            loaded_label(&self.gemini_api_key),
            self.gemini_text_model,
            self.gemini_image_model,
            self.enable_search_grounding,
            self.persona_file_path.display()
        );
        for warning in &self.load_warnings {
            warn!("{warning}");
        }
        if self.gemini_api_key.trim().is_empty() {
            warn!("GOOGLE_API_KEY is not set; every generation request will fail");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_safety_profile_falls_back_to_permissive_with_a_warning() {
        let (profile, warning) = normalize_gemini_safety_settings("strict");
        assert_eq!(profile, "permissive");
        assert!(warning.is_some_and(|text| text.contains("'strict'")));

        assert_eq!(
            normalize_gemini_safety_settings(" Standard "),
            ("standard".to_string(), None)
        );
        assert_eq!(
            normalize_gemini_safety_settings(""),
            ("permissive".to_string(), None)
        );
    }

    #[test]
    fn loaded_label_never_echoes_the_secret() {
        assert_eq!(loaded_label("abc123"), "loaded");
        assert_eq!(loaded_label("  "), "missing");
    }
}
