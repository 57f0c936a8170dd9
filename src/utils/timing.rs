use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::routing::event::IncomingEvent;

const LOGGED_TEXT_LIMIT: usize = 300;

/// Logs when an action is received and when its processing completes.
#[derive(Debug)]
pub struct ActionTimer {
    action: String,
    chat_id: i64,
    sender_id: Option<u64>,
    message_id: i32,
    text: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl ActionTimer {
    pub fn from_event(action: &str, event: &IncomingEvent) -> Self {
        let text = event
            .text_or_caption()
            .map(|value| value.replace('\n', " "))
            .map(|value| {
                if value.chars().count() > LOGGED_TEXT_LIMIT {
                    value.chars().take(LOGGED_TEXT_LIMIT).collect()
                } else {
                    value
                }
            });

        ActionTimer {
            action: action.to_string(),
            chat_id: event.chat_id,
            sender_id: event.sender_id,
            message_id: event.message_id,
            text,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: "bot.timing",
            "event=action_received action={} chat_id={} sender_id={:?} message_id={} received_at={} text={:?}",
            self.action,
            self.chat_id,
            self.sender_id,
            self.message_id,
            self.started_at.to_rfc3339(),
            self.text
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "bot.timing",
            "event=action_completed action={} chat_id={} sender_id={:?} message_id={} started_at={} response_sent_at={} duration_s={:.3} status={} detail={}",
            self.action,
            self.chat_id,
            self.sender_id,
            self.message_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        self.log_completed();
    }
}

pub fn start_action_timer(action: &str, event: &IncomingEvent) -> ActionTimer {
    let timer = ActionTimer::from_event(action, event);
    timer.log_received();
    timer
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "bot.timing",
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    info!(
        target: "bot.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::event::ChatKind;

    #[test]
    fn logged_text_is_flattened_and_truncated() {
        let mut event = IncomingEvent::new(1, ChatKind::Private, 2);
        event.text = Some(format!("baris\n{}", "x".repeat(400)));
        let timer = ActionTimer::from_event("answer_question", &event);
        let text = timer.text.clone().unwrap_or_default();
        assert!(text.starts_with("baris x"));
        assert_eq!(text.chars().count(), LOGGED_TEXT_LIMIT);
    }

    #[tokio::test]
    async fn llm_timing_passes_the_result_through() {
        let ok = log_llm_timing("gemini", "m", "op", None, || async { Ok(5) }).await;
        assert_eq!(ok.ok(), Some(5));
        let err: Result<(), _> =
            log_llm_timing("gemini", "m", "op", None, || async { Err(anyhow::anyhow!("x")) })
                .await;
        assert!(err.is_err());
    }
}
