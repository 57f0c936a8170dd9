use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::error::{require_non_empty, DispatchError, ValidationError};
use crate::handlers::gateway::{ChatActivity, MessagingGateway};
use crate::handlers::responses::{
    reply_in_chunks, reply_plain, EDIT_APOLOGY, GENERATE_APOLOGY, GUIDANCE_MESSAGE, HELP_MESSAGE,
    NO_ANSWER_MESSAGE, NO_IMAGE_MESSAGE, QUESTION_APOLOGY, TIMEOUT_APOLOGY,
};
use crate::llm::media::{extension_for_mime, image_mime_type};
use crate::llm::{GenerationOutput, GenerationRequest, GenerationService, InlineImage, OutputPart};
use crate::persona::PersonaStore;
use crate::routing::event::ImageRef;
use crate::routing::{Action, ConversationContext, IncomingEvent};
use crate::session::SessionStore;
use crate::utils::telegram::start_chat_action_heartbeat;
use crate::utils::timing::start_action_timer;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_chunk_length: usize,
    pub generation_timeout: Duration,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Rejected,
    Upstream,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was sent.
    Skipped,
    /// A single fixed-text reply was sent.
    Notice,
    Answered { chunks: usize },
    Imaged { photos: usize, texts: usize },
    Failed(FailureKind),
}

impl DispatchOutcome {
    fn status(&self) -> &'static str {
        match self {
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::Notice => "notice",
            DispatchOutcome::Answered { .. } | DispatchOutcome::Imaged { .. } => "success",
            DispatchOutcome::Failed(FailureKind::Rejected) => "rejected",
            DispatchOutcome::Failed(FailureKind::Upstream) => "error",
            DispatchOutcome::Failed(FailureKind::Timeout) => "timeout",
        }
    }
}

/// Executes classified actions against the collaborators.
pub struct Orchestrator {
    gateway: Arc<dyn MessagingGateway>,
    generator: Arc<dyn GenerationService>,
    sessions: Arc<dyn SessionStore>,
    persona: Arc<dyn PersonaStore>,
    settings: DispatchSettings,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        generator: Arc<dyn GenerationService>,
        sessions: Arc<dyn SessionStore>,
        persona: Arc<dyn PersonaStore>,
        settings: DispatchSettings,
    ) -> Self {
        Orchestrator {
            gateway,
            generator,
            sessions,
            persona,
            settings,
        }
    }

    /// Runs `action` for `event`. Every failure is answered with one apology
    /// reply and reported in the outcome; nothing is retried.
    pub async fn dispatch(&self, action: Action, event: &IncomingEvent) -> DispatchOutcome {
        let mut timer = start_action_timer(action.label(), event);

        let outcome = match action {
            Action::Ignore {
                send_guidance: false,
            } => DispatchOutcome::Skipped,
            Action::Ignore {
                send_guidance: true,
            } => self.notice(event, GUIDANCE_MESSAGE).await,
            Action::ShowHelp => self.notice(event, HELP_MESSAGE).await,
            Action::RejectEmptyPrompt(err) => self.notice(event, err.user_message()).await,
            Action::AnswerQuestion {
                question,
                prior_context,
            } => match self.answer(event, &question, prior_context).await {
                Ok(chunks) => DispatchOutcome::Answered { chunks },
                Err(err) => self.fail(event, err, QUESTION_APOLOGY).await,
            },
            Action::GenerateImage { prompt } => match self.images(event, &prompt, None).await {
                Ok(outcome) => outcome,
                Err(err) => self.fail(event, err, GENERATE_APOLOGY).await,
            },
            Action::EditImage { prompt, source } => {
                match self.images(event, &prompt, Some(&source)).await {
                    Ok(outcome) => outcome,
                    Err(err) => self.fail(event, err, EDIT_APOLOGY).await,
                }
            }
        };

        timer.mark_status(outcome.status(), None);
        timer.log_completed();
        outcome
    }

    async fn notice(&self, event: &IncomingEvent, text: &str) -> DispatchOutcome {
        match reply_plain(self.gateway.as_ref(), event.chat_id, event.message_id, text).await {
            Ok(()) => DispatchOutcome::Notice,
            Err(err) => {
                error!(
                    chat_id = event.chat_id,
                    message_id = event.message_id,
                    "Failed to send notice: {err:#}"
                );
                DispatchOutcome::Failed(FailureKind::Upstream)
            }
        }
    }

    async fn fail(
        &self,
        event: &IncomingEvent,
        err: DispatchError,
        apology: &str,
    ) -> DispatchOutcome {
        let (text, kind) = match &err {
            DispatchError::Validation(validation) => {
                (validation.user_message(), FailureKind::Rejected)
            }
            other if other.is_timeout() => (TIMEOUT_APOLOGY, FailureKind::Timeout),
            _ => (apology, FailureKind::Upstream),
        };
        error!(
            chat_id = event.chat_id,
            message_id = event.message_id,
            "Dispatch failed: {err}"
        );
        if let Err(send_err) =
            reply_plain(self.gateway.as_ref(), event.chat_id, event.message_id, text).await
        {
            error!(
                chat_id = event.chat_id,
                message_id = event.message_id,
                "Failed to send apology: {send_err:#}"
            );
        }
        DispatchOutcome::Failed(kind)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, DispatchError> {
        let limit = self.settings.generation_timeout;
        match tokio::time::timeout(limit, self.generator.generate(request)).await {
            Ok(result) => result.map_err(DispatchError::Generation),
            Err(_) => Err(DispatchError::Timeout(limit)),
        }
    }

    async fn answer(
        &self,
        event: &IncomingEvent,
        question: &str,
        prior_context: Option<String>,
    ) -> Result<usize, DispatchError> {
        let question = require_non_empty(question, ValidationError::EmptyQuestion)?;
        let persona = self.persona.persona().await;
        let prompt = ConversationContext::new(persona, prior_context).build_prompt(&question);

        let output = {
            let _heartbeat = start_chat_action_heartbeat(
                self.gateway.clone(),
                event.chat_id,
                ChatActivity::Typing,
            );
            self.generate(GenerationRequest::text(prompt)).await?
        };

        if let Some(sender_id) = event.sender_id {
            self.sessions.remember_question(sender_id, &question);
        }

        let mut answer = output.answer_text();
        if answer.trim().is_empty() {
            answer = NO_ANSWER_MESSAGE.to_string();
        }
        let delivery = reply_in_chunks(
            self.gateway.as_ref(),
            event.chat_id,
            event.message_id,
            &answer,
            self.settings.max_chunk_length,
        )
        .await;
        info!(
            chat_id = event.chat_id,
            delivered = delivery.delivered,
            apologized = delivery.apologized,
            "Answer delivered"
        );
        Ok(delivery.delivered + delivery.apologized)
    }

    async fn load_source(&self, source: &ImageRef) -> Result<InlineImage, DispatchError> {
        let bytes = self
            .gateway
            .fetch_file(&source.file_id)
            .await
            .map_err(DispatchError::Gateway)?;
        Ok(InlineImage {
            mime_type: image_mime_type(&bytes, source.mime_type.as_deref()),
            bytes,
        })
    }

    async fn images(
        &self,
        event: &IncomingEvent,
        prompt: &str,
        source: Option<&ImageRef>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let prompt = require_non_empty(prompt, ValidationError::EmptyImagePrompt)?;
        let _heartbeat = start_chat_action_heartbeat(
            self.gateway.clone(),
            event.chat_id,
            ChatActivity::UploadPhoto,
        );

        let image = match source {
            Some(source) => Some(self.load_source(source).await?),
            None => None,
        };
        let output = self.generate(GenerationRequest::image(prompt, image)).await?;

        let mut photos = 0usize;
        let mut texts = 0usize;
        for part in output.parts {
            match part {
                OutputPart::Text(text) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    reply_in_chunks(
                        self.gateway.as_ref(),
                        event.chat_id,
                        event.message_id,
                        &text,
                        self.settings.max_chunk_length,
                    )
                    .await;
                    texts += 1;
                }
                OutputPart::Image { mime_type, bytes } => {
                    self.send_image(event, &mime_type, &bytes).await?;
                    photos += 1;
                }
            }
        }

        if photos == 0 {
            reply_plain(
                self.gateway.as_ref(),
                event.chat_id,
                event.message_id,
                NO_IMAGE_MESSAGE,
            )
            .await
            .map_err(DispatchError::Gateway)?;
        }

        Ok(DispatchOutcome::Imaged { photos, texts })
    }

    /// Writes the image to a temporary file, sends it and deletes the file.
    /// The file is also removed when writing fails.
    async fn send_image(
        &self,
        event: &IncomingEvent,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<(), DispatchError> {
        let suffix = format!(".{}", extension_for_mime(mime_type));
        let temp = tempfile::Builder::new()
            .prefix("gemini-image-")
            .suffix(&suffix)
            .tempfile_in(&self.settings.temp_dir)?;
        tokio::fs::write(temp.path(), bytes).await?;

        let sent = self
            .gateway
            .send_photo(event.chat_id, Some(event.message_id), temp.path())
            .await;
        release_temp_file(temp);
        sent.map_err(DispatchError::Gateway)
    }
}

fn release_temp_file(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(err) = file.close() {
        warn!("Failed to delete temporary image {}: {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::handlers::gateway::TextFormat;
    use crate::routing::classify;
    use crate::routing::event::{ChatKind, ImageSource};
    use crate::routing::BotIdentity;
    use crate::session::InMemorySessionStore;

    const CHAT: i64 = 7;
    const SENDER: u64 = 42;
    const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text {
            text: String,
            format: TextFormat,
            reply_to: Option<i32>,
        },
        Photo {
            reply_to: Option<i32>,
            existed: bool,
            path: PathBuf,
        },
    }

    #[derive(Default)]
    struct FakeGateway {
        sent: Mutex<Vec<Sent>>,
        fail_fetch: bool,
        fail_photo: bool,
    }

    impl FakeGateway {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|sent| match sent {
                    Sent::Text { text, .. } => Some(text),
                    Sent::Photo { .. } => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MessagingGateway for FakeGateway {
        async fn send_text(
            &self,
            _chat_id: i64,
            reply_to: Option<i32>,
            text: &str,
            format: TextFormat,
        ) -> anyhow::Result<()> {
            self.sent.lock().push(Sent::Text {
                text: text.to_string(),
                format,
                reply_to,
            });
            Ok(())
        }

        async fn send_photo(
            &self,
            _chat_id: i64,
            reply_to: Option<i32>,
            path: &Path,
        ) -> anyhow::Result<()> {
            self.sent.lock().push(Sent::Photo {
                reply_to,
                existed: path.exists(),
                path: path.to_path_buf(),
            });
            if self.fail_photo {
                return Err(anyhow!("sendPhoto rejected"));
            }
            Ok(())
        }

        async fn fetch_file(&self, _file_id: &str) -> anyhow::Result<Vec<u8>> {
            if self.fail_fetch {
                return Err(anyhow!("getFile failed"));
            }
            Ok(PNG_BYTES.to_vec())
        }

        async fn send_activity(&self, _: i64, _: ChatActivity) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        requests: Mutex<Vec<GenerationRequest>>,
        responses: Mutex<VecDeque<anyhow::Result<GenerationOutput>>>,
        delay: Option<Duration>,
    }

    impl FakeGenerator {
        fn replying(responses: Vec<anyhow::Result<GenerationOutput>>) -> Self {
            FakeGenerator {
                responses: Mutex::new(responses.into()),
                ..FakeGenerator::default()
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl GenerationService for FakeGenerator {
        async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationOutput> {
            self.requests.lock().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationOutput::default()))
        }
    }

    struct FixedPersona(Option<String>);

    #[async_trait]
    impl PersonaStore for FixedPersona {
        async fn persona(&self) -> Option<String> {
            self.0.clone()
        }
    }

    struct Harness {
        gateway: Arc<FakeGateway>,
        generator: Arc<FakeGenerator>,
        sessions: Arc<InMemorySessionStore>,
        orchestrator: Orchestrator,
        temp_dir: tempfile::TempDir,
    }

    fn harness(gateway: FakeGateway, generator: FakeGenerator, persona: Option<&str>) -> Harness {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let gateway = Arc::new(gateway);
        let generator = Arc::new(generator);
        let sessions = Arc::new(InMemorySessionStore::new(None, 100));
        let orchestrator = Orchestrator::new(
            gateway.clone(),
            generator.clone(),
            sessions.clone(),
            Arc::new(FixedPersona(persona.map(str::to_string))),
            DispatchSettings {
                max_chunk_length: 3500,
                generation_timeout: Duration::from_secs(5),
                temp_dir: temp_dir.path().to_path_buf(),
            },
        );
        Harness {
            gateway,
            generator,
            sessions,
            orchestrator,
            temp_dir,
        }
    }

    fn private_text(message_id: i32, text: &str) -> IncomingEvent {
        let mut event = IncomingEvent::new(CHAT, ChatKind::Private, message_id);
        event.sender_id = Some(SENDER);
        event.text = Some(text.to_string());
        event
    }

    fn image_output() -> GenerationOutput {
        GenerationOutput {
            parts: vec![
                OutputPart::Text("Ini kucing oren".to_string()),
                OutputPart::Image {
                    mime_type: "image/png".to_string(),
                    bytes: PNG_BYTES.to_vec(),
                },
            ],
            citations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn question_then_follow_up_uses_session_memory() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![
                Ok(GenerationOutput::from_text("Fotosintesis adalah proses.")),
                Ok(GenerationOutput::from_text("Lebih detail.")),
            ]),
            Some("Kamu asisten ramah."),
        );
        let bot = BotIdentity::new(999, "GeminiBot");

        let first = private_text(1, "/tanya Apa itu fotosintesis");
        let action = classify(&first, &bot, h.sessions.as_ref());
        assert_eq!(
            action,
            Action::AnswerQuestion {
                question: "Apa itu fotosintesis".to_string(),
                prior_context: None
            }
        );
        assert_eq!(
            h.orchestrator.dispatch(action, &first).await,
            DispatchOutcome::Answered { chunks: 1 }
        );
        assert_eq!(
            h.sessions.last_question(SENDER).as_deref(),
            Some("Apa itu fotosintesis")
        );

        let second = private_text(2, "Jelaskan lebih detail");
        let action = classify(&second, &bot, h.sessions.as_ref());
        assert_eq!(
            action,
            Action::AnswerQuestion {
                question: "Jelaskan lebih detail".to_string(),
                prior_context: Some("Apa itu fotosintesis".to_string())
            }
        );
        h.orchestrator.dispatch(action, &second).await;

        let prompts: Vec<String> = h
            .generator
            .requests()
            .into_iter()
            .map(|request| request.prompt)
            .collect();
        assert_eq!(
            prompts,
            vec![
                "Kamu asisten ramah.\n\nApa itu fotosintesis".to_string(),
                "Kamu asisten ramah.\n\nApa itu fotosintesis\n\nJelaskan lebih detail"
                    .to_string(),
            ]
        );
        assert_eq!(
            h.gateway.sent(),
            vec![
                Sent::Text {
                    text: "Fotosintesis adalah proses\\.".to_string(),
                    format: TextFormat::MarkdownV2,
                    reply_to: Some(1)
                },
                Sent::Text {
                    text: "Lebih detail\\.".to_string(),
                    format: TextFormat::MarkdownV2,
                    reply_to: Some(2)
                },
            ]
        );
    }

    #[tokio::test]
    async fn generate_image_sends_text_then_photo_and_cleans_up() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![Ok(image_output())]),
            None,
        );
        let event = private_text(5, "/gambar kucing oren");
        let action = classify(&event, &BotIdentity::new(999, "GeminiBot"), h.sessions.as_ref());
        assert_eq!(
            action,
            Action::GenerateImage {
                prompt: "kucing oren".to_string()
            }
        );

        let outcome = h.orchestrator.dispatch(action, &event).await;
        assert_eq!(outcome, DispatchOutcome::Imaged { photos: 1, texts: 1 });

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Sent::Text {
                text: "Ini kucing oren".to_string(),
                format: TextFormat::MarkdownV2,
                reply_to: Some(5)
            }
        );
        let Sent::Photo {
            reply_to,
            existed,
            path,
        } = &sent[1]
        else {
            panic!("expected a photo, got {:?}", sent[1]);
        };
        assert_eq!(*reply_to, Some(5));
        assert!(*existed);
        assert!(!path.exists());
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("png"));

        let requests = h.generator.requests();
        let request = &requests[0];
        assert_eq!(request.prompt, "kucing oren");
        assert!(request.image.is_none());
        assert!(h.sessions.last_question(SENDER).is_none());
    }

    #[tokio::test]
    async fn missing_image_part_sends_fixed_notice() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![Ok(GenerationOutput::from_text("Maaf."))]),
            None,
        );
        let event = private_text(5, "/gambar apa saja");
        let outcome = h
            .orchestrator
            .dispatch(
                Action::GenerateImage {
                    prompt: "apa saja".to_string(),
                },
                &event,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Imaged { photos: 0, texts: 1 });
        assert_eq!(
            h.gateway.texts(),
            vec!["Maaf\\.".to_string(), NO_IMAGE_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn edit_sends_the_source_image_with_sniffed_type() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![Ok(image_output())]),
            None,
        );
        let event = private_text(5, "jadikan hitam putih");
        let source = ImageRef {
            file_id: "photo-1".to_string(),
            source: ImageSource::Photo,
            mime_type: None,
        };
        h.orchestrator
            .dispatch(
                Action::EditImage {
                    prompt: "jadikan hitam putih".to_string(),
                    source,
                },
                &event,
            )
            .await;

        let requests = h.generator.requests();
        let request = &requests[0];
        let image = request.image.as_ref().expect("source image");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, PNG_BYTES);
    }

    #[tokio::test]
    async fn failed_download_yields_one_edit_apology() {
        let gateway = FakeGateway {
            fail_fetch: true,
            ..FakeGateway::default()
        };
        let h = harness(gateway, FakeGenerator::default(), None);
        let event = private_text(5, "edit");
        let source = ImageRef {
            file_id: "photo-1".to_string(),
            source: ImageSource::Photo,
            mime_type: None,
        };
        let outcome = h
            .orchestrator
            .dispatch(
                Action::EditImage {
                    prompt: "edit".to_string(),
                    source,
                },
                &event,
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Upstream));
        assert_eq!(h.gateway.texts(), vec![EDIT_APOLOGY.to_string()]);
        assert!(h.generator.requests().is_empty());
    }

    #[tokio::test]
    async fn rejected_photo_still_deletes_the_temp_file() {
        let gateway = FakeGateway {
            fail_photo: true,
            ..FakeGateway::default()
        };
        let h = harness(gateway, FakeGenerator::replying(vec![Ok(image_output())]), None);
        let event = private_text(6, "jadikan kartun");
        let outcome = h
            .orchestrator
            .dispatch(
                Action::EditImage {
                    prompt: "jadikan kartun".to_string(),
                    source: ImageRef {
                        file_id: "photo-1".to_string(),
                        source: ImageSource::Photo,
                        mime_type: None,
                    },
                },
                &event,
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Upstream));
        let sent = h.gateway.sent();
        let Some(Sent::Photo { existed, path, .. }) =
            sent.iter().find(|sent| matches!(sent, Sent::Photo { .. }))
        else {
            panic!("expected a photo attempt, got {sent:?}");
        };
        assert!(*existed);
        assert!(!path.exists());

        let texts = h.gateway.texts();
        assert_eq!(
            texts.iter().filter(|text| text.as_str() == EDIT_APOLOGY).count(),
            1
        );
        assert_eq!(texts.last().map(String::as_str), Some(EDIT_APOLOGY));
        assert!(!texts.iter().any(|text| text == GENERATE_APOLOGY));

        let leftovers = std::fs::read_dir(h.temp_dir.path())
            .expect("read temp dir")
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn generation_error_sends_apology_and_keeps_session_untouched() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![Err(anyhow!("quota exceeded"))]),
            None,
        );
        let event = private_text(3, "/tanya halo");
        let outcome = h
            .orchestrator
            .dispatch(
                Action::AnswerQuestion {
                    question: "halo".to_string(),
                    prior_context: None,
                },
                &event,
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Upstream));
        assert_eq!(
            h.gateway.sent(),
            vec![Sent::Text {
                text: QUESTION_APOLOGY.to_string(),
                format: TextFormat::Plain,
                reply_to: Some(3)
            }]
        );
        assert!(h.sessions.last_question(SENDER).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out_with_dedicated_apology() {
        let generator = FakeGenerator {
            delay: Some(Duration::from_secs(600)),
            ..FakeGenerator::default()
        };
        let h = harness(FakeGateway::default(), generator, None);
        let event = private_text(3, "/tanya lama sekali");
        let outcome = h
            .orchestrator
            .dispatch(
                Action::AnswerQuestion {
                    question: "lama sekali".to_string(),
                    prior_context: None,
                },
                &event,
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed(FailureKind::Timeout));
        assert_eq!(h.gateway.texts(), vec![TIMEOUT_APOLOGY.to_string()]);
    }

    #[tokio::test]
    async fn empty_answer_is_replaced_by_fallback_text() {
        let h = harness(
            FakeGateway::default(),
            FakeGenerator::replying(vec![Ok(GenerationOutput::default())]),
            None,
        );
        let event = private_text(3, "/tanya ?");
        h.orchestrator
            .dispatch(
                Action::AnswerQuestion {
                    question: "?".to_string(),
                    prior_context: None,
                },
                &event,
            )
            .await;
        assert_eq!(
            h.gateway.texts(),
            vec!["Maaf, tidak ada jawaban\\.".to_string()]
        );
        assert_eq!(h.sessions.last_question(SENDER).as_deref(), Some("?"));
    }

    #[tokio::test]
    async fn fixed_replies_never_call_the_generator() {
        let h = harness(FakeGateway::default(), FakeGenerator::default(), None);
        let event = private_text(9, "hai");

        let cases = [
            (Action::ShowHelp, DispatchOutcome::Notice),
            (Action::guidance(), DispatchOutcome::Notice),
            (
                Action::RejectEmptyPrompt(ValidationError::EmptyImagePrompt),
                DispatchOutcome::Notice,
            ),
            (Action::ignore(), DispatchOutcome::Skipped),
        ];
        for (action, expected) in cases {
            assert_eq!(h.orchestrator.dispatch(action, &event).await, expected);
        }

        assert_eq!(
            h.gateway.texts(),
            vec![
                HELP_MESSAGE.to_string(),
                GUIDANCE_MESSAGE.to_string(),
                "Deskripsi gambar tidak boleh kosong.".to_string(),
            ]
        );
        assert!(h.generator.requests().is_empty());
    }
}
