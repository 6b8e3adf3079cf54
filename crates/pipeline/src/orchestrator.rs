//! PipelineOrchestrator (§4.8): threads audio or text through VAD, wake
//! word, ASR, text normalization, the NLU cascade, and intent dispatch.
//! Exactly one [`UnifiedContext`] flows, unchanged, from entry to
//! dispatch — no stage here constructs its own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use va_audio::{AudioProcessor, Frame};
use va_domain::config::VadConfig;
use va_domain::error::Error;
use va_domain::model::{Intent, IntentResult, RequestContext};
use va_domain::trace::TraceEvent;
use va_intent::IntentOrchestrator;
use va_nlu::text_normalizer::{self, Stage};
use va_nlu::Cascade;
use va_providers::{AsrProvider, AudioOutProvider, LlmProvider, TtsProvider, VectorizerProvider, WakeWordProvider};
use va_sessions::{ContextManager, UnifiedContext};

use crate::tts;

/// Providers the pipeline calls directly; all optional, since the
/// components that back them may be disabled (§6.6 `components`).
#[derive(Default, Clone)]
pub struct PipelineProviders {
    pub asr: Option<Arc<dyn AsrProvider>>,
    pub tts: Option<Arc<dyn TtsProvider>>,
    pub wake_word: Option<Arc<dyn WakeWordProvider>>,
    pub audio_out: Option<Arc<dyn AudioOutProvider>>,
    pub vectorizer: Option<Arc<dyn VectorizerProvider>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
}

pub struct PipelineOrchestrator {
    context_manager: Arc<ContextManager>,
    cascade: parking_lot::RwLock<Arc<Cascade>>,
    intent_orchestrator: Arc<IntentOrchestrator>,
    providers: PipelineProviders,
    vad_config: VadConfig,
    temp_audio_dir: PathBuf,
}

impl PipelineOrchestrator {
    pub fn new(
        context_manager: Arc<ContextManager>,
        cascade: Arc<Cascade>,
        intent_orchestrator: Arc<IntentOrchestrator>,
        providers: PipelineProviders,
        vad_config: VadConfig,
        temp_audio_dir: PathBuf,
    ) -> Self {
        Self {
            context_manager,
            cascade: parking_lot::RwLock::new(cascade),
            intent_orchestrator,
            providers,
            vad_config,
            temp_audio_dir,
        }
    }

    /// Atomically replace the cascade, e.g. after a donation registry
    /// reload produced a new immutable snapshot (§3.5).
    pub fn replace_cascade(&self, cascade: Arc<Cascade>) {
        *self.cascade.write() = cascade;
    }

    /// Text-mode entry (§4.8): skips VAD/WW/ASR, entering at
    /// `TextNormalizer`. An optional `deadline` bounds the NLU+dispatch
    /// portion of the request; on expiry, `active_actions` is left
    /// untouched and the result reports `error: "deadline"`.
    pub async fn handle_text(
        &self,
        request_ctx: &RequestContext,
        text: &str,
        deadline: Option<Duration>,
    ) -> IntentResult {
        let context = self.context_manager.get_with_request_info(&request_ctx.session_id, request_ctx);
        let result = self.process_command(&context, text, deadline).await;
        if request_ctx.wants_audio_response {
            self.maybe_speak(&context, &result).await;
        }
        result
    }

    /// Audio-mode entry (§4.8): VAD → wake word (unless
    /// `request_ctx.skip_wake_word`) → ASR → the same command path as
    /// text mode. Returns one [`IntentResult`] per dispatched command
    /// (segments that never produce a command, e.g. wake-word-only or
    /// empty transcriptions, contribute nothing to the returned list).
    pub async fn handle_audio_stream<I>(
        &self,
        request_ctx: &RequestContext,
        frames: I,
        deadline: Option<Duration>,
    ) -> Vec<IntentResult>
    where
        I: IntoIterator<Item = Frame>,
    {
        let context = self.context_manager.get_with_request_info(&request_ctx.session_id, request_ctx);
        let processor = AudioProcessor::new(self.vad_config.clone());
        let mut wake_detected = request_ctx.skip_wake_word;
        let mut results = Vec::new();

        for segment in processor.process_stream(frames) {
            TraceEvent::VoiceSegmentDetected {
                session_id: context.session_id().to_owned(),
                frame_count: segment.frame_count(),
                duration_ms: segment.duration_ms() as u64,
                truncated: segment.truncated,
            }
            .emit();

            if !wake_detected {
                let Some(wake_word) = &self.providers.wake_word else {
                    continue;
                };
                let detected = match wake_word.detect(&segment).await {
                    Ok(r) => {
                        TraceEvent::WakeWordDetected {
                            session_id: context.session_id().to_owned(),
                            detected: r.detected,
                            confidence: r.confidence,
                        }
                        .emit();
                        r.detected
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "wake word detection failed, skipping segment");
                        false
                    }
                };
                if !detected {
                    continue;
                }
                wake_detected = true;
                continue;
            }

            let Some(asr) = &self.providers.asr else {
                continue;
            };
            let text = match asr.transcribe(&segment, &context.language()).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, "asr transcription failed, skipping segment");
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }

            let result = self.process_command(&context, &text, deadline).await;
            if request_ctx.wants_audio_response {
                self.maybe_speak(&context, &result).await;
            }
            results.push(result);
            wake_detected = request_ctx.skip_wake_word;
        }

        results
    }

    /// The shared tail of both entry modes: normalize → recognize →
    /// dispatch → append history. `raw_text` is already-transcribed (or
    /// caller-supplied) text, not yet ASR-stage normalized.
    async fn process_command(&self, context: &Arc<UnifiedContext>, raw_text: &str, deadline: Option<Duration>) -> IntentResult {
        let work = self.run_command(context, raw_text);
        match deadline {
            Some(d) => match tokio::time::timeout(d, work).await {
                Ok((text, intent, result)) => {
                    context.append_history(text, result.text.clone(), intent.name.clone(), context.client_id());
                    result
                }
                Err(_) => IntentResult::failed("", Error::DeadlineExceeded.to_string()),
            },
            None => {
                let (text, intent, result) = work.await;
                context.append_history(text, result.text.clone(), intent.name.clone(), context.client_id());
                result
            }
        }
    }

    async fn run_command(&self, context: &Arc<UnifiedContext>, raw_text: &str) -> (String, Intent, IntentResult) {
        let request_ctx_for_language = text_normalizer::request_context_with_language(&context.language());
        let normalized = text_normalizer::normalize(raw_text, &request_ctx_for_language, Stage::AsrOutput);
        TraceEvent::TextNormalized {
            session_id: context.session_id().to_owned(),
            stage: "asr_output".to_owned(),
            input_chars: raw_text.chars().count(),
            output_chars: normalized.chars().count(),
        }
        .emit();

        let cascade = self.cascade.read().clone();
        let intent = cascade
            .recognize(
                &normalized,
                context,
                self.providers.vectorizer.as_deref(),
                self.providers.llm.as_deref(),
            )
            .await;
        TraceEvent::NluRecognized {
            session_id: context.session_id().to_owned(),
            intent_name: intent.name.clone(),
            confidence: intent.confidence,
            stage: "cascade".to_owned(),
        }
        .emit();

        let result = self.intent_orchestrator.execute(&intent, context).await;
        (normalized, intent, result)
    }

    async fn maybe_speak(&self, context: &Arc<UnifiedContext>, result: &IntentResult) {
        if !result.should_speak {
            return;
        }
        let Some(text) = &result.text else { return };
        let (Some(tts), Some(audio_out)) = (&self.providers.tts, &self.providers.audio_out) else {
            return;
        };
        match tts::speak(tts.as_ref(), audio_out.as_ref(), text, &context.language(), &self.temp_audio_dir).await {
            Ok(()) => {
                TraceEvent::TtsSynthesized {
                    session_id: context.session_id().to_owned(),
                    chars: text.chars().count(),
                    duration_ms: 0,
                }
                .emit();
            }
            Err(e) => tracing::warn!(error = %e, "tts synthesis/playback failed"),
        }
    }
}
