//! Capability traits every external provider adapter implements. Concrete
//! adapters (a real ASR engine, a real TTS engine, a real embedding
//! service, a real LLM) are not part of this crate — only the seams they
//! plug into.

use va_audio::VoiceSegment;
use va_domain::error::Result;
use va_domain::model::Entities;

/// Converts a finished voice segment into text.
#[async_trait::async_trait]
pub trait AsrProvider: Send + Sync {
    async fn transcribe(&self, segment: &VoiceSegment, language: &str) -> Result<String>;
    fn provider_id(&self) -> &str;
}

/// Synthesizes text into audio bytes. The caller (the pipeline
/// orchestrator) is responsible for writing the bytes to a temp file and
/// deleting it after playback.
#[async_trait::async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
    fn provider_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeWordResult {
    pub detected: bool,
    pub confidence: f32,
}

/// Detects a wake word in a voice segment.
#[async_trait::async_trait]
pub trait WakeWordProvider: Send + Sync {
    async fn detect(&self, segment: &VoiceSegment) -> Result<WakeWordResult>;
    fn provider_id(&self) -> &str;
}

/// Embeds text into a fixed-dimensional vector, for the semantic-vector
/// NLU stage.
#[async_trait::async_trait]
pub trait VectorizerProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn provider_id(&self) -> &str;
}

/// A candidate intent guess produced by the LLM-as-NLU stage.
#[derive(Debug, Clone)]
pub struct LlmIntentGuess {
    pub intent_name: String,
    pub entities: Entities,
}

/// Plays back a synthesized audio file. The pipeline orchestrator owns
/// the temp file's lifecycle; this trait only plays it.
#[async_trait::async_trait]
pub trait AudioOutProvider: Send + Sync {
    async fn play(&self, path: &std::path::Path) -> Result<()>;
    fn provider_id(&self) -> &str;
}

/// Drives both the LLM-as-NLU cascade stage and the conversation handler.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Classify `text` against the closed set of `candidate_intents`,
    /// constrained to return one of them (or reject entirely).
    async fn classify_intent(
        &self,
        text: &str,
        candidate_intents: &[String],
    ) -> Result<Option<LlmIntentGuess>>;

    /// Free-form conversational reply, used by the conversation fallback
    /// handler.
    async fn converse(&self, messages: &[(String, String)]) -> Result<String>;

    fn provider_id(&self) -> &str;
}
