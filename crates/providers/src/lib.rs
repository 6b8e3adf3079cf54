//! Provider capability traits (ASR, TTS, wake word, vectorizer, LLM) and
//! the registry that resolves default/fallback adapters per kind.

pub mod registry;
pub mod traits;

pub use registry::{ProviderInitError, ProviderRegistry};
pub use traits::{
    AsrProvider, AudioOutProvider, LlmIntentGuess, LlmProvider, TtsProvider, VectorizerProvider,
    WakeWordProvider, WakeWordResult,
};
