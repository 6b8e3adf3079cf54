//! PipelineOrchestrator (§4.8): wires VAD, wake word, ASR, text
//! normalization, the NLU cascade, and intent dispatch into the three
//! entry modes — text, audio-with-wake-word, and audio-with-wake-word-
//! skipped.

pub mod orchestrator;
pub mod tts;

pub use orchestrator::{PipelineOrchestrator, PipelineProviders};
