//! Voice-activity-detection state machine: turns a stream of fixed-duration
//! audio frames into variable-length voice segments for downstream ASR.

mod segment;
mod vad;

pub use segment::{Frame, VoiceSegment};
pub use vad::{AudioProcessor, VadState};
