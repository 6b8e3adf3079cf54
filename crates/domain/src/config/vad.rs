use serde::{Deserialize, Serialize};

/// `vad` — voice-activity-detection tuning, consumed by the audio
/// processor's state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VadConfig {
    #[serde(default = "d_energy_threshold")]
    pub energy_threshold: f32,
    #[serde(default = "d_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "d_voice_duration_ms")]
    pub voice_duration_ms: u32,
    #[serde(default = "d_silence_duration_ms")]
    pub silence_duration_ms: u32,
    #[serde(default = "d_max_segment_duration_s")]
    pub max_segment_duration_s: u32,
    #[serde(default = "d_true")]
    pub use_zero_crossing_rate: bool,
    #[serde(default)]
    pub adaptive_threshold: bool,
    #[serde(default = "d_buffer_size_frames")]
    pub buffer_size_frames: usize,
    #[serde(default = "d_zcr_min")]
    pub zcr_min: f32,
    #[serde(default = "d_zcr_max")]
    pub zcr_max: f32,
    #[serde(default = "d_smoothing_window")]
    pub smoothing_window_frames: usize,
    #[serde(default)]
    pub multi_frame_smoothing: bool,
}

fn d_energy_threshold() -> f32 {
    0.01
}
fn d_sensitivity() -> f32 {
    0.5
}
fn d_voice_duration_ms() -> u32 {
    100
}
fn d_silence_duration_ms() -> u32 {
    200
}
fn d_max_segment_duration_s() -> u32 {
    10
}
fn d_true() -> bool {
    true
}
fn d_buffer_size_frames() -> usize {
    100
}
fn d_zcr_min() -> f32 {
    0.02
}
fn d_zcr_max() -> f32 {
    0.5
}
fn d_smoothing_window() -> usize {
    5
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: d_energy_threshold(),
            sensitivity: d_sensitivity(),
            voice_duration_ms: d_voice_duration_ms(),
            silence_duration_ms: d_silence_duration_ms(),
            max_segment_duration_s: d_max_segment_duration_s(),
            use_zero_crossing_rate: d_true(),
            adaptive_threshold: false,
            buffer_size_frames: d_buffer_size_frames(),
            zcr_min: d_zcr_min(),
            zcr_max: d_zcr_max(),
            smoothing_window_frames: d_smoothing_window(),
            multi_frame_smoothing: false,
        }
    }
}

impl VadConfig {
    /// Number of consecutive positive frames required to enter
    /// `VOICE_ONSET`, given a frame duration.
    pub fn voice_frames_required(&self, frame_duration_ms: u32) -> u32 {
        (self.voice_duration_ms / frame_duration_ms.max(1)).max(1)
    }

    /// Number of consecutive negative frames required to trigger offset.
    pub fn silence_frames_required(&self, frame_duration_ms: u32) -> u32 {
        (self.silence_duration_ms / frame_duration_ms.max(1)).max(1)
    }
}
