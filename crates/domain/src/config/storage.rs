use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `storage` — filesystem locations the runtime is allowed to write to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Mandatory when TTS and audio output are both enabled; defaults to a
    /// subdirectory of the system temp directory.
    #[serde(default = "d_temp_audio_dir")]
    pub temp_audio_dir: PathBuf,
}

fn d_temp_audio_dir() -> PathBuf {
    std::env::temp_dir().join("voice-runtime-audio")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_audio_dir: d_temp_audio_dir(),
        }
    }
}
