//! TTS/audio handoff (§4.8): synthesis writes to a temp file with a fresh
//! UUIDv4 name, playback reads it, and the orchestrator deletes it
//! regardless of how the attempt ends.

use std::path::{Path, PathBuf};

use va_domain::error::Result;
use va_providers::{AudioOutProvider, TtsProvider};

fn temp_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.audio", uuid::Uuid::new_v4()))
}

/// Synthesize `text` and play it back, deleting the temp file on every
/// path: success, synthesis failure, playback failure.
pub async fn speak(
    tts: &dyn TtsProvider,
    audio_out: &dyn AudioOutProvider,
    text: &str,
    language: &str,
    temp_dir: &Path,
) -> Result<()> {
    tokio::fs::create_dir_all(temp_dir).await?;
    let path = temp_path(temp_dir);

    let outcome = synthesize_and_play(tts, audio_out, text, language, &path).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete temp audio file");
        }
    }
    outcome
}

async fn synthesize_and_play(
    tts: &dyn TtsProvider,
    audio_out: &dyn AudioOutProvider,
    text: &str,
    language: &str,
    path: &Path,
) -> Result<()> {
    let bytes = tts.synthesize(text, language).await?;
    tokio::fs::write(path, &bytes).await?;
    audio_out.play(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeTts;
    #[async_trait]
    impl TtsProvider for FakeTts {
        async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
        fn provider_id(&self) -> &str {
            "fake"
        }
    }

    struct RecordingAudioOut {
        played_path: Arc<std::sync::Mutex<Option<PathBuf>>>,
    }
    #[async_trait]
    impl AudioOutProvider for RecordingAudioOut {
        async fn play(&self, path: &Path) -> Result<()> {
            *self.played_path.lock().unwrap() = Some(path.to_owned());
            Ok(())
        }
        fn provider_id(&self) -> &str {
            "fake"
        }
    }

    struct FailingTts;
    #[async_trait]
    impl TtsProvider for FailingTts {
        async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
            Err(va_domain::error::Error::Other("synth failed".to_owned()))
        }
        fn provider_id(&self) -> &str {
            "failing"
        }
    }

    struct NoopAudioOut;
    #[async_trait]
    impl AudioOutProvider for NoopAudioOut {
        async fn play(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn provider_id(&self) -> &str {
            "noop"
        }
    }

    #[tokio::test]
    async fn deletes_temp_file_after_successful_playback() {
        let dir = tempfile::tempdir().unwrap();
        let played = Arc::new(std::sync::Mutex::new(None));
        let audio_out = RecordingAudioOut { played_path: played.clone() };
        speak(&FakeTts, &audio_out, "hello", "en", dir.path()).await.unwrap();

        let path = played.lock().unwrap().clone().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists(), "temp audio file must be deleted after playback");
    }

    #[tokio::test]
    async fn deletes_temp_file_even_when_synthesis_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = speak(&FailingTts, &NoopAudioOut, "hello", "en", dir.path()).await;
        assert!(result.is_err());
        let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftover.is_empty(), "no temp file should survive a synthesis failure");
    }

    static PLAY_ATTEMPTED: AtomicBool = AtomicBool::new(false);
    struct FailingAudioOut;
    #[async_trait]
    impl AudioOutProvider for FailingAudioOut {
        async fn play(&self, _path: &Path) -> Result<()> {
            PLAY_ATTEMPTED.store(true, Ordering::SeqCst);
            Err(va_domain::error::Error::Other("playback failed".to_owned()))
        }
        fn provider_id(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn deletes_temp_file_even_when_playback_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = speak(&FakeTts, &FailingAudioOut, "hello", "en", dir.path()).await;
        assert!(result.is_err());
        assert!(PLAY_ATTEMPTED.load(Ordering::SeqCst));
        let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftover.is_empty(), "no temp file should survive a playback failure");
    }
}
