mod components;
mod context;
mod fire_forget;
mod intents;
mod nlu;
mod providers;
mod server;
mod storage;
mod vad;
mod workflows;

pub use components::{Component, ComponentsConfig};
pub use context::ContextConfig;
pub use fire_forget::FireForgetConfig;
pub use intents::{HandlersConfig, IntentsConfig};
pub use nlu::NluConfig;
pub use providers::{ProviderKindConfig, ProvidersConfig};
pub use server::{RoomsConfig, ServerConfig};
pub use storage::StorageConfig;
pub use vad::VadConfig;
pub use workflows::WorkflowsConfig;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The single structured configuration document for the runtime (§6.6).
/// Every recognized option is enumerated by a field here or in a nested
/// config struct; unrecognized fields are rejected rather than ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub components: ComponentsConfig,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub nlu: NluConfig,
    #[serde(default)]
    pub intents: IntentsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub fire_forget: FireForgetConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
}

impl Config {
    /// Load from a TOML file, falling back to built-in defaults (with a
    /// warning) if the file is missing or fails to parse.
    pub fn load_or_default(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<Config>(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to parse config, using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read config, using defaults");
                Config::default()
            }
        }
    }

    /// Boot-time validation. Fatal conditions return `Err`; non-fatal ones
    /// are logged as warnings.
    pub fn validate(&self) -> Result<()> {
        let tts_enabled = self.components.is_enabled(Component::Tts);
        let audio_enabled = self.components.is_enabled(Component::Audio);
        if tts_enabled && !audio_enabled {
            return Err(Error::ConfigValidation(
                "components.tts is enabled without components.audio".to_owned(),
            ));
        }

        if !self.workflows.enabled.iter().any(|w| w == &self.workflows.default) {
            return Err(Error::ConfigValidation(format!(
                "workflows.default '{}' is not present in workflows.enabled",
                self.workflows.default
            )));
        }

        if self.components.is_enabled(Component::Nlu) {
            let non_fallback_plugins: Vec<_> = self
                .nlu
                .normalized_plugins()
                .into_iter()
                .filter(|p| p != "conversation_fallback")
                .collect();
            if non_fallback_plugins.is_empty() {
                tracing::warn!("nlu is enabled with no plugins other than the fallback stage");
            }
        }

        Ok(())
    }
}
