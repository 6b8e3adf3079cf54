use serde::{Deserialize, Serialize};

/// The set of pluggable components a deployment may instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Audio,
    Tts,
    Asr,
    Llm,
    Nlu,
    TextProcessor,
    VoiceTrigger,
}

/// `components.enabled`/`components.disabled` — an explicit disable always
/// wins over an explicit enable for the same component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: Vec<Component>,
    #[serde(default)]
    pub disabled: Vec<Component>,
}

fn default_enabled() -> Vec<Component> {
    vec![
        Component::Audio,
        Component::Asr,
        Component::Nlu,
        Component::TextProcessor,
        Component::VoiceTrigger,
    ]
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            disabled: Vec::new(),
        }
    }
}

impl ComponentsConfig {
    pub fn is_enabled(&self, component: Component) -> bool {
        !self.disabled.contains(&component) && self.enabled.contains(&component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_overrides_enabled() {
        let cfg = ComponentsConfig {
            enabled: vec![Component::Tts],
            disabled: vec![Component::Tts],
        };
        assert!(!cfg.is_enabled(Component::Tts));
    }

    #[test]
    fn default_enables_core_voice_components() {
        let cfg = ComponentsConfig::default();
        assert!(cfg.is_enabled(Component::Audio));
        assert!(!cfg.is_enabled(Component::Tts));
    }
}
