use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-capability-kind provider configuration. `fallback_providers` being
/// empty means "fail the request if the default provider is unavailable"
/// rather than silently trying alternates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderKindConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    pub default: String,
    #[serde(default)]
    pub fallback_providers: Vec<String>,
}

fn d_true() -> bool {
    true
}

/// `providers.<kind>` table, keyed by capability kind (`"asr"`, `"tts"`,
/// `"wake_word"`, `"llm"`, `"vectorizer"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(flatten)]
    pub kinds: HashMap<String, ProviderKindConfig>,
}

impl ProvidersConfig {
    pub fn kind(&self, kind: &str) -> Option<&ProviderKindConfig> {
        self.kinds.get(kind)
    }
}
