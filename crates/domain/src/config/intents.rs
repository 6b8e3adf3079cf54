use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `intents.handlers.enabled/disabled` plus the domain-priority table used
/// to disambiguate contextual commands when more than one domain has an
/// active fire-and-forget action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentsConfig {
    #[serde(default)]
    pub handlers: HandlersConfig,
    /// Higher value wins when resolving a contextual command against
    /// multiple active domains. Domains absent from this map have priority 0.
    #[serde(default)]
    pub domain_priority: HashMap<String, i32>,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            handlers: HandlersConfig::default(),
            domain_priority: HashMap::new(),
        }
    }
}

impl IntentsConfig {
    pub fn priority_of(&self, domain: &str) -> i32 {
        self.domain_priority.get(domain).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlersConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl HandlersConfig {
    pub fn is_enabled(&self, domain: &str) -> bool {
        if self.disabled.iter().any(|d| d == domain) {
            return false;
        }
        self.enabled.is_empty() || self.enabled.iter().any(|d| d == domain)
    }
}
