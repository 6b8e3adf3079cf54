use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const KEYWORD_MATCHER: &str = "keyword_matcher";

/// `nlu.enabled_plugins` and per-plugin threshold overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NluConfig {
    #[serde(default = "default_plugins")]
    pub enabled_plugins: Vec<String>,
    /// Cascade-wide default confidence threshold, overridable per plugin.
    #[serde(default = "d_default_threshold")]
    pub default_threshold: f32,
    #[serde(default)]
    pub per_plugin_threshold: HashMap<String, f32>,
    #[serde(default = "d_fuzzy_threshold")]
    pub semantic_threshold: f32,
    #[serde(default = "d_max_text_length_for_fuzzy")]
    pub max_text_length_for_fuzzy: usize,
    #[serde(default = "d_fuzzy_cache_size")]
    pub fuzzy_cache_size: usize,
}

fn default_plugins() -> Vec<String> {
    vec![
        KEYWORD_MATCHER.to_owned(),
        "rule_based".to_owned(),
        "semantic_vector".to_owned(),
        "llm_nlu".to_owned(),
    ]
}

fn d_default_threshold() -> f32 {
    0.8
}

fn d_fuzzy_threshold() -> f32 {
    0.55
}

fn d_max_text_length_for_fuzzy() -> usize {
    200
}

fn d_fuzzy_cache_size() -> usize {
    1000
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            enabled_plugins: default_plugins(),
            default_threshold: d_default_threshold(),
            per_plugin_threshold: HashMap::new(),
            semantic_threshold: d_fuzzy_threshold(),
            max_text_length_for_fuzzy: d_max_text_length_for_fuzzy(),
            fuzzy_cache_size: d_fuzzy_cache_size(),
        }
    }
}

impl NluConfig {
    /// `keyword_matcher` is mandatory; auto-prepend it if the configured
    /// list omits it.
    pub fn normalized_plugins(&self) -> Vec<String> {
        if self
            .enabled_plugins
            .iter()
            .any(|p| p == KEYWORD_MATCHER)
        {
            self.enabled_plugins.clone()
        } else {
            let mut plugins = vec![KEYWORD_MATCHER.to_owned()];
            plugins.extend(self.enabled_plugins.iter().cloned());
            plugins
        }
    }

    pub fn threshold_for(&self, plugin: &str) -> f32 {
        self.per_plugin_threshold
            .get(plugin)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// The semantic-vector stage defaults to `semantic_threshold` (0.55)
    /// rather than the cascade-wide `default_threshold` (0.8); an explicit
    /// `per_plugin_threshold["semantic_vector"]` still overrides it.
    pub fn semantic_threshold_for(&self) -> f32 {
        self.per_plugin_threshold
            .get("semantic_vector")
            .copied()
            .unwrap_or(self.semantic_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_matcher_auto_prepended() {
        let cfg = NluConfig {
            enabled_plugins: vec!["semantic_vector".to_owned()],
            ..NluConfig::default()
        };
        let normalized = cfg.normalized_plugins();
        assert_eq!(normalized[0], KEYWORD_MATCHER);
    }

    #[test]
    fn explicit_keyword_matcher_not_duplicated() {
        let cfg = NluConfig {
            enabled_plugins: vec![KEYWORD_MATCHER.to_owned(), "rule_based".to_owned()],
            ..NluConfig::default()
        };
        let normalized = cfg.normalized_plugins();
        assert_eq!(normalized.iter().filter(|p| *p == KEYWORD_MATCHER).count(), 1);
    }

    #[test]
    fn per_plugin_threshold_overrides_default() {
        let mut cfg = NluConfig::default();
        cfg.per_plugin_threshold.insert("rule_based".to_owned(), 0.95);
        assert_eq!(cfg.threshold_for("rule_based"), 0.95);
        assert_eq!(cfg.threshold_for("semantic_vector"), cfg.default_threshold);
    }
}
