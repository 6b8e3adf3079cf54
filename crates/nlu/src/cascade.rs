//! The NLU cascade (§4.5): runs the configured plugins in fixed order,
//! stopping at the first one whose confidence clears its threshold, and
//! always falling through to the conversation fallback.

use std::time::Duration;

use va_domain::config::NluConfig;
use va_domain::error::Result;
use va_domain::model::Intent;
use va_donations::DonationSnapshot;
use va_providers::{LlmProvider, VectorizerProvider};
use va_sessions::UnifiedContext;

use crate::fallback::{self, RejectedCandidate};
use crate::keyword::KeywordMatcher;
use crate::llm_stage::LlmStage;
use crate::rule_based::{self, RuleBasedMatcher};
use crate::semantic::SemanticMatcher;
use crate::{extraction, text_normalizer};

/// Built once per donation snapshot and reused across requests; rebuild
/// whenever the snapshot is reloaded.
pub struct Cascade {
    config: NluConfig,
    snapshot: std::sync::Arc<DonationSnapshot>,
    keyword: KeywordMatcher,
    rule_based: Option<RuleBasedMatcher>,
    semantic: Option<SemanticMatcher>,
    known_intents: Vec<String>,
}

impl Cascade {
    pub fn build(config: NluConfig, snapshot: std::sync::Arc<DonationSnapshot>) -> Self {
        let methods: Vec<_> = snapshot.all_methods().cloned().collect();
        let plugins = config.normalized_plugins();

        let keyword = KeywordMatcher::build(&methods, config.max_text_length_for_fuzzy, config.fuzzy_cache_size);

        let rule_based = if plugins.iter().any(|p| p == "rule_based") {
            Some(RuleBasedMatcher::build(&methods, &snapshot.negative_patterns))
        } else {
            None
        };

        let known_intents: Vec<String> = snapshot.by_intent_name.keys().cloned().collect();

        Self {
            config,
            snapshot,
            keyword,
            rule_based,
            semantic: None,
            known_intents,
        }
    }

    /// Build the semantic-vector centroids against `vectorizer`. A no-op
    /// (stage stays disabled) if `semantic_vector` isn't enabled.
    pub async fn with_semantic(mut self, vectorizer: &dyn VectorizerProvider, cache_ttl: Duration) -> Result<Self> {
        if self.config.normalized_plugins().iter().any(|p| p == "semantic_vector") {
            let methods: Vec<_> = self.snapshot.all_methods().cloned().collect();
            self.semantic = Some(SemanticMatcher::build(&methods, vectorizer, cache_ttl).await?);
        }
        Ok(self)
    }

    fn parameters_for(&self, full_intent_name: &str) -> &[va_donations::types::ParameterSpec] {
        self.snapshot
            .method_by_intent(full_intent_name)
            .map(|m| m.parameters.as_slice())
            .unwrap_or(&[])
    }

    /// Recognize `text` against the current session's language. Never
    /// fails — the last resort is always the conversation fallback intent.
    pub async fn recognize(
        &self,
        text: &str,
        context: &UnifiedContext,
        vectorizer: Option<&dyn VectorizerProvider>,
        llm: Option<&dyn LlmProvider>,
    ) -> Intent {
        let session_id = context.session_id().to_owned();
        let plugins = self.config.normalized_plugins();
        let mut attempted: Vec<&str> = Vec::new();
        let mut rejected: Vec<RejectedCandidate> = Vec::new();

        for plugin in &plugins {
            match plugin.as_str() {
                "keyword_matcher" => {
                    attempted.push("keyword_matcher");
                    if let Some(hit) = self.keyword.best_match(text) {
                        let threshold = self.config.threshold_for("keyword_matcher");
                        if hit.confidence >= threshold {
                            return self.finish(&hit.full_intent_name, hit.confidence, text, &session_id, &[], &Default::default());
                        }
                        rejected.push(RejectedCandidate {
                            stage: "keyword_matcher".to_owned(),
                            full_intent_name: hit.full_intent_name,
                            confidence: hit.confidence,
                        });
                    }
                }
                "rule_based" => {
                    if let Some(matcher) = &self.rule_based {
                        attempted.push("rule_based");
                        let tokens = rule_based::tokenize(text);
                        if let Some(hit) = matcher.best_match(text) {
                            let threshold = self.config.threshold_for("rule_based");
                            if hit.confidence >= threshold {
                                return self.finish(&hit.full_intent_name, hit.confidence, text, &session_id, &tokens, &hit.slots);
                            }
                            rejected.push(RejectedCandidate {
                                stage: "rule_based".to_owned(),
                                full_intent_name: hit.full_intent_name,
                                confidence: hit.confidence,
                            });
                        }
                    }
                }
                "semantic_vector" => {
                    if let (Some(matcher), Some(vectorizer)) = (&self.semantic, vectorizer) {
                        attempted.push("semantic_vector");
                        let threshold = self.config.semantic_threshold_for();
                        if let Ok(Some(hit)) = matcher.best_match(text, vectorizer, threshold).await {
                            return self.finish(&hit.full_intent_name, hit.confidence, text, &session_id, &[], &Default::default());
                        }
                    }
                }
                "llm_nlu" => {
                    if let Some(llm) = llm {
                        attempted.push("llm_nlu");
                        let stage = LlmStage::new(&self.known_intents);
                        if let Ok(Some(hit)) = stage.best_match(text, llm).await {
                            let mut intent = Intent::new(&hit.full_intent_name, text, &session_id)
                                .with_confidence(hit.confidence)
                                .with_entities(hit.entities);
                            intent.metadata.insert(
                                "_recognition_provider".to_owned(),
                                va_domain::model::Value::String("llm_nlu".to_owned()),
                            );
                            return intent;
                        }
                    }
                }
                other => {
                    tracing::warn!(plugin = %other, "unknown nlu plugin in configuration, skipping");
                }
            }
        }

        let normalized = text_normalizer::normalize(
            text,
            &text_normalizer::request_context_with_language(&context.language()),
            text_normalizer::Stage::General,
        );
        let _ = normalized; // fallback carries the raw text verbatim, not re-normalized
        fallback::build_fallback(text, &session_id, &rejected, &attempted)
    }

    fn finish(
        &self,
        full_intent_name: &str,
        confidence: f32,
        raw_text: &str,
        session_id: &str,
        tokens: &[va_donations::dsl::Token],
        slots: &std::collections::HashMap<String, va_donations::dsl::MatchSpan>,
    ) -> Intent {
        let mut intent = Intent::new(full_intent_name, raw_text, session_id).with_confidence(confidence);
        let parameters = self.parameters_for(full_intent_name);
        match extraction::extract_parameters(raw_text, tokens, slots, parameters) {
            Ok(entities) => intent.entities = entities,
            Err(e) => {
                tracing::warn!(intent = %full_intent_name, error = %e, "parameter extraction failed");
                intent
                    .metadata
                    .insert("_extraction_error".to_owned(), va_domain::model::Value::String(e.to_string()));
            }
        }
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use va_domain::config::ContextConfig;
    use va_donations::types::{DonationExample, HandlerDonation, ParameterSpec, ParameterType, SUPPORTED_SCHEMA_VERSION};

    fn snapshot_with_timer() -> std::sync::Arc<DonationSnapshot> {
        let donation = HandlerDonation {
            schema_version: SUPPORTED_SCHEMA_VERSION.to_owned(),
            handler_domain: "timers".to_owned(),
            global_parameters: vec![],
            method_donations: vec![va_donations::types::MethodDonation {
                method_name: "set_timer".to_owned(),
                intent_suffix: "set".to_owned(),
                phrases: vec!["set a timer".to_owned()],
                lemmas: vec![],
                parameters: vec![ParameterSpec {
                    name: "duration".to_owned(),
                    param_type: ParameterType::Duration,
                    required: true,
                    default_value: None,
                    description: None,
                    choices: None,
                    min_value: None,
                    max_value: None,
                    pattern: None,
                    extraction_patterns: vec![r"(\d+\s*minutes?)".to_owned()],
                    aliases: vec![],
                }],
                token_patterns: vec![],
                slot_patterns: Default::default(),
                examples: vec![DonationExample {
                    text: "set a timer".to_owned(),
                    parameters: Default::default(),
                }],
                boost: 1.0,
                full_intent_name: "timers.set".to_owned(),
                handler_domain: "timers".to_owned(),
            }],
            negative_patterns: vec![],
        };
        std::sync::Arc::new(DonationSnapshot::build(vec![donation]))
    }

    #[tokio::test]
    async fn exact_keyword_match_extracts_duration() {
        let cascade = Cascade::build(NluConfig::default(), snapshot_with_timer());
        let ctx = UnifiedContext::new("kitchen_session", ContextConfig::default());
        let intent = cascade.recognize("set a timer for 5 minutes", &ctx, None, None).await;
        assert_eq!(intent.name, "timers.set");
        assert_eq!(
            intent.entities.get("duration"),
            Some(&va_domain::model::Value::Float(300.0))
        );
    }

    #[tokio::test]
    async fn unrelated_text_falls_back() {
        let cascade = Cascade::build(NluConfig::default(), snapshot_with_timer());
        let ctx = UnifiedContext::new("kitchen_session", ContextConfig::default());
        let intent = cascade.recognize("what a beautiful day outside", &ctx, None, None).await;
        assert_eq!(intent.name, "conversation.general");
    }

    #[tokio::test]
    async fn cascade_is_deterministic_for_same_input() {
        let cascade = Cascade::build(NluConfig::default(), snapshot_with_timer());
        let ctx = UnifiedContext::new("kitchen_session", ContextConfig::default());
        let a = cascade.recognize("set a timer for 5 minutes", &ctx, None, None).await;
        let b = cascade.recognize("set a timer for 5 minutes", &ctx, None, None).await;
        assert_eq!(a.name, b.name);
        assert_eq!(a.confidence, b.confidence);
    }
}
