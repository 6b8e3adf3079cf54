//! The rule-based NLU stage (§4.5.2): matches the compiled token-pattern
//! DSL from each donation method against a lightweight token stream.

use std::collections::HashMap;

use va_donations::dsl::{self, CompiledPattern, Token};
use va_donations::{MethodDonation, ParameterSpec};

/// Confidence assigned to a rule-based match before `boost` is applied.
/// A structural token-pattern match is treated as more reliable than a
/// keyword match but not treated as an automatic 1.0, so a low `boost`
/// can still let a later cascade stage win.
const RULE_MATCH_CONFIDENCE_BASE: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct RuleHit {
    pub full_intent_name: String,
    pub confidence: f32,
    pub slots: HashMap<String, dsl::MatchSpan>,
}

/// No integrated POS tagger or lemmatizer; `lemma` mirrors `lower` and
/// `pos` is left empty. POS-keyed token constraints compile but will
/// never match until a real tagger is wired in as a provider.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut is_first = true;
    text.split_whitespace()
        .map(|raw| {
            let lower = raw.to_lowercase();
            let is_alpha = raw.chars().all(|c| c.is_alphabetic());
            let like_num = raw.chars().all(|c| c.is_ascii_digit()) && !raw.is_empty();
            let token = Token {
                text: raw.to_owned(),
                lower: lower.clone(),
                lemma: lower,
                pos: String::new(),
                is_alpha,
                like_num,
                is_sent_start: is_first,
            };
            is_first = false;
            token
        })
        .collect()
}

struct CompiledMethod {
    full_intent_name: String,
    boost: f32,
    patterns: Vec<CompiledPattern>,
    slot_patterns: HashMap<String, CompiledPattern>,
    parameters: Vec<ParameterSpec>,
}

pub struct RuleBasedMatcher {
    methods: Vec<CompiledMethod>,
    negative_patterns: Vec<CompiledPattern>,
}

impl RuleBasedMatcher {
    /// `negative_patterns` have already passed donation validation (§4.4
    /// rule 7), so compilation here cannot fail; a pattern that failed to
    /// compile would have kept its donation out of the snapshot entirely.
    pub fn build(methods: &[MethodDonation], negative_patterns: &[va_donations::types::TokenPattern]) -> Self {
        let compiled = methods
            .iter()
            .filter(|m| !m.token_patterns.is_empty() || !m.slot_patterns.is_empty())
            .map(|m| CompiledMethod {
                full_intent_name: m.full_intent_name.clone(),
                boost: m.boost,
                patterns: m
                    .token_patterns
                    .iter()
                    .filter_map(|p| dsl::compile_pattern(p).ok())
                    .collect(),
                slot_patterns: dsl::compile_slot_patterns(&m.slot_patterns).unwrap_or_default(),
                parameters: m.parameters.clone(),
            })
            .collect();
        let negative = negative_patterns
            .iter()
            .filter_map(|p| dsl::compile_pattern(p).ok())
            .collect();
        Self {
            methods: compiled,
            negative_patterns: negative,
        }
    }

    /// Returns the highest-`boost`-weighted method whose token pattern
    /// matches, with any slot patterns resolved against the same tokens.
    /// A matching negative pattern suppresses every candidate (§4.5.2).
    pub fn best_match(&self, text: &str) -> Option<RuleHit> {
        let tokens = tokenize(text);

        if self.negative_patterns.iter().any(|p| p.find(&tokens).is_some()) {
            return None;
        }

        let mut best: Option<RuleHit> = None;
        for method in &self.methods {
            if !method.patterns.iter().any(|p| p.find(&tokens).is_some()) {
                continue;
            }
            let confidence = (RULE_MATCH_CONFIDENCE_BASE * method.boost).min(1.0);
            if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
                let slots = method
                    .slot_patterns
                    .iter()
                    .filter_map(|(name, pattern)| pattern.find(&tokens).map(|span| (name.clone(), span)))
                    .collect();
                best = Some(RuleHit {
                    full_intent_name: method.full_intent_name.clone(),
                    confidence,
                    slots,
                });
            }
        }
        best
    }

    /// Parameter specs declared for a matched method, by full intent name
    /// — used by the parameter extractor to interpret `slots`.
    pub fn parameters_for(&self, full_intent_name: &str) -> &[ParameterSpec] {
        self.methods
            .iter()
            .find(|m| m.full_intent_name == full_intent_name)
            .map(|m| m.parameters.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use va_donations::types::TokenConstraint;

    fn pattern_set_a_timer() -> Vec<Vec<TokenConstraint>> {
        let mut set_tok = TokenConstraint::new();
        set_tok.insert("LOWER".to_owned(), json!("set"));
        let mut timer_tok = TokenConstraint::new();
        timer_tok.insert("LOWER".to_owned(), json!("timer"));
        vec![vec![set_tok, timer_tok]]
    }

    fn method_with_pattern() -> MethodDonation {
        MethodDonation {
            method_name: "set_timer".to_owned(),
            intent_suffix: "set".to_owned(),
            phrases: vec![],
            lemmas: vec![],
            parameters: vec![],
            token_patterns: pattern_set_a_timer(),
            slot_patterns: Default::default(),
            examples: vec![],
            boost: 1.0,
            full_intent_name: "timers.set".to_owned(),
            handler_domain: "timers".to_owned(),
        }
    }

    #[test]
    fn matches_compiled_token_pattern() {
        let matcher = RuleBasedMatcher::build(&[method_with_pattern()], &[]);
        let hit = matcher.best_match("please set timer now").unwrap();
        assert_eq!(hit.full_intent_name, "timers.set");
    }

    #[test]
    fn no_match_when_pattern_absent() {
        let matcher = RuleBasedMatcher::build(&[method_with_pattern()], &[]);
        assert!(matcher.best_match("what is the weather").is_none());
    }

    #[test]
    fn negative_pattern_suppresses_all_candidates() {
        let mut cancel_tok = TokenConstraint::new();
        cancel_tok.insert("LOWER".to_owned(), json!("cancel"));
        let negative = vec![vec![cancel_tok]];
        let matcher = RuleBasedMatcher::build(&[method_with_pattern()], &negative);
        assert!(matcher.best_match("cancel set timer").is_none());
    }

    #[test]
    fn boost_breaks_ties_between_methods() {
        let mut low = method_with_pattern();
        low.full_intent_name = "timers.low".to_owned();
        low.boost = 0.5;
        let mut high = method_with_pattern();
        high.full_intent_name = "timers.high".to_owned();
        high.boost = 1.0;
        let matcher = RuleBasedMatcher::build(&[low, high], &[]);
        let hit = matcher.best_match("set timer").unwrap();
        assert_eq!(hit.full_intent_name, "timers.high");
    }
}
