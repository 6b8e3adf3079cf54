//! The keyword matcher: the mandatory, always-first NLU cascade stage
//! (§4.5.1). Builds exact/flexible/partial matchers per donation phrase,
//! with a Levenshtein-based fuzzy fallback for near-misses.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;

use va_donations::MethodDonation;

/// Confidence contributed by the fuzzy fallback is `fuzzy_confidence_base
/// x composite_score`. Not exposed via configuration (§6.6 enumerates no
/// such knob); kept as an internal constant so the composite score (which
/// is already normalized to [0, 1]) maps directly onto a confidence.
const FUZZY_CONFIDENCE_BASE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub full_intent_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Exact,
    Flexible,
    Partial,
}

impl MatchKind {
    fn multiplier(self) -> f32 {
        match self {
            MatchKind::Exact => 1.0,
            MatchKind::Flexible => 0.9,
            MatchKind::Partial => 0.8,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn exact_regex(phrase: &str) -> Option<Regex> {
    let escaped_words: Vec<String> = tokenize(phrase).iter().map(|w| regex::escape(w)).collect();
    if escaped_words.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b{}\b", escaped_words.join(r"\s+"))).ok()
}

fn flexible_match(input_words: &HashSet<String>, phrase_words: &[String]) -> bool {
    !phrase_words.is_empty() && phrase_words.iter().all(|w| input_words.contains(w))
}

fn partial_fraction(input_words: &HashSet<String>, phrase_words: &[String]) -> f32 {
    if phrase_words.is_empty() {
        return 0.0;
    }
    let present = phrase_words.iter().filter(|w| input_words.contains(*w)).count();
    present as f32 / phrase_words.len() as f32
}

/// rapidfuzz-style composite fuzzy score: `0.5 x best full-string ratio +
/// 0.3 x avg partial-ratio per input word + 0.2 x best token-set ratio`,
/// each term a Levenshtein-similarity-derived value in [0, 1].
fn fuzzy_composite(input: &str, input_words: &[String], phrases: &[String]) -> f32 {
    if phrases.is_empty() {
        return 0.0;
    }

    let full_string_ratio = phrases
        .iter()
        .map(|p| strsim::normalized_levenshtein(input, p) as f32)
        .fold(0.0_f32, f32::max);

    let partial_ratio = if input_words.is_empty() {
        0.0
    } else {
        let sum: f32 = input_words
            .iter()
            .map(|w| {
                phrases
                    .iter()
                    .flat_map(|p| tokenize(p))
                    .map(|pw| strsim::normalized_levenshtein(w, &pw) as f32)
                    .fold(0.0_f32, f32::max)
            })
            .sum();
        sum / input_words.len() as f32
    };

    let token_set_ratio = {
        let input_set: HashSet<&String> = input_words.iter().collect();
        phrases
            .iter()
            .map(|p| {
                let phrase_words = tokenize(p);
                let phrase_set: HashSet<&String> = phrase_words.iter().collect();
                let mut sorted_input: Vec<&str> = input_set.iter().map(|s| s.as_str()).collect();
                sorted_input.sort_unstable();
                let mut sorted_phrase: Vec<&str> = phrase_set.iter().map(|s| s.as_str()).collect();
                sorted_phrase.sort_unstable();
                strsim::normalized_levenshtein(&sorted_input.join(" "), &sorted_phrase.join(" ")) as f32
            })
            .fold(0.0_f32, f32::max)
    };

    0.5 * full_string_ratio + 0.3 * partial_ratio + 0.2 * token_set_ratio
}

struct CompiledMethod {
    full_intent_name: String,
    boost: f32,
    exact_patterns: Vec<Regex>,
    phrase_words: Vec<Vec<String>>,
    phrases: Vec<String>,
}

pub struct KeywordMatcher {
    methods: Vec<CompiledMethod>,
    max_text_length_for_fuzzy: usize,
    cache: Mutex<LruCache<String, Option<KeywordHit>>>,
}

impl KeywordMatcher {
    pub fn build(methods: &[MethodDonation], max_text_length_for_fuzzy: usize, cache_size: usize) -> Self {
        let compiled = methods
            .iter()
            .map(|m| CompiledMethod {
                full_intent_name: m.full_intent_name.clone(),
                boost: m.boost,
                exact_patterns: m.phrases.iter().filter_map(|p| exact_regex(p)).collect(),
                phrase_words: m.phrases.iter().map(|p| tokenize(p)).collect(),
                phrases: m.phrases.clone(),
            })
            .collect();
        let cap = NonZeroUsize::new(cache_size.max(1)).unwrap();
        Self {
            methods: compiled,
            max_text_length_for_fuzzy,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Find the best-scoring method for `text`, if any regex or fuzzy
    /// match clears zero (the caller applies the cascade threshold).
    pub fn best_match(&self, text: &str) -> Option<KeywordHit> {
        if let Some(cached) = self.cache.lock().get(text).cloned() {
            return cached;
        }

        let input_words = tokenize(text);
        let input_word_set: HashSet<String> = input_words.iter().cloned().collect();

        let mut best: Option<KeywordHit> = None;

        for method in &self.methods {
            let mut method_best_kind: Option<MatchKind> = None;
            for pattern in &method.exact_patterns {
                if pattern.is_match(text) {
                    method_best_kind = Some(MatchKind::Exact);
                    break;
                }
            }
            if method_best_kind.is_none() {
                for words in &method.phrase_words {
                    if flexible_match(&input_word_set, words) {
                        method_best_kind = Some(MatchKind::Flexible);
                        break;
                    }
                }
            }
            if method_best_kind.is_none() {
                for words in &method.phrase_words {
                    if partial_fraction(&input_word_set, words) >= 0.7 {
                        method_best_kind = Some(MatchKind::Partial);
                        break;
                    }
                }
            }

            if let Some(kind) = method_best_kind {
                let scored = (kind.multiplier() * method.boost).min(1.0);
                let candidate = KeywordHit {
                    full_intent_name: method.full_intent_name.clone(),
                    confidence: scored,
                };
                if best.as_ref().map(|b| scored > b.confidence).unwrap_or(true) {
                    best = Some(candidate);
                }
                continue;
            }

            if text.chars().count() <= self.max_text_length_for_fuzzy {
                let composite = fuzzy_composite(text, &input_words, &method.phrases);
                let scored = (FUZZY_CONFIDENCE_BASE * composite * method.boost).min(1.0);
                if scored > 0.0 && best.as_ref().map(|b| scored > b.confidence).unwrap_or(true) {
                    best = Some(KeywordHit {
                        full_intent_name: method.full_intent_name.clone(),
                        confidence: scored,
                    });
                }
            }
        }

        self.cache.lock().put(text.to_owned(), best.clone());
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, phrases: &[&str]) -> MethodDonation {
        MethodDonation {
            method_name: name.to_owned(),
            intent_suffix: name.to_owned(),
            phrases: phrases.iter().map(|s| s.to_string()).collect(),
            lemmas: vec![],
            parameters: vec![],
            token_patterns: vec![],
            slot_patterns: Default::default(),
            examples: vec![],
            boost: 1.0,
            full_intent_name: format!("timers.{name}"),
            handler_domain: "timers".to_owned(),
        }
    }

    #[test]
    fn exact_phrase_scores_highest_confidence() {
        let matcher = KeywordMatcher::build(&[method("set", &["set a timer"])], 200, 100);
        let hit = matcher.best_match("please set a timer now").unwrap();
        assert_eq!(hit.confidence, 1.0);
    }

    #[test]
    fn flexible_order_scores_lower() {
        let matcher = KeywordMatcher::build(&[method("set", &["set a timer"])], 200, 100);
        let hit = matcher.best_match("timer a set").unwrap();
        assert!((hit.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn partial_match_requires_seventy_percent_words() {
        let matcher = KeywordMatcher::build(&[method("set", &["set a kitchen timer now"])], 200, 100);
        let hit = matcher.best_match("set a kitchen timer please").unwrap();
        assert!((hit.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn no_match_below_partial_threshold_falls_to_fuzzy_or_none() {
        let matcher = KeywordMatcher::build(&[method("set", &["set a kitchen timer now"])], 200, 100);
        let hit = matcher.best_match("completely unrelated utterance");
        assert!(hit.map(|h| h.confidence).unwrap_or(0.0) < 0.8);
    }

    #[test]
    fn fuzzy_skipped_beyond_max_length() {
        let long_text = "x".repeat(300);
        let matcher = KeywordMatcher::build(&[method("set", &["set a timer"])], 10, 100);
        let hit = matcher.best_match(&long_text);
        assert!(hit.is_none());
    }

    #[test]
    fn cache_returns_same_result_on_repeat_query() {
        let matcher = KeywordMatcher::build(&[method("set", &["set a timer"])], 200, 100);
        let first = matcher.best_match("set a timer");
        let second = matcher.best_match("set a timer");
        assert_eq!(first.map(|h| h.confidence), second.map(|h| h.confidence));
    }

    #[test]
    fn fuzzy_fallback_matches_two_letter_typo() {
        let matcher = KeywordMatcher::build(&[method("set", &["поставь таймер"])], 200, 100);
        let hit = matcher.best_match("пастав тайме на 5 минут").unwrap();
        assert_eq!(hit.full_intent_name, "timers.set");
        assert!(hit.confidence >= 0.56, "confidence {} below the spec's 0.56 floor", hit.confidence);
    }
}
