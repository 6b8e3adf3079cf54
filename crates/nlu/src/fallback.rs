//! The conversation fallback stage (§4.5.5): the cascade's backstop.
//! Never fails — if every other stage rejected the utterance, this stage
//! hands it to the conversation handler with enough breadcrumbs for it to
//! explain what almost matched.

use va_domain::model::{Intent, Value};

/// One rejected stage's best (sub-threshold) candidate, carried into
/// `_fallback_context` so the conversation handler can reference "did you
/// mean" information if it chooses to.
#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub stage: String,
    pub full_intent_name: String,
    pub confidence: f32,
}

/// Build the fallback intent for `text`, recording every stage's rejected
/// candidate and the full list of stages that were attempted.
pub fn build_fallback(
    text: &str,
    session_id: &str,
    rejected: &[RejectedCandidate],
    attempted_stages: &[&str],
) -> Intent {
    let mut intent = Intent::fallback(text, session_id);
    intent
        .metadata
        .insert("_recognition_provider".to_owned(), Value::String("fallback".to_owned()));

    let best_rejected = rejected
        .iter()
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let mut fallback_context = std::collections::HashMap::new();
    fallback_context.insert("original_text".to_owned(), Value::String(text.to_owned()));
    fallback_context.insert(
        "attempted_providers".to_owned(),
        Value::List(attempted_stages.iter().map(|s| Value::String((*s).to_owned())).collect()),
    );
    if let Some(best) = best_rejected {
        fallback_context.insert(
            "best_rejected_intent".to_owned(),
            Value::String(best.full_intent_name.clone()),
        );
        fallback_context.insert(
            "best_rejected_confidence".to_owned(),
            Value::Float(best.confidence as f64),
        );
        fallback_context.insert("best_rejected_stage".to_owned(), Value::String(best.stage.clone()));
    }
    let ambiguous: Vec<Value> = rejected
        .iter()
        .map(|r| Value::String(format!("{}:{} ({:.2})", r.stage, r.full_intent_name, r.confidence)))
        .collect();
    fallback_context.insert("ambiguous_entities".to_owned(), Value::List(ambiguous));

    intent
        .metadata
        .insert("_fallback_context".to_owned(), Value::Map(fallback_context));

    intent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_intent_is_conversation_general() {
        let intent = build_fallback("hello there", "sess1", &[], &["keyword", "rule_based"]);
        assert_eq!(intent.name, "conversation.general");
        assert_eq!(intent.raw_text, "hello there");
    }

    #[test]
    fn fallback_records_best_rejected_candidate() {
        let rejected = vec![
            RejectedCandidate {
                stage: "keyword".to_owned(),
                full_intent_name: "timers.set".to_owned(),
                confidence: 0.4,
            },
            RejectedCandidate {
                stage: "rule_based".to_owned(),
                full_intent_name: "weather.get".to_owned(),
                confidence: 0.6,
            },
        ];
        let intent = build_fallback("huh", "sess1", &rejected, &["keyword", "rule_based"]);
        let ctx = match intent.metadata.get("_fallback_context") {
            Some(Value::Map(m)) => m.clone(),
            _ => panic!("expected map"),
        };
        assert_eq!(
            ctx.get("best_rejected_intent"),
            Some(&Value::String("weather.get".to_owned()))
        );
    }

    #[test]
    fn fallback_never_panics_on_empty_input() {
        let intent = build_fallback("", "sess1", &[], &[]);
        assert_eq!(intent.domain, "conversation");
    }
}
