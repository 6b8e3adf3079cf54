//! The LLM classification stage (§4.5.4): the last stage before the
//! conversation fallback. Delegates to a [`LlmProvider`] and accepts its
//! guess only if it names a known, eligible intent.

use va_domain::error::Result;
use va_providers::LlmProvider;

#[derive(Debug, Clone)]
pub struct LlmHit {
    pub full_intent_name: String,
    pub confidence: f32,
    pub entities: va_domain::model::Entities,
}

/// Confidence assigned to an accepted LLM guess; the provider itself does
/// not return a calibrated score, so this stage treats any accepted guess
/// uniformly rather than inventing one.
pub const LLM_MATCH_CONFIDENCE: f32 = 0.6;

pub struct LlmStage<'a> {
    known_intents: &'a [String],
}

impl<'a> LlmStage<'a> {
    pub fn new(known_intents: &'a [String]) -> Self {
        Self { known_intents }
    }

    /// Ask the LLM provider to classify `text` against the known intent
    /// set, rejecting any guess that names an intent outside it — a
    /// hallucinated or stale intent name must never reach dispatch.
    pub async fn best_match(&self, text: &str, llm: &dyn LlmProvider) -> Result<Option<LlmHit>> {
        let guess = llm.classify_intent(text, self.known_intents).await?;
        Ok(guess.and_then(|g| {
            if self.known_intents.iter().any(|n| n == &g.intent_name) {
                Some(LlmHit {
                    full_intent_name: g.intent_name,
                    confidence: LLM_MATCH_CONFIDENCE,
                    entities: g.entities,
                })
            } else {
                None
            }
        }))
    }
}
