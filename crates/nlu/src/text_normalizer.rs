//! Stage-parameterized text normalization before NLU (§4.3). Four pure
//! functions keyed by stage; each is idempotent — normalizing twice
//! yields the same result as normalizing once.

use std::collections::HashMap;

use regex::Regex;

use va_domain::model::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AsrOutput,
    General,
    TtsInput,
    Numbers,
}

/// Minimal language-keyed number-word table, covering the digits and
/// teens most voice-assistant utterances actually use. Extending this to
/// full cardinal/ordinal coverage for every supported language is a
/// provider concern, not this crate's.
fn number_words(language: &str) -> &'static [(&'static str, &'static str)] {
    match language {
        "ru" => &[
            ("ноль", "0"), ("один", "1"), ("два", "2"), ("три", "3"), ("четыре", "4"),
            ("пять", "5"), ("шесть", "6"), ("семь", "7"), ("восемь", "8"), ("девять", "9"),
            ("десять", "10"),
        ],
        _ => &[
            ("zero", "0"), ("one", "1"), ("two", "2"), ("three", "3"), ("four", "4"),
            ("five", "5"), ("six", "6"), ("seven", "7"), ("eight", "8"), ("nine", "9"),
            ("ten", "10"),
        ],
    }
}

/// Replace standalone number words with digits (ASR output normalization
/// direction — spoken numbers arrive as words).
fn words_to_digits(text: &str, language: &str) -> String {
    let mut result = text.to_owned();
    for (word, digit) in number_words(language) {
        let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap();
        result = re.replace_all(&result, *digit).into_owned();
    }
    result
}

/// Replace standalone digits with number words (TTS input direction —
/// synthesized speech reads digits as words).
fn digits_to_words(text: &str, language: &str) -> String {
    let mut result = text.to_owned();
    for (word, digit) in number_words(language) {
        let re = Regex::new(&format!(r"\b{}\b", regex::escape(digit))).unwrap();
        result = re.replace_all(&result, *word).into_owned();
    }
    result
}

/// Collapse whitespace and strip a small set of punctuation/transliteration
/// artifacts that show up between ASR and NLU.
fn clean_symbols(text: &str) -> String {
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(text.trim(), " ");
    collapsed
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{feff}'))
        .collect()
}

/// Language-specific normalization pass beyond symbol cleanup, applied
/// only at the `tts_input` stage (e.g. expanding abbreviations before
/// synthesis). Currently a light no-op hook kept separate from
/// `clean_symbols` so language-specific rules can be added per-language
/// without touching the shared cleanup path.
fn advanced_language_normalize(text: &str, _language: &str) -> String {
    text.to_owned()
}

/// Stage-parameterized normalization entry point.
pub fn normalize(text: &str, context: &RequestContext, stage: Stage) -> String {
    let language = context.language.as_deref().unwrap_or("ru");
    match stage {
        Stage::AsrOutput => words_to_digits(&clean_symbols(text), language),
        Stage::General => clean_symbols(&words_to_digits(text, language)),
        Stage::TtsInput => {
            let cleaned = clean_symbols(text);
            let worded = digits_to_words(&cleaned, language);
            advanced_language_normalize(&worded, language)
        }
        Stage::Numbers => words_to_digits(text, language),
    }
}

/// Used by tests and callers that don't need a full `RequestContext`.
pub fn request_context_with_language(language: &str) -> RequestContext {
    RequestContext {
        source: "test".to_owned(),
        session_id: "test_session".to_owned(),
        client_id: None,
        room_name: None,
        device_context: None,
        language: Some(language.to_owned()),
        wants_audio_response: false,
        skip_wake_word: false,
        metadata: HashMap::new(),
    }
}
