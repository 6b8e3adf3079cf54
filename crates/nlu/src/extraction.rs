//! Parameter extraction: converts the chosen method's declared
//! [`ParameterSpec`]s into typed [`Entities`] (§6.2 final paragraph).
//!
//! Precedence per parameter: a matched DSL slot span (rule-based stage)
//! wins over a regex `extraction_pattern` match over the raw text, which
//! wins over `default_value`. A required parameter with none of the above
//! produces [`Error::ParameterExtraction`], which the orchestrator turns
//! into a clarification prompt (§7).

use std::collections::HashMap;

use regex::Regex;

use va_domain::error::{Error, Result};
use va_domain::model::{Entities, Value};
use va_donations::dsl::{MatchSpan, Token};
use va_donations::types::{ParameterSpec, ParameterType};

/// Run extraction for every parameter of a matched method.
///
/// `tokens`/`slots` come from the rule-based stage when it produced the
/// match; pass an empty token slice and slot map for stages (keyword,
/// semantic, LLM) that don't tokenize, and extraction falls through to
/// `extraction_patterns` and `default_value`.
pub fn extract_parameters(
    raw_text: &str,
    tokens: &[Token],
    slots: &HashMap<String, MatchSpan>,
    parameters: &[ParameterSpec],
) -> Result<Entities> {
    let mut entities = Entities::new();
    for spec in parameters {
        match resolve_raw_value(raw_text, tokens, slots, spec) {
            Some(raw) => {
                let value = convert_value(&raw, spec)?;
                entities.insert(spec.name.clone(), value);
            }
            None => {
                if spec.required {
                    return Err(Error::ParameterExtraction {
                        parameter: spec.name.clone(),
                        message: "no value found and no default provided".to_owned(),
                    });
                }
                if let Some(default) = &spec.default_value {
                    entities.insert(spec.name.clone(), json_to_value(default));
                }
            }
        }
    }
    Ok(entities)
}

fn slot_span_text(tokens: &[Token], span: MatchSpan) -> Option<String> {
    if tokens.is_empty() || span.start >= span.end {
        return None;
    }
    let words: Vec<&str> = tokens[span.start..span.end.min(tokens.len())]
        .iter()
        .map(|t| t.text.as_str())
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn resolve_raw_value(
    raw_text: &str,
    tokens: &[Token],
    slots: &HashMap<String, MatchSpan>,
    spec: &ParameterSpec,
) -> Option<String> {
    if let Some(span) = slots.get(&spec.name) {
        if let Some(text) = slot_span_text(tokens, *span) {
            return Some(text);
        }
    }
    for pattern in &spec.extraction_patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(raw_text) {
                let captured = caps.get(1).or_else(|| caps.get(0))?;
                return Some(captured.as_str().to_owned());
            }
        }
    }
    None
}

fn json_to_value(json: &serde_json::Value) -> Value {
    serde_json::from_value(json.clone()).unwrap_or(Value::Null)
}

/// Parse a duration expression like `"5 minutes"` / `"30 sec"` into a
/// total-seconds float. Defaults to minutes when no unit word is present.
fn parse_duration_seconds(raw: &str) -> Option<f64> {
    let re = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h)?").ok()?;
    let caps = re.captures(raw)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    let multiplier = if unit.starts_with('h') {
        3600.0
    } else if unit.starts_with('s') {
        1.0
    } else {
        60.0
    };
    Some(amount * multiplier)
}

fn convert_value(raw: &str, spec: &ParameterSpec) -> Result<Value> {
    let raw = raw.trim();
    let err = |message: String| {
        Error::ParameterExtraction {
            parameter: spec.name.clone(),
            message,
        }
    };

    match spec.param_type {
        ParameterType::String => {
            if let Some(pattern) = &spec.pattern {
                let re = Regex::new(pattern)
                    .map_err(|e| err(format!("invalid pattern '{pattern}': {e}")))?;
                if !re.is_match(raw) {
                    return Err(err(format!("'{raw}' does not match pattern '{pattern}'")));
                }
            }
            Ok(Value::String(raw.to_owned()))
        }
        ParameterType::Integer => {
            let n: i64 = raw
                .parse()
                .map_err(|_| err(format!("'{raw}' is not an integer")))?;
            check_range(n as f64, spec).map_err(|e| err(e))?;
            Ok(Value::Int(n))
        }
        ParameterType::Float => {
            let n: f64 = raw.parse().map_err(|_| err(format!("'{raw}' is not a number")))?;
            check_range(n, spec).map_err(|e| err(e))?;
            Ok(Value::Float(n))
        }
        ParameterType::Duration => {
            let seconds = parse_duration_seconds(raw)
                .ok_or_else(|| err(format!("'{raw}' is not a recognizable duration")))?;
            check_range(seconds, spec).map_err(|e| err(e))?;
            Ok(Value::Float(seconds))
        }
        ParameterType::Datetime => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
                Ok(Value::String(dt.to_rfc3339()))
            } else {
                Ok(Value::String(raw.to_owned()))
            }
        }
        ParameterType::Boolean => {
            let lower = raw.to_lowercase();
            if ["true", "yes", "on", "1"].contains(&lower.as_str()) {
                Ok(Value::Bool(true))
            } else if ["false", "no", "off", "0"].contains(&lower.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(err(format!("'{raw}' is not a recognizable boolean")))
            }
        }
        ParameterType::Choice => {
            let choices = spec.choices.as_deref().unwrap_or(&[]);
            if choices.iter().any(|c| c.eq_ignore_ascii_case(raw)) {
                Ok(Value::String(raw.to_owned()))
            } else {
                Err(err(format!("'{raw}' is not one of {choices:?}")))
            }
        }
        ParameterType::Entity => Ok(Value::String(raw.to_owned())),
    }
}

fn check_range(value: f64, spec: &ParameterSpec) -> std::result::Result<(), String> {
    if let Some(min) = spec.min_value {
        if value < min {
            return Err(format!("{value} is below min_value {min}"));
        }
    }
    if let Some(max) = spec.max_value {
        if value > max {
            return Err(format!("{value} is above max_value {max}"));
        }
    }
    Ok(())
}
