//! The token-pattern attribute-match DSL (§6.2).
//!
//! A [`crate::types::TokenPattern`] is compiled once, at donation load time,
//! into a [`CompiledPattern`]. Compilation fails (and the donation fails
//! validation) on any unrecognized key or malformed value, so a pattern
//! that cannot compile can never reach a live NLU stage.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value as Json;

use crate::types::{TokenConstraint, TokenPattern};

/// One token of normalized, tagged input text, as produced upstream of the
/// rule-based NLU stage.
#[derive(Debug, Clone, Default)]
pub struct Token {
    pub text: String,
    pub lower: String,
    pub lemma: String,
    pub pos: String,
    pub is_alpha: bool,
    pub like_num: bool,
    pub is_sent_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Exactly one (default, no `OP` key).
    One,
    /// `"+"`: one or more.
    Plus,
    /// `"*"`: zero or more.
    Star,
    /// `"?"`: zero or one.
    Question,
}

#[derive(Debug, Clone)]
enum TextConstraint {
    Exact(String),
    Regex(Regex),
}

#[derive(Debug, Clone)]
enum SetConstraint {
    Exact(String),
    In(Vec<String>),
}

impl SetConstraint {
    fn matches(&self, value: &str) -> bool {
        match self {
            SetConstraint::Exact(s) => s == value,
            SetConstraint::In(set) => set.iter().any(|s| s == value),
        }
    }
}

/// One compiled token-position constraint.
#[derive(Debug, Clone, Default)]
pub struct CompiledToken {
    text: Option<TextConstraint>,
    lemma: Option<SetConstraint>,
    pos: Option<SetConstraint>,
    lower: Option<SetConstraint>,
    like_num: Option<bool>,
    is_sent_start: Option<bool>,
    is_alpha: Option<bool>,
    op: Op,
}

impl Default for Op {
    fn default() -> Self {
        Op::One
    }
}

impl CompiledToken {
    fn matches_one(&self, token: &Token) -> bool {
        if let Some(c) = &self.text {
            let ok = match c {
                TextConstraint::Exact(s) => s == &token.text,
                TextConstraint::Regex(re) => re.is_match(&token.text),
            };
            if !ok {
                return false;
            }
        }
        if let Some(c) = &self.lemma {
            if !c.matches(&token.lemma) {
                return false;
            }
        }
        if let Some(c) = &self.pos {
            if !c.matches(&token.pos) {
                return false;
            }
        }
        if let Some(c) = &self.lower {
            if !c.matches(&token.lower) {
                return false;
            }
        }
        if let Some(v) = self.like_num {
            if v != token.like_num {
                return false;
            }
        }
        if let Some(v) = self.is_sent_start {
            if v != token.is_sent_start {
                return false;
            }
        }
        if let Some(v) = self.is_alpha {
            if v != token.is_alpha {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompiledPattern {
    tokens: Vec<CompiledToken>,
}

#[derive(Debug, thiserror::Error)]
pub enum DslError {
    #[error("unrecognized key '{0}' in token pattern")]
    UnrecognizedKey(String),
    #[error("invalid value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("invalid regex in TEXT constraint: {0}")]
    InvalidRegex(#[from] regex::Error),
}

const RECOGNIZED_KEYS: &[&str] = &[
    "TEXT",
    "LEMMA",
    "POS",
    "LOWER",
    "LIKE_NUM",
    "IS_SENT_START",
    "IS_ALPHA",
    "OP",
];

fn compile_text(value: &Json) -> Result<TextConstraint, DslError> {
    match value {
        Json::String(s) => Ok(TextConstraint::Exact(s.clone())),
        Json::Object(map) => {
            if let Some(Json::String(pattern)) = map.get("REGEX") {
                Ok(TextConstraint::Regex(Regex::new(pattern)?))
            } else {
                Err(DslError::InvalidValue {
                    key: "TEXT".to_owned(),
                    reason: "object form must be {REGEX: <pattern>}".to_owned(),
                })
            }
        }
        _ => Err(DslError::InvalidValue {
            key: "TEXT".to_owned(),
            reason: "must be a string or {REGEX: ...}".to_owned(),
        }),
    }
}

fn compile_set(key: &str, value: &Json) -> Result<SetConstraint, DslError> {
    match value {
        Json::String(s) => Ok(SetConstraint::Exact(s.clone())),
        Json::Object(map) => {
            if let Some(Json::Array(items)) = map.get("IN") {
                let mut set = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Json::String(s) => set.push(s.clone()),
                        _ => {
                            return Err(DslError::InvalidValue {
                                key: key.to_owned(),
                                reason: "IN set members must be strings".to_owned(),
                            })
                        }
                    }
                }
                Ok(SetConstraint::In(set))
            } else {
                Err(DslError::InvalidValue {
                    key: key.to_owned(),
                    reason: "object form must be {IN: [...]}".to_owned(),
                })
            }
        }
        _ => Err(DslError::InvalidValue {
            key: key.to_owned(),
            reason: "must be a string or {IN: [...]}".to_owned(),
        }),
    }
}

fn compile_bool(key: &str, value: &Json) -> Result<bool, DslError> {
    value.as_bool().ok_or_else(|| DslError::InvalidValue {
        key: key.to_owned(),
        reason: "must be a boolean".to_owned(),
    })
}

fn compile_op(value: &Json) -> Result<Op, DslError> {
    match value.as_str() {
        Some("+") => Ok(Op::Plus),
        Some("*") => Ok(Op::Star),
        Some("?") => Ok(Op::Question),
        _ => Err(DslError::InvalidValue {
            key: "OP".to_owned(),
            reason: "must be one of \"+\", \"*\", \"?\"".to_owned(),
        }),
    }
}

fn compile_token_constraint(constraint: &TokenConstraint) -> Result<CompiledToken, DslError> {
    let mut compiled = CompiledToken::default();
    for (key, value) in constraint {
        if !RECOGNIZED_KEYS.contains(&key.as_str()) {
            return Err(DslError::UnrecognizedKey(key.clone()));
        }
        match key.as_str() {
            "TEXT" => compiled.text = Some(compile_text(value)?),
            "LEMMA" => compiled.lemma = Some(compile_set("LEMMA", value)?),
            "POS" => compiled.pos = Some(compile_set("POS", value)?),
            "LOWER" => compiled.lower = Some(compile_set("LOWER", value)?),
            "LIKE_NUM" => compiled.like_num = Some(compile_bool("LIKE_NUM", value)?),
            "IS_SENT_START" => compiled.is_sent_start = Some(compile_bool("IS_SENT_START", value)?),
            "IS_ALPHA" => compiled.is_alpha = Some(compile_bool("IS_ALPHA", value)?),
            "OP" => compiled.op = compile_op(value)?,
            _ => unreachable!(),
        }
    }
    Ok(compiled)
}

/// Compile a raw [`TokenPattern`] into a [`CompiledPattern`]. This is the
/// single point of truth for "does this pattern compile" (§4.4 rule 7).
pub fn compile_pattern(pattern: &TokenPattern) -> Result<CompiledPattern, DslError> {
    let tokens = pattern
        .iter()
        .map(compile_token_constraint)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledPattern { tokens })
}

/// A matched slot span: token indices `[start, end)` in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl CompiledPattern {
    /// Try to match this pattern starting at every position in `tokens`,
    /// returning the first (leftmost) match found, if any.
    pub fn find(&self, tokens: &[Token]) -> Option<MatchSpan> {
        for start in 0..=tokens.len() {
            if let Some(end) = self.match_from(tokens, start) {
                return Some(MatchSpan { start, end });
            }
        }
        None
    }

    /// Backtracking match of the whole pattern starting at `start`;
    /// returns the end index on success.
    fn match_from(&self, tokens: &[Token], start: usize) -> Option<usize> {
        Self::match_rest(&self.tokens, tokens, start)
    }

    fn match_rest(pattern: &[CompiledToken], tokens: &[Token], pos: usize) -> Option<usize> {
        let Some((head, rest)) = pattern.split_first() else {
            return Some(pos);
        };
        match head.op {
            Op::One => {
                let tok = tokens.get(pos)?;
                if head.matches_one(tok) {
                    Self::match_rest(rest, tokens, pos + 1)
                } else {
                    None
                }
            }
            Op::Question => {
                if let Some(tok) = tokens.get(pos) {
                    if head.matches_one(tok) {
                        if let Some(end) = Self::match_rest(rest, tokens, pos + 1) {
                            return Some(end);
                        }
                    }
                }
                Self::match_rest(rest, tokens, pos)
            }
            Op::Star | Op::Plus => {
                let min = if head.op == Op::Plus { 1 } else { 0 };
                let mut consumed = 0usize;
                let mut cursor = pos;
                loop {
                    if consumed >= min {
                        if let Some(end) = Self::match_rest(rest, tokens, cursor) {
                            return Some(end);
                        }
                    }
                    match tokens.get(cursor) {
                        Some(tok) if head.matches_one(tok) => {
                            cursor += 1;
                            consumed += 1;
                        }
                        _ => {
                            return if consumed >= min {
                                Self::match_rest(rest, tokens, cursor)
                            } else {
                                None
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Slot patterns labelled with a slot name, compiled together.
pub fn compile_slot_patterns(
    slots: &HashMap<String, TokenPattern>,
) -> Result<HashMap<String, CompiledPattern>, DslError> {
    slots
        .iter()
        .map(|(name, pattern)| Ok((name.clone(), compile_pattern(pattern)?)))
        .collect()
}
