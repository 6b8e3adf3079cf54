//! The donation document schema (§3.5): the declarative documents each
//! intent handler contributes describing how it should be recognized.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const SUPPORTED_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Duration,
    Datetime,
    Boolean,
    Choice,
    Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Required iff `param_type == Choice`.
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    /// Numeric types only.
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    /// String type only.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub extraction_patterns: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One per-token constraint map in a [`TokenPattern`]. Unrecognized keys
/// are a compile error (see `dsl::compile_pattern`).
pub type TokenConstraint = HashMap<String, serde_json::Value>;

/// A sequence of per-token constraint maps: the attribute-match DSL (§6.2).
pub type TokenPattern = Vec<TokenConstraint>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationExample {
    pub text: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDonation {
    pub method_name: String,
    pub intent_suffix: String,
    pub phrases: Vec<String>,
    #[serde(default)]
    pub lemmas: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub token_patterns: Vec<TokenPattern>,
    #[serde(default)]
    pub slot_patterns: HashMap<String, TokenPattern>,
    #[serde(default)]
    pub examples: Vec<DonationExample>,
    #[serde(default = "default_boost")]
    pub boost: f32,

    /// Filled in by the loader: `"{handler_domain}.{intent_suffix}"`.
    #[serde(skip_deserializing, default)]
    pub full_intent_name: String,
    /// Filled in by the loader.
    #[serde(skip_deserializing, default)]
    pub handler_domain: String,
}

fn default_boost() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDonation {
    pub schema_version: String,
    pub handler_domain: String,
    #[serde(default)]
    pub global_parameters: Vec<ParameterSpec>,
    pub method_donations: Vec<MethodDonation>,
    #[serde(default)]
    pub negative_patterns: Vec<TokenPattern>,
}
