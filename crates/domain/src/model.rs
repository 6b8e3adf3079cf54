//! Shared data model: the request/intent/result types that flow between
//! pipeline stages, plus the small value types context and action records
//! are built from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A loosely-typed value carried in entity maps and client metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

pub type Entities = HashMap<String, Value>;

/// Transport-level facts a request carries, immutable for the lifetime of
/// the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// "api" | "mic" | "ws" | "cli" | ...
    pub source: String,
    pub session_id: String,
    pub client_id: Option<String>,
    pub room_name: Option<String>,
    pub device_context: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub wants_audio_response: bool,
    #[serde(default)]
    pub skip_wake_word: bool,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// `{domain}.{action}` recognized from an utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    pub domain: String,
    pub action: String,
    #[serde(default)]
    pub entities: Entities,
    pub confidence: f32,
    pub raw_text: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Intent {
    /// Build an intent, deriving `domain`/`action` from `name` when the
    /// name follows the `{domain}.{action}` convention.
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>, session_id: impl Into<String>) -> Self {
        let name = name.into();
        let (domain, action) = split_intent_name(&name);
        Self {
            name,
            domain,
            action,
            entities: Entities::new(),
            confidence: 0.0,
            raw_text: raw_text.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_entities(mut self, entities: Entities) -> Self {
        self.entities = entities;
        self
    }

    /// The conversation fallback intent, never fails to construct.
    pub fn fallback(raw_text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new("conversation.general", raw_text, session_id).with_confidence(0.3)
    }

    pub fn is_contextual(&self) -> bool {
        self.domain == "contextual"
    }
}

/// Split `"{domain}.{action}"` into its parts. Names without a dot become
/// `(name, name)`.
pub fn split_intent_name(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((domain, action)) => (domain.to_owned(), action.to_owned()),
        None => (name.to_owned(), name.to_owned()),
    }
}

/// Outcome of dispatching an [`Intent`] to a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub text: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub should_speak: bool,
    #[serde(default)]
    pub action_metadata: HashMap<String, Value>,
    pub error: Option<String>,
    pub confidence: f32,
    pub intent_name: String,
}

impl IntentResult {
    pub fn ok(intent_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            success: true,
            should_speak: true,
            action_metadata: HashMap::new(),
            error: None,
            confidence: 1.0,
            intent_name: intent_name.into(),
        }
    }

    pub fn failed(intent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            text: None,
            success: false,
            should_speak: false,
            action_metadata: HashMap::new(),
            error: Some(error.into()),
            confidence: 0.0,
            intent_name: intent_name.into(),
        }
    }

    pub fn silent(intent_name: impl Into<String>) -> Self {
        Self {
            text: None,
            success: true,
            should_speak: false,
            action_metadata: HashMap::new(),
            error: None,
            confidence: 1.0,
            intent_name: intent_name.into(),
        }
    }
}

/// Status of a fire-and-forget action, mirrored into `active_actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Cancelling,
}

/// An in-flight fire-and-forget action, the single slot for its domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub task_id: String,
    pub action: String,
    pub started_at: DateTime<Utc>,
    pub status: ActionStatus,
    pub room_id: Option<String>,
    pub session_id: String,
}

/// A completed fire-and-forget action, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedAction {
    pub task_id: String,
    pub domain: String,
    pub action: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Present only for `failed_actions` entries.
    pub error_class: Option<crate::error::ErrorClass>,
    pub error: Option<String>,
}

/// One turn of recorded conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub user_text: String,
    pub response: Option<String>,
    pub intent_name: String,
    pub client_id: Option<String>,
}

/// A device known to a room/session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub room: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Coarse conversational mode of a session, informs the NLU/orchestrator
/// whether a follow-up utterance should be interpreted contextually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Conversing,
    Clarifying,
    Contextual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_domain_action() {
        let (d, a) = split_intent_name("timers.stop");
        assert_eq!(d, "timers");
        assert_eq!(a, "stop");
    }

    #[test]
    fn name_without_dot_is_its_own_domain() {
        let (d, a) = split_intent_name("greeting");
        assert_eq!(d, "greeting");
        assert_eq!(a, "greeting");
    }

    #[test]
    fn intent_new_derives_domain_and_action() {
        let intent = Intent::new("audio.play", "play some music", "kitchen_session");
        assert_eq!(intent.domain, "audio");
        assert_eq!(intent.action, "play");
    }

    #[test]
    fn fallback_intent_has_fixed_shape() {
        let intent = Intent::fallback("huh?", "kitchen_session");
        assert_eq!(intent.name, "conversation.general");
        assert_eq!(intent.confidence, 0.3);
    }

    #[test]
    fn contextual_intent_detected() {
        let intent = Intent::new("contextual.stop", "stop", "s");
        assert!(intent.is_contextual());
    }
}
