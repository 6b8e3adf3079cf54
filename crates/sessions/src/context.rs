//! UnifiedContext: the room-scoped session state every pipeline stage
//! reads from and writes through.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use va_domain::config::ContextConfig;
use va_domain::error::{Error, ErrorClass, Result};
use va_domain::model::{
    ActionRecord, ActionStatus, CompletedAction, ConversationState, DeviceRecord, HistoryEntry,
    RequestContext, Value,
};

/// One role-tagged message in a handler's persistent scratch conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Per-handler scratch space: free-form key/value data plus an ordered
/// message list (e.g. an LLM conversation transcript).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerContext {
    pub data: HashMap<String, Value>,
    pub messages: Vec<Message>,
}

impl HandlerContext {
    /// Append a message, preserving the invariant that a system message
    /// stays at index 0 until an explicit keep_system=false clear.
    fn push(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message {
            role: role.into(),
            content: content.into(),
        });
    }

    fn clear(&mut self, keep_system: bool) {
        if keep_system {
            self.messages.retain(|m| m.role == "system");
        } else {
            self.messages.clear();
        }
    }
}

/// A read-only, serializable summary of memory usage broken down by field,
/// in bytes (approximate — counts entries and estimates per-entry size).
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryEstimate {
    pub conversation_history: usize,
    pub handler_contexts: usize,
    pub active_actions: usize,
    pub recent_actions: usize,
    pub failed_actions: usize,
    pub available_devices: usize,
    pub total: usize,
}

#[derive(Debug)]
struct ContextState {
    client_id: Option<String>,
    room_name: Option<String>,
    language: String,
    client_metadata: HashMap<String, Value>,
    available_devices: Vec<DeviceRecord>,
    conversation_history: VecDeque<HistoryEntry>,
    handler_contexts: HashMap<String, HandlerContext>,
    active_actions: HashMap<String, ActionRecord>,
    recent_actions: VecDeque<CompletedAction>,
    failed_actions: VecDeque<CompletedAction>,
    action_error_count: HashMap<String, u32>,
    conversation_state: ConversationState,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

/// Room-scoped session state (§3.1). All mutation goes through methods on
/// this type; nothing outside `context` module reaches into the fields
/// directly, so the invariants enumerated in the spec stay enforced in one
/// place.
pub struct UnifiedContext {
    session_id: String,
    config: ContextConfig,
    inner: parking_lot::Mutex<ContextState>,
}

impl std::fmt::Debug for UnifiedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedContext")
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl UnifiedContext {
    pub fn new(session_id: impl Into<String>, config: ContextConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            config,
            inner: parking_lot::Mutex::new(ContextState {
                client_id: None,
                room_name: None,
                language: "ru".to_owned(),
                client_metadata: HashMap::new(),
                available_devices: Vec::new(),
                conversation_history: VecDeque::new(),
                handler_contexts: HashMap::new(),
                active_actions: HashMap::new(),
                recent_actions: VecDeque::new(),
                failed_actions: VecDeque::new(),
                action_error_count: HashMap::new(),
                conversation_state: ConversationState::default(),
                created_at: now,
                last_activity: now,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn touch(state: &mut ContextState) {
        let now = Utc::now();
        if now > state.last_activity {
            state.last_activity = now;
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.inner.lock().last_activity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.lock().created_at
    }

    pub fn client_id(&self) -> Option<String> {
        self.inner.lock().client_id.clone()
    }

    pub fn room_name(&self) -> Option<String> {
        self.inner.lock().room_name.clone()
    }

    pub fn language(&self) -> String {
        self.inner.lock().language.clone()
    }

    pub fn conversation_state(&self) -> ConversationState {
        self.inner.lock().conversation_state
    }

    pub fn set_conversation_state(&self, state: ConversationState) {
        let mut inner = self.inner.lock();
        inner.conversation_state = state;
        Self::touch(&mut inner);
    }

    /// Enrich from transport metadata, applying the §4.2 precedence rule:
    /// explicit `request_ctx.client_id` > session-id-derived room >
    /// `device_context`; an already-set (non-empty) value is never
    /// overwritten by a weaker source ("priority floor").
    pub fn enrich(&self, request_ctx: &RequestContext) {
        let mut inner = self.inner.lock();

        if inner.client_id.is_none() {
            if let Some(client_id) = &request_ctx.client_id {
                inner.client_id = Some(client_id.clone());
            } else if let Some(room) = va_domain::session_id::extract_room_id(&self.session_id) {
                inner.client_id = Some(room.to_owned());
            } else if let Some(device_context) = &request_ctx.device_context {
                inner.client_id = Some(device_context.clone());
            }
        }

        if inner.room_name.is_none() {
            if let Some(room_name) = &request_ctx.room_name {
                inner.room_name = Some(room_name.clone());
            }
        }

        if let Some(language) = &request_ctx.language {
            inner.language = language.clone();
        }

        for (key, value) in &request_ctx.metadata {
            inner
                .client_metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        Self::touch(&mut inner);
    }

    pub fn merge_client_metadata(&self, metadata: HashMap<String, Value>) {
        let mut inner = self.inner.lock();
        inner.client_metadata.extend(metadata);
        Self::touch(&mut inner);
    }

    pub fn client_metadata(&self) -> HashMap<String, Value> {
        self.inner.lock().client_metadata.clone()
    }

    pub fn set_available_devices(&self, devices: Vec<DeviceRecord>) {
        let mut inner = self.inner.lock();
        inner.available_devices = devices;
        Self::touch(&mut inner);
    }

    pub fn available_devices(&self) -> Vec<DeviceRecord> {
        self.inner.lock().available_devices.clone()
    }

    pub fn append_history(
        &self,
        user_text: impl Into<String>,
        response: Option<String>,
        intent_name: impl Into<String>,
        client_id: Option<String>,
    ) {
        let mut inner = self.inner.lock();
        inner.conversation_history.push_back(HistoryEntry {
            ts: Utc::now(),
            user_text: user_text.into(),
            response,
            intent_name: intent_name.into(),
            client_id,
        });
        while inner.conversation_history.len() > self.config.max_history {
            inner.conversation_history.pop_front();
        }
        Self::touch(&mut inner);
    }

    pub fn conversation_history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().conversation_history.iter().cloned().collect()
    }

    pub fn with_handler_context<R>(&self, handler: &str, f: impl FnOnce(&mut HandlerContext) -> R) -> R {
        let mut inner = self.inner.lock();
        let ctx = inner.handler_contexts.entry(handler.to_owned()).or_default();
        let result = f(ctx);
        Self::touch(&mut inner);
        result
    }

    pub fn push_handler_message(&self, handler: &str, role: impl Into<String>, content: impl Into<String>) {
        self.with_handler_context(handler, |ctx| ctx.push(role, content));
    }

    pub fn clear_handler_messages(&self, handler: &str, keep_system: bool) {
        self.with_handler_context(handler, |ctx| ctx.clear(keep_system));
    }

    pub fn handler_context(&self, handler: &str) -> HandlerContext {
        self.inner
            .lock()
            .handler_contexts
            .get(handler)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of currently active fire-and-forget actions, keyed by
    /// domain. Always reflects *this* context, never another room's.
    pub fn active_actions(&self) -> HashMap<String, ActionRecord> {
        self.inner.lock().active_actions.clone()
    }

    pub fn action_error_count(&self, domain: &str) -> u32 {
        *self.inner.lock().action_error_count.get(domain).unwrap_or(&0)
    }

    /// Register a new fire-and-forget action for `domain`. Fails with
    /// [`Error::DomainBusy`] if one is already running — the caller must
    /// cancel the prior task first.
    pub fn start_action(&self, domain: &str, action_name: &str, task_id: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active_actions.contains_key(domain) {
            return Err(Error::DomainBusy(domain.to_owned()));
        }
        inner.active_actions.insert(
            domain.to_owned(),
            ActionRecord {
                task_id: task_id.into(),
                action: action_name.to_owned(),
                started_at: Utc::now(),
                status: ActionStatus::Running,
                room_id: inner.client_id.clone(),
                session_id: self.session_id.clone(),
            },
        );
        Self::touch(&mut inner);
        Ok(())
    }

    /// Flip an active action's status to `cancelling` ahead of dispatching
    /// the cancel signal to its task.
    pub fn begin_cancel_action(&self, domain: &str) -> bool {
        let mut inner = self.inner.lock();
        let found = if let Some(record) = inner.active_actions.get_mut(domain) {
            record.status = ActionStatus::Cancelling;
            true
        } else {
            false
        };
        if found {
            Self::touch(&mut inner);
        }
        found
    }

    /// Move a domain's active action into `recent_actions` on success.
    pub fn complete_action_success(&self, domain: &str) {
        let mut inner = self.inner.lock();
        let Some(record) = inner.active_actions.remove(domain) else {
            return;
        };
        inner.recent_actions.push_back(CompletedAction {
            task_id: record.task_id,
            domain: domain.to_owned(),
            action: record.action,
            started_at: record.started_at,
            finished_at: Utc::now(),
            error_class: None,
            error: None,
        });
        while inner.recent_actions.len() > self.config.max_recent_actions {
            inner.recent_actions.pop_front();
        }
        Self::touch(&mut inner);
    }

    /// Move a domain's active action into `failed_actions`, bumping the
    /// domain's error counter. Returns whether this failure crosses the
    /// critical-error threshold for `{timeout, permission, internal}`.
    ///
    /// The counter is per-session per-domain (this context's own
    /// `action_error_count`), not a cross-session global — the spec's
    /// open question on scope is resolved in favor of per-session, since
    /// nothing in this crate has visibility into other sessions' counts.
    pub fn complete_action_failure(
        &self,
        domain: &str,
        error_class: ErrorClass,
        error: impl Into<String>,
        critical_error_threshold: u32,
    ) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.active_actions.remove(domain) else {
            return false;
        };
        inner.failed_actions.push_back(CompletedAction {
            task_id: record.task_id,
            domain: domain.to_owned(),
            action: record.action,
            started_at: record.started_at,
            finished_at: Utc::now(),
            error_class: Some(error_class),
            error: Some(error.into()),
        });
        while inner.failed_actions.len() > self.config.max_failed_actions {
            inner.failed_actions.pop_front();
        }
        let count = inner.action_error_count.entry(domain.to_owned()).or_insert(0);
        *count += 1;
        let crosses_threshold =
            error_class.counts_toward_critical() && *count >= critical_error_threshold;
        Self::touch(&mut inner);
        crosses_threshold
    }

    /// Forcibly drop a domain's active-action entry without recording a
    /// completion (used when eviction detaches a task past its grace
    /// period).
    pub fn discard_action(&self, domain: &str) {
        let mut inner = self.inner.lock();
        inner.active_actions.remove(domain);
        Self::touch(&mut inner);
    }

    /// Every domain with an action still active, for eviction to cancel.
    pub fn active_action_domains(&self) -> Vec<String> {
        self.inner.lock().active_actions.keys().cloned().collect()
    }

    pub fn estimate_memory(&self) -> MemoryEstimate {
        let inner = self.inner.lock();
        const ENTRY_OVERHEAD: usize = 64;
        let conversation_history = inner.conversation_history.len() * ENTRY_OVERHEAD;
        let handler_contexts = inner
            .handler_contexts
            .values()
            .map(|c| c.messages.iter().map(|m| m.content.len() + 32).sum::<usize>() + c.data.len() * ENTRY_OVERHEAD)
            .sum::<usize>();
        let active_actions = inner.active_actions.len() * ENTRY_OVERHEAD;
        let recent_actions = inner.recent_actions.len() * ENTRY_OVERHEAD;
        let failed_actions = inner.failed_actions.len() * ENTRY_OVERHEAD;
        let available_devices = inner.available_devices.len() * ENTRY_OVERHEAD;
        let total = conversation_history
            + handler_contexts
            + active_actions
            + recent_actions
            + failed_actions
            + available_devices;
        MemoryEstimate {
            conversation_history,
            handler_contexts,
            active_actions,
            recent_actions,
            failed_actions,
            available_devices,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> UnifiedContext {
        UnifiedContext::new("kitchen_session", ContextConfig::default())
    }

    #[test]
    fn enrich_does_not_overwrite_explicit_client_id() {
        let c = ctx();
        c.enrich(&RequestContext {
            source: "api".into(),
            session_id: "kitchen_session".into(),
            client_id: Some("kitchen".into()),
            room_name: None,
            device_context: None,
            language: None,
            wants_audio_response: false,
            skip_wake_word: false,
            metadata: HashMap::new(),
        });
        assert_eq!(c.client_id().as_deref(), Some("kitchen"));

        c.enrich(&RequestContext {
            source: "api".into(),
            session_id: "kitchen_session".into(),
            client_id: Some("other_room".into()),
            room_name: None,
            device_context: None,
            language: None,
            wants_audio_response: false,
            skip_wake_word: false,
            metadata: HashMap::new(),
        });
        assert_eq!(c.client_id().as_deref(), Some("kitchen"));
    }

    #[test]
    fn enrich_falls_back_to_session_id_room() {
        let c = ctx();
        c.enrich(&RequestContext {
            source: "mic".into(),
            session_id: "kitchen_session".into(),
            client_id: None,
            room_name: None,
            device_context: None,
            language: None,
            wants_audio_response: false,
            skip_wake_word: false,
            metadata: HashMap::new(),
        });
        assert_eq!(c.client_id().as_deref(), Some("kitchen"));
    }

    #[test]
    fn history_is_capped_oldest_first() {
        let mut cfg = ContextConfig::default();
        cfg.max_history = 2;
        let c = UnifiedContext::new("s", cfg);
        c.append_history("one", None, "x", None);
        c.append_history("two", None, "x", None);
        c.append_history("three", None, "x", None);
        let history = c.conversation_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_text, "two");
        assert_eq!(history[1].user_text, "three");
    }

    #[test]
    fn start_action_rejects_when_domain_busy() {
        let c = ctx();
        c.start_action("timers", "set_timer", "t1").unwrap();
        assert!(c.start_action("timers", "set_timer", "t2").is_err());
    }

    #[test]
    fn complete_success_moves_to_recent_actions() {
        let c = ctx();
        c.start_action("timers", "set_timer", "t1").unwrap();
        c.complete_action_success("timers");
        assert!(c.active_actions().is_empty());
    }

    #[test]
    fn complete_failure_crosses_threshold_after_three() {
        let c = ctx();
        for i in 0..3 {
            c.start_action("timers", "set_timer", format!("t{i}")).unwrap();
            let crossed = c.complete_action_failure("timers", ErrorClass::Internal, "boom", 3);
            if i == 2 {
                assert!(crossed);
            } else {
                assert!(!crossed);
            }
        }
    }

    #[test]
    fn handler_context_system_message_stays_first() {
        let c = ctx();
        c.push_handler_message("conversation", "system", "you are a helpful assistant");
        c.push_handler_message("conversation", "user", "hi");
        c.clear_handler_messages("conversation", true);
        let hc = c.handler_context("conversation");
        assert_eq!(hc.messages.len(), 1);
        assert_eq!(hc.messages[0].role, "system");
    }
}
