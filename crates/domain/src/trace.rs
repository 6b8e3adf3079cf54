use serde::Serialize;

/// Structured trace events emitted across the pipeline.
///
/// These are the stage-by-stage records surfaced by the `/trace/*` command
/// endpoints and written to the structured log via [`TraceEvent::emit`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    VoiceSegmentDetected {
        session_id: String,
        frame_count: usize,
        duration_ms: u64,
        truncated: bool,
    },
    WakeWordDetected {
        session_id: String,
        detected: bool,
        confidence: f32,
    },
    AsrTranscribed {
        session_id: String,
        chars: usize,
        duration_ms: u64,
    },
    TextNormalized {
        session_id: String,
        stage: String,
        input_chars: usize,
        output_chars: usize,
    },
    NluStageAttempted {
        session_id: String,
        stage: String,
        matched: bool,
        confidence: f32,
    },
    NluRecognized {
        session_id: String,
        intent_name: String,
        confidence: f32,
        stage: String,
    },
    ContextualResolved {
        session_id: String,
        contextual_intent: String,
        resolved_domain: Option<String>,
        candidate_count: usize,
    },
    IntentDispatched {
        session_id: String,
        intent_name: String,
        handler_domain: String,
        success: bool,
    },
    FireForgetStarted {
        session_id: String,
        domain: String,
        action: String,
        task_id: String,
    },
    FireForgetCompleted {
        session_id: String,
        domain: String,
        action: String,
        task_id: String,
    },
    FireForgetFailed {
        session_id: String,
        domain: String,
        action: String,
        task_id: String,
        class: String,
        retry_attempt: u32,
        will_retry: bool,
        critical: bool,
    },
    FireForgetCancelled {
        session_id: String,
        domain: String,
        task_id: String,
        reason: String,
    },
    SessionCreated {
        session_id: String,
        client_id: Option<String>,
    },
    SessionEvicted {
        session_id: String,
        active_actions_cancelled: usize,
    },
    TtsSynthesized {
        session_id: String,
        chars: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "va_event");
    }
}
