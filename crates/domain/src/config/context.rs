use serde::{Deserialize, Serialize};

/// Session lifecycle and history-bound configuration, owned by the
/// context manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    #[serde(default = "d_session_timeout_s")]
    pub session_timeout_s: u64,
    #[serde(default = "d_cleanup_interval_s")]
    pub cleanup_interval_s: u64,
    #[serde(default = "d_max_history")]
    pub max_history: usize,
    #[serde(default = "d_max_recent_actions")]
    pub max_recent_actions: usize,
    #[serde(default = "d_max_failed_actions")]
    pub max_failed_actions: usize,
    /// Grace period for tasks to observe cancellation during eviction
    /// before being detached.
    #[serde(default = "d_eviction_grace_s")]
    pub eviction_grace_s: u64,
}

fn d_session_timeout_s() -> u64 {
    1800
}

fn d_cleanup_interval_s() -> u64 {
    300
}

fn d_max_history() -> usize {
    10
}

fn d_max_recent_actions() -> usize {
    20
}

fn d_max_failed_actions() -> usize {
    50
}

fn d_eviction_grace_s() -> u64 {
    2
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            session_timeout_s: d_session_timeout_s(),
            cleanup_interval_s: d_cleanup_interval_s(),
            max_history: d_max_history(),
            max_recent_actions: d_max_recent_actions(),
            max_failed_actions: d_max_failed_actions(),
            eviction_grace_s: d_eviction_grace_s(),
        }
    }
}
