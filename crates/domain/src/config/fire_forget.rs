use serde::{Deserialize, Serialize};

/// `fire_forget` — default timeout/retry policy and the alerting threshold
/// for the critical-error flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FireForgetConfig {
    #[serde(default = "d_timeout_s")]
    pub default_timeout_s: u64,
    #[serde(default)]
    pub default_retries: u32,
    #[serde(default = "d_retry_delay_s")]
    pub default_retry_delay_s: f64,
    #[serde(default = "d_critical_error_threshold")]
    pub critical_error_threshold: u32,
}

fn d_timeout_s() -> u64 {
    300
}

fn d_retry_delay_s() -> f64 {
    1.0
}

fn d_critical_error_threshold() -> u32 {
    3
}

impl Default for FireForgetConfig {
    fn default() -> Self {
        Self {
            default_timeout_s: d_timeout_s(),
            default_retries: 0,
            default_retry_delay_s: d_retry_delay_s(),
            critical_error_threshold: d_critical_error_threshold(),
        }
    }
}
