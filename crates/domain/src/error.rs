/// Shared error type used across all voice-runtime crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("donation schema error in {handler}: {message}")]
    DonationSchema { handler: String, message: String },

    #[error("parameter extraction failed for '{parameter}': {message}")]
    ParameterExtraction { parameter: String, message: String },

    #[error("no handler registered for intent '{0}'")]
    HandlerNotFound(String),

    #[error("domain '{0}' already has an active fire-and-forget action")]
    DomainBusy(String),

    #[error("action '{0}' timed out")]
    Timeout(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("context eviction error for session '{session_id}': {message}")]
    ContextEviction { session_id: String, message: String },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("config validation: {0}")]
    ConfigValidation(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a fire-and-forget failure, used to decide
/// retryability and to feed the critical-error threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    Network,
    Permission,
    ServiceUnavailable,
    Validation,
    Internal,
}

impl ErrorClass {
    /// Default retryability per the engine's classification table. Callers
    /// may override with a custom `retryable` predicate.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::Timeout | ErrorClass::Network | ErrorClass::ServiceUnavailable
        )
    }

    /// Whether this class counts toward the "critical" flag, the engine's
    /// `{timeout, permission, internal}` set.
    pub fn counts_toward_critical(self) -> bool {
        matches!(
            self,
            ErrorClass::Timeout | ErrorClass::Permission | ErrorClass::Internal
        )
    }
}

impl Error {
    /// Map this error onto its fire-and-forget classification.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Error::Timeout(_) => ErrorClass::Timeout,
            Error::DependencyUnavailable(_) => ErrorClass::ServiceUnavailable,
            Error::ParameterExtraction { .. } | Error::ConfigValidation(_) => {
                ErrorClass::Validation
            }
            Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorClass::Permission
            }
            Error::Io(_) => ErrorClass::Network,
            _ => ErrorClass::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
