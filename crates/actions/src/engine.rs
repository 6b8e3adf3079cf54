//! FireForgetEngine (§4.7): runs a handler-selected operation as a
//! background task, tracked in the originating room's context, with
//! timeout, retry, and cancellation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use va_domain::config::FireForgetConfig;
use va_domain::error::{Error, ErrorClass};
use va_domain::trace::TraceEvent;
use va_sessions::{ActionCanceller, UnifiedContext};

/// Per-call overrides of the defaults carried in [`FireForgetConfig`].
#[derive(Debug, Clone)]
pub struct FireForgetOptions {
    pub timeout_s: u64,
    pub retries: u32,
    pub retry_delay_s: f64,
    pub critical_error_threshold: u32,
}

impl FireForgetOptions {
    pub fn from_config(config: &FireForgetConfig) -> Self {
        Self {
            timeout_s: config.default_timeout_s,
            retries: config.default_retries,
            retry_delay_s: config.default_retry_delay_s,
            critical_error_threshold: config.critical_error_threshold,
        }
    }
}

struct TaskHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

/// Owns every in-flight background task's cancellation handle, keyed by
/// `(session_id, domain)` — there can only ever be one active action per
/// domain per session, mirroring `UnifiedContext::active_actions`.
#[derive(Default)]
pub struct FireForgetEngine {
    tasks: Mutex<HashMap<(String, String), TaskHandle>>,
}

impl FireForgetEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start `operation` as a background task for `domain`. Returns the
    /// `{"active_actions": {...}}` metadata blob immediately; the caller
    /// does not await completion.
    ///
    /// `operation` is invoked once per attempt and receives a
    /// [`CancellationToken`] it should honor cooperatively; the engine
    /// also races it against the configured timeout and an explicit
    /// [`Self::cancel_action`] call regardless of whether the operation
    /// checks the token itself.
    pub fn start_fire_forget<F, Fut>(
        self: &Arc<Self>,
        context: Arc<UnifiedContext>,
        domain: &str,
        action_name: &str,
        operation: F,
        options: FireForgetOptions,
    ) -> va_domain::error::Result<serde_json::Value>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = va_domain::error::Result<()>> + Send + 'static,
    {
        let task_id = Uuid::new_v4().to_string();
        context.start_action(domain, action_name, task_id.clone())?;

        let token = CancellationToken::new();
        let reason = Arc::new(Mutex::new(None));
        self.tasks.lock().insert(
            (context.session_id().to_owned(), domain.to_owned()),
            TaskHandle {
                token: token.clone(),
                reason: reason.clone(),
            },
        );

        TraceEvent::FireForgetStarted {
            session_id: context.session_id().to_owned(),
            domain: domain.to_owned(),
            action: action_name.to_owned(),
            task_id: task_id.clone(),
        }
        .emit();

        let metadata = serde_json::json!({ "active_actions": context.active_actions() });

        let engine = self.clone();
        let domain = domain.to_owned();
        let action_name = action_name.to_owned();
        let operation = Arc::new(operation);

        tokio::spawn(async move {
            engine
                .run_with_retry(context, domain, action_name, task_id, operation, options, token, reason)
                .await;
        });

        Ok(metadata)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_with_retry<F, Fut>(
        self: Arc<Self>,
        context: Arc<UnifiedContext>,
        domain: String,
        action_name: String,
        task_id: String,
        operation: Arc<F>,
        options: FireForgetOptions,
        token: CancellationToken,
        reason: Arc<Mutex<Option<String>>>,
    ) where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = va_domain::error::Result<()>> + Send + 'static,
    {
        let timeout = Duration::from_secs(options.timeout_s);
        let mut attempt: u32 = 0;

        loop {
            let attempt_token = token.clone();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Outcome::Cancelled,
                result = tokio::time::timeout(timeout, (*operation)(attempt_token)) => match result {
                    Ok(Ok(())) => Outcome::Success,
                    Ok(Err(e)) => Outcome::Failed(e),
                    Err(_) => Outcome::TimedOut,
                },
            };

            match outcome {
                Outcome::Success => {
                    context.complete_action_success(&domain);
                    self.tasks.lock().remove(&(context.session_id().to_owned(), domain.clone()));
                    TraceEvent::FireForgetCompleted {
                        session_id: context.session_id().to_owned(),
                        domain: domain.clone(),
                        action: action_name.clone(),
                        task_id: task_id.clone(),
                    }
                    .emit();
                    return;
                }
                Outcome::Cancelled => {
                    let why = reason.lock().take().unwrap_or_else(|| "unspecified".to_owned());
                    context.complete_action_failure(
                        &domain,
                        ErrorClass::Internal,
                        format!("cancelled:{why}"),
                        options.critical_error_threshold,
                    );
                    self.tasks.lock().remove(&(context.session_id().to_owned(), domain.clone()));
                    TraceEvent::FireForgetCancelled {
                        session_id: context.session_id().to_owned(),
                        domain: domain.clone(),
                        task_id: task_id.clone(),
                        reason: why,
                    }
                    .emit();
                    return;
                }
                Outcome::TimedOut | Outcome::Failed(_) => {
                    let class = match &outcome {
                        Outcome::TimedOut => ErrorClass::Timeout,
                        Outcome::Failed(e) => e.classify(),
                        Outcome::Success | Outcome::Cancelled => unreachable!(),
                    };
                    let message = match &outcome {
                        Outcome::TimedOut => format!("action '{action_name}' timed out after {}s", options.timeout_s),
                        Outcome::Failed(e) => e.to_string(),
                        Outcome::Success | Outcome::Cancelled => unreachable!(),
                    };

                    let will_retry = class.default_retryable() && attempt < options.retries;
                    if will_retry {
                        let delay = Duration::from_secs_f64(options.retry_delay_s * 2f64.powi(attempt as i32));
                        TraceEvent::FireForgetFailed {
                            session_id: context.session_id().to_owned(),
                            domain: domain.clone(),
                            action: action_name.clone(),
                            task_id: task_id.clone(),
                            class: format!("{class:?}"),
                            retry_attempt: attempt,
                            will_retry: true,
                            critical: false,
                        }
                        .emit();
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    let critical = context.complete_action_failure(
                        &domain,
                        class,
                        message.clone(),
                        options.critical_error_threshold,
                    );
                    self.tasks.lock().remove(&(context.session_id().to_owned(), domain.clone()));
                    TraceEvent::FireForgetFailed {
                        session_id: context.session_id().to_owned(),
                        domain: domain.clone(),
                        action: action_name.clone(),
                        task_id: task_id.clone(),
                        class: format!("{class:?}"),
                        retry_attempt: attempt,
                        will_retry: false,
                        critical,
                    }
                    .emit();
                    if critical {
                        tracing::error!(
                            session_id = %context.session_id(),
                            domain = %domain,
                            class = ?class,
                            "fire-and-forget action crossed the critical failure threshold"
                        );
                    }
                    return;
                }
            }
        }
    }

    /// Flip the action's status to `cancelling` and signal its task. The
    /// task's own loop finishes the transition into `failed_actions` once
    /// it observes the cancellation.
    pub fn cancel_action(&self, context: &UnifiedContext, domain: &str, reason: impl Into<String>) -> bool {
        if !context.begin_cancel_action(domain) {
            return false;
        }
        let key = (context.session_id().to_owned(), domain.to_owned());
        if let Some(handle) = self.tasks.lock().get(&key) {
            *handle.reason.lock() = Some(reason.into());
            handle.token.cancel();
            true
        } else {
            false
        }
    }
}

enum Outcome {
    Success,
    TimedOut,
    Failed(Error),
    Cancelled,
}

impl ActionCanceller for FireForgetEngine {
    fn cancel(&self, session_id: &str, domain: &str) {
        let key = (session_id.to_owned(), domain.to_owned());
        if let Some(handle) = self.tasks.lock().get(&key) {
            *handle.reason.lock() = Some("session evicted".to_owned());
            handle.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use va_domain::config::ContextConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> Arc<UnifiedContext> {
        Arc::new(UnifiedContext::new("kitchen_session", ContextConfig::default()))
    }

    #[tokio::test]
    async fn successful_action_moves_to_recent() {
        let engine = FireForgetEngine::new();
        let context = ctx();
        let options = FireForgetOptions {
            timeout_s: 5,
            retries: 0,
            retry_delay_s: 0.01,
            critical_error_threshold: 3,
        };
        engine
            .start_fire_forget(context.clone(), "timers", "set_timer", |_token| async { Ok(()) }, options)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(context.active_actions().is_empty());
    }

    #[tokio::test]
    async fn second_start_while_active_is_domain_busy() {
        let engine = FireForgetEngine::new();
        let context = ctx();
        let options = FireForgetOptions {
            timeout_s: 5,
            retries: 0,
            retry_delay_s: 0.01,
            critical_error_threshold: 3,
        };
        engine
            .start_fire_forget(
                context.clone(),
                "timers",
                "set_timer",
                |_token| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                },
                options.clone(),
            )
            .unwrap();
        let err = engine.start_fire_forget(context.clone(), "timers", "set_timer", |_token| async { Ok(()) }, options);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn failing_action_retries_then_fails() {
        let engine = FireForgetEngine::new();
        let context = ctx();
        let attempts = Arc::new(AtomicU32::new(0));
        let options = FireForgetOptions {
            timeout_s: 5,
            retries: 2,
            retry_delay_s: 0.001,
            critical_error_threshold: 3,
        };
        let counter = attempts.clone();
        engine
            .start_fire_forget(
                context.clone(),
                "weather",
                "get_forecast",
                move |_token| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Error::DependencyUnavailable("weather-api".to_owned()))
                    }
                },
                options,
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(context.active_actions().is_empty());
    }

    #[tokio::test]
    async fn cancel_action_moves_to_failed_with_reason() {
        let engine = FireForgetEngine::new();
        let context = ctx();
        let options = FireForgetOptions {
            timeout_s: 30,
            retries: 0,
            retry_delay_s: 0.01,
            critical_error_threshold: 3,
        };
        engine
            .start_fire_forget(
                context.clone(),
                "music",
                "play",
                |token| async move {
                    token.cancelled().await;
                    Ok(())
                },
                options,
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.cancel_action(&context, "music", "user requested stop"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(context.active_actions().is_empty());
    }

    #[tokio::test]
    async fn timeout_is_classified_and_not_retried_when_not_permission_class() {
        let engine = FireForgetEngine::new();
        let context = ctx();
        let options = FireForgetOptions {
            timeout_s: 0,
            retries: 1,
            retry_delay_s: 0.001,
            critical_error_threshold: 3,
        };
        engine
            .start_fire_forget(
                context.clone(),
                "timers",
                "set_timer",
                |_token| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                },
                options,
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(context.active_actions().is_empty());
    }
}
