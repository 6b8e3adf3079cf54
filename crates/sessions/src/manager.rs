//! ContextManager: owns every UnifiedContext, enriches them from request
//! metadata, and evicts idle ones on a timer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use va_domain::config::ContextConfig;
use va_domain::model::RequestContext;
use va_domain::trace::TraceEvent;

use crate::context::{MemoryEstimate, UnifiedContext};

/// Callback invoked once per active-action domain of an evicted context,
/// so the fire-and-forget engine can cancel the underlying task. Kept as
/// a trait object to avoid a dependency cycle with the actions crate.
pub trait ActionCanceller: Send + Sync {
    fn cancel(&self, session_id: &str, domain: &str);
}

pub struct NoopCanceller;
impl ActionCanceller for NoopCanceller {
    fn cancel(&self, _session_id: &str, _domain: &str) {}
}

pub struct ContextManager {
    contexts: RwLock<HashMap<String, Arc<UnifiedContext>>>,
    config: ContextConfig,
    canceller: Arc<dyn ActionCanceller>,
    eviction_token: parking_lot::Mutex<Option<CancellationToken>>,
    eviction_handle: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self::with_canceller(config, Arc::new(NoopCanceller))
    }

    pub fn with_canceller(config: ContextConfig, canceller: Arc<dyn ActionCanceller>) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            config,
            canceller,
            eviction_token: parking_lot::Mutex::new(None),
            eviction_handle: parking_lot::Mutex::new(None),
        }
    }

    /// Lazily create the context for `session_id` if it doesn't exist yet.
    pub fn get_or_create(&self, session_id: &str) -> Arc<UnifiedContext> {
        if let Some(ctx) = self.contexts.read().get(session_id) {
            return ctx.clone();
        }
        let mut contexts = self.contexts.write();
        contexts
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                TraceEvent::SessionCreated {
                    session_id: session_id.to_owned(),
                    client_id: None,
                }
                .emit();
                Arc::new(UnifiedContext::new(session_id, self.config.clone()))
            })
            .clone()
    }

    /// As [`Self::get_or_create`], then enrich from `request_ctx` (§4.2).
    pub fn get_with_request_info(&self, session_id: &str, request_ctx: &RequestContext) -> Arc<UnifiedContext> {
        let ctx = self.get_or_create(session_id);
        ctx.enrich(request_ctx);
        ctx
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<UnifiedContext>> {
        self.contexts.read().get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn estimate_memory(&self, session_id: &str) -> Option<MemoryEstimate> {
        self.get(session_id).map(|ctx| ctx.estimate_memory())
    }

    /// Cancel every active action for the context, then drop it. A
    /// cancellation failure for one domain does not stop the others, nor
    /// does it stop the context from being removed — the grace period is
    /// owned by the canceller, not by this method.
    fn evict_one(&self, session_id: &str) {
        if let Some(ctx) = self.contexts.write().remove(session_id) {
            let domains = ctx.active_action_domains();
            for domain in &domains {
                self.canceller.cancel(session_id, domain);
            }
            TraceEvent::SessionEvicted {
                session_id: session_id.to_owned(),
                active_actions_cancelled: domains.len(),
            }
            .emit();
        }
    }

    /// Remove every session idle past `session_timeout_s`. Safe to call
    /// concurrently with readers/writers of distinct sessions; a failure
    /// evicting one session is logged and does not abort the tick.
    pub fn evict_idle(&self) {
        let now = chrono::Utc::now();
        let timeout = chrono::Duration::seconds(self.config.session_timeout_s as i64);
        let stale: Vec<String> = self
            .contexts
            .read()
            .iter()
            .filter(|(_, ctx)| now.signed_duration_since(ctx.last_activity()) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in stale {
            self.evict_one(&session_id);
        }
    }

    /// Start the periodic eviction task (default interval from config).
    /// Calling this twice without an intervening `stop` replaces the
    /// previous task.
    pub fn start(self: &Arc<Self>) {
        let token = CancellationToken::new();
        *self.eviction_token.lock() = Some(token.clone());

        let manager = self.clone();
        // `tokio::time::interval` panics on a zero period; `cleanup_interval_s`
        // carries no floor in config validation, so clamp here rather than
        // let a misconfigured 0 bring down the eviction task.
        let interval = std::time::Duration::from_secs(self.config.cleanup_interval_s.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.evict_idle();
                    }
                }
            }
        });
        *self.eviction_handle.lock() = Some(handle);
    }

    /// Cancel the eviction task and await it.
    pub async fn stop(&self) {
        if let Some(token) = self.eviction_token.lock().take() {
            token.cancel();
        }
        let handle = self.eviction_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
