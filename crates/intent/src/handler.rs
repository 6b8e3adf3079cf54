//! The handler contract (§4.6.3): handlers receive the context by
//! reference and must route every mutation through its own methods.

use std::sync::Arc;

use async_trait::async_trait;
use va_domain::model::{Intent, IntentResult};
use va_sessions::UnifiedContext;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn execute(&self, intent: &Intent, context: &Arc<UnifiedContext>) -> IntentResult;
}
