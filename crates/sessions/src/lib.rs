//! Room-scoped session state: `UnifiedContext` and the `ContextManager`
//! that owns, enriches, and evicts instances of it.

pub mod context;
pub mod manager;

pub use context::{HandlerContext, MemoryEstimate, Message, UnifiedContext};
pub use manager::{ActionCanceller, ContextManager, NoopCanceller};
