//! FireForgetEngine (§4.7): background task execution for handlers that
//! dispatch long-running work without blocking the pipeline.

pub mod engine;

pub use engine::{FireForgetEngine, FireForgetOptions};
