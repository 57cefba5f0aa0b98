// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod enrich;
pub mod feed;
pub mod fingerprints;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod stats;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::TrackerConfig;
pub use crate::pipeline::{Pipeline, PipelineSnapshot};
