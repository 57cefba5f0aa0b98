// src/feed/mod.rs
pub mod mlb;
pub mod types;

pub use types::{fingerprint, FeedProvider, HitMetrics, PlayEvent};
