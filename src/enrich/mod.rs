// src/enrich/mod.rs
pub mod savant;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::feed::{HitMetrics, PlayEvent};

/// Data attached to a job before it is announced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Link to the play's video/animation.
    pub artifact_url: Option<String>,
    pub metrics: Option<HitMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Found(Enrichment),
    /// The service has nothing for this play (yet). Counts as an attempt.
    NotFound,
}

/// Media/metrics lookup for a play. Slow and rate-sensitive; `Err` is a
/// transient failure.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, play: &PlayEvent) -> Result<EnrichOutcome>;
    fn name(&self) -> &'static str;
}

/// Used when media lookups are switched off: passes the feed's own hit
/// metrics through and never fails.
pub struct FeedMetricsEnricher;

#[async_trait::async_trait]
impl Enricher for FeedMetricsEnricher {
    async fn enrich(&self, play: &PlayEvent) -> Result<EnrichOutcome> {
        Ok(EnrichOutcome::Found(Enrichment {
            artifact_url: None,
            metrics: play.hit,
        }))
    }

    fn name(&self) -> &'static str {
        "feed-metrics"
    }
}
