use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Only one recorder can exist per process.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "tracker_plays_scanned_total",
            "Plays read from live game feeds."
        );
        describe_counter!(
            "tracker_jobs_queued_total",
            "Scoring plays accepted into the dispatch queue."
        );
        describe_counter!(
            "tracker_jobs_rejected_total",
            "Scoring plays rejected because the queue was full."
        );
        describe_counter!(
            "tracker_jobs_notified_total",
            "Jobs announced successfully."
        );
        describe_counter!(
            "tracker_jobs_dropped_total",
            "Jobs given up on (attempt cap or permanent error)."
        );
        describe_counter!(
            "tracker_job_attempts_total",
            "Failed dispatch attempts (enrichment or notification)."
        );
        describe_counter!("tracker_feed_errors_total", "Feed fetch/parse errors.");
        describe_counter!("tracker_feed_requests_total", "HTTP requests to the feed.");
        describe_counter!(
            "tracker_enrichments_total",
            "Enrichment lookups that found media."
        );
        describe_histogram!("tracker_feed_parse_ms", "Live feed parse time in milliseconds.");
        describe_histogram!("tracker_enrich_ms", "Enrichment lookup time in milliseconds.");
        describe_gauge!("tracker_queue_len", "Jobs waiting in the dispatch queue.");
        describe_gauge!("tracker_fingerprints", "Fingerprints held in the dedup window.");
        describe_gauge!("tracker_last_poll_ts", "Unix ts of the last detector tick.");
    });
}
