//! stats.rs: in-memory counters since the last start, mirrored to `metrics`.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineStats {
    queued: AtomicU64,
    rejected: AtomicU64,
    notified: AtomicU64,
    dropped: AtomicU64,
    enriched: AtomicU64,
    failed_attempts: AtomicU64,
    feed_errors: AtomicU64,
    polls: AtomicU64,
    /// Unix seconds, 0 = never.
    last_poll_ts: AtomicI64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queued: u64,
    pub rejected: u64,
    pub notified: u64,
    pub dropped: u64,
    pub enriched: u64,
    pub failed_attempts: u64,
    pub feed_errors: u64,
    pub polls: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
}

impl PipelineStats {
    pub fn reset(&self) {
        for c in [
            &self.queued,
            &self.rejected,
            &self.notified,
            &self.dropped,
            &self.enriched,
            &self.failed_attempts,
            &self.feed_errors,
            &self.polls,
        ] {
            c.store(0, Ordering::Relaxed);
        }
        self.last_poll_ts.store(0, Ordering::Relaxed);
    }

    pub fn job_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_jobs_queued_total").increment(1);
    }

    pub fn job_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_jobs_rejected_total").increment(1);
    }

    pub fn job_notified(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_jobs_notified_total").increment(1);
    }

    pub fn job_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_jobs_dropped_total").increment(1);
    }

    pub fn job_enriched(&self) {
        self.enriched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempt_failed(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_job_attempts_total").increment(1);
    }

    pub fn feed_error(&self) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
        counter!("tracker_feed_errors_total").increment(1);
    }

    pub fn poll_finished(&self, now: DateTime<Utc>, plays_scanned: usize) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ts.store(now.timestamp(), Ordering::Relaxed);
        counter!("tracker_plays_scanned_total").increment(plays_scanned as u64);
        gauge!("tracker_last_poll_ts").set(now.timestamp() as f64);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let ts = self.last_poll_ts.load(Ordering::Relaxed);
        StatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            last_poll_at: (ts != 0).then(|| DateTime::from_timestamp(ts, 0)).flatten(),
        }
    }
}
