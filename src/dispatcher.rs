//! dispatcher.rs: drains eligible jobs: enrich, then notify.
//!
//! One attempt counter covers both stages. A failed attempt stamps
//! `last_attempt_at` with the moment it ended (the tick's start plus the
//! time spent so far), so the job is not eligible again until the minimum
//! spacing has passed. At `max_attempts` failures, or on a permanent
//! notifier error, the job is dropped and counted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::detector::bounded;
use crate::enrich::{EnrichOutcome, Enricher};
use crate::notify::{NotifyError, Notifier};
use crate::queue::{DispatchQueue, NotificationJob};
use crate::stats::PipelineStats;

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub min_spacing: ChronoDuration,
    pub max_jobs_per_tick: usize,
    pub enrich_timeout: Duration,
    pub notify_timeout: Duration,
}

impl DispatchPolicy {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            min_spacing: cfg.min_attempt_spacing(),
            max_jobs_per_tick: cfg.max_jobs_per_tick,
            enrich_timeout: Duration::from_secs(cfg.enrich_timeout_secs),
            notify_timeout: Duration::from_secs(cfg.notify_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Notified,
    Requeued { attempts: u32 },
    Dropped { attempts: u32 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTick {
    pub notified: usize,
    pub requeued: usize,
    pub dropped: usize,
}

impl DispatchTick {
    pub fn processed(&self) -> usize {
        self.notified + self.requeued + self.dropped
    }
}

pub struct Dispatcher {
    policy: DispatchPolicy,
    queue: Arc<DispatchQueue>,
    enricher: Arc<dyn Enricher>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    pub fn new(
        policy: DispatchPolicy,
        queue: Arc<DispatchQueue>,
        enricher: Arc<dyn Enricher>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            policy,
            queue,
            enricher,
            notifier,
            stats,
        }
    }

    /// Work through eligible jobs until none is left or the per-tick budget
    /// runs out. Each job is attempted at most once per tick. `now` is the
    /// tick's start; later jobs see it advanced by the time already spent.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> DispatchTick {
        let clock = TickClock::new(now);
        let mut tick = DispatchTick::default();
        let mut attempted: HashSet<String> = HashSet::new();

        while attempted.len() < self.policy.max_jobs_per_tick {
            let Some(job) = self
                .queue
                .peek_eligible(clock.now(), self.policy.min_spacing, &attempted)
            else {
                break;
            };
            attempted.insert(job.fingerprint.clone());

            match self.process(job, &clock).await {
                JobOutcome::Notified => tick.notified += 1,
                JobOutcome::Requeued { .. } => tick.requeued += 1,
                JobOutcome::Dropped { .. } => tick.dropped += 1,
            }
        }

        metrics::gauge!("tracker_queue_len").set(self.queue.len() as f64);
        tick
    }

    async fn process(&self, mut job: NotificationJob, clock: &TickClock) -> JobOutcome {
        if job.enrichment.is_none() {
            let outcome = bounded(
                self.policy.enrich_timeout,
                "enrich",
                self.enricher.enrich(&job.payload),
            )
            .await;
            match outcome {
                Ok(EnrichOutcome::Found(e)) => {
                    self.stats.job_enriched();
                    job.enrichment = Some(e);
                }
                Ok(EnrichOutcome::NotFound) => {
                    return self.failed(job, clock.now(), "enrichment found no match", false);
                }
                Err(e) => {
                    let reason = format!("enrichment failed: {e:#}");
                    return self.failed(job, clock.now(), &reason, false);
                }
            }
        }

        let sent = tokio::time::timeout(
            self.policy.notify_timeout,
            self.notifier.notify(&job.payload, job.enrichment.as_ref()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(NotifyError::Transient(anyhow::anyhow!(
                "notify timed out after {}s",
                self.policy.notify_timeout.as_secs()
            )))
        });

        match sent {
            Ok(()) => {
                self.queue.remove(&job.fingerprint);
                self.stats.job_notified();
                tracing::info!(
                    target: "dispatcher",
                    fingerprint = %job.fingerprint,
                    player = %job.payload.player_name,
                    notifier = self.notifier.name(),
                    attempts = job.attempts + 1,
                    with_media = job.enrichment.as_ref().is_some_and(|e| e.artifact_url.is_some()),
                    "scoring play announced"
                );
                JobOutcome::Notified
            }
            Err(e) => {
                let permanent = e.is_permanent();
                self.failed(job, clock.now(), &e.to_string(), permanent)
            }
        }
    }

    /// Count a failed attempt, then requeue or drop.
    fn failed(&self, mut job: NotificationJob, now: DateTime<Utc>, reason: &str, permanent: bool) -> JobOutcome {
        job.attempts += 1;
        job.last_attempt_at = Some(now);
        self.stats.attempt_failed();

        if permanent || job.attempts >= self.policy.max_attempts {
            self.queue.remove(&job.fingerprint);
            self.stats.job_dropped();
            tracing::error!(
                target: "dispatcher",
                fingerprint = %job.fingerprint,
                player = %job.payload.player_name,
                attempts = job.attempts,
                permanent,
                reason,
                "giving up on scoring play"
            );
            return JobOutcome::Dropped {
                attempts: job.attempts,
            };
        }

        tracing::warn!(
            target: "dispatcher",
            fingerprint = %job.fingerprint,
            attempts = job.attempts,
            max_attempts = self.policy.max_attempts,
            reason,
            "attempt failed, requeued"
        );
        let attempts = job.attempts;
        self.queue.requeue(job);
        JobOutcome::Requeued { attempts }
    }
}

/// Wall-clock time inside a tick: the tick's start plus the monotonic time
/// elapsed since.
struct TickClock {
    start: DateTime<Utc>,
    started: Instant,
}

impl TickClock {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            started: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let spent = ChronoDuration::from_std(self.started.elapsed()).unwrap_or(ChronoDuration::zero());
        self.start + spent
    }
}
