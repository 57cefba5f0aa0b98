//! detector.rs: one poll of the live feed per tick.
//!
//! For every play the feed reports: skip it if its fingerprint was seen,
//! otherwise test the scoring predicate, enqueue a job, and record the
//! fingerprint whether or not the queue took the job. A play rejected by a
//! full queue is therefore never evaluated again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;

use crate::config::TrackerConfig;
use crate::feed::{FeedProvider, PlayEvent};
use crate::fingerprints::FingerprintStore;
use crate::queue::{DispatchQueue, Enqueue, NotificationJob};
use crate::stats::PipelineStats;

/// What one tick saw and did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DetectorTick {
    pub games: usize,
    pub plays: usize,
    pub queued: usize,
    pub rejected: usize,
}

pub struct Detector {
    team_id: u32,
    scoring_event: String,
    feed_timeout: Duration,
    feed: Arc<dyn FeedProvider>,
    fingerprints: Arc<FingerprintStore>,
    queue: Arc<DispatchQueue>,
    stats: Arc<PipelineStats>,
}

/// Run a collaborator call with an upper bound on its duration.
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow!("{what} timed out after {}s", limit.as_secs()))?
}

impl Detector {
    pub fn new(
        cfg: &TrackerConfig,
        feed: Arc<dyn FeedProvider>,
        fingerprints: Arc<FingerprintStore>,
        queue: Arc<DispatchQueue>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            team_id: cfg.team_id,
            scoring_event: cfg.scoring_event.clone(),
            feed_timeout: Duration::from_secs(cfg.feed_timeout_secs),
            feed,
            fingerprints,
            queue,
            stats,
        }
    }

    /// Poll every watched game once. A feed failure ends the tick early;
    /// whatever was applied before it stays applied.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<DetectorTick> {
        let mut tick = DetectorTick::default();
        let result = self.scan(now, &mut tick).await;

        gauge!("tracker_queue_len").set(self.queue.len() as f64);
        gauge!("tracker_fingerprints").set(self.fingerprints.len() as f64);

        match result {
            Ok(()) => {
                self.stats.poll_finished(now, tick.plays);
                Ok(tick)
            }
            Err(e) => {
                self.stats.feed_error();
                Err(e)
            }
        }
    }

    async fn scan(&self, now: DateTime<Utc>, tick: &mut DetectorTick) -> Result<()> {
        let games = bounded(
            self.feed_timeout,
            "list_live_games",
            self.feed.list_live_games(self.team_id),
        )
        .await
        .with_context(|| format!("{}: listing games for team {}", self.feed.name(), self.team_id))?;

        if games.is_empty() {
            tracing::info!(target: "detector", team = self.team_id, "no games today, standing by");
        }

        for game in games {
            let plays = bounded(self.feed_timeout, "list_plays", self.feed.list_plays(&game))
                .await
                .with_context(|| format!("{}: listing plays for game {game}", self.feed.name()))?;

            tick.games += 1;
            tick.plays += plays.len();
            let before = tick.queued + tick.rejected;
            for play in plays {
                self.evaluate(play, now, tick);
            }
            if tick.queued + tick.rejected == before {
                tracing::debug!(target: "detector", %game, "no new scoring plays");
            }
        }
        Ok(())
    }

    fn evaluate(&self, play: PlayEvent, now: DateTime<Utc>, tick: &mut DetectorTick) {
        let fp = play.fingerprint();
        if self.fingerprints.contains(&fp) {
            return;
        }
        if !play.is_scoring_play(self.team_id, &self.scoring_event) {
            return;
        }

        let player = play.player_name.clone();
        let inning = play.inning;
        match self.queue.enqueue(NotificationJob::new(play, now)) {
            Enqueue::Accepted => {
                tick.queued += 1;
                self.stats.job_queued();
                tracing::info!(
                    target: "detector",
                    fingerprint = %fp,
                    %player,
                    inning,
                    "new scoring play queued"
                );
            }
            Enqueue::Full => {
                tick.rejected += 1;
                self.stats.job_rejected();
                tracing::warn!(
                    target: "detector",
                    fingerprint = %fp,
                    %player,
                    capacity = self.queue.capacity(),
                    "dispatch queue full, scoring play will not be announced"
                );
            }
            Enqueue::Duplicate => {
                tracing::debug!(target: "detector", fingerprint = %fp, "already pending");
            }
        }

        self.fingerprints.record(&fp);
    }
}
