//! pipeline.rs: lifecycle owner for the two periodic loops.
//!
//! The detector and dispatcher each run on their own `tokio` interval. A tick
//! is awaited inline, so ticks of one kind never overlap, and the shutdown
//! signal is only observed between ticks. The lifecycle lock is never held
//! across an await, so the snapshot answers while a stop drains a tick.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TrackerConfig;
use crate::detector::{Detector, DetectorTick};
use crate::dispatcher::{DispatchPolicy, DispatchTick, Dispatcher};
use crate::enrich::{savant::SavantEnricher, Enricher, FeedMetricsEnricher};
use crate::feed::{mlb::MlbFeed, FeedProvider};
use crate::fingerprints::FingerprintStore;
use crate::notify::{discord::DiscordNotifier, Notifier};
use crate::queue::{DispatchQueue, JobSummary};
use crate::stats::{PipelineStats, StatsSnapshot};

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

enum Lifecycle {
    Stopped,
    Running(Running),
    /// Shutdown signalled; waiting for in-flight ticks to finish.
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Stopped,
    Running,
    Stopping,
}

/// Read-only view served by `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub running: bool,
    pub state: PipelineState,
    pub team_id: u32,
    pub team_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<i64>,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub fingerprints: usize,
    pub fingerprint_capacity: usize,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub pending: Vec<JobSummary>,
}

pub struct Pipeline {
    cfg: TrackerConfig,
    fingerprints: Arc<FingerprintStore>,
    queue: Arc<DispatchQueue>,
    stats: Arc<PipelineStats>,
    detector: Arc<Detector>,
    dispatcher: Arc<Dispatcher>,
    keep_alive: Option<(Client, String)>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Pipeline {
    pub fn new(
        mut cfg: TrackerConfig,
        feed: Arc<dyn FeedProvider>,
        enricher: Arc<dyn Enricher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        // zero intervals would panic inside the spawned loops
        cfg.sanitize();
        let fingerprints = Arc::new(FingerprintStore::with_capacity(cfg.fingerprint_capacity));
        let queue = Arc::new(DispatchQueue::with_capacity(cfg.queue_capacity));
        let stats = Arc::new(PipelineStats::default());

        let detector = Arc::new(Detector::new(
            &cfg,
            feed,
            fingerprints.clone(),
            queue.clone(),
            stats.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            DispatchPolicy::from_config(&cfg),
            queue.clone(),
            enricher,
            notifier,
            stats.clone(),
        ));
        let keep_alive = cfg
            .keep_alive_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .map(|u| (Client::new(), u));

        Self {
            cfg,
            fingerprints,
            queue,
            stats,
            detector,
            dispatcher,
            keep_alive,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Stopped)),
        }
    }

    /// Wire the production adapters: MLB Stats API, Baseball Savant (or the
    /// feed-metrics fallback) and the Discord webhook.
    pub fn from_config(cfg: TrackerConfig) -> Result<Self> {
        let webhook = cfg.webhook_url().ok_or_else(|| {
            anyhow!(
                "no Discord webhook configured (set discord.webhook_url or {})",
                crate::config::ENV_WEBHOOK
            )
        })?;

        let feed = MlbFeed::new(cfg.feed.base_url.clone())
            .with_utc_offset_hours(cfg.feed.utc_offset_hours)
            .with_timeout(cfg.feed_timeout_secs);
        let enricher: Arc<dyn Enricher> = if cfg.savant.enabled {
            Arc::new(SavantEnricher::new(cfg.savant.base_url.clone()).with_timeout(cfg.enrich_timeout_secs))
        } else {
            Arc::new(FeedMetricsEnricher)
        };
        let notifier = DiscordNotifier::new(webhook)
            .with_timeout(cfg.notify_timeout_secs)
            .with_hashtag(cfg.discord.hashtag.clone());

        tracing::info!(
            target: "pipeline",
            team = cfg.team_id,
            feed = feed.name(),
            enricher = enricher.name(),
            notifier = notifier.name(),
            "pipeline wired"
        );
        Ok(Self::new(cfg, Arc::new(feed), enricher, Arc::new(notifier)))
    }

    /// Spawn both loops. Returns `false` (and changes nothing) unless the
    /// pipeline is stopped. Counters are reset; the dedup window and queue
    /// are kept.
    pub fn start(&self) -> bool {
        let mut guard = self.lifecycle.lock().expect("lifecycle mutex poisoned");
        if !matches!(*guard, Lifecycle::Stopped) {
            return false;
        }

        self.stats.reset();
        let (tx, rx) = watch::channel(false);

        let detector = self.detector.clone();
        let keep_alive = self.keep_alive.clone();
        let detect = spawn_loop("detector", self.cfg.poll_interval(), rx.clone(), move || {
            let detector = detector.clone();
            let keep_alive = keep_alive.clone();
            async move {
                run_detector(&detector, Utc::now()).await;
                if let Some((client, url)) = keep_alive {
                    ping(&client, &url).await;
                }
            }
        });

        let dispatcher = self.dispatcher.clone();
        let dispatch = spawn_loop("dispatcher", self.cfg.dispatch_interval(), rx, move || {
            let dispatcher = dispatcher.clone();
            async move {
                run_dispatcher(&dispatcher, Utc::now()).await;
            }
        });

        let started_at = Utc::now();
        *guard = Lifecycle::Running(Running {
            shutdown: tx,
            handles: vec![detect, dispatch],
            started_at,
        });
        tracing::info!(
            target: "pipeline",
            team = self.cfg.team_id,
            poll_secs = self.cfg.poll_interval_secs,
            dispatch_secs = self.cfg.dispatch_interval_secs,
            "pipeline started"
        );
        true
    }

    /// Signal both loops and wait for any in-flight tick to finish.
    /// Returns `false` when not running (stopped, or a stop is in progress).
    pub async fn stop(&self) -> bool {
        let running = {
            let mut guard = self.lifecycle.lock().expect("lifecycle mutex poisoned");
            match std::mem::replace(&mut *guard, Lifecycle::Stopping) {
                Lifecycle::Running(r) => r,
                other => {
                    *guard = other;
                    return false;
                }
            }
        };

        let _ = running.shutdown.send(true);
        // drained in its own task so a dropped caller cannot leave us Stopping
        let lifecycle = self.lifecycle.clone();
        let queue = self.queue.clone();
        let drain = tokio::spawn(async move {
            for handle in running.handles {
                if let Err(e) = handle.await {
                    tracing::error!(target: "pipeline", error = ?e, "loop task ended abnormally");
                }
            }
            *lifecycle.lock().expect("lifecycle mutex poisoned") = Lifecycle::Stopped;
            tracing::info!(
                target: "pipeline",
                pending = queue.len(),
                "pipeline stopped"
            );
        });
        if let Err(e) = drain.await {
            tracing::error!(target: "pipeline", error = ?e, "stop task ended abnormally");
        }
        true
    }

    pub fn state(&self) -> PipelineState {
        match *self.lifecycle.lock().expect("lifecycle mutex poisoned") {
            Lifecycle::Stopped => PipelineState::Stopped,
            Lifecycle::Running(_) => PipelineState::Running,
            Lifecycle::Stopping => PipelineState::Stopping,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let (state, started_at) = match &*self.lifecycle.lock().expect("lifecycle mutex poisoned") {
            Lifecycle::Stopped => (PipelineState::Stopped, None),
            Lifecycle::Running(r) => (PipelineState::Running, Some(r.started_at)),
            Lifecycle::Stopping => (PipelineState::Stopping, None),
        };
        PipelineSnapshot {
            running: state == PipelineState::Running,
            state,
            team_id: self.cfg.team_id,
            team_name: self.cfg.team_name.clone(),
            started_at,
            uptime_secs: started_at.map(|t| (Utc::now() - t).num_seconds()),
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            fingerprints: self.fingerprints.len(),
            fingerprint_capacity: self.fingerprints.capacity(),
            stats: self.stats.snapshot(),
            pending: self.queue.pending(),
        }
    }

    /// One detector tick outside the timers.
    pub async fn detect_once(&self, now: DateTime<Utc>) -> Result<DetectorTick> {
        self.detector.run_tick(now).await
    }

    /// One dispatcher tick outside the timers.
    pub async fn dispatch_once(&self, now: DateTime<Utc>) -> DispatchTick {
        self.dispatcher.run_tick(now).await
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            tick().await;
        }
        tracing::debug!(target: "pipeline", task = name, "loop exited");
    })
}

async fn run_detector(detector: &Detector, now: DateTime<Utc>) {
    match detector.run_tick(now).await {
        Ok(t) => tracing::debug!(
            target: "detector",
            games = t.games,
            plays = t.plays,
            queued = t.queued,
            rejected = t.rejected,
            "detector tick"
        ),
        Err(e) => tracing::warn!(target: "detector", error = ?e, "detector tick failed, retrying next interval"),
    }
}

async fn run_dispatcher(dispatcher: &Dispatcher, now: DateTime<Utc>) {
    let t = dispatcher.run_tick(now).await;
    if t.processed() > 0 {
        tracing::info!(
            target: "dispatcher",
            notified = t.notified,
            requeued = t.requeued,
            dropped = t.dropped,
            "dispatch tick"
        );
    }
}

async fn ping(client: &Client, url: &str) {
    let res = client
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .with_context(|| format!("keep-alive ping {url}"));
    match res {
        Ok(r) => tracing::debug!(target: "pipeline", status = %r.status(), "keep-alive ping"),
        Err(e) => tracing::debug!(target: "pipeline", error = ?e, "keep-alive ping failed"),
    }
}
