// tests/common/mod.rs
// Hand-written collaborators for driving the pipeline without network access.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};

use homerun_tracker::enrich::{EnrichOutcome, Enricher, Enrichment};
use homerun_tracker::feed::{FeedProvider, HitMetrics, PlayEvent};
use homerun_tracker::notify::{NotifyError, Notifier};
use homerun_tracker::TrackerConfig;

pub const METS: u32 = 121;
pub const BRAVES: u32 = 144;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 14, 23, 10, 0).unwrap()
}

pub fn mins(n: i64) -> Duration {
    Duration::minutes(n)
}

pub fn home_run(game: &str, seq: u32, team_id: u32) -> PlayEvent {
    play(game, seq, team_id, "home_run")
}

pub fn play(game: &str, seq: u32, team_id: u32, play_type: &str) -> PlayEvent {
    PlayEvent {
        game_id: game.into(),
        game_date: None,
        sequence: seq,
        inning: 3,
        team_id,
        player_id: 624413,
        player_name: "Pete Alonso".into(),
        play_type: play_type.into(),
        description: "Pete Alonso homers (20) on a fly ball to left field.".into(),
        hit: Some(HitMetrics {
            exit_velocity: Some(107.1),
            launch_angle: Some(31.0),
            distance: Some(412.0),
        }),
    }
}

/// Config with the production tuning and no real endpoints.
pub fn test_config() -> TrackerConfig {
    let mut cfg = TrackerConfig::default();
    cfg.autostart = false;
    cfg.keep_alive_url = None;
    cfg
}

/// Feed serving a fixed game → plays table; can be told to fail.
#[derive(Default)]
pub struct MockFeed {
    games: Mutex<Vec<String>>,
    plays: Mutex<HashMap<String, Vec<PlayEvent>>>,
    failing_game: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl MockFeed {
    pub fn with_game(self, game: &str, plays: Vec<PlayEvent>) -> Self {
        self.set_game(game, plays);
        self
    }

    pub fn set_game(&self, game: &str, plays: Vec<PlayEvent>) {
        let mut games = self.games.lock().unwrap();
        if !games.iter().any(|g| g == game) {
            games.push(game.to_string());
        }
        self.plays.lock().unwrap().insert(game.to_string(), plays);
    }

    pub fn fail_game(&self, game: Option<&str>) {
        *self.failing_game.lock().unwrap() = game.map(str::to_string);
    }
}

#[async_trait::async_trait]
impl FeedProvider for MockFeed {
    async fn list_live_games(&self, _team_id: u32) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.games.lock().unwrap().clone())
    }

    async fn list_plays(&self, game_id: &str) -> Result<Vec<PlayEvent>> {
        if self.failing_game.lock().unwrap().as_deref() == Some(game_id) {
            return Err(anyhow!("feed unavailable for {game_id}"));
        }
        Ok(self
            .plays
            .lock()
            .unwrap()
            .get(game_id)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "mock-feed"
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EnrichStep {
    Found,
    NotFound,
    Fail,
}

/// Enricher that replays scripted outcomes, then keeps returning the last one.
pub struct ScriptedEnricher {
    script: Mutex<VecDeque<EnrichStep>>,
    fallback: EnrichStep,
    pub calls: AtomicUsize,
}

impl ScriptedEnricher {
    pub fn always(step: EnrichStep) -> Self {
        Self::script(vec![], step)
    }

    pub fn script(steps: Vec<EnrichStep>, fallback: EnrichStep) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Enricher for ScriptedEnricher {
    async fn enrich(&self, play: &PlayEvent) -> Result<EnrichOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match step {
            EnrichStep::Found => Ok(EnrichOutcome::Found(Enrichment {
                artifact_url: Some(format!(
                    "https://savant.example/sporty-videos?playId={}",
                    play.fingerprint()
                )),
                metrics: play.hit,
            })),
            EnrichStep::NotFound => Ok(EnrichOutcome::NotFound),
            EnrichStep::Fail => Err(anyhow!("savant unavailable")),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Enricher that takes `delay` (tokio time) and then finds nothing.
pub struct SlowEnricher {
    delay: StdDuration,
    pub calls: AtomicUsize,
}

impl SlowEnricher {
    pub fn new(delay: StdDuration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Enricher for SlowEnricher {
    async fn enrich(&self, _play: &PlayEvent) -> Result<EnrichOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(EnrichOutcome::NotFound)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[derive(Debug, Clone, Copy)]
pub enum NotifyStep {
    Ok,
    Transient,
    Permanent,
}

/// Notifier that records every delivered fingerprint.
pub struct RecordingNotifier {
    script: Mutex<VecDeque<NotifyStep>>,
    fallback: NotifyStep,
    pub delivered: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl RecordingNotifier {
    pub fn ok() -> Self {
        Self::script(vec![], NotifyStep::Ok)
    }

    pub fn script(steps: Vec<NotifyStep>, fallback: NotifyStep) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback,
            delivered: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        play: &PlayEvent,
        _enrichment: Option<&Enrichment>,
    ) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match step {
            NotifyStep::Ok => {
                self.delivered.lock().unwrap().push(play.fingerprint());
                Ok(())
            }
            NotifyStep::Transient => Err(NotifyError::Transient(anyhow!("discord 503"))),
            NotifyStep::Permanent => Err(NotifyError::Permanent("discord 400".into())),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
