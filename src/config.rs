// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "TRACKER_CONFIG_PATH";
pub const ENV_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";

fn default_team_id() -> u32 {
    121 // New York Mets
}
fn default_team_name() -> String {
    "New York Mets".to_string()
}
fn default_scoring_event() -> String {
    "home_run".to_string()
}
fn default_poll_interval_secs() -> u64 {
    120
}
fn default_dispatch_interval_secs() -> u64 {
    120
}
fn default_fingerprint_capacity() -> usize {
    200
}
fn default_queue_capacity() -> usize {
    20
}
fn default_max_attempts() -> u32 {
    5
}
fn default_min_attempt_spacing_secs() -> u64 {
    300
}
fn default_max_jobs_per_tick() -> usize {
    5
}
fn default_feed_timeout_secs() -> u64 {
    10
}
fn default_enrich_timeout_secs() -> u64 {
    30
}
fn default_notify_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,
    /// Offset (hours) of the calendar day used for the schedule lookup.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

fn default_feed_base_url() -> String {
    crate::feed::mlb::DEFAULT_BASE_URL.to_string()
}
fn default_utc_offset_hours() -> i32 {
    -4
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavantConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_savant_base_url")]
    pub base_url: String,
}

fn default_savant_base_url() -> String {
    crate::enrich::savant::DEFAULT_BASE_URL.to_string()
}

impl Default for SavantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_savant_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// "ENV" means: read from DISCORD_WEBHOOK_URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_hashtag")]
    pub hashtag: String,
}

fn default_hashtag() -> String {
    "#LGM".to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            hashtag: default_hashtag(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_team_id")]
    pub team_id: u32,
    #[serde(default = "default_team_name")]
    pub team_name: String,
    /// Play-type tag that counts as a scoring play.
    #[serde(default = "default_scoring_event")]
    pub scoring_event: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,
    #[serde(default = "default_fingerprint_capacity")]
    pub fingerprint_capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Minimum gap between two attempts of the same job.
    #[serde(default = "default_min_attempt_spacing_secs")]
    pub min_attempt_spacing_secs: u64,
    #[serde(default = "default_max_jobs_per_tick")]
    pub max_jobs_per_tick: usize,
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_enrich_timeout_secs")]
    pub enrich_timeout_secs: u64,
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    /// Start both loops as soon as the service boots.
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Pinged after every detector tick; keeps free-tier hosts awake.
    #[serde(default)]
    pub keep_alive_url: Option<String>,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub savant: SavantConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            team_id: default_team_id(),
            team_name: default_team_name(),
            scoring_event: default_scoring_event(),
            poll_interval_secs: default_poll_interval_secs(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
            fingerprint_capacity: default_fingerprint_capacity(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            min_attempt_spacing_secs: default_min_attempt_spacing_secs(),
            max_jobs_per_tick: default_max_jobs_per_tick(),
            feed_timeout_secs: default_feed_timeout_secs(),
            enrich_timeout_secs: default_enrich_timeout_secs(),
            notify_timeout_secs: default_notify_timeout_secs(),
            autostart: true,
            keep_alive_url: None,
            feed: FeedConfig::default(),
            savant: SavantConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: TrackerConfig = toml::from_str(s).context("parsing tracker toml")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let mut cfg: TrackerConfig = serde_json::from_str(s).context("parsing tracker json")?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext == "json" {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $TRACKER_CONFIG_PATH
    /// 2) config/tracker.toml
    /// 3) config/tracker.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new("config/tracker.toml").exists() {
            Self::load_from_file("config/tracker.toml")?
        } else if Path::new("config/tracker.json").exists() {
            Self::load_from_file("config/tracker.json")?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u32>("TRACKED_TEAM_ID")? {
            self.team_id = v;
        }
        if let Some(v) = env_parse::<u64>("POLL_INTERVAL_SECS")? {
            self.poll_interval_secs = v;
        }
        if let Some(v) = env_parse::<u64>("DISPATCH_INTERVAL_SECS")? {
            self.dispatch_interval_secs = v;
        }
        self.sanitize();
        Ok(())
    }

    /// Clamp values that would stall or disable the pipeline.
    pub(crate) fn sanitize(&mut self) {
        self.poll_interval_secs = self.poll_interval_secs.max(1);
        self.dispatch_interval_secs = self.dispatch_interval_secs.max(1);
        self.fingerprint_capacity = self.fingerprint_capacity.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self.max_attempts = self.max_attempts.max(1);
        self.max_jobs_per_tick = self.max_jobs_per_tick.max(1);
        self.feed_timeout_secs = self.feed_timeout_secs.max(1);
        self.enrich_timeout_secs = self.enrich_timeout_secs.max(1);
        self.notify_timeout_secs = self.notify_timeout_secs.max(1);
        self.scoring_event = self.scoring_event.trim().to_ascii_lowercase();
        if self.scoring_event.is_empty() {
            self.scoring_event = default_scoring_event();
        }
    }

    /// Webhook URL with the "ENV" indirection resolved. `None` when not set.
    pub fn webhook_url(&self) -> Option<String> {
        match self.discord.webhook_url.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("env") => {
                std::env::var(ENV_WEBHOOK).ok().filter(|s| !s.trim().is_empty())
            }
            Some("") => None,
            Some(v) => Some(v.to_string()),
            None => std::env::var(ENV_WEBHOOK).ok().filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn min_attempt_spacing(&self) -> ChronoDuration {
        // a year is plenty and keeps chrono in range
        ChronoDuration::seconds(self.min_attempt_spacing_secs.min(365 * 86_400) as i64)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{key}={v} is not a valid value")),
        _ => Ok(None),
    }
}
