// src/feed/mlb.rs
//! MLB Stats API feed: today's schedule for a team + the live game feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::feed::types::{FeedProvider, HitMetrics, PlayEvent};

pub const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com";

/// Live, preview, scheduled and final games. Final stays in so a home run in
/// the last inning is still picked up after the game ends.
const WATCHED_STATUS_CODES: [&str; 4] = ["I", "P", "S", "F"];

// ---- schedule ----

#[derive(Debug, Deserialize)]
struct Schedule {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<ScheduleGame>,
}

#[derive(Debug, Deserialize)]
struct ScheduleGame {
    #[serde(rename = "gamePk")]
    game_pk: u64,
    #[serde(default)]
    status: GameStatus,
    #[serde(default)]
    teams: Option<ScheduleTeams>,
}

#[derive(Debug, Default, Deserialize)]
struct GameStatus {
    #[serde(rename = "statusCode", default)]
    status_code: String,
    #[serde(rename = "detailedState", default)]
    detailed_state: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleTeams {
    away: ScheduleSide,
    home: ScheduleSide,
}

#[derive(Debug, Deserialize)]
struct ScheduleSide {
    team: TeamRef,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    id: u32,
    #[serde(default)]
    name: String,
}

// ---- live feed ----

#[derive(Debug, Deserialize)]
struct LiveFeed {
    #[serde(rename = "gameData")]
    game_data: GameData,
    #[serde(rename = "liveData")]
    live_data: LiveData,
}

#[derive(Debug, Deserialize)]
struct GameData {
    #[serde(default)]
    datetime: Option<GameDateTime>,
    teams: GameTeams,
}

#[derive(Debug, Deserialize)]
struct GameDateTime {
    #[serde(rename = "officialDate")]
    official_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct GameTeams {
    away: TeamRef,
    home: TeamRef,
}

#[derive(Debug, Deserialize)]
struct LiveData {
    #[serde(default)]
    plays: Plays,
}

#[derive(Debug, Default, Deserialize)]
struct Plays {
    #[serde(rename = "allPlays", default)]
    all_plays: Vec<RawPlay>,
}

#[derive(Debug, Deserialize)]
struct RawPlay {
    #[serde(default)]
    result: PlayResult,
    about: About,
    matchup: Matchup,
    #[serde(rename = "playEvents", default)]
    play_events: Vec<RawPlayEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayResult {
    #[serde(rename = "eventType")]
    event_type: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct About {
    #[serde(rename = "atBatIndex")]
    at_bat_index: u32,
    #[serde(default)]
    inning: u32,
    #[serde(rename = "halfInning", default)]
    half_inning: String,
}

#[derive(Debug, Deserialize)]
struct Matchup {
    batter: Person,
}

#[derive(Debug, Deserialize)]
struct Person {
    id: u32,
    #[serde(rename = "fullName", default)]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct RawPlayEvent {
    #[serde(rename = "hitData")]
    hit_data: Option<HitData>,
}

#[derive(Debug, Deserialize)]
struct HitData {
    #[serde(rename = "launchSpeed")]
    launch_speed: Option<f64>,
    #[serde(rename = "launchAngle")]
    launch_angle: Option<f64>,
    #[serde(rename = "totalDistance")]
    total_distance: Option<f64>,
}

/// Game ids from a schedule response that are worth polling.
pub fn parse_schedule(body: &str) -> Result<Vec<String>> {
    let schedule: Schedule = serde_json::from_str(body).context("parsing mlb schedule json")?;
    let mut out = Vec::new();
    for game in schedule.dates.into_iter().flat_map(|d| d.games) {
        if !WATCHED_STATUS_CODES.contains(&game.status.status_code.as_str()) {
            continue;
        }
        if let Some(teams) = &game.teams {
            tracing::debug!(
                target: "feed",
                game = game.game_pk,
                away = %teams.away.team.name,
                home = %teams.home.team.name,
                status = %game.status.detailed_state,
                "watching game"
            );
        }
        out.push(game.game_pk.to_string());
    }
    Ok(out)
}

/// Completed plays from a live game feed. The batting team is derived from
/// the half inning: visitors bat in the top, the home side in the bottom.
pub fn parse_live_feed(game_id: &str, body: &str) -> Result<Vec<PlayEvent>> {
    let t0 = std::time::Instant::now();
    let feed: LiveFeed = serde_json::from_str(body)
        .with_context(|| format!("parsing live feed json for game {game_id}"))?;

    let game_date = feed.game_data.datetime.and_then(|d| d.official_date);
    let away = feed.game_data.teams.away.id;
    let home = feed.game_data.teams.home.id;

    let mut out = Vec::with_capacity(feed.live_data.plays.all_plays.len());
    for play in feed.live_data.plays.all_plays {
        // in-progress at-bat, no result yet
        let Some(play_type) = play.result.event_type else {
            continue;
        };
        let team_id = if play.about.half_inning.eq_ignore_ascii_case("bottom") {
            home
        } else {
            away
        };
        let hit = play
            .play_events
            .iter()
            .find_map(|e| e.hit_data.as_ref())
            .map(|h| HitMetrics {
                exit_velocity: h.launch_speed,
                launch_angle: h.launch_angle,
                distance: h.total_distance,
            });

        out.push(PlayEvent {
            game_id: game_id.to_string(),
            game_date,
            sequence: play.about.at_bat_index,
            inning: play.about.inning,
            team_id,
            player_id: play.matchup.batter.id,
            player_name: play.matchup.batter.full_name,
            play_type,
            description: play.result.description.unwrap_or_default(),
            hit,
        });
    }

    histogram!("tracker_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

pub struct MlbFeed {
    client: reqwest::Client,
    base_url: String,
    utc_offset_hours: i32,
    timeout: Duration,
}

impl MlbFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            utc_offset_hours: -4,
            timeout: Duration::from_secs(10),
        }
    }

    /// Offset used to decide which calendar day "today" is.
    pub fn with_utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn today(&self) -> NaiveDate {
        let now = Utc::now();
        // out-of-range offsets fall back to UTC
        match FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600)) {
            Some(off) => now.with_timezone(&off).date_naive(),
            None => now.date_naive(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        counter!("tracker_feed_requests_total").increment(1);
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("non-2xx from {url}"))?;
        resp.text().await.context("reading feed body")
    }
}

#[async_trait]
impl FeedProvider for MlbFeed {
    async fn list_live_games(&self, team_id: u32) -> Result<Vec<String>> {
        let url = format!(
            "{}/api/v1/schedule?sportId=1&date={}&teamId={}",
            self.base_url,
            self.today().format("%Y-%m-%d"),
            team_id
        );
        let body = self.get_text(&url).await?;
        parse_schedule(&body)
    }

    async fn list_plays(&self, game_id: &str) -> Result<Vec<PlayEvent>> {
        let url = format!("{}/api/v1.1/game/{}/feed/live", self.base_url, game_id);
        let body = self.get_text(&url).await?;
        parse_live_feed(game_id, &body)
    }

    fn name(&self) -> &'static str {
        "mlb-statsapi"
    }
}
