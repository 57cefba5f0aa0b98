// src/enrich/savant.rs
//! Baseball Savant lookup: find the pitch row for a play in the game's
//! pitch-by-pitch feed, then check that its video page is up.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::time::Duration;

use crate::enrich::{EnrichOutcome, Enricher, Enrichment};
use crate::feed::{HitMetrics, PlayEvent};

pub const DEFAULT_BASE_URL: &str = "https://baseballsavant.mlb.com";

#[derive(Debug, Default, Deserialize)]
struct GameFeed {
    #[serde(default)]
    team_home: Vec<PitchRow>,
    #[serde(default)]
    team_away: Vec<PitchRow>,
}

#[derive(Debug, Default, Deserialize)]
struct PitchRow {
    play_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    inning: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    batter: Option<u32>,
    #[serde(default)]
    batter_name: Option<String>,
    #[serde(default)]
    events: Option<String>,
    #[serde(default)]
    des: Option<String>,
    #[serde(default)]
    call: Option<String>,
    #[serde(default)]
    pitch_call: Option<String>,
    #[serde(default, alias = "launch_speed", deserialize_with = "lenient")]
    hit_speed: Option<f64>,
    #[serde(default, alias = "launch_angle", deserialize_with = "lenient")]
    hit_angle: Option<f64>,
    #[serde(default, alias = "hit_distance_sc", deserialize_with = "lenient")]
    hit_distance: Option<f64>,
}

/// Savant mixes numbers and numeric strings ("104.2") in the same column.
fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let v = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match v {
        Some(serde_json::Value::Number(n)) => n.to_string().parse().ok(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Pitch row picked for a play.
#[derive(Debug, Clone, PartialEq)]
pub struct SavantMatch {
    pub play_uuid: String,
    pub metrics: Option<HitMetrics>,
}

fn same_batter(row: &PitchRow, play: &PlayEvent) -> bool {
    if let Some(id) = row.batter {
        return id == play.player_id;
    }
    // older payloads only carry the name
    let last = play
        .player_name
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_ascii_lowercase();
    !last.is_empty()
        && row
            .batter_name
            .as_deref()
            .is_some_and(|n| n.to_ascii_lowercase().contains(&last))
}

fn score_row(row: &PitchRow, play: &PlayEvent) -> u32 {
    let mut score = 0;

    // the contact pitch, not just any pitch of the at-bat
    if row.call.as_deref() == Some("X") || row.pitch_call.as_deref() == Some("hit_into_play") {
        score += 1000;
    }

    let needle = play.play_type.replace('_', " ").to_ascii_lowercase();
    let des = row.des.as_deref().unwrap_or_default().to_ascii_lowercase();
    if des.contains(&needle) || (needle == "home run" && des.contains("homer")) {
        score += 100;
    }

    let events = row.events.as_deref().unwrap_or_default().to_ascii_lowercase();
    if !events.is_empty()
        && (events == play.play_type.to_ascii_lowercase() || events.replace('_', " ") == needle)
    {
        score += 50;
    }
    score
}

/// Best pitch row for `play` in a `/gf` response body, if any.
pub fn match_play(body: &str, play: &PlayEvent) -> Result<Option<SavantMatch>> {
    let feed: GameFeed = serde_json::from_str(body).context("parsing savant game feed")?;

    let best = feed
        .team_home
        .iter()
        .chain(feed.team_away.iter())
        .filter(|r| r.play_id.is_some() && r.inning == Some(play.inning) && same_batter(r, play))
        .map(|r| (score_row(r, play), r))
        // first row wins ties
        .fold(None::<(u32, &PitchRow)>, |best, cur| match best {
            Some(b) if b.0 >= cur.0 => Some(b),
            _ => Some(cur),
        });

    Ok(best.and_then(|(score, row)| {
        tracing::debug!(
            target: "enrich",
            score,
            des = row.des.as_deref().unwrap_or_default(),
            "savant row selected"
        );
        let metrics = HitMetrics {
            exit_velocity: row.hit_speed,
            launch_angle: row.hit_angle,
            distance: row.hit_distance,
        };
        row.play_id.clone().map(|play_uuid| SavantMatch {
            play_uuid,
            metrics: (!metrics.is_empty()).then_some(metrics),
        })
    }))
}

pub struct SavantEnricher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SavantEnricher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn video_url(&self, play_uuid: &str) -> String {
        format!("{}/sporty-videos?playId={}", self.base_url, play_uuid)
    }
}

#[async_trait]
impl Enricher for SavantEnricher {
    async fn enrich(&self, play: &PlayEvent) -> Result<EnrichOutcome> {
        let t0 = std::time::Instant::now();
        let url = format!("{}/gf?game_pk={}", self.base_url, play.game_id);
        let body = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .context("savant /gf non-2xx")?
            .text()
            .await
            .context("reading savant /gf body")?;

        let Some(found) = match_play(&body, play)? else {
            tracing::info!(
                target: "enrich",
                game = %play.game_id,
                player = %play.player_name,
                inning = play.inning,
                "no savant row for play yet"
            );
            return Ok(EnrichOutcome::NotFound);
        };

        let video = self.video_url(&found.play_uuid);
        let probe = self
            .client
            .head(&video)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("HEAD {video}"))?;
        let status = probe.status();
        histogram!("tracker_enrich_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        if status.is_success() {
            counter!("tracker_enrichments_total").increment(1);
            Ok(EnrichOutcome::Found(Enrichment {
                artifact_url: Some(video),
                metrics: found.metrics.or(play.hit),
            }))
        } else if status.is_server_error() {
            anyhow::bail!("savant video probe returned {status}");
        } else {
            tracing::info!(target: "enrich", %status, url = %video, "video not published yet");
            Ok(EnrichOutcome::NotFound)
        }
    }

    fn name(&self) -> &'static str {
        "baseball-savant"
    }
}
