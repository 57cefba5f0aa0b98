// src/feed/types.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Batted-ball numbers reported with a play (Statcast).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HitMetrics {
    pub exit_velocity: Option<f64>, // mph
    pub launch_angle: Option<f64>,  // degrees
    pub distance: Option<f64>,      // feet
}

impl HitMetrics {
    pub fn is_empty(&self) -> bool {
        self.exit_velocity.is_none() && self.launch_angle.is_none() && self.distance.is_none()
    }
}

/// One play as reported by the upstream feed. Never mutated once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub game_id: String,
    pub game_date: Option<NaiveDate>,
    /// Play sequence within the game (MLB `atBatIndex`).
    pub sequence: u32,
    pub inning: u32,
    /// Team at bat when the play happened.
    pub team_id: u32,
    pub player_id: u32,
    pub player_name: String,
    /// e.g. "home_run", "single", "strikeout"
    pub play_type: String,
    pub description: String,
    #[serde(default)]
    pub hit: Option<HitMetrics>,
}

impl PlayEvent {
    /// Stable identity of the play across polls: game id + play sequence.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.game_id, self.sequence)
    }

    /// The tracked team's scoring play? Deliberately no significance filter:
    /// a solo shot in a blowout counts the same as a walk-off.
    pub fn is_scoring_play(&self, team_id: u32, scoring_event: &str) -> bool {
        self.team_id == team_id && self.play_type.eq_ignore_ascii_case(scoring_event)
    }
}

pub fn fingerprint(game_id: &str, sequence: u32) -> String {
    format!("{game_id}-p{sequence}")
}

/// Read-only live-game feed.
#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    /// Games worth scanning for `team_id` right now.
    async fn list_live_games(&self, team_id: u32) -> Result<Vec<String>>;
    /// All plays reported so far for `game_id`.
    async fn list_plays(&self, game_id: &str) -> Result<Vec<PlayEvent>>;
    fn name(&self) -> &'static str;
}
