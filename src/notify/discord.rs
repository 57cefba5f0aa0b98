use anyhow::anyhow;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{NotifyError, Notifier};
use crate::enrich::Enrichment;
use crate::feed::{HitMetrics, PlayEvent};

/// Discord rejects message content longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    hashtag: String,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            hashtag: "#LGM".to_string(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_hashtag(mut self, hashtag: impl Into<String>) -> Self {
        self.hashtag = hashtag.into();
        self
    }

    pub fn payload_for(&self, play: &PlayEvent, enrichment: Option<&Enrichment>) -> DiscordWebhookPayload {
        let content = format_message(play, enrichment, &self.hashtag);
        let artifact = enrichment.and_then(|e| e.artifact_url.as_deref());
        DiscordWebhookPayload::new(content, artifact.map(|url| (format!("Watch: {}", play.player_name), url)))
    }
}

/// Message body for a home run post.
pub fn format_message(play: &PlayEvent, enrichment: Option<&Enrichment>, hashtag: &str) -> String {
    let mut msg = format!("🏠⚾ **{}** goes yard! ⚾🏠\n\n", play.player_name);
    if !play.description.is_empty() {
        msg.push_str(&play.description);
        msg.push('\n');
    }

    let metrics = enrichment.and_then(|e| e.metrics).or(play.hit);
    if let Some(line) = metrics.as_ref().and_then(stats_line) {
        msg.push_str(&line);
        msg.push('\n');
    }

    if let Some(url) = enrichment.and_then(|e| e.artifact_url.as_deref()) {
        msg.push_str(url);
        msg.push('\n');
    }

    if !hashtag.is_empty() {
        msg.push('\n');
        msg.push_str(hashtag);
    }
    msg
}

fn stats_line(m: &HitMetrics) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(ev) = m.exit_velocity {
        parts.push(format!("Exit Velocity: {ev:.1} mph"));
    }
    if let Some(la) = m.launch_angle {
        parts.push(format!("Launch Angle: {la:.0}°"));
    }
    if let Some(d) = m.distance {
        parts.push(format!("Distance: {d:.0} ft"));
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// 429 and 5xx are worth retrying; any other non-2xx means the message
/// itself was refused.
pub fn classify_status(status: StatusCode) -> Result<(), NotifyError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(NotifyError::Transient(anyhow!("Discord webhook HTTP {status}")))
    } else {
        Err(NotifyError::Permanent(format!("Discord webhook refused message: HTTP {status}")))
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(
        &self,
        play: &PlayEvent,
        enrichment: Option<&Enrichment>,
    ) -> Result<(), NotifyError> {
        let payload = self.payload_for(play, enrichment);
        if let Some(content) = &payload.content {
            let len = content.chars().count();
            if len > MAX_CONTENT_CHARS {
                return Err(NotifyError::Permanent(format!(
                    "message is {len} chars, Discord allows {MAX_CONTENT_CHARS}"
                )));
            }
        }

        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transient(anyhow!("Discord webhook request failed: {e}")))?;
        classify_status(rsp.status())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    title: String,
    url: String,
}

#[derive(Debug, Serialize)]
pub struct DiscordWebhookPayload {
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn new(content: String, link: Option<(String, &str)>) -> Self {
        Self {
            content: Some(content),
            embeds: link
                .map(|(title, url)| DiscordEmbed {
                    title,
                    url: url.to_string(),
                })
                .into_iter()
                .collect(),
        }
    }
}
