//! Posts one sample home run to the configured Discord webhook, to check the
//! webhook URL before a game.

use anyhow::{anyhow, Result};
use homerun_tracker::enrich::Enrichment;
use homerun_tracker::feed::{HitMetrics, PlayEvent};
use homerun_tracker::notify::{discord::DiscordNotifier, Notifier};
use homerun_tracker::TrackerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = TrackerConfig::load_default()?;
    let webhook = cfg
        .webhook_url()
        .ok_or_else(|| anyhow!("no webhook configured; set DISCORD_WEBHOOK_URL"))?;
    let notifier = DiscordNotifier::new(webhook)
        .with_timeout(cfg.notify_timeout_secs)
        .with_hashtag(cfg.discord.hashtag.clone());

    let hit = HitMetrics {
        exit_velocity: Some(108.2),
        launch_angle: Some(27.0),
        distance: Some(421.0),
    };
    let play = PlayEvent {
        game_id: "demo".into(),
        game_date: None,
        sequence: 0,
        inning: 1,
        team_id: cfg.team_id,
        player_name: "Test Player".into(),
        player_id: 0,
        play_type: cfg.scoring_event.clone(),
        description: "Test Player homers (1) on a fly ball to left center field.".into(),
        hit: Some(hit),
    };
    let enrichment = Enrichment {
        artifact_url: None,
        metrics: Some(hit),
    };

    notifier.notify(&play, Some(&enrichment)).await?;
    println!("notify-demo: test message sent");
    Ok(())
}
