//! Home run tracker: binary entrypoint.
//! Boots the status router and, unless disabled, the detection pipeline.

use std::sync::Arc;

use anyhow::Context;
use homerun_tracker::{create_router, metrics::Metrics, AppState, Pipeline, TrackerConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("homerun_tracker=info,warn"));

    // The hosting runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = TrackerConfig::load_default().context("loading tracker config")?;
    let autostart = cfg.autostart;
    let pipeline = Arc::new(Pipeline::from_config(cfg)?);

    if autostart {
        pipeline.start();
    } else {
        tracing::info!("autostart disabled, waiting for POST /api/start");
    }

    let mut router = create_router(AppState::new(pipeline));
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics exporter not installed"),
    }

    Ok(router.into())
}
