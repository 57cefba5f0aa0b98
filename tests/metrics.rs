// tests/metrics.rs
//
// The Prometheus exporter sees pipeline counters once the recorder is
// installed. One recorder per process, so this file holds a single test.

mod common;

use std::sync::Arc;

use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt as _;

use common::*;
use homerun_tracker::metrics::Metrics;
use homerun_tracker::Pipeline;

#[tokio::test]
async fn metrics_route_exposes_pipeline_series() {
    let metrics = Metrics::init().expect("install recorder");

    let pipeline = Pipeline::new(
        test_config(),
        Arc::new(MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)])),
        Arc::new(ScriptedEnricher::always(EnrichStep::Found)),
        Arc::new(RecordingNotifier::ok()),
    );
    pipeline.detect_once(t0()).await.unwrap();
    pipeline.dispatch_once(t0()).await;

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = metrics.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    for name in [
        "tracker_plays_scanned_total",
        "tracker_jobs_queued_total",
        "tracker_jobs_notified_total",
        "tracker_queue_len",
        "tracker_fingerprints",
        "tracker_last_poll_ts",
    ] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
    assert!(Metrics::init().is_err(), "second recorder is refused");
}
