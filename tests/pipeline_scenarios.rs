// tests/pipeline_scenarios.rs
//
// End-to-end behaviour of the pipeline with mock collaborators: the four
// reference scenarios plus the start/stop lifecycle.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use common::*;
use homerun_tracker::enrich::Enricher;
use homerun_tracker::feed::FeedProvider;
use homerun_tracker::notify::Notifier;
use homerun_tracker::pipeline::PipelineState;
use homerun_tracker::{Pipeline, TrackerConfig};

struct Rig {
    feed: Arc<MockFeed>,
    enricher: Arc<ScriptedEnricher>,
    notifier: Arc<RecordingNotifier>,
    pipeline: Pipeline,
}

fn rig(cfg: TrackerConfig, feed: MockFeed, enricher: ScriptedEnricher) -> Rig {
    let feed = Arc::new(feed);
    let enricher = Arc::new(enricher);
    let notifier = Arc::new(RecordingNotifier::ok());
    let pipeline = Pipeline::new(
        cfg,
        feed.clone() as Arc<dyn FeedProvider>,
        enricher.clone() as Arc<dyn Enricher>,
        notifier.clone() as Arc<dyn Notifier>,
    );
    Rig {
        feed,
        enricher,
        notifier,
        pipeline,
    }
}

#[tokio::test]
async fn scenario_a_detect_then_announce() {
    let r = rig(
        test_config(),
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Found),
    );

    r.pipeline.detect_once(t0()).await.unwrap();
    let snap = r.pipeline.snapshot();
    assert_eq!(snap.queue_len, 1);
    assert_eq!(snap.fingerprints, 1);
    assert_eq!(snap.pending[0].fingerprint, "g1-p5");

    r.pipeline.dispatch_once(t0() + mins(2)).await;
    let snap = r.pipeline.snapshot();
    assert_eq!(snap.queue_len, 0);
    assert_eq!(snap.stats.notified, 1);
    assert_eq!(r.notifier.delivered(), vec!["g1-p5"]);
}

#[tokio::test]
async fn scenario_b_rereported_play_is_not_announced_twice() {
    let r = rig(
        test_config(),
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Found),
    );

    let mut now = t0();
    for _ in 0..6 {
        r.pipeline.detect_once(now).await.unwrap();
        r.pipeline.dispatch_once(now).await;
        now += mins(2);
    }

    assert_eq!(r.notifier.delivered(), vec!["g1-p5"]);
    assert_eq!(r.pipeline.snapshot().stats.queued, 1);
}

#[tokio::test]
async fn scenario_c_enrichment_never_succeeds() {
    let r = rig(
        test_config(),
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Fail),
    );
    r.pipeline.detect_once(t0()).await.unwrap();

    // dispatcher every 2 minutes for an hour; spacing allows one try per 5
    let mut now = t0();
    for _ in 0..30 {
        r.pipeline.dispatch_once(now).await;
        now += mins(2);
    }

    let snap = r.pipeline.snapshot();
    assert_eq!(snap.stats.dropped, 1);
    assert_eq!(snap.queue_len, 0);
    assert_eq!(r.enricher.calls(), 5);
    assert!(r.notifier.delivered().is_empty());
}

#[tokio::test]
async fn scenario_d_full_queue_rejects_without_crashing() {
    let mut cfg = test_config();
    cfg.queue_capacity = 2;
    let r = rig(
        cfg,
        MockFeed::default().with_game("g1", vec![home_run("g1", 1, METS), home_run("g1", 2, METS)]),
        ScriptedEnricher::always(EnrichStep::NotFound),
    );
    r.pipeline.detect_once(t0()).await.unwrap();

    r.feed.set_game(
        "g1",
        vec![home_run("g1", 1, METS), home_run("g1", 2, METS), home_run("g1", 3, METS)],
    );
    let tick = r.pipeline.detect_once(t0() + mins(2)).await.unwrap();
    assert_eq!(tick.rejected, 1);

    let snap = r.pipeline.snapshot();
    assert_eq!(snap.queue_len, 2);
    assert_eq!(snap.fingerprints, 3);
    assert_eq!(snap.stats.rejected, 1);
    assert!(snap.pending.iter().all(|j| j.fingerprint != "g1-p3"));
}

#[tokio::test(start_paused = true)]
async fn start_runs_both_loops_and_stop_halts_them() {
    let r = rig(
        test_config(),
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Found),
    );

    assert!(r.pipeline.start());
    assert!(!r.pipeline.start(), "second start is a no-op");
    assert!(r.pipeline.is_running());

    // first ticks fire immediately; give the dispatcher one more interval
    tokio::time::sleep(StdDuration::from_secs(121)).await;
    assert_eq!(r.notifier.delivered(), vec!["g1-p5"]);

    let snap = r.pipeline.snapshot();
    assert!(snap.running);
    assert!(snap.started_at.is_some());
    assert!(snap.stats.polls >= 1);

    assert!(r.pipeline.stop().await);
    assert!(!r.pipeline.stop().await);
    assert!(!r.pipeline.is_running());

    let polls = r.feed.calls.load(Ordering::SeqCst);
    tokio::time::sleep(StdDuration::from_secs(600)).await;
    assert_eq!(r.feed.calls.load(Ordering::SeqCst), polls, "no polling after stop");
    assert!(!r.pipeline.snapshot().running);
}

#[tokio::test(start_paused = true)]
async fn restart_resets_counters_but_keeps_dedup_window() {
    let r = rig(
        test_config(),
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Found),
    );

    r.pipeline.start();
    tokio::time::sleep(StdDuration::from_secs(121)).await;
    r.pipeline.stop().await;
    assert_eq!(r.pipeline.snapshot().stats.notified, 1);

    r.pipeline.start();
    tokio::time::sleep(StdDuration::from_secs(121)).await;
    let snap = r.pipeline.snapshot();
    assert_eq!(snap.stats.notified, 0);
    assert_eq!(snap.fingerprints, 1);
    assert_eq!(r.notifier.delivered().len(), 1, "no second announcement");
    r.pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_tick_finish_while_status_stays_readable() {
    let mut cfg = test_config();
    cfg.enrich_timeout_secs = 120;
    let enricher = Arc::new(SlowEnricher::new(StdDuration::from_secs(90)));
    let pipeline = Arc::new(Pipeline::new(
        cfg,
        Arc::new(MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)])),
        enricher.clone() as Arc<dyn Enricher>,
        Arc::new(RecordingNotifier::ok()),
    ));
    pipeline.detect_once(t0()).await.unwrap();

    assert!(pipeline.start());
    tokio::time::sleep(StdDuration::from_secs(1)).await;
    assert_eq!(enricher.calls(), 1, "enrichment is in flight");

    let began = tokio::time::Instant::now();
    let stopper = {
        let p = pipeline.clone();
        tokio::spawn(async move {
            let stopped = p.stop().await;
            (stopped, began.elapsed())
        })
    };
    tokio::task::yield_now().await;

    // the snapshot answers at once while the tick drains
    let snap = pipeline.snapshot();
    assert_eq!(snap.state, PipelineState::Stopping);
    assert!(!snap.running);
    assert_eq!(snap.pending[0].attempts, 0);
    assert!(!pipeline.start(), "no restart while draining");

    let (stopped, waited) = stopper.await.unwrap();
    assert!(stopped);
    assert!(
        waited >= StdDuration::from_secs(89),
        "stop returned after {waited:?}, before the tick ended"
    );

    let snap = pipeline.snapshot();
    assert_eq!(snap.state, PipelineState::Stopped);
    assert_eq!(snap.pending[0].attempts, 1);
    assert!(snap.pending[0].last_attempt_at.is_some());
    assert_eq!(snap.stats.failed_attempts, 1);
    assert!(pipeline.start(), "startable again once drained");
    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn zero_intervals_are_clamped_instead_of_killing_the_loops() {
    let mut cfg = test_config();
    cfg.poll_interval_secs = 0;
    cfg.dispatch_interval_secs = 0;
    let r = rig(
        cfg,
        MockFeed::default().with_game("g1", vec![home_run("g1", 5, METS)]),
        ScriptedEnricher::always(EnrichStep::Found),
    );

    assert!(r.pipeline.start());
    tokio::time::sleep(StdDuration::from_millis(3_500)).await;
    assert!(r.feed.calls.load(Ordering::SeqCst) >= 3, "detector keeps polling every second");
    assert_eq!(r.notifier.delivered(), vec!["g1-p5"]);
    assert!(r.pipeline.is_running());
    assert!(r.pipeline.stop().await);
}
