use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rusty_focus::alert::{AlertDispatcher, AlertError, AlertSink, BrainrotAlert};
use rusty_focus::recording::{write_recording, RecordingSource};
use rusty_focus::source::{BoxedFeed, FaceFeed, FeedFactory, FeedFrame};
use rusty_focus::synthetic::SyntheticFace;
use rusty_focus::{FocusConfig, SessionCoordinator, SessionError, SessionStatus, TrackingFailure};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<BrainrotAlert>>);

impl AlertSink for RecordingSink {
    fn dispatch(&self, alert: &BrainrotAlert) -> Result<(), AlertError> {
        self.0.lock().push(alert.clone());
        Ok(())
    }
}

/// Looks at the screen, leaves for a while, comes back. Driven by wall time.
struct Timeline {
    started: Instant,
    away_from: Duration,
    away_until: Duration,
}

impl FaceFeed for Timeline {
    fn name(&self) -> String {
        "timeline".into()
    }

    fn next_face(&mut self) -> Result<FeedFrame> {
        let t = self.started.elapsed();
        if t >= self.away_from && t < self.away_until {
            Ok(FeedFrame::NoFace)
        } else {
            Ok(FeedFrame::Face(SyntheticFace::looking(0.0, 0.0).detection()))
        }
    }
}

struct Broken;

impl FaceFeed for Broken {
    fn name(&self) -> String {
        "broken".into()
    }

    fn next_face(&mut self) -> Result<FeedFrame> {
        Err(anyhow!("camera unplugged"))
    }
}

fn fast_config() -> FocusConfig {
    let mut config = FocusConfig::default();
    config.calibration.auto_calibrate = false;
    config.unfocus.look_away_secs = 0.2;
    config.tracking.frame_interval_ms = 2;
    config.tracking.retry_backoff_ms = 1;
    config.tracking.max_consecutive_failures = 3;
    config.tracking.stop_grace_ms = 2000;
    config
}

fn timeline_feeds(away_from_ms: u64, away_until_ms: u64) -> Arc<dyn FeedFactory> {
    Arc::new(move |_: &str| -> Result<BoxedFeed> {
        Ok(Box::new(Timeline {
            started: Instant::now(),
            away_from: Duration::from_millis(away_from_ms),
            away_until: Duration::from_millis(away_until_ms),
        }))
    })
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn look_away_raises_exactly_one_alert() {
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Arc::new(AlertDispatcher::spawn(sink.clone(), 4).unwrap());
    let coordinator = SessionCoordinator::new(fast_config(), timeline_feeds(100, 500), Some(dispatcher.clone()));

    coordinator.start("ada", None).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !sink.0.lock().is_empty()));

    // Keep going a little to make sure nothing else fires
    thread::sleep(Duration::from_millis(100));
    let report = coordinator.stop("ada").unwrap();
    dispatcher.shutdown();

    assert!(!report.forced);
    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.stats.times_looked_away, 1);
    assert!(report.stats.total_unfocused_seconds >= 0.2);
    assert!(report.stats.currently_focused);

    let alerts = sink.0.lock();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_id, "ada");
    assert_eq!(alerts[0].look_away_count, 1);
    assert_eq!(alerts[0].notes, "User looked away 1 times");
}

#[test]
fn stats_include_the_open_interval() {
    // Leaves after 50ms and never comes back
    let coordinator = SessionCoordinator::new(fast_config(), timeline_feeds(50, 60_000), None);
    coordinator.start("ada", None).unwrap();

    // The window starts as five "away" votes, so the very first frame reads as unfocused
    assert!(wait_until(Duration::from_secs(5), || {
        let s = coordinator.query_stats("ada").unwrap();
        s.session_duration > 0.1 && !s.currently_focused
    }));
    let first = coordinator.query_stats("ada").unwrap();
    thread::sleep(Duration::from_millis(150));
    let second = coordinator.query_stats("ada").unwrap();

    assert!(second.total_unfocused_seconds >= first.total_unfocused_seconds + 0.1);
    assert_eq!(second.times_looked_away, 0);

    // Stopping while unfocused flushes the open interval
    let report = coordinator.stop("ada").unwrap();
    assert!(!report.stats.currently_focused);
    assert!(report.stats.total_unfocused_seconds >= second.total_unfocused_seconds);
}

#[test]
fn reset_keeps_accumulated_time() {
    let coordinator = SessionCoordinator::new(fast_config(), timeline_feeds(50, 350), None);
    coordinator.start("ada", None).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        coordinator.query_stats("ada").unwrap().times_looked_away == 1
    }));

    coordinator.reset_trigger("ada").unwrap();
    coordinator.reset_trigger("ada").unwrap();
    let stats = coordinator.query_stats("ada").unwrap();
    assert_eq!(stats.times_looked_away, 0);
    assert!(stats.total_unfocused_seconds >= 0.2);
    coordinator.stop("ada").unwrap();
}

#[test]
fn broken_feed_fails_the_session_only() {
    let feeds: Arc<dyn FeedFactory> = Arc::new(|user: &str| -> Result<BoxedFeed> {
        if user == "broken" {
            Ok(Box::new(Broken))
        } else {
            Ok(Box::new(Timeline {
                started: Instant::now(),
                away_from: Duration::MAX,
                away_until: Duration::MAX,
            }))
        }
    });
    let coordinator = SessionCoordinator::new(fast_config(), feeds, None);
    coordinator.start("broken", None).unwrap();
    coordinator.start("fine", None).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        !coordinator.status("broken").unwrap().is_active()
    }));
    match coordinator.status("broken").unwrap() {
        SessionStatus::Failed(TrackingFailure::TooManyFrameFailures { consecutive, last_error }) => {
            assert_eq!(consecutive, 3);
            assert!(last_error.contains("camera unplugged"));
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(coordinator.active_users(), vec!["fine".to_string()]);

    let report = coordinator.stop("broken").unwrap();
    assert!(matches!(report.status, SessionStatus::Failed(_)));
    assert_eq!(
        coordinator.stop("broken").unwrap_err(),
        SessionError::NoSession { user_id: "broken".into() }
    );
}

#[test]
fn recording_replays_through_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drill.jsonl");
    let face = SyntheticFace::looking(0.0, 0.0).detection();
    let frames: Vec<_> = (0..60).map(|i| if (10..40).contains(&i) { None } else { Some(&face) }).collect();
    write_recording(&path, frames).unwrap();

    let feeds: Arc<dyn FeedFactory> = {
        let path = path.clone();
        Arc::new(move |_: &str| -> Result<BoxedFeed> {
            Ok(Box::new(RecordingSource::open(&path)?.feed()))
        })
    };
    let mut config = fast_config();
    config.tracking.frame_interval_ms = 10;
    let coordinator = SessionCoordinator::new(config, feeds, None);
    coordinator.start("ada", None).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        coordinator.status("ada").unwrap() == SessionStatus::Completed
    }));
    let stats = coordinator.query_stats("ada").unwrap();
    assert_eq!(stats.times_looked_away, 1);
    assert!(stats.currently_focused);
    assert!(stats.total_unfocused_seconds >= 0.2);
}
