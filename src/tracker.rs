use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::alert::{AlertDispatcher, BrainrotAlert};
use crate::config::TrackingConfig;
use crate::error::TrackingFailure;
use crate::pipeline::FocusPipeline;
use crate::source::{FaceFeed, FeedFrame};
use crate::types::StatsSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Active,
    Completed,
    Failed(TrackingFailure),
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }
}

/// How one session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingExit {
    Stopped,
    DurationElapsed,
    Exhausted,
    Failed(TrackingFailure),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingSettings {
    pub max_consecutive_failures: u32,
    pub retry_backoff: Duration,
    pub frame_interval: Duration,
    /// Stop on our own after this long.
    pub duration: Option<Duration>,
}

impl TrackingSettings {
    pub fn from_config(config: &TrackingConfig, duration: Option<Duration>) -> Self {
        Self {
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            retry_backoff: config.retry_backoff(),
            frame_interval: config.frame_interval(),
            duration,
        }
    }
}

/// Per-user state owned by the tracking worker and read by the coordinator.
#[derive(Debug)]
pub struct SessionState {
    pub user_id: String,
    pub pipeline: FocusPipeline,
    pub started: Instant,
    pub ended: Option<Instant>,
    pub status: SessionStatus,
}

pub type SharedSession = Arc<Mutex<SessionState>>;

impl SessionState {
    pub fn new(user_id: impl Into<String>, pipeline: FocusPipeline, started: Instant) -> Self {
        Self {
            user_id: user_id.into(),
            pipeline,
            started,
            ended: None,
            status: SessionStatus::Active,
        }
    }

    /// Live while running, frozen at the end time once finished.
    pub fn stats(&self, now: Instant) -> StatsSnapshot {
        self.pipeline.stats(self.started, self.ended.unwrap_or(now))
    }
}

/// Frame loop for one session. Runs until stopped, out of time, out of
/// frames, or the feed keeps failing; then flushes the open unfocused
/// interval and records the final status.
pub fn run_tracking(
    feed: &mut dyn FaceFeed,
    session: &SharedSession,
    stop: &AtomicBool,
    settings: &TrackingSettings,
    alerts: Option<&AlertDispatcher>,
) -> TrackingExit {
    let (user_id, started) = {
        let s = session.lock();
        (s.user_id.clone(), s.started)
    };
    info!("Tracking {} from {}", user_id, feed.name());

    let mut failures = 0u32;
    let exit = loop {
        if stop.load(Ordering::SeqCst) {
            break TrackingExit::Stopped;
        }
        if settings.duration.is_some_and(|limit| started.elapsed() >= limit) {
            break TrackingExit::DurationElapsed;
        }

        let frame = match feed.next_face() {
            Ok(FeedFrame::Exhausted) => break TrackingExit::Exhausted,
            Ok(frame) => frame,
            Err(e) => {
                failures += 1;
                warn!(
                    "Frame failure for {} ({}/{}): {:#}",
                    user_id, failures, settings.max_consecutive_failures, e
                );
                if failures >= settings.max_consecutive_failures {
                    break TrackingExit::Failed(TrackingFailure::TooManyFrameFailures {
                        consecutive: failures,
                        last_error: format!("{:#}", e),
                    });
                }
                thread::sleep(settings.retry_backoff);
                continue;
            }
        };
        failures = 0;

        let outcome = session.lock().pipeline.process(frame.face(), Instant::now());

        if let Some(baseline) = outcome.calibrated {
            debug!(
                "Baseline for {} is ({:.3}, {:.3})",
                user_id, baseline.center_x, baseline.center_y
            );
        }
        if let Some(request) = outcome.alert {
            let alert = BrainrotAlert::new(&user_id, request.look_away_count);
            match alerts {
                Some(dispatcher) => {
                    if let Err(e) = dispatcher.send(alert) {
                        warn!("Alert for {} not queued: {}", user_id, e);
                    }
                }
                None => info!("{} (alerts disabled)", alert.notes),
            }
        }

        if !settings.frame_interval.is_zero() {
            thread::sleep(settings.frame_interval);
        }
    };

    let now = Instant::now();
    let mut s = session.lock();
    s.pipeline.finish(now);
    s.ended = Some(now);
    s.status = match &exit {
        TrackingExit::Failed(failure) => {
            error!("Tracking for {} failed: {}", user_id, failure);
            SessionStatus::Failed(failure.clone())
        }
        other => {
            info!("Tracking for {} ended ({:?})", user_id, other);
            SessionStatus::Completed
        }
    };
    exit
}
