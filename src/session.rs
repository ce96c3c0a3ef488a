//! Registry of per-user tracking sessions and the operations the control
//! surface maps onto.
//!
//! Each session owns its pipeline behind its own lock; the registry lock only
//! guards inserts, removals and lookups. Lock order is registry, then session.

use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::alert::AlertDispatcher;
use crate::attention::GazeThresholds;
use crate::config::FocusConfig;
use crate::error::SessionError;
use crate::pipeline::FocusPipeline;
use crate::source::FeedFactory;
use crate::tracker::{run_tracking, SessionState, SharedSession, TrackingExit, TrackingSettings};
use crate::types::StatsSnapshot;

pub use crate::tracker::SessionStatus;

/// Final word on a stopped session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub user_id: String,
    pub stats: StatsSnapshot,
    pub status: SessionStatus,
    /// The worker did not finish within the grace period; the stats are a
    /// live snapshot and the worker was left to wind down on its own.
    pub forced: bool,
}

struct SessionHandle {
    shared: SharedSession,
    stop: Arc<AtomicBool>,
    done: Receiver<TrackingExit>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    fn is_active(&self) -> bool {
        self.shared.lock().status.is_active()
    }
}

pub struct SessionCoordinator {
    config: FocusConfig,
    feeds: Arc<dyn FeedFactory>,
    alerts: Option<Arc<AlertDispatcher>>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionCoordinator {
    pub fn new(
        config: FocusConfig,
        feeds: Arc<dyn FeedFactory>,
        alerts: Option<Arc<AlertDispatcher>>,
    ) -> Self {
        Self {
            config,
            feeds,
            alerts,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts tracking `user_id` on a worker thread. A finished session for
    /// the same user is replaced.
    pub fn start(&self, user_id: &str, duration: Option<Duration>) -> Result<(), SessionError> {
        self.ensure_not_active(user_id)?;

        // Opening a camera can be slow; keep it outside the registry lock
        let mut feed = self
            .feeds
            .open(user_id)
            .map_err(|e| SessionError::FeedUnavailable {
                user_id: user_id.to_string(),
                reason: format!("{:#}", e),
            })?;

        let mut pipeline = FocusPipeline::new(&self.config);
        if self.config.calibration.auto_calibrate {
            pipeline.start_calibration();
        }
        let shared: SharedSession = Arc::new(Mutex::new(SessionState::new(
            user_id,
            pipeline,
            Instant::now(),
        )));
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();
        let settings = TrackingSettings::from_config(&self.config.tracking, duration);

        let mut sessions = self.sessions.lock();
        // Someone may have started the same user while the feed was opening
        if sessions.get(user_id).is_some_and(SessionHandle::is_active) {
            return Err(SessionError::AlreadyActive {
                user_id: user_id.to_string(),
            });
        }

        let worker = {
            let shared = shared.clone();
            let stop = stop.clone();
            let alerts = self.alerts.clone();
            thread::Builder::new()
                .name(format!("track-{}", user_id))
                .spawn(move || {
                    let exit = run_tracking(feed.as_mut(), &shared, &stop, &settings, alerts.as_deref());
                    let _ = done_tx.send(exit);
                })
                .map_err(|e| SessionError::WorkerSpawn(e.to_string()))?
        };

        sessions.insert(
            user_id.to_string(),
            SessionHandle {
                shared,
                stop,
                done,
                worker: Some(worker),
            },
        );
        info!(
            "Started session for {}{}",
            user_id,
            duration.map(|d| format!(" ({}s)", d.as_secs())).unwrap_or_default()
        );
        Ok(())
    }

    fn ensure_not_active(&self, user_id: &str) -> Result<(), SessionError> {
        if self.sessions.lock().get(user_id).is_some_and(SessionHandle::is_active) {
            return Err(SessionError::AlreadyActive {
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }

    /// Asks the worker to stop and waits up to the grace period for it to
    /// flush. The session is removed from the registry either way.
    pub fn stop(&self, user_id: &str) -> Result<SessionReport, SessionError> {
        let handle = self
            .sessions
            .lock()
            .remove(user_id)
            .ok_or_else(|| SessionError::NoSession {
                user_id: user_id.to_string(),
            })?;
        Ok(Self::finish(user_id, handle, self.config.tracking.stop_grace()))
    }

    fn finish(user_id: &str, mut handle: SessionHandle, grace: Duration) -> SessionReport {
        handle.stop.store(true, Ordering::SeqCst);

        let forced = match handle.done.recv_timeout(grace) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = handle.worker.take() {
                    if worker.join().is_err() {
                        warn!("Tracking worker for {} panicked", user_id);
                    }
                }
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Tracking for {} did not stop within {:.1}s, reporting live stats",
                    user_id,
                    grace.as_secs_f64()
                );
                true
            }
        };

        let state = handle.shared.lock();
        let report = SessionReport {
            user_id: user_id.to_string(),
            stats: state.stats(Instant::now()),
            status: state.status.clone(),
            forced,
        };
        info!(
            "Stopped session for {}: looked away {} times, unfocused {}",
            user_id,
            report.stats.times_looked_away,
            report.stats.total_unfocused_formatted()
        );
        report
    }

    /// Stops every session, e.g. on shutdown.
    pub fn stop_all(&self) -> Vec<SessionReport> {
        let handles: Vec<_> = self.sessions.lock().drain().collect();
        let grace = self.config.tracking.stop_grace();
        handles
            .into_iter()
            .map(|(user_id, handle)| Self::finish(&user_id, handle, grace))
            .collect()
    }

    /// Live stats, including any unfocused interval still in progress.
    pub fn query_stats(&self, user_id: &str) -> Result<StatsSnapshot, SessionError> {
        self.with_session(user_id, |s| s.stats(Instant::now()))
    }

    pub fn status(&self, user_id: &str) -> Result<SessionStatus, SessionError> {
        self.with_session(user_id, |s| s.status.clone())
    }

    pub fn reset_trigger(&self, user_id: &str) -> Result<(), SessionError> {
        self.with_session(user_id, |s| s.pipeline.reset_trigger())
    }

    pub fn calibrate(&self, user_id: &str) -> Result<(), SessionError> {
        self.with_session(user_id, |s| s.pipeline.start_calibration())
    }

    pub fn adjust_thresholds(
        &self,
        user_id: &str,
        x_delta: f64,
        y_delta: f64,
    ) -> Result<GazeThresholds, SessionError> {
        self.with_session(user_id, |s| s.pipeline.adjust_thresholds(x_delta, y_delta))
    }

    pub fn set_head_pose_compensation(&self, user_id: &str, enabled: bool) -> Result<(), SessionError> {
        self.with_session(user_id, |s| s.pipeline.set_head_pose_compensation(enabled))
    }

    /// Returns the new setting.
    pub fn toggle_head_pose_compensation(&self, user_id: &str) -> Result<bool, SessionError> {
        self.with_session(user_id, |s| s.pipeline.toggle_head_pose_compensation())
    }

    pub fn set_locked_in(&self, user_id: &str, locked_in: bool) -> Result<(), SessionError> {
        self.with_session(user_id, |s| s.pipeline.set_locked_in(locked_in))
    }

    /// Users with a running session, sorted.
    pub fn active_users(&self) -> Vec<String> {
        let sessions = self.sessions.lock();
        let mut users: Vec<String> = sessions
            .iter()
            .filter(|(_, h)| h.is_active())
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        users
    }

    fn with_session<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Result<R, SessionError> {
        let shared = self
            .sessions
            .lock()
            .get(user_id)
            .map(|h| h.shared.clone())
            .ok_or_else(|| SessionError::NoSession {
                user_id: user_id.to_string(),
            })?;
        let mut state = shared.lock();
        Ok(f(&mut state))
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.stop_all();
    }
}
