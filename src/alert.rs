use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::config::AlertConfig;

/// Body of the look-away alert sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainrotAlert {
    pub user_id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub look_away_count: u32,
    pub notes: String,
}

impl BrainrotAlert {
    pub fn new(user_id: &str, look_away_count: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            look_away_count,
            notes: format!("User looked away {} times", look_away_count),
        }
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("backend returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("alert queue full, dropped alert for '{0}'")]
    QueueFull(String),

    #[error("alert dispatcher is shut down")]
    Closed,
}

pub trait AlertSink: Send + Sync {
    fn dispatch(&self, alert: &BrainrotAlert) -> Result<(), AlertError>;
}

/// POSTs alerts as JSON to the backend.
pub struct HttpAlertSink {
    url: String,
    timeout: Duration,
}

impl HttpAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.url(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AlertSink for HttpAlertSink {
    fn dispatch(&self, alert: &BrainrotAlert) -> Result<(), AlertError> {
        ureq::post(&self.url)
            .timeout(self.timeout)
            .set("Content-Type", "application/json")
            .send_json(alert)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => AlertError::Status(code),
                ureq::Error::Transport(t) => AlertError::Transport(t.to_string()),
            })?;
        Ok(())
    }
}

/// Logs alerts instead of sending them (`--no-alerts`).
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn dispatch(&self, alert: &BrainrotAlert) -> Result<(), AlertError> {
        info!("[alert] {} for {}", alert.notes, alert.user_id);
        Ok(())
    }
}

/// Delivers alerts on a worker thread so the frame loop never waits on the
/// network. The queue is bounded; when it is full the alert is dropped.
pub struct AlertDispatcher {
    tx: Mutex<Option<SyncSender<BrainrotAlert>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AlertDispatcher {
    pub fn spawn(sink: Arc<dyn AlertSink>, queue_depth: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<BrainrotAlert>(queue_depth.max(1));
        let worker = thread::Builder::new()
            .name("alert-dispatch".to_string())
            .spawn(move || deliver(sink, rx))?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queues without blocking. Errors only say the alert was not queued.
    pub fn send(&self, alert: BrainrotAlert) -> Result<(), AlertError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(AlertError::Closed);
        };
        match tx.try_send(alert) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(alert)) => {
                warn!("Alert queue full, dropping alert for {}", alert.user_id);
                Err(AlertError::QueueFull(alert.user_id))
            }
            Err(TrySendError::Disconnected(_)) => Err(AlertError::Closed),
        }
    }

    /// Drains queued alerts and stops the worker.
    pub fn shutdown(&self) {
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Alert worker panicked");
            }
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(sink: Arc<dyn AlertSink>, rx: Receiver<BrainrotAlert>) {
    debug!("Alert worker started");
    while let Ok(alert) = rx.recv() {
        match sink.dispatch(&alert) {
            Ok(()) => info!(
                "Alert sent for {} ({} look-aways)",
                alert.user_id, alert.look_away_count
            ),
            Err(e) => warn!("Failed to send alert for {}: {}", alert.user_id, e),
        }
    }
    debug!("Alert worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    struct Recording(Mutex<Vec<BrainrotAlert>>);

    impl AlertSink for Recording {
        fn dispatch(&self, alert: &BrainrotAlert) -> Result<(), AlertError> {
            self.0.lock().push(alert.clone());
            Ok(())
        }
    }

    struct Failing;

    impl AlertSink for Failing {
        fn dispatch(&self, _alert: &BrainrotAlert) -> Result<(), AlertError> {
            Err(AlertError::Status(503))
        }
    }

    /// Blocks until released so the queue can be filled.
    struct Gate(Mutex<Receiver<()>>);

    impl AlertSink for Gate {
        fn dispatch(&self, _alert: &BrainrotAlert) -> Result<(), AlertError> {
            let _ = self.0.lock().recv();
            Ok(())
        }
    }

    #[test]
    fn alert_body_has_expected_shape() {
        let alert = BrainrotAlert::new("ada", 3);
        assert_eq!(alert.notes, "User looked away 3 times");
        assert!(chrono::DateTime::parse_from_rfc3339(&alert.timestamp).is_ok());

        let json = serde_json::to_value(&alert).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["look_away_count", "notes", "timestamp", "user_id"]);
    }

    #[test]
    fn dispatcher_delivers_then_drains_on_shutdown() {
        let sink = Arc::new(Recording(Mutex::new(Vec::new())));
        let dispatcher = AlertDispatcher::spawn(sink.clone(), 4).unwrap();
        dispatcher.send(BrainrotAlert::new("a", 1)).unwrap();
        dispatcher.send(BrainrotAlert::new("b", 2)).unwrap();
        dispatcher.shutdown();

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].user_id, "b");
        drop(seen);
        assert!(matches!(dispatcher.send(BrainrotAlert::new("c", 1)), Err(AlertError::Closed)));
    }

    #[test]
    fn sink_failures_do_not_stop_the_worker() {
        let dispatcher = AlertDispatcher::spawn(Arc::new(Failing), 2).unwrap();
        dispatcher.send(BrainrotAlert::new("a", 1)).unwrap();
        dispatcher.send(BrainrotAlert::new("a", 2)).unwrap();
        dispatcher.shutdown();
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (release, gate) = channel();
        let dispatcher = AlertDispatcher::spawn(Arc::new(Gate(Mutex::new(gate))), 1).unwrap();

        // One alert can be in the sink and one in the queue; keep sending until one is refused
        let refused = (0..10).any(|i| {
            matches!(
                dispatcher.send(BrainrotAlert::new("a", i)),
                Err(AlertError::QueueFull(_))
            )
        });
        assert!(refused);

        for _ in 0..10 {
            let _ = release.send(());
        }
        drop(release);
        dispatcher.shutdown();
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let sink = HttpAlertSink::new("http://127.0.0.1:9/api/brainrot/trigger", Duration::from_millis(200));
        match sink.dispatch(&BrainrotAlert::new("a", 1)) {
            Err(AlertError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
