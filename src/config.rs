use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::attention::{GazeThresholds, THRESHOLD_MAX, THRESHOLD_MIN};
use crate::calibration::DEFAULT_SAMPLE_COUNT;
use crate::unfocus::RetriggerPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub gaze: GazeConfig,
    pub calibration: CalibrationConfig,
    pub unfocus: UnfocusConfig,
    pub alert: AlertConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub threshold_x: f64,
    pub threshold_y: f64,
    pub min_ear: f64,
    pub head_pose_compensation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub sample_count: usize,
    /// Start calibrating as soon as a session starts.
    pub auto_calibrate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnfocusConfig {
    /// Minimum unfocused interval that counts as a look-away event.
    pub look_away_secs: f64,
    /// Look-away events needed before an alert is raised.
    pub trigger_threshold: u32,
    pub retrigger: RetriggerPolicy,
    /// Study mode. Relaxed sessions still track time but never alert.
    pub locked_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub backend_url: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub max_consecutive_failures: u32,
    pub retry_backoff_ms: u64,
    pub frame_interval_ms: u64,
    pub stop_grace_ms: u64,
}

impl Default for GazeConfig {
    fn default() -> Self {
        let t = GazeThresholds::default();
        Self {
            threshold_x: t.x,
            threshold_y: t.y,
            min_ear: t.min_ear,
            head_pose_compensation: true,
        }
    }
}

impl GazeConfig {
    /// Gaze thresholds from the file are held to the same range as runtime
    /// adjustments.
    pub fn thresholds(&self) -> GazeThresholds {
        GazeThresholds {
            x: self.threshold_x.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            y: self.threshold_y.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            min_ear: self.min_ear,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            auto_calibrate: true,
        }
    }
}

impl Default for UnfocusConfig {
    fn default() -> Self {
        Self {
            look_away_secs: 5.0,
            trigger_threshold: 1,
            retrigger: RetriggerPolicy::Once,
            locked_in: true,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend_url: "http://localhost:5001".to_string(),
            endpoint: "/api/brainrot/trigger".to_string(),
            timeout_ms: 2000,
            queue_depth: 8,
        }
    }
}

impl AlertConfig {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
            retry_backoff_ms: 500,
            frame_interval_ms: 10,
            stop_grace_ms: 3000,
        }
    }
}

impl TrackingConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Frame rate the feed should be scripted at. An explicit rate also sets
    /// the frame interval; otherwise the rate follows `frame_interval_ms`.
    pub fn frame_rate(&mut self, fps: Option<u32>) -> u32 {
        match fps {
            Some(fps) => {
                let fps = fps.max(1);
                self.frame_interval_ms = 1000 / u64::from(fps);
                fps
            }
            None => (1000 / self.frame_interval_ms.max(1)).clamp(1, u64::from(u32::MAX)) as u32,
        }
    }
}

impl FocusConfig {
    pub const PATH: &'static str = "focus_config.json";

    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(Self::PATH))
    }

    /// Missing file or unparsable content falls back to defaults. The result
    /// is written back so newly added fields show up in the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            // Missing fields are filled from Default thanks to #[serde(default)]
            match serde_json::from_str::<FocusConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config {}: {}. Loading defaults.", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}
