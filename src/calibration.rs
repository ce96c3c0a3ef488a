use log::info;

use crate::types::{CalibrationBaseline, GazeSample};

/// Default number of frames averaged into a baseline.
pub const DEFAULT_SAMPLE_COUNT: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    Idle,
    Active,
    Complete,
}

/// Collects gaze samples while the user looks at the screen center and turns
/// them into a [`CalibrationBaseline`].
///
/// The previous baseline stays in effect while a new calibration is running
/// and is only replaced once the new one completes.
#[derive(Debug, Clone)]
pub struct CalibrationManager {
    status: CalibrationStatus,
    target_samples: usize,
    samples: Vec<(GazeSample, GazeSample)>,
    baseline: CalibrationBaseline,
}

impl CalibrationManager {
    pub fn new(target_samples: usize) -> Self {
        Self {
            status: CalibrationStatus::Idle,
            target_samples: target_samples.max(1),
            samples: Vec::with_capacity(target_samples),
            baseline: CalibrationBaseline::default(),
        }
    }

    pub fn start(&mut self) {
        self.samples.clear();
        self.status = CalibrationStatus::Active;
        info!("Calibration started. Look directly at the center of the screen...");
    }

    /// Buffers one frame's (left, right) samples. Returns the new baseline on
    /// the frame that completes calibration. No-op unless active.
    pub fn accumulate(&mut self, left: GazeSample, right: GazeSample) -> Option<CalibrationBaseline> {
        if self.status != CalibrationStatus::Active {
            return None;
        }

        self.samples.push((left, right));
        if self.samples.len() < self.target_samples {
            return None;
        }

        let left_x = running_mean(self.samples.iter().map(|(l, _)| l.x_ratio));
        let left_y = running_mean(self.samples.iter().map(|(l, _)| l.y_ratio));
        let right_x = running_mean(self.samples.iter().map(|(_, r)| r.x_ratio));
        let right_y = running_mean(self.samples.iter().map(|(_, r)| r.y_ratio));

        self.baseline = CalibrationBaseline {
            center_x: (left_x + right_x) / 2.0,
            center_y: (left_y + right_y) / 2.0,
        };
        self.samples.clear();
        self.status = CalibrationStatus::Complete;

        info!(
            "Calibration complete! Center gaze set to: ({:.3}, {:.3})",
            self.baseline.center_x, self.baseline.center_y
        );
        Some(self.baseline)
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == CalibrationStatus::Active
    }

    pub fn is_complete(&self) -> bool {
        self.status == CalibrationStatus::Complete
    }

    /// `(0, 0)` until the first calibration completes.
    pub fn baseline(&self) -> CalibrationBaseline {
        self.baseline
    }

}

impl Default for CalibrationManager {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT)
    }
}

// Incremental form: identical samples average back to themselves exactly.
fn running_mean(values: impl Iterator<Item = f64>) -> f64 {
    values
        .enumerate()
        .fold(0.0, |mean, (i, v)| mean + (v - mean) / (i + 1) as f64)
}
