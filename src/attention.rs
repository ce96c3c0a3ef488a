//! Per-frame "looking at the screen" classification with majority-vote
//! smoothing over the last few frames.

use log::info;
use serde::{Deserialize, Serialize};

use crate::gaze::EyeReading;
use crate::types::CalibrationBaseline;

pub const HISTORY_LEN: usize = 5;
pub const THRESHOLD_MIN: f64 = 0.05;
pub const THRESHOLD_MAX: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeThresholds {
    /// Max |x| gaze ratio (after baseline) still counted as on screen.
    pub x: f64,
    /// Max |y| gaze ratio (after baseline) still counted as on screen.
    pub y: f64,
    /// Eyes with a lower aspect ratio are treated as closed.
    pub min_ear: f64,
}

impl Default for GazeThresholds {
    fn default() -> Self {
        Self {
            x: 0.18,
            y: 0.12,
            min_ear: 0.11,
        }
    }
}

impl GazeThresholds {
    /// Operator tuning. Both gaze thresholds stay within `[0.05, 0.5]`.
    pub fn adjust(&mut self, x_delta: f64, y_delta: f64) {
        self.x = (self.x + x_delta).clamp(THRESHOLD_MIN, THRESHOLD_MAX);
        self.y = (self.y + y_delta).clamp(THRESHOLD_MIN, THRESHOLD_MAX);
    }
}

// =========================================================================
// Ring buffer of recent decisions
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttentionHistory {
    slots: [bool; HISTORY_LEN],
    next: usize,
}

impl AttentionHistory {
    pub fn new() -> Self {
        Self {
            slots: [false; HISTORY_LEN],
            next: 0,
        }
    }

    /// Seeds the window, oldest first.
    pub fn from_entries(entries: [bool; HISTORY_LEN]) -> Self {
        Self {
            slots: entries,
            next: 0,
        }
    }

    /// Evicts the oldest entry.
    pub fn push(&mut self, looking: bool) {
        self.slots[self.next] = looking;
        self.next = (self.next + 1) % HISTORY_LEN;
    }

    pub const fn len(&self) -> usize {
        HISTORY_LEN
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn true_count(&self) -> usize {
        self.slots.iter().filter(|&&v| v).count()
    }

    /// At least `len / 2` (floor) entries are true.
    pub fn majority(&self) -> bool {
        self.true_count() >= HISTORY_LEN / 2
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..HISTORY_LEN).map(move |i| self.slots[(self.next + i) % HISTORY_LEN])
    }
}

impl Default for AttentionHistory {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Classifier
// =========================================================================

#[derive(Debug, Clone, Default)]
pub struct AttentionClassifier {
    thresholds: GazeThresholds,
    history: AttentionHistory,
}

impl AttentionClassifier {
    pub fn new(thresholds: GazeThresholds) -> Self {
        Self {
            thresholds,
            history: AttentionHistory::new(),
        }
    }

    /// Single-frame decision without touching the history.
    ///
    /// Closed eyes (below `min_ear`) and eyes with degenerate gaze geometry
    /// are left out of the average; with no eye left the frame is "not
    /// looking".
    pub fn looking_now(
        &self,
        left: &EyeReading,
        right: &EyeReading,
        baseline: &CalibrationBaseline,
    ) -> bool {
        let min_ear = self.thresholds.min_ear;
        if left.ear < min_ear && right.ear < min_ear {
            return false;
        }

        let usable: Vec<_> = [left, right]
            .into_iter()
            .filter(|eye| eye.ear >= min_ear)
            .filter_map(|eye| eye.gaze)
            .collect();
        if usable.is_empty() {
            return false;
        }

        let n = usable.len() as f64;
        let avg_x = usable.iter().map(|g| g.x_ratio).sum::<f64>() / n - baseline.center_x;
        let avg_y = usable.iter().map(|g| g.y_ratio).sum::<f64>() / n - baseline.center_y;

        avg_x.abs() < self.thresholds.x && avg_y.abs() < self.thresholds.y
    }

    /// Classifies one frame and returns the smoothed decision.
    pub fn classify(
        &mut self,
        left: &EyeReading,
        right: &EyeReading,
        baseline: &CalibrationBaseline,
    ) -> bool {
        let now = self.looking_now(left, right, baseline);
        self.record(now)
    }

    /// A frame without a face counts as not looking.
    pub fn record_absent(&mut self) -> bool {
        self.record(false)
    }

    fn record(&mut self, looking_now: bool) -> bool {
        self.history.push(looking_now);
        self.history.majority()
    }

    pub fn thresholds(&self) -> GazeThresholds {
        self.thresholds
    }

    /// Takes effect from the next frame.
    pub fn adjust_thresholds(&mut self, x_delta: f64, y_delta: f64) -> GazeThresholds {
        self.thresholds.adjust(x_delta, y_delta);
        info!(
            "Thresholds adjusted to X: ±{:.2}, Y: ±{:.2}",
            self.thresholds.x, self.thresholds.y
        );
        self.thresholds
    }

    pub fn history(&self) -> &AttentionHistory {
        &self.history
    }
}
