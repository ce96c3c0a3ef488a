use log::info;
use std::time::Instant;

use crate::attention::{AttentionClassifier, GazeThresholds};
use crate::calibration::{CalibrationManager, CalibrationStatus};
use crate::config::FocusConfig;
use crate::gaze::{measure_face, EyeMeasurement};
use crate::head_pose::{compensate, HeadAngles};
use crate::landmarks::FaceTopology;
use crate::types::{CalibrationBaseline, FaceDetection, StatsSnapshot};
use crate::unfocus::{AlertRequest, LookAwayEvent, UnfocusAccumulator, UnfocusState};

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub face_found: bool,
    pub head_pose_applied: bool,
    pub head_angles: Option<HeadAngles>,
    pub left: Option<EyeMeasurement>,
    pub right: Option<EyeMeasurement>,
    /// Smoothed decision, the value fed to the unfocus state machine.
    pub looking: bool,
    pub calibration: CalibrationStatus,
    /// Set on the frame that completed a calibration.
    pub calibrated: Option<CalibrationBaseline>,
    pub event: Option<LookAwayEvent>,
    pub alert: Option<AlertRequest>,
}

/// One user's full per-frame chain: head pose, eye geometry, calibration,
/// classification and the unfocus state machine.
#[derive(Debug, Clone)]
pub struct FocusPipeline {
    topology: FaceTopology,
    head_pose_compensation: bool,
    calibration: CalibrationManager,
    classifier: AttentionClassifier,
    unfocus: UnfocusAccumulator,
}

impl FocusPipeline {
    pub fn new(config: &FocusConfig) -> Self {
        Self::with_topology(config, FaceTopology::MEDIAPIPE)
    }

    pub fn with_topology(config: &FocusConfig, topology: FaceTopology) -> Self {
        Self {
            topology,
            head_pose_compensation: config.gaze.head_pose_compensation,
            calibration: CalibrationManager::new(config.calibration.sample_count),
            classifier: AttentionClassifier::new(config.gaze.thresholds()),
            unfocus: UnfocusAccumulator::new(&config.unfocus),
        }
    }

    pub fn process(&mut self, face: Option<&FaceDetection>, now: Instant) -> FrameOutcome {
        let Some(face) = face else {
            let looking = self.classifier.record_absent();
            let update = self.unfocus.update(looking, now);
            return FrameOutcome {
                face_found: false,
                head_pose_applied: false,
                head_angles: None,
                left: None,
                right: None,
                looking,
                calibration: self.calibration.status(),
                calibrated: None,
                event: update.event,
                alert: update.alert,
            };
        };

        // 1. Head pose
        let landmarks = compensate(face, self.head_pose_compensation);
        let head_angles = face.transform.as_ref().map(HeadAngles::from_transform);

        // 2. Eye geometry
        let eyes = measure_face(&landmarks.landmarks, &self.topology);

        // 3. Calibration, skipping frames where either eye has no extent
        let mut calibrated = None;
        if self.calibration.is_active() {
            if let (Some(l), Some(r)) = (eyes.left.gaze.sample(), eyes.right.gaze.sample()) {
                calibrated = self.calibration.accumulate(l, r);
            }
        }

        // 4. Classification
        let looking = self.classifier.classify(
            &eyes.left.reading(),
            &eyes.right.reading(),
            &self.calibration.baseline(),
        );

        // 5. Unfocus state machine
        let update = self.unfocus.update(looking, now);

        FrameOutcome {
            face_found: true,
            head_pose_applied: landmarks.applied,
            head_angles,
            left: Some(eyes.left),
            right: Some(eyes.right),
            looking,
            calibration: self.calibration.status(),
            calibrated,
            event: update.event,
            alert: update.alert,
        }
    }

    /// Live snapshot, including an unfocused interval still open at `now`.
    pub fn stats(&self, started: Instant, now: Instant) -> StatsSnapshot {
        let state = self.unfocus.state();
        StatsSnapshot {
            times_looked_away: state.look_away_event_count,
            total_unfocused_seconds: self.unfocus.unfocused_seconds_at(now),
            currently_focused: state.is_focused,
            session_duration: now.saturating_duration_since(started).as_secs_f64(),
        }
    }

    /// Flushes the open unfocused interval. Call once when the session ends.
    pub fn finish(&mut self, now: Instant) {
        self.unfocus.flush(now);
    }

    pub fn start_calibration(&mut self) {
        self.calibration.start();
    }

    pub fn calibration(&self) -> &CalibrationManager {
        &self.calibration
    }

    pub fn thresholds(&self) -> GazeThresholds {
        self.classifier.thresholds()
    }

    pub fn adjust_thresholds(&mut self, x_delta: f64, y_delta: f64) -> GazeThresholds {
        self.classifier.adjust_thresholds(x_delta, y_delta)
    }

    pub fn head_pose_compensation(&self) -> bool {
        self.head_pose_compensation
    }

    pub fn set_head_pose_compensation(&mut self, enabled: bool) {
        self.head_pose_compensation = enabled;
        info!(
            "Head pose compensation {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn toggle_head_pose_compensation(&mut self) -> bool {
        self.set_head_pose_compensation(!self.head_pose_compensation);
        self.head_pose_compensation
    }

    pub fn reset_trigger(&mut self) {
        self.unfocus.reset_trigger();
    }

    pub fn set_locked_in(&mut self, locked_in: bool) {
        self.unfocus.set_locked_in(locked_in);
    }

    pub fn locked_in(&self) -> bool {
        self.unfocus.locked_in()
    }

    pub fn unfocus_state(&self) -> &UnfocusState {
        self.unfocus.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticFace;
    use std::time::Duration;

    fn at(t0: Instant, secs: f64) -> Instant {
        t0 + Duration::from_secs_f64(secs)
    }

    fn fast_config() -> FocusConfig {
        let mut config = FocusConfig::default();
        config.calibration.sample_count = 3;
        config.unfocus.look_away_secs = 1.0;
        config
    }

    #[test]
    fn centered_face_is_looking() {
        let mut p = FocusPipeline::new(&FocusConfig::default());
        let face = SyntheticFace::looking(0.0, 0.0).detection();
        let t0 = Instant::now();
        let outcomes: Vec<_> = (0..5).map(|i| p.process(Some(&face), at(t0, i as f64 * 0.1))).collect();
        assert!(outcomes[4].looking);
        assert!(outcomes.iter().all(|o| o.face_found));
        assert!(p.stats(t0, at(t0, 0.5)).currently_focused);
    }

    #[test]
    fn missing_face_becomes_unfocused_and_counts() {
        let mut p = FocusPipeline::new(&fast_config());
        let face = SyntheticFace::looking(0.0, 0.0).detection();
        let t0 = Instant::now();
        for i in 0..5 {
            p.process(Some(&face), at(t0, i as f64 * 0.1));
        }

        // Four absent frames flip the majority
        let mut last = None;
        for i in 0..4 {
            last = Some(p.process(None, at(t0, 1.0 + i as f64 * 0.1)));
        }
        let last = last.unwrap();
        assert!(!last.face_found);
        assert!(!last.looking);
        assert!(!p.stats(t0, at(t0, 2.0)).currently_focused);

        // Back for long enough to win the vote
        let mut event = None;
        for i in 0..3 {
            let o = p.process(Some(&face), at(t0, 3.0 + i as f64 * 0.1));
            event = event.or(o.event);
        }
        let event = event.expect("look-away event");
        assert!(event.duration_secs >= 1.0);
        assert_eq!(p.stats(t0, at(t0, 4.0)).times_looked_away, 1);
    }

    #[test]
    fn calibration_absorbs_a_constant_offset() {
        let mut p = FocusPipeline::new(&fast_config());
        let off_center = SyntheticFace::looking(0.4, 0.0).detection();
        let t0 = Instant::now();

        p.start_calibration();
        let mut baseline = None;
        for i in 0..3 {
            let o = p.process(Some(&off_center), at(t0, i as f64 * 0.1));
            baseline = baseline.or(o.calibrated);
        }
        let baseline = baseline.expect("calibration should complete");
        assert!((baseline.center_x - 0.4).abs() < 1e-9);
        assert!(p.calibration().is_complete());

        let outcome = (0..5)
            .map(|i| p.process(Some(&off_center), at(t0, 1.0 + i as f64 * 0.1)))
            .last()
            .unwrap();
        assert!(outcome.looking);
    }

    #[test]
    fn head_pose_flag_is_reported() {
        let mut p = FocusPipeline::new(&FocusConfig::default());
        let face = SyntheticFace::looking(0.0, 0.0).detection().with_transform([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let now = Instant::now();
        assert!(p.process(Some(&face), now).head_pose_applied);
        assert!(!p.toggle_head_pose_compensation());
        let o = p.process(Some(&face), now);
        assert!(!o.head_pose_applied);
        assert_eq!(o.head_angles, Some(HeadAngles::default()));
    }
}
