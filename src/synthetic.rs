//! Simulated faces for running without a camera or landmark model.

use anyhow::Result;
use std::f64::consts::PI;

use crate::landmarks::{EyeTopology, FaceTopology};
use crate::source::{DetectorFeed, FrameSource, PrecomputedDetector};
use crate::types::{FaceDetection, Landmarks, Point3D};

const EYE_SPACING: f64 = 60.0;
const EYE_HALF_WIDTH: f64 = 30.0;
const OPEN: f64 = 0.35;
const CLOSED: f64 = 0.05;

/// A face whose eyes are drawn as ellipses with the iris displaced by a gaze
/// ratio, so the measured ratio matches the requested one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFace {
    pub gaze_x: f64,
    pub gaze_y: f64,
    /// Eye height over width.
    pub openness: f64,
    pub center: (f64, f64),
}

impl SyntheticFace {
    pub fn looking(gaze_x: f64, gaze_y: f64) -> Self {
        Self {
            gaze_x,
            gaze_y,
            openness: OPEN,
            center: (320.0, 240.0),
        }
    }

    pub fn closed() -> Self {
        Self {
            openness: CLOSED,
            ..Self::looking(0.0, 0.0)
        }
    }

    pub fn landmarks(&self) -> Landmarks {
        self.landmarks_for(&FaceTopology::MEDIAPIPE)
    }

    pub fn landmarks_for(&self, topology: &FaceTopology) -> Landmarks {
        let (cx, cy) = self.center;
        // Everything outside the eyes sits on a rough face oval
        let mut points: Vec<Point3D> = (0..topology.landmark_count)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / topology.landmark_count as f64;
                Point3D::new(cx + 120.0 * a.cos(), cy + 150.0 * a.sin(), 0.0)
            })
            .collect();

        // Subject's left eye appears on the image right
        self.draw_eye(&mut points, &topology.left, (cx + EYE_SPACING, cy));
        self.draw_eye(&mut points, &topology.right, (cx - EYE_SPACING, cy));
        Landmarks::new(points)
    }

    fn draw_eye(&self, points: &mut [Point3D], eye: &EyeTopology, (ex, ey): (f64, f64)) {
        let a = EYE_HALF_WIDTH;
        let b = a * self.openness;

        let n = eye.outline.len() as f64;
        for (k, &idx) in eye.outline.iter().enumerate() {
            let t = 2.0 * PI * k as f64 / n;
            if let Some(p) = points.get_mut(idx) {
                *p = Point3D::new(ex + a * t.cos(), ey + b * t.sin(), 0.0);
            }
        }

        let ix = ex + self.gaze_x * a;
        let iy = ey + self.gaze_y * b;
        let r = a * 0.2;
        let ring = [(0.0, 0.0), (r, 0.0), (0.0, -r), (-r, 0.0), (0.0, r)];
        for (&idx, (dx, dy)) in eye.iris.iter().zip(ring) {
            if let Some(p) = points.get_mut(idx) {
                *p = Point3D::new(ix + dx, iy + dy, 0.0);
            }
        }
    }

    pub fn detection(&self) -> FaceDetection {
        FaceDetection::new(self.landmarks())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub frames: usize,
    /// `None` is a frame with nobody in it.
    pub face: Option<SyntheticFace>,
}

impl Segment {
    pub fn looking(frames: usize, gaze_x: f64, gaze_y: f64) -> Self {
        Self {
            frames,
            face: Some(SyntheticFace::looking(gaze_x, gaze_y)),
        }
    }

    pub fn closed(frames: usize) -> Self {
        Self {
            frames,
            face: Some(SyntheticFace::closed()),
        }
    }

    pub fn absent(frames: usize) -> Self {
        Self { frames, face: None }
    }
}

/// Plays a scripted timeline of segments, optionally on repeat.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    script: Vec<Segment>,
    segment: usize,
    frame: usize,
    repeat: bool,
}

impl SyntheticSource {
    pub fn new(script: Vec<Segment>) -> Self {
        Self {
            script,
            segment: 0,
            frame: 0,
            repeat: false,
        }
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Center, glance right, leave, close eyes, come back.
    pub fn attention_drill(fps: usize) -> Self {
        let fps = fps.max(1);
        Self::new(vec![
            Segment::looking(fps * 3, 0.0, 0.0),
            Segment::looking(fps * 2, 0.7, 0.0),
            Segment::looking(fps * 3, 0.0, 0.0),
            Segment::absent(fps * 6),
            Segment::looking(fps * 3, 0.0, 0.05),
            Segment::closed(fps),
            Segment::looking(fps * 3, 0.0, -0.6),
        ])
    }

    pub fn total_frames(&self) -> usize {
        self.script.iter().map(|s| s.frames).sum()
    }

    pub fn feed(self) -> DetectorFeed<Self, PrecomputedDetector> {
        DetectorFeed::new(self, PrecomputedDetector)
    }
}

impl FrameSource for SyntheticSource {
    type Frame = Option<FaceDetection>;

    fn name(&self) -> String {
        "synthetic".to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Self::Frame>> {
        if self.total_frames() == 0 {
            return Ok(None);
        }
        loop {
            if self.segment >= self.script.len() {
                if !self.repeat {
                    return Ok(None);
                }
                self.segment = 0;
            }
            let seg = self.script[self.segment];
            if self.frame < seg.frames {
                self.frame += 1;
                return Ok(Some(seg.face.map(|f| f.detection())));
            }
            self.segment += 1;
            self.frame = 0;
        }
    }
}
