use serde::{Deserialize, Serialize};

/// Represents a single 3D landmark in image pixel space (z is the detector's depth proxy)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane.
    pub fn distance_2d(&self, other: &Point3D) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

impl From<[f64; 3]> for Point3D {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<Point3D> for [f64; 3] {
    fn from(p: Point3D) -> Self {
        [p.x, p.y, p.z]
    }
}

/// One face's landmark set for one frame, indexed positionally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmarks {
    pub points: Vec<Point3D>,
}

impl Landmarks {
    pub fn new(points: Vec<Point3D>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point3D> {
        self.points.get(index)
    }
}

/// Row-major 4x4 facial transformation matrix as reported by the detector
pub type HeadTransform = [[f64; 4]; 4];

/// Output of the landmark detector for a frame that contains a face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub landmarks: Landmarks,
    #[serde(default)]
    pub transform: Option<HeadTransform>,
}

impl FaceDetection {
    pub fn new(landmarks: Landmarks) -> Self {
        Self { landmarks, transform: None }
    }

    pub fn with_transform(mut self, transform: HeadTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Iris offset from the eye center, normalized by the eye half-extent per axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x_ratio: f64,
    pub y_ratio: f64,
}

impl GazeSample {
    pub fn new(x_ratio: f64, y_ratio: f64) -> Self {
        Self { x_ratio, y_ratio }
    }
}

/// Personal neutral gaze, subtracted from every averaged gaze sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    pub center_x: f64,
    pub center_y: f64,
}

/// Live view of a session's attention statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub times_looked_away: u32,
    pub total_unfocused_seconds: f64,
    pub currently_focused: bool,
    pub session_duration: f64,
}

impl StatsSnapshot {
    /// e.g. "1 min 5.25 sec"
    pub fn total_unfocused_formatted(&self) -> String {
        let total = self.total_unfocused_seconds.max(0.0);
        let minutes = (total / 60.0).floor();
        let seconds = total - minutes * 60.0;
        format!("{} min {:.2} sec", minutes as u64, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_serializes_as_triplet() {
        let p = Point3D::new(1.5, -2.0, 0.25);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[1.5,-2.0,0.25]");
        let back: Point3D = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn face_detection_transform_is_optional() {
        let face: FaceDetection =
            serde_json::from_str(r#"{"landmarks": [[0.0, 1.0, 2.0]]}"#).unwrap();
        assert_eq!(face.landmarks.len(), 1);
        assert!(face.transform.is_none());
    }

    #[test]
    fn formats_unfocused_time_as_minutes_and_seconds() {
        let stats = StatsSnapshot {
            times_looked_away: 2,
            total_unfocused_seconds: 65.25,
            currently_focused: true,
            session_duration: 300.0,
        };
        assert_eq!(stats.total_unfocused_formatted(), "1 min 5.25 sec");
    }
}
