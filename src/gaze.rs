use crate::landmarks::{EyeTopology, FaceTopology};
use crate::types::{GazeSample, Landmarks, Point3D};

// =========================================================================
// Eye Aspect Ratio (openness)
// =========================================================================

/// Mean vertical lid distance over mean horizontal corner distance.
///
/// Returns `0.0` when the horizontal distances sum to zero or any index is
/// missing from the landmark set. Zero is the "eye not measurable" sentinel,
/// it always falls below any openness threshold.
pub fn eye_aspect_ratio(
    landmarks: &Landmarks,
    vertical_pairs: &[(usize, usize)],
    horizontal_pairs: &[(usize, usize)],
) -> f64 {
    let (Some(vertical), Some(horizontal)) = (
        pair_distances(landmarks, vertical_pairs),
        pair_distances(landmarks, horizontal_pairs),
    ) else {
        return 0.0;
    };

    let h_sum: f64 = horizontal.iter().sum();
    if vertical.is_empty() || horizontal.is_empty() || h_sum == 0.0 {
        return 0.0;
    }

    let v_mean = vertical.iter().sum::<f64>() / vertical.len() as f64;
    let h_mean = h_sum / horizontal.len() as f64;
    v_mean / h_mean
}

fn pair_distances(landmarks: &Landmarks, pairs: &[(usize, usize)]) -> Option<Vec<f64>> {
    pairs
        .iter()
        .map(|&(a, b)| Some(landmarks.get(a)?.distance_2d(landmarks.get(b)?)))
        .collect()
}

// =========================================================================
// Gaze Ratio (iris offset inside the eye)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeOffset {
    pub x_ratio: f64,
    pub y_ratio: f64,
    pub eye_center: Point3D,
    pub iris_center: Point3D,
    /// Zero eye extent (or missing points): ratios are the `(0, 0)` sentinel
    /// and carry no gaze information.
    pub degenerate: bool,
}

impl GazeOffset {
    fn indeterminate(eye_center: Point3D, iris_center: Point3D) -> Self {
        Self {
            x_ratio: 0.0,
            y_ratio: 0.0,
            eye_center,
            iris_center,
            degenerate: true,
        }
    }

    /// The usable gaze sample, or `None` when the measurement is degenerate.
    pub fn sample(&self) -> Option<GazeSample> {
        if self.degenerate {
            None
        } else {
            Some(GazeSample::new(self.x_ratio, self.y_ratio))
        }
    }
}

/// Iris center relative to eye center, normalized by half the eye's bounding
/// box on each axis. Positive x is towards increasing image x, positive y
/// towards increasing image y (down).
pub fn gaze_offset(landmarks: &Landmarks, outline: &[usize], iris: &[usize]) -> GazeOffset {
    let (Some(eye_points), Some(iris_points)) =
        (collect_points(landmarks, outline), collect_points(landmarks, iris))
    else {
        return GazeOffset::indeterminate(Point3D::default(), Point3D::default());
    };

    let eye_center = centroid(&eye_points);
    let iris_center = centroid(&iris_points);

    let (min_x, max_x) = extent(eye_points.iter().map(|p| p.x));
    let (min_y, max_y) = extent(eye_points.iter().map(|p| p.y));
    let eye_width = max_x - min_x;
    let eye_height = max_y - min_y;

    if eye_width == 0.0 || eye_height == 0.0 {
        return GazeOffset::indeterminate(eye_center, iris_center);
    }

    GazeOffset {
        x_ratio: (iris_center.x - eye_center.x) / (eye_width * 0.5),
        y_ratio: (iris_center.y - eye_center.y) / (eye_height * 0.5),
        eye_center,
        iris_center,
        degenerate: false,
    }
}

/// `None` when the list is empty or references a point the frame lacks.
fn collect_points(landmarks: &Landmarks, indices: &[usize]) -> Option<Vec<Point3D>> {
    if indices.is_empty() {
        return None;
    }
    indices.iter().map(|&i| landmarks.get(i).copied()).collect()
}

fn centroid(points: &[Point3D]) -> Point3D {
    let n = points.len() as f64;
    let (x, y, z) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
    Point3D::new(x / n, y / n, z / n)
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

// =========================================================================
// Per-eye measurement
// =========================================================================

/// What the classifier needs from one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeReading {
    pub ear: f64,
    pub gaze: Option<GazeSample>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMeasurement {
    pub ear: f64,
    pub gaze: GazeOffset,
}

impl EyeMeasurement {
    pub fn reading(&self) -> EyeReading {
        EyeReading {
            ear: self.ear,
            gaze: self.gaze.sample(),
        }
    }
}

pub fn measure_eye(landmarks: &Landmarks, eye: &EyeTopology) -> EyeMeasurement {
    EyeMeasurement {
        ear: eye_aspect_ratio(landmarks, eye.vertical_pairs, eye.horizontal_pairs),
        gaze: gaze_offset(landmarks, eye.outline, eye.iris),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMeasurement {
    pub left: EyeMeasurement,
    pub right: EyeMeasurement,
}

pub fn measure_face(landmarks: &Landmarks, topology: &FaceTopology) -> FaceMeasurement {
    FaceMeasurement {
        left: measure_eye(landmarks, &topology.left),
        right: measure_eye(landmarks, &topology.right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pts(coords: &[(f64, f64)]) -> Landmarks {
        Landmarks::new(coords.iter().map(|&(x, y)| Point3D::new(x, y, 0.0)).collect())
    }

    #[test]
    fn ear_is_mean_vertical_over_mean_horizontal() {
        // 0,1: corners 10px apart. 2,3 and 4,5: lids 2px and 4px apart.
        let l = pts(&[(0.0, 0.0), (10.0, 0.0), (3.0, -1.0), (3.0, 1.0), (6.0, -2.0), (6.0, 2.0)]);
        let ear = eye_aspect_ratio(&l, &[(2, 3), (4, 5)], &[(0, 1)]);
        assert!((ear - 0.3).abs() < 1e-12, "ear = {}", ear);
    }

    #[test]
    fn ear_sentinel_for_collapsed_corners() {
        let l = pts(&[(5.0, 5.0), (5.0, 5.0), (5.0, 4.0), (5.0, 6.0)]);
        assert_eq!(eye_aspect_ratio(&l, &[(2, 3)], &[(0, 1)]), 0.0);
    }

    #[test]
    fn ear_sentinel_for_missing_points() {
        let l = pts(&[(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(eye_aspect_ratio(&l, &[(2, 3)], &[(0, 1)]), 0.0);
        assert_eq!(eye_aspect_ratio(&l, &[], &[(0, 1)]), 0.0);
    }

    #[test]
    fn centered_iris_gives_zero_ratio() {
        // Square eye outline with the iris in the middle
        let l = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 4.0), (0.0, 4.0), (5.0, 2.0)]);
        let g = gaze_offset(&l, &[0, 1, 2, 3], &[4]);
        assert!(!g.degenerate);
        assert_eq!(g.sample(), Some(GazeSample::new(0.0, 0.0)));
        assert_eq!(g.eye_center, Point3D::new(5.0, 2.0, 0.0));
    }

    #[test]
    fn offset_iris_is_normalized_by_half_extent() {
        let l = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 4.0), (0.0, 4.0), (7.5, 1.0)]);
        let g = gaze_offset(&l, &[0, 1, 2, 3], &[4]);
        assert!((g.x_ratio - 0.5).abs() < 1e-12);
        assert!((g.y_ratio + 0.5).abs() < 1e-12);
        assert_eq!(g.iris_center, Point3D::new(7.5, 1.0, 0.0));
    }

    #[test]
    fn flat_eye_is_indeterminate_not_centered() {
        let l = pts(&[(0.0, 2.0), (10.0, 2.0), (8.0, 2.0)]);
        let g = gaze_offset(&l, &[0, 1], &[2]);
        assert!(g.degenerate);
        assert_eq!((g.x_ratio, g.y_ratio), (0.0, 0.0));
        assert_eq!(g.sample(), None);
    }

    #[test]
    fn short_landmark_set_is_indeterminate() {
        let l = pts(&[(0.0, 0.0)]);
        let m = measure_face(&l, &FaceTopology::MEDIAPIPE);
        assert_eq!(m.left.ear, 0.0);
        assert!(m.left.gaze.degenerate);
        assert_eq!(m.right.reading().gaze, None);
    }

    proptest! {
        #[test]
        fn ear_and_gaze_ignore_uniform_scale(
            scale in 0.1f64..10.0,
            lid in 0.5f64..5.0,
            iris_x in 1.0f64..9.0,
        ) {
            let eye = [(0.0, 0.0), (10.0, 0.0), (5.0, -lid), (5.0, lid), (iris_x, 0.0)];
            let scaled: Vec<_> = eye.iter().map(|&(x, y)| (x * scale, y * scale)).collect();
            let (a, b) = (pts(&eye), pts(&scaled));

            let ear_a = eye_aspect_ratio(&a, &[(2, 3)], &[(0, 1)]);
            let ear_b = eye_aspect_ratio(&b, &[(2, 3)], &[(0, 1)]);
            prop_assert!((ear_a - ear_b).abs() < 1e-9);

            let g_a = gaze_offset(&a, &[0, 1, 2, 3], &[4]);
            let g_b = gaze_offset(&b, &[0, 1, 2, 3], &[4]);
            prop_assert!((g_a.x_ratio - g_b.x_ratio).abs() < 1e-9);
        }
    }
}
