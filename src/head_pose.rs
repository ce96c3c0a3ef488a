use std::borrow::Cow;

use crate::types::{FaceDetection, HeadTransform, Landmarks, Point3D};

/// Maps every landmark through the facial transformation matrix.
///
/// Each point is lifted to homogeneous coordinates (w = 1), multiplied by the
/// row-major 4x4 matrix and divided by the resulting w. A resulting w of
/// exactly zero is treated as 1.
pub fn apply_head_pose(landmarks: &Landmarks, transform: &HeadTransform) -> Landmarks {
    let points = landmarks
        .points
        .iter()
        .map(|p| transform_point(p, transform))
        .collect();
    Landmarks::new(points)
}

fn transform_point(p: &Point3D, m: &HeadTransform) -> Point3D {
    let v = [p.x, p.y, p.z, 1.0];
    let row = |r: usize| -> f64 { (0..4).map(|c| m[r][c] * v[c]).sum() };

    let mut w = row(3);
    if w == 0.0 {
        w = 1.0;
    }
    Point3D::new(row(0) / w, row(1) / w, row(2) / w)
}

/// Landmarks to measure for one frame, plus whether compensation happened.
#[derive(Debug, Clone)]
pub struct Compensated<'a> {
    pub landmarks: Cow<'a, Landmarks>,
    pub applied: bool,
}

/// Applies head-pose compensation when enabled and the frame carries a
/// transform; otherwise hands back the raw landmarks untouched.
pub fn compensate(face: &FaceDetection, enabled: bool) -> Compensated<'_> {
    match (&face.transform, enabled) {
        (Some(transform), true) => Compensated {
            landmarks: Cow::Owned(apply_head_pose(&face.landmarks, transform)),
            applied: true,
        },
        _ => Compensated {
            landmarks: Cow::Borrowed(&face.landmarks),
            applied: false,
        },
    }
}

/// Head orientation in degrees, decoded from the rotation part of the matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl HeadAngles {
    pub fn from_transform(m: &HeadTransform) -> Self {
        let pitch = m[2][1].atan2(m[2][2]);
        let yaw = (-m[2][0]).atan2((m[2][1].powi(2) + m[2][2].powi(2)).sqrt());
        let roll = m[1][0].atan2(m[0][0]);
        Self {
            yaw: yaw.to_degrees(),
            pitch: pitch.to_degrees(),
            roll: roll.to_degrees(),
        }
    }
}
