#[cfg(test)]
mod tests {
    use crate::gaze::measure_face;
    use crate::head_pose::apply_head_pose;
    use crate::landmarks::FaceTopology;
    use crate::synthetic::SyntheticFace;
    use crate::types::HeadTransform;

    // =========================================================================
    // Regression Tests: Gaze Direction
    // Convention: image coordinates. Positive x = iris toward image right,
    // positive y = iris toward image bottom.
    // =========================================================================

    fn average_ratio(face: &SyntheticFace) -> (f64, f64) {
        let m = measure_face(&face.landmarks(), &FaceTopology::MEDIAPIPE);
        let l = m.left.gaze.sample().expect("left eye measurable");
        let r = m.right.gaze.sample().expect("right eye measurable");
        ((l.x_ratio + r.x_ratio) / 2.0, (l.y_ratio + r.y_ratio) / 2.0)
    }

    #[test]
    fn test_iris_right_is_positive_x() {
        let (x, y) = average_ratio(&SyntheticFace::looking(0.4, 0.0));
        assert!(x > 0.0, "Iris toward image right produced x {}, expected positive", x);
        assert!(y.abs() < 1e-9, "Horizontal glance leaked into y: {}", y);

        let (x, _) = average_ratio(&SyntheticFace::looking(-0.4, 0.0));
        assert!(x < 0.0, "Iris toward image left produced x {}, expected negative", x);
    }

    #[test]
    fn test_iris_down_is_positive_y() {
        let (_, y) = average_ratio(&SyntheticFace::looking(0.0, 0.5));
        assert!(y > 0.0, "Iris toward image bottom produced y {}, expected positive", y);
    }

    #[test]
    fn test_gaze_ratio_is_scale_invariant() {
        // Moving closer to the camera scales the whole face; ratios must not move
        let face = SyntheticFace::looking(0.3, -0.2);
        let scale: HeadTransform = [
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let topo = FaceTopology::MEDIAPIPE;
        let near = measure_face(&apply_head_pose(&face.landmarks(), &scale), &topo);
        let far = measure_face(&face.landmarks(), &topo);

        assert!((near.left.gaze.x_ratio - far.left.gaze.x_ratio).abs() < 1e-9);
        assert!((near.right.gaze.y_ratio - far.right.gaze.y_ratio).abs() < 1e-9);
        assert!((near.left.ear - far.left.ear).abs() < 1e-9);
    }

    #[test]
    fn test_translation_does_not_change_gaze() {
        let mut moved = SyntheticFace::looking(0.2, 0.1);
        let (x0, y0) = average_ratio(&moved);
        moved.center = (100.0, 400.0);
        let (x1, y1) = average_ratio(&moved);
        assert!((x0 - x1).abs() < 1e-9 && (y0 - y1).abs() < 1e-9);
    }
}
