//! Landmark index tables describing where the eyes live in a face mesh.
//!
//! The geometry functions never hard-code indices; they take an [`EyeTopology`]
//! so a different landmark model only needs a new table.

/// Which landmark indices make up one eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeTopology {
    /// Closed loop around the eyelids.
    pub outline: &'static [usize],
    /// Iris center followed by its ring points.
    pub iris: &'static [usize],
    /// Upper/lower lid pairs used for openness.
    pub vertical_pairs: &'static [(usize, usize)],
    /// Corner pairs used for openness.
    pub horizontal_pairs: &'static [(usize, usize)],
}

impl EyeTopology {
    /// Highest index referenced by this eye.
    pub fn max_index(&self) -> usize {
        let pairs = self
            .vertical_pairs
            .iter()
            .chain(self.horizontal_pairs)
            .flat_map(|&(a, b)| [a, b]);
        self.outline
            .iter()
            .chain(self.iris)
            .copied()
            .chain(pairs)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceTopology {
    pub left: EyeTopology,
    pub right: EyeTopology,
    /// Number of points the detector emits per face.
    pub landmark_count: usize,
}

// =========================================================================
// MediaPipe Face Landmarker (468 mesh points + 10 refined iris points)
// "Left" and "right" are the subject's own eyes.
// =========================================================================

const MP_LEFT_OUTLINE: [usize; 16] = [
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];
const MP_RIGHT_OUTLINE: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];
const MP_LEFT_IRIS: [usize; 5] = [468, 469, 470, 471, 472];
const MP_RIGHT_IRIS: [usize; 5] = [473, 474, 475, 476, 477];
const MP_LEFT_VERTICAL: [(usize, usize); 3] = [(386, 374), (385, 380), (387, 373)];
const MP_RIGHT_VERTICAL: [(usize, usize); 3] = [(159, 145), (158, 153), (160, 144)];
const MP_LEFT_HORIZONTAL: [(usize, usize); 1] = [(263, 362)];
const MP_RIGHT_HORIZONTAL: [(usize, usize); 1] = [(133, 33)];

impl FaceTopology {
    pub const MEDIAPIPE: FaceTopology = FaceTopology {
        left: EyeTopology {
            outline: &MP_LEFT_OUTLINE,
            iris: &MP_LEFT_IRIS,
            vertical_pairs: &MP_LEFT_VERTICAL,
            horizontal_pairs: &MP_LEFT_HORIZONTAL,
        },
        right: EyeTopology {
            outline: &MP_RIGHT_OUTLINE,
            iris: &MP_RIGHT_IRIS,
            vertical_pairs: &MP_RIGHT_VERTICAL,
            horizontal_pairs: &MP_RIGHT_HORIZONTAL,
        },
        landmark_count: 478,
    };

    pub fn eyes(&self) -> [&EyeTopology; 2] {
        [&self.left, &self.right]
    }
}

impl Default for FaceTopology {
    fn default() -> Self {
        Self::MEDIAPIPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mediapipe_indices_fit_the_mesh() {
        let face = FaceTopology::MEDIAPIPE;
        for eye in face.eyes() {
            assert!(eye.max_index() < face.landmark_count);
        }
    }

    #[test]
    fn openness_pairs_are_drawn_from_the_outline() {
        for eye in FaceTopology::MEDIAPIPE.eyes() {
            for &(a, b) in eye.vertical_pairs.iter().chain(eye.horizontal_pairs) {
                assert!(eye.outline.contains(&a), "{} not on outline", a);
                assert!(eye.outline.contains(&b), "{} not on outline", b);
            }
        }
    }
}
