use anyhow::Result;

use crate::types::FaceDetection;

/// Anything that hands out frames one at a time.
///
/// `Ok(None)` means the source is exhausted; an `Err` is a transient failure
/// and the caller may ask again.
pub trait FrameSource {
    type Frame;

    fn name(&self) -> String;
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// Finds at most one face in a frame. `Ok(None)` (no face) is a normal outcome.
pub trait LandmarkDetector<F> {
    fn detect(&mut self, frame: &F) -> Result<Option<FaceDetection>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    Face(FaceDetection),
    NoFace,
    Exhausted,
}

impl FeedFrame {
    pub fn face(&self) -> Option<&FaceDetection> {
        match self {
            FeedFrame::Face(face) => Some(face),
            _ => None,
        }
    }
}

/// What the tracking loop consumes: frames already run through a detector.
pub trait FaceFeed {
    fn name(&self) -> String;
    fn next_face(&mut self) -> Result<FeedFrame>;
}

pub type BoxedFeed = Box<dyn FaceFeed + Send>;

/// A frame source paired with the detector that understands its frames.
pub struct DetectorFeed<S, D> {
    source: S,
    detector: D,
}

impl<S, D> DetectorFeed<S, D> {
    pub fn new(source: S, detector: D) -> Self {
        Self { source, detector }
    }
}

impl<S, D> FaceFeed for DetectorFeed<S, D>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    fn name(&self) -> String {
        self.source.name()
    }

    fn next_face(&mut self) -> Result<FeedFrame> {
        let Some(frame) = self.source.next_frame()? else {
            return Ok(FeedFrame::Exhausted);
        };
        Ok(match self.detector.detect(&frame)? {
            Some(face) => FeedFrame::Face(face),
            None => FeedFrame::NoFace,
        })
    }
}

/// Pass-through for sources whose frames already are landmark sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedDetector;

impl LandmarkDetector<Option<FaceDetection>> for PrecomputedDetector {
    fn detect(&mut self, frame: &Option<FaceDetection>) -> Result<Option<FaceDetection>> {
        Ok(frame.clone())
    }
}

/// Opens a fresh feed for a user when a session starts.
pub trait FeedFactory: Send + Sync {
    fn open(&self, user_id: &str) -> Result<BoxedFeed>;
}

impl<F> FeedFactory for F
where
    F: Fn(&str) -> Result<BoxedFeed> + Send + Sync,
{
    fn open(&self, user_id: &str) -> Result<BoxedFeed> {
        self(user_id)
    }
}
