pub mod alert;
pub mod attention;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod gaze;
pub mod head_pose;
pub mod landmarks;
pub mod pipeline;
pub mod recording;
pub mod session;
pub mod source;
pub mod synthetic;
pub mod tracker;
pub mod types;
pub mod unfocus;

#[cfg(test)]
mod gaze_tests;

pub use config::FocusConfig;
pub use error::{SessionError, TrackingFailure};
pub use pipeline::{FocusPipeline, FrameOutcome};
pub use session::{SessionCoordinator, SessionReport, SessionStatus};
pub use types::StatsSnapshot;
