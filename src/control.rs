use anyhow::{anyhow, bail, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::attention::GazeThresholds;
use crate::error::SessionError;
use crate::session::{SessionCoordinator, SessionReport, SessionStatus};
use crate::types::StatsSnapshot;

/// Per-keypress threshold step.
pub const THRESHOLD_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Start { duration: Option<Duration> },
    Stop,
    Status,
    Stats,
    Reset,
    Calibrate,
    Threshold { axis: Axis, delta: f64 },
    HeadPose(Option<bool>),
    Mode { locked_in: bool },
    Quit,
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    /// Accepts full commands (`threshold x -0.02`) and the single-key
    /// shortcuts `c h r q w a s d`.
    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let cmd = match head.to_ascii_lowercase().as_str() {
            "start" => ControlCommand::Start {
                duration: match args.first() {
                    Some(secs) => Some(duration_from_secs(parse_number(secs)?)?),
                    None => None,
                },
            },
            "stop" => ControlCommand::Stop,
            "status" => ControlCommand::Status,
            "stats" => ControlCommand::Stats,
            "reset" | "r" => ControlCommand::Reset,
            "calibrate" | "c" => ControlCommand::Calibrate,
            "quit" | "exit" | "q" => ControlCommand::Quit,
            "w" => ControlCommand::Threshold { axis: Axis::Y, delta: -THRESHOLD_STEP },
            "s" => ControlCommand::Threshold { axis: Axis::Y, delta: THRESHOLD_STEP },
            "a" => ControlCommand::Threshold { axis: Axis::X, delta: -THRESHOLD_STEP },
            "d" => ControlCommand::Threshold { axis: Axis::X, delta: THRESHOLD_STEP },
            "h" => ControlCommand::HeadPose(None),
            "threshold" => {
                let [axis, delta] = args.as_slice() else {
                    bail!("usage: threshold x|y <delta>");
                };
                let axis = match *axis {
                    "x" | "X" => Axis::X,
                    "y" | "Y" => Axis::Y,
                    other => bail!("unknown axis '{}'", other),
                };
                ControlCommand::Threshold { axis, delta: parse_number(delta)? }
            }
            "headpose" => ControlCommand::HeadPose(match args.first().copied() {
                None | Some("toggle") => None,
                Some("on") => Some(true),
                Some("off") => Some(false),
                Some(other) => bail!("usage: headpose [on|off|toggle], got '{}'", other),
            }),
            "mode" => ControlCommand::Mode {
                locked_in: match args.first().copied() {
                    Some("locked") | Some("locked-in") | Some("study") => true,
                    Some("relaxed") | Some("break") => false,
                    _ => bail!("usage: mode locked|relaxed"),
                },
            },
            other => bail!("unknown command '{}'", other),
        };
        Ok(cmd)
    }
}

fn parse_number(s: &str) -> Result<f64> {
    let v: f64 = s.parse().map_err(|_| anyhow!("'{}' is not a number", s))?;
    if !v.is_finite() {
        bail!("'{}' is not a finite number", s);
    }
    Ok(v)
}

/// Negative values mean "stop right away". Values `Duration` cannot hold
/// are rejected.
pub fn duration_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() {
        bail!("duration '{}' is not a finite number", secs);
    }
    Duration::try_from_secs_f64(secs.max(0.0)).map_err(|_| anyhow!("duration {}s out of range", secs))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    Started,
    Stopped(SessionReport),
    Status(SessionStatus),
    Stats(StatsSnapshot),
    TriggerReset,
    CalibrationStarted,
    Thresholds(GazeThresholds),
    HeadPose(bool),
    Mode { locked_in: bool },
    Quit,
}

impl ControlCommand {
    /// Runs the command against one user's session.
    pub fn apply(self, coordinator: &SessionCoordinator, user_id: &str) -> Result<ControlReply, SessionError> {
        Ok(match self {
            ControlCommand::Start { duration } => {
                coordinator.start(user_id, duration)?;
                ControlReply::Started
            }
            ControlCommand::Stop => ControlReply::Stopped(coordinator.stop(user_id)?),
            ControlCommand::Status => ControlReply::Status(coordinator.status(user_id)?),
            ControlCommand::Stats => ControlReply::Stats(coordinator.query_stats(user_id)?),
            ControlCommand::Reset => {
                coordinator.reset_trigger(user_id)?;
                ControlReply::TriggerReset
            }
            ControlCommand::Calibrate => {
                coordinator.calibrate(user_id)?;
                ControlReply::CalibrationStarted
            }
            ControlCommand::Threshold { axis, delta } => {
                let (dx, dy) = match axis {
                    Axis::X => (delta, 0.0),
                    Axis::Y => (0.0, delta),
                };
                ControlReply::Thresholds(coordinator.adjust_thresholds(user_id, dx, dy)?)
            }
            ControlCommand::HeadPose(Some(enabled)) => {
                coordinator.set_head_pose_compensation(user_id, enabled)?;
                ControlReply::HeadPose(enabled)
            }
            ControlCommand::HeadPose(None) => {
                ControlReply::HeadPose(coordinator.toggle_head_pose_compensation(user_id)?)
            }
            ControlCommand::Mode { locked_in } => {
                coordinator.set_locked_in(user_id, locked_in)?;
                ControlReply::Mode { locked_in }
            }
            ControlCommand::Quit => ControlReply::Quit,
        })
    }
}

impl fmt::Display for ControlReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlReply::Started => write!(f, "Tracking started"),
            ControlReply::Stopped(r) => write!(
                f,
                "Tracking stopped{}: looked away {} times, unfocused {}",
                if r.forced { " (forced)" } else { "" },
                r.stats.times_looked_away,
                r.stats.total_unfocused_formatted()
            ),
            ControlReply::Status(SessionStatus::Active) => write!(f, "Tracking in progress"),
            ControlReply::Status(SessionStatus::Completed) => write!(f, "Tracking finished"),
            ControlReply::Status(SessionStatus::Failed(e)) => write!(f, "Tracking failed: {}", e),
            ControlReply::Stats(s) => write!(
                f,
                "Looked away {} times | unfocused {} | {} | session {:.1}s",
                s.times_looked_away,
                s.total_unfocused_formatted(),
                if s.currently_focused { "focused" } else { "unfocused" },
                s.session_duration
            ),
            ControlReply::TriggerReset => write!(f, "Brain rot trigger reset"),
            ControlReply::CalibrationStarted => write!(f, "Calibration started, look at the center of the screen"),
            ControlReply::Thresholds(t) => write!(f, "Thresholds X: ±{:.2}, Y: ±{:.2}", t.x, t.y),
            ControlReply::HeadPose(on) => {
                write!(f, "Head pose compensation {}", if *on { "on" } else { "off" })
            }
            ControlReply::Mode { locked_in } => {
                write!(f, "Mode: {}", if *locked_in { "locked in" } else { "relaxed" })
            }
            ControlReply::Quit => write!(f, "Bye"),
        }
    }
}
