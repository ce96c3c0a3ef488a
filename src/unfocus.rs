//! Focused/Unfocused state machine that turns the smoothed per-frame decision
//! into unfocused time, look-away events and alert requests.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::UnfocusConfig;

/// What happens to the trigger once an alert has been requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Latch `triggered` until `reset_trigger`.
    #[default]
    Once,
    /// Restart the event count after each alert and keep alerting.
    EveryThreshold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnfocusState {
    pub is_focused: bool,
    /// Set exactly while unfocused.
    pub last_unfocus_time: Option<Instant>,
    pub accumulated_unfocused_seconds: f64,
    pub look_away_event_count: u32,
    pub triggered: bool,
}

impl Default for UnfocusState {
    fn default() -> Self {
        Self {
            is_focused: true,
            last_unfocus_time: None,
            accumulated_unfocused_seconds: 0.0,
            look_away_event_count: 0,
            triggered: false,
        }
    }
}

/// An unfocused interval long enough to count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAwayEvent {
    pub duration_secs: f64,
    /// Count toward the next alert after this event.
    pub event_number: u32,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRequest {
    pub look_away_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnfocusUpdate {
    pub event: Option<LookAwayEvent>,
    pub alert: Option<AlertRequest>,
}

#[derive(Debug, Clone)]
pub struct UnfocusAccumulator {
    state: UnfocusState,
    look_away_secs: f64,
    trigger_threshold: u32,
    retrigger: RetriggerPolicy,
    locked_in: bool,
}

impl UnfocusAccumulator {
    pub fn new(config: &UnfocusConfig) -> Self {
        Self {
            state: UnfocusState::default(),
            look_away_secs: config.look_away_secs,
            trigger_threshold: config.trigger_threshold.max(1),
            retrigger: config.retrigger,
            locked_in: config.locked_in,
        }
    }

    /// Feeds one smoothed decision. Only transitions do anything.
    pub fn update(&mut self, focused: bool, now: Instant) -> UnfocusUpdate {
        match (self.state.is_focused, focused) {
            (true, false) => {
                self.state.is_focused = false;
                self.state.last_unfocus_time = Some(now);
                debug!("Attention lost");
                UnfocusUpdate::default()
            }
            (false, true) => self.refocus(now),
            _ => UnfocusUpdate::default(),
        }
    }

    fn refocus(&mut self, now: Instant) -> UnfocusUpdate {
        let started = self.state.last_unfocus_time.take().unwrap_or(now);
        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        self.state.is_focused = true;
        self.state.accumulated_unfocused_seconds += elapsed;

        if elapsed < self.look_away_secs {
            return UnfocusUpdate::default();
        }

        self.state.look_away_event_count += 1;
        let event = LookAwayEvent {
            duration_secs: elapsed,
            event_number: self.state.look_away_event_count,
            at: now,
        };
        info!(
            "Look away detected ({}/{}), away for {:.1}s",
            event.event_number, self.trigger_threshold, elapsed
        );

        UnfocusUpdate {
            event: Some(event),
            alert: self.maybe_trigger(),
        }
    }

    fn maybe_trigger(&mut self) -> Option<AlertRequest> {
        if self.state.triggered || self.state.look_away_event_count < self.trigger_threshold {
            return None;
        }
        if !self.locked_in {
            debug!("Threshold reached in relaxed mode, no alert");
            return None;
        }

        let request = AlertRequest {
            look_away_count: self.state.look_away_event_count,
        };
        match self.retrigger {
            RetriggerPolicy::Once => self.state.triggered = true,
            RetriggerPolicy::EveryThreshold => self.state.look_away_event_count = 0,
        }
        Some(request)
    }

    /// Restarts counting toward the next alert. Accumulated time is kept.
    pub fn reset_trigger(&mut self) {
        self.state.triggered = false;
        self.state.look_away_event_count = 0;
        info!("Trigger reset");
    }

    /// Total unfocused time including the interval still open at `now`.
    pub fn unfocused_seconds_at(&self, now: Instant) -> f64 {
        let open = self
            .state
            .last_unfocus_time
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.state.accumulated_unfocused_seconds + open
    }

    /// Folds the open interval into the total without changing focus state,
    /// so calling it twice adds nothing the second time.
    pub fn flush(&mut self, now: Instant) {
        if let Some(started) = self.state.last_unfocus_time {
            self.state.accumulated_unfocused_seconds +=
                now.saturating_duration_since(started).as_secs_f64();
            self.state.last_unfocus_time = Some(now);
        }
    }

    pub fn set_locked_in(&mut self, locked_in: bool) {
        self.locked_in = locked_in;
        info!("Mode set to {}", if locked_in { "locked in" } else { "relaxed" });
    }

    pub fn locked_in(&self) -> bool {
        self.locked_in
    }

    pub fn state(&self) -> &UnfocusState {
        &self.state
    }
}

impl Default for UnfocusAccumulator {
    fn default() -> Self {
        Self::new(&UnfocusConfig::default())
    }
}
