//! Desired system state from override markers, schedule and transfer activity.
//!
//! Rules, first match wins:
//!
//! 1. the force-stop marker exists: [`SystemState::ForcedOffline`]
//! 2. the force-start marker exists: [`SystemState::ForcedOnline`]
//! 3. inside the schedule window and transfers need the tunnel:
//!    [`SystemState::ShouldBeOnline`]
//! 4. anything else: [`SystemState::ShouldBeOffline`]

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::activity::ActivitySignal;
use crate::clock::Clock;
use crate::config::{MarkersConfig, ScheduleConfig};
use crate::finding::Finding;
use crate::schedule::Schedule;

/// Desired operational state for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// Force-stop marker present.
    ForcedOffline,
    /// Force-start marker present.
    ForcedOnline,
    /// Outside the window or nothing to do.
    ShouldBeOffline,
    /// Inside the window with transfer activity.
    ShouldBeOnline,
}

impl SystemState {
    /// Whether the tunnel should be up in this state.
    pub fn wants_online(self) -> bool {
        matches!(self, SystemState::ForcedOnline | SystemState::ShouldBeOnline)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::ForcedOffline => "forced offline",
            SystemState::ForcedOnline => "forced online",
            SystemState::ShouldBeOffline => "should be offline",
            SystemState::ShouldBeOnline => "should be online",
        };
        f.write_str(name)
    }
}

/// A state together with the signals it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The decided state.
    pub state: SystemState,
    /// Schedule verdict; `None` when an override marker decided.
    pub time_ok: Option<Finding>,
    /// Activity verdict; `None` when an override marker decided.
    pub activity: Option<Finding>,
}

impl Decision {
    fn overridden(state: SystemState) -> Self {
        Self {
            state,
            time_ok: None,
            activity: None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let (Some(time_ok), Some(activity)) = (&self.time_ok, &self.activity) {
            write!(f, " (schedule: {}, activity: {})", time_ok, activity)?;
        }
        Ok(())
    }
}

/// Computes the [`Decision`] for a pass.
pub struct StateDecisionEngine<'a> {
    markers: &'a MarkersConfig,
    schedule: Schedule<'a>,
    clock: &'a dyn Clock,
    activity: &'a dyn ActivitySignal,
}

impl<'a> StateDecisionEngine<'a> {
    /// Create an engine.
    pub fn new(
        markers: &'a MarkersConfig,
        schedule: &'a ScheduleConfig,
        clock: &'a dyn Clock,
        activity: &'a dyn ActivitySignal,
    ) -> Self {
        Self {
            markers,
            schedule: Schedule::new(schedule),
            clock,
            activity,
        }
    }

    /// Evaluate the rules. Markers are re-read on every call.
    pub fn decide(&self) -> Decision {
        if self.markers.force_stop.exists() {
            info!("Force-stop marker {} present", self.markers.force_stop.display());
            return Decision::overridden(SystemState::ForcedOffline);
        }
        if self.markers.force_start.exists() {
            info!("Force-start marker {} present", self.markers.force_start.display());
            return Decision::overridden(SystemState::ForcedOnline);
        }

        let time_ok = Finding::verified(self.schedule.is_open(self.clock.now()));
        let activity = either(self.activity.has_active_downloads(), || {
            self.activity.resume_if_seeding_needed()
        });
        debug!("Schedule open: {}, activity: {}", time_ok, activity);

        let state = if time_ok.value() && activity.value() {
            SystemState::ShouldBeOnline
        } else {
            SystemState::ShouldBeOffline
        };
        info!("Decided state: {}", state);

        Decision {
            state,
            time_ok: Some(time_ok),
            activity: Some(activity),
        }
    }
}

/// Short-circuit OR over findings, keeping a failure reason when the result is false.
fn either(first: Finding, second: impl FnOnce() -> Finding) -> Finding {
    if first.value() {
        return first;
    }
    let second = second();
    if second.value() || second.is_failure() || !first.is_failure() {
        second
    } else {
        first
    }
}
