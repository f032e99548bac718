//! Wall clock and polling primitives.
//!
//! Every wait in a supervisor pass goes through a [`Clock`] so that tests can
//! drive the polling loops without sleeping in wall-clock time.
//!
//! # Bounded and unbounded waits
//!
//! Several waits (tunnel establishment, daemon shutdown, daemon relaunch) keep
//! polling until the external system converges. A [`PollPolicy`] without
//! `max_attempts` expresses exactly that; configuring a bound turns the same loop
//! into one that gives up with [`PollExhausted`].

use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Source of the current time and of blocking sleeps.
pub trait Clock {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Block the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A polling loop ran out of attempts before its condition held.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("gave up waiting for {what} after {attempts} checks")]
pub struct PollExhausted {
    /// Description of the awaited condition.
    pub what: String,
    /// Number of checks performed.
    pub attempts: u32,
}

/// Interval and optional attempt bound for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two checks.
    pub interval: Duration,
    /// Maximum number of checks. `None` polls until the condition holds.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll forever at `interval`.
    #[must_use]
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Poll at most `max_attempts` times at `interval`.
    #[must_use]
    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Check `done` until it returns true, sleeping `interval` between checks.
    ///
    /// Returns the number of checks performed. The condition is checked before
    /// the first sleep, so an already-satisfied condition costs no sleep at all.
    pub fn wait_until<F>(&self, clock: &dyn Clock, what: &str, mut done: F) -> Result<u32, PollExhausted>
    where
        F: FnMut() -> bool,
    {
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            if done() {
                return Ok(attempts);
            }
            if let Some(max) = self.max_attempts
                && attempts >= max
            {
                return Err(PollExhausted {
                    what: what.to_string(),
                    attempts,
                });
            }
            trace!("Still waiting for {} (check {})", what, attempts);
            clock.sleep(self.interval);
        }
    }
}
