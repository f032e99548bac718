//! Time-of-week windows during which the daemon may run.
//!
//! Monday to Friday use the weekday window, Saturday and Sunday the weekend one.
//! A window covers `[start, stop)`. When `stop` is earlier than `start` the
//! window runs past midnight: `22:00`-`06:00` covers 22:00 to 23:59 and 00:00 to
//! 05:59 of the same day. Equal bounds describe an empty window; `00:00`-`24:00`
//! covers the whole day.

use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike, Weekday};

use crate::config::{ScheduleConfig, WindowConfig};

/// Schedule lookups over a [`ScheduleConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    config: &'a ScheduleConfig,
}

impl<'a> Schedule<'a> {
    /// Wrap a schedule configuration.
    pub fn new(config: &'a ScheduleConfig) -> Self {
        Self { config }
    }

    /// Window that applies on `day`.
    pub fn window_for(&self, day: Weekday) -> &'a WindowConfig {
        match day {
            Weekday::Sat | Weekday::Sun => &self.config.weekend,
            _ => &self.config.weekday,
        }
    }

    /// Whether `at` falls inside that day's window.
    pub fn is_open(&self, at: DateTime<Local>) -> bool {
        window_contains(self.window_for(at.weekday()), at.time())
    }
}

fn window_contains(window: &WindowConfig, time: NaiveTime) -> bool {
    let start = window.start.minute_of_day();
    let stop = window.stop.minute_of_day();
    let time = time.hour() * 60 + time.minute();
    if start <= stop {
        start <= time && time < stop
    } else {
        time >= start || time < stop
    }
}
