//! Audit telemetry for seedbox-warden.
//!
//! Every pass records its decisions and corrective actions to syslog with the
//! `SEEDBOX_WARDEN` tag. This is separate from the `tracing` diagnostics, which
//! go to stderr.
//!
//! # Event Format
//!
//! Events are logged as JSON with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-01-07T01:00:02Z","event":"state_decided","state":"should_be_online","time_ok":true,"activity":true}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, PassOutcome};
pub use syslog::{AuditLogger, SYSLOG_TAG};
