//! Audit event types for structured logging.
//!
//! These events are logged to syslog with the `SEEDBOX_WARDEN` tag so that
//! every state decision and corrective action of a pass can be traced later.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;

use crate::decision::SystemState;
use crate::reconcile::ReconcileStage;

/// Audit events emitted during a supervisor pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Pass started.
    PassStart {
        /// Process ID of the supervisor.
        pid: u32,
    },

    /// Pass ended.
    PassEnd {
        /// How the pass ended.
        outcome: PassOutcome,
        /// Duration of the pass in seconds.
        duration_sec: u64,
    },

    /// Required storage missing; the pass did not manage the tunnel.
    StorageMissing {
        /// Missing paths.
        paths: Vec<String>,
        /// Whether the daemon was shut down because of it.
        daemon_stopped: bool,
    },

    /// Desired state decided.
    StateDecided {
        /// The decided state.
        state: SystemState,
        /// Schedule verdict, absent when an override decided.
        time_ok: Option<bool>,
        /// Activity verdict, absent when an override decided.
        activity: Option<bool>,
    },

    /// The tunnel came up or went down.
    TunnelTransition {
        /// Whether the tunnel is now up.
        online: bool,
        /// Outbound address after the transition.
        address: Ipv4Addr,
    },

    /// The daemon was relaunched on a new address.
    DaemonRebound {
        /// Address the daemon now listens on.
        address: Ipv4Addr,
    },

    /// A daemon rebind gave up before completing.
    DaemonIncomplete {
        /// Address the daemon was being bound to.
        address: Ipv4Addr,
        /// Step that gave up.
        stage: ReconcileStage,
    },

    /// Transfers were force-started because they still owe seeding.
    TransfersResumed {
        /// Transfer IDs.
        ids: Vec<i64>,
    },
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// Another pass held the run lock.
    Locked,
    /// Required storage was missing.
    StorageUnavailable,
    /// The pass ran to completion.
    Completed,
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}
