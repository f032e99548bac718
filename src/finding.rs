//! Boolean observations that remember why they are false.
//!
//! Collaborator failures (RPC errors, failed commands) never abort a pass; they
//! collapse into a conservative `false`. A [`Finding`] keeps the reason next to
//! the value so callers and tests can tell "verified absent" from "could not
//! find out".

use std::fmt;

/// A boolean verdict plus the failure that forced it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    value: bool,
    failure: Option<String>,
}

impl Finding {
    /// A verdict obtained from a successful observation.
    #[must_use]
    pub fn verified(value: bool) -> Self {
        Self {
            value,
            failure: None,
        }
    }

    /// A `false` verdict caused by a failed observation.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            value: false,
            failure: Some(reason.into()),
        }
    }

    /// The boolean verdict.
    pub fn value(&self) -> bool {
        self.value
    }

    /// The failure reason, if the verdict was forced by a failure.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Whether the verdict was forced by a failure.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            Some(reason) => write!(f, "{} ({})", self.value, reason),
            None => write!(f, "{}", self.value),
        }
    }
}
