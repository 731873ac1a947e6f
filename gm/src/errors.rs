//! Error types for the group manager
//!
//! Variants follow how a failure must be handled, not where it came from:
//! connectivity problems move on to the next candidate or surface at once,
//! precondition failures end the current decision without touching state,
//! inconsistencies need an operator, and throttling is an expected outcome.

use ha_common::{HadbError, ThrottleDecision};
use std::fmt;

/// Main error type for the group manager
#[derive(Debug)]
pub enum GmError {
    /// A single instance could not be reached
    Connectivity { target: String, reason: String },

    /// A statement failed on a reachable instance
    Query {
        target: String,
        statement: String,
        reason: String,
    },

    /// Candidate failed a check; nothing was changed
    Precondition { stage: String, reason: String },

    /// Topology contradicts itself; never resolved automatically
    Inconsistency { reason: String },

    /// Switch-rate limit reached
    Throttled(ThrottleDecision),

    /// A switch step failed and the instance may be left mid-sequence
    Switch {
        stage: String,
        target: String,
        reason: String,
    },

    /// Status store failure
    Hadb(HadbError),

    /// Configuration problems
    Config(String),
}

impl GmError {
    pub fn connectivity(target: &str, reason: impl fmt::Display) -> Self {
        GmError::Connectivity {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn query(target: &str, statement: &str, reason: impl fmt::Display) -> Self {
        GmError::Query {
            target: target.to_string(),
            statement: statement.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn precondition(stage: &str, reason: impl Into<String>) -> Self {
        GmError::Precondition {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    pub fn inconsistency(reason: impl Into<String>) -> Self {
        GmError::Inconsistency {
            reason: reason.into(),
        }
    }

    pub fn switch(stage: &str, target: &str, reason: impl fmt::Display) -> Self {
        GmError::Switch {
            stage: stage.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach a stage name to an error raised below the checker
    pub fn at_stage(self, stage: &str) -> Self {
        match self {
            GmError::Precondition { .. }
            | GmError::Inconsistency { .. }
            | GmError::Throttled(_)
            | GmError::Switch { .. } => self,
            other => GmError::Precondition {
                stage: stage.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, GmError::Inconsistency { .. })
    }

    /// Outcomes that are part of normal operation rather than failures
    pub fn is_expected(&self) -> bool {
        matches!(self, GmError::Throttled(_))
    }
}

impl fmt::Display for GmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GmError::Connectivity { target, reason } => {
                write!(f, "connect {} failed: {}", target, reason)
            }
            GmError::Query {
                target,
                statement,
                reason,
            } => {
                write!(f, "execute [{}] on {} failed: {}", statement, target, reason)
            }
            GmError::Precondition { stage, reason } => write!(f, "{}: {}", stage, reason),
            GmError::Inconsistency { reason } => {
                write!(f, "inconsistent topology, operator required: {}", reason)
            }
            GmError::Throttled(decision) => write!(f, "switch throttled: {}", decision),
            GmError::Switch {
                stage,
                target,
                reason,
            } => {
                write!(f, "switch step {} on {} failed: {}", stage, target, reason)
            }
            GmError::Hadb(e) => write!(f, "status store error: {}", e),
            GmError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for GmError {}

impl From<HadbError> for GmError {
    fn from(err: HadbError) -> Self {
        GmError::Hadb(err)
    }
}
