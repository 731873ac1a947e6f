//! Error types for the HA status store client
//!
//! Every store call either fails in transport, is rejected by the store with a
//! non-zero code, or returns a payload that does not decode into the expected shape.

use std::fmt;

/// Status store error
#[derive(Debug)]
pub enum HadbError {
    /// Request could not be sent or timed out
    Transport { operation: String, reason: String },

    /// Store answered with `code != 0`
    Api {
        operation: String,
        code: i64,
        message: String,
    },

    /// `data` did not match the operation's response shape
    Decode { operation: String, reason: String },

    /// Operation succeeded but returned no rows where at least one is required
    Empty { operation: String, what: String },
}

impl HadbError {
    pub fn operation(&self) -> &str {
        match self {
            HadbError::Transport { operation, .. }
            | HadbError::Api { operation, .. }
            | HadbError::Decode { operation, .. }
            | HadbError::Empty { operation, .. } => operation,
        }
    }

    /// Transport failures are the only ones worth retrying on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, HadbError::Transport { .. })
    }
}

impl fmt::Display for HadbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HadbError::Transport { operation, reason } => {
                write!(f, "{} request failed: {}", operation, reason)
            }
            HadbError::Api {
                operation,
                code,
                message,
            } => {
                write!(
                    f,
                    "{} failed, return code:{}, msg:{}",
                    operation, code, message
                )
            }
            HadbError::Decode { operation, reason } => {
                write!(f, "{} returned undecodable data: {}", operation, reason)
            }
            HadbError::Empty { operation, what } => {
                write!(f, "{} returned no {}", operation, what)
            }
        }
    }
}

impl std::error::Error for HadbError {}
