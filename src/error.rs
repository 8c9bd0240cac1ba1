//! Error types for simulation setup and execution.
//!
//! Deadline misses, drops and preemptions are statistics, never errors.
//! Only two things can fail: a configuration that cannot describe a run,
//! and a broken internal invariant.

use thiserror::Error;

/// Fatal simulation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Configuration rejected before any run starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal bookkeeping is inconsistent. Signals a simulator bug.
    #[error("invariant violated at t={time}: {detail}")]
    InvariantViolation {
        /// Tick at which the check failed.
        time: i64,
        /// What was found.
        detail: String,
    },
}

impl SimError {
    pub(crate) fn invariant(time: i64, detail: impl Into<String>) -> Self {
        SimError::InvariantViolation {
            time,
            detail: detail.into(),
        }
    }
}
