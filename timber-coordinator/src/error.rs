//! Coordinator error types.

use thiserror::Error;

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors that can occur during offset coordination.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The backing key-value store could not be reached.
    #[error("store unavailable during {operation}: {message}")]
    Unavailable {
        /// The operation that was being performed.
        operation: &'static str,
        /// Transport error description.
        message: String,
    },

    /// Compare-and-swap contention exhausted the retry budget.
    #[error("compare-and-swap conflict on {key} after {attempts} attempts")]
    Conflict {
        /// The contested coordinator key.
        key: String,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The stored value is not a valid integer.
    #[error("stored value for {key} is not an integer: {value:?}")]
    Malformed {
        /// The coordinator key.
        key: String,
        /// The raw stored value.
        value: String,
    },

    /// A store operation exceeded its deadline.
    #[error("{operation} timed out after {waited_ms} ms")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// How long the operation waited, in milliseconds.
        waited_ms: u64,
    },
}
