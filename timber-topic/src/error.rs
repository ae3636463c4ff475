//! Topic error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for topic operations.
pub type TopicResult<T> = Result<T, TopicError>;

/// Errors that can occur managing topics.
#[derive(Debug, Error)]
pub enum TopicError {
    /// A topic with this name already has a directory on disk.
    #[error("topic already exists: {topic}")]
    AlreadyExists {
        /// The topic name.
        topic: String,
    },

    /// The topic configuration failed validation.
    #[error("invalid topic config: {message}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        message: String,
    },

    /// The topic name is empty or not filesystem-safe.
    #[error("invalid topic name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// The configuration document could not be read.
    #[error("config unavailable for topic {topic}: {message}")]
    ConfigUnavailable {
        /// The topic name.
        topic: String,
        /// I/O error description.
        message: String,
    },

    /// The configuration document could not be decoded.
    #[error("config malformed for topic {topic}: {message}")]
    ConfigMalformed {
        /// The topic name.
        topic: String,
        /// Decode error description.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error during {operation} on {path}: {message}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// Error description.
        message: String,
    },
}

impl TopicError {
    /// Creates an I/O error for `operation` on `path`.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            message: err.to_string(),
        }
    }
}
