//! Broker error types.

use thiserror::Error;
use timber_coordinator::CoordinatorError;
use timber_topic::TopicError;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors surfaced synchronously by the broker facade.
///
/// Everything here happens before a message is owned by its partition
/// queue. Post-enqueue failures (writer I/O, coordinator errors inside a
/// queue consumer) are logged and the affected message dropped; the only
/// synchronous trace of one is a dropped offset acknowledgment.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No topic directory exists for this name.
    #[error("topic not found: {topic}")]
    TopicNotFound {
        /// The topic name.
        topic: String,
    },

    /// No partition queue is registered for this (topic, partition).
    #[error("no queue for partition {partition} of topic {topic}")]
    QueueMissing {
        /// The topic name.
        topic: String,
        /// The partition index.
        partition: u32,
    },

    /// The message could not be serialized into a storable payload.
    #[error("payload serialization failed: {message}")]
    SerializationFailed {
        /// Why serialization was rejected.
        message: String,
    },

    /// The caller's cancellation token fired while waiting to enqueue.
    #[error("produce cancelled by caller")]
    Cancelled,

    /// The message was accepted but its offset acknowledgment never
    /// arrived; the queue consumer dropped it post-enqueue.
    #[error("message accepted but no offset acknowledgment arrived")]
    AckDropped,

    /// The offset acknowledgment did not arrive within the deadline.
    #[error("offset acknowledgment timed out after {waited_ms} ms")]
    AckTimeout {
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// The broker configuration failed validation at startup.
    #[error("invalid broker config: {message}")]
    Config {
        /// Which constraint was violated.
        message: &'static str,
    },

    /// A topic-side error (creation, existence, configuration).
    #[error(transparent)]
    Topic(#[from] TopicError),

    /// An offset-coordination error.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}
