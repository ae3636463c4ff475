//! Timber Broker - the partitioned enqueue pipeline and batched writers.
//!
//! Producers hand a `(topic, key, message)` triple to the [`Broker`]; the
//! broker routes the key to a partition, enqueues the message on that
//! partition's bounded queue, and returns. A single consumer task per
//! partition stamps each message with a timestamp, a strictly monotonic
//! offset, and its byte range, then forwards one log line and one index
//! line to the two global writer singletons, which batch appends per file
//! and flush on a size threshold or a periodic tick.
//!
//! ```text
//! produce() ──► partition queue ──► queue consumer ──► log writer ──► <t>-<p>.log
//!                 (bounded mpsc)     (stamps offset,  └► index writer ► <t>-<p>.index
//!                                     timestamp, bytes)
//! ```
//!
//! Within a partition, records land in offset order with contiguous byte
//! ranges; across partitions there is no ordering. A completed `produce`
//! call is not a durability guarantee: entries become durable when the
//! owning writer flushes (and fsyncs, if configured).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod broker;
mod config;
mod error;
mod queue;
mod writer;

pub use broker::{Ack, Broker, ProduceMetadata};
pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult};
pub use writer::{spawn_writer, WriterClosed, WriterConfig, WriterHandle, WriterKind};
