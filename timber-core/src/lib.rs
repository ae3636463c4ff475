//! Timber Core - shared types and on-disk record formats for the timber broker.
//!
//! This crate holds everything both the broker and its callers agree on:
//! the strongly-typed offset/partition/timestamp wrappers, the textual
//! log and index record formats, the key partitioner, and system limits.
//!
//! # Design Principles
//!
//! - **Strongly-typed wrappers**: Prevent mixing up offsets with byte positions
//! - **Explicit limits**: Every resource has a bounded maximum
//! - **The record formats are a contract**: identical bytes for identical inputs
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod hash;
mod limits;
mod record;
mod types;

pub use hash::{murmur3_32, partition_for_key};
pub use limits::Limits;
pub use record::{IndexRecord, LogRecord, RecordError, RecordResult, FIELD_SEPARATOR, INDEX_HEADER};
pub use types::{Offset, PartitionIndex, Timestamp};
