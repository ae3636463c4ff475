//! Timber Topic - topic lifecycle and on-disk layout.
//!
//! A topic is a directory tree under `<base>/topics/`:
//!
//! ```text
//! <base>/topics/<name>/<name>.json            topic config (pretty JSON)
//! <base>/topics/<name>/<name>-<i>.log         partition i log
//! <base>/topics/<name>/index/<name>-<i>.index partition i index (header line first)
//! <base>/topics/<name>/meta/<name>-<i>.json   legacy per-partition offset file
//! ```
//!
//! The [`TopicManager`] owns directory creation and the configuration
//! document, and fronts the filesystem with two TTL caches: a 60 s
//! existence cache and a 10 s configuration cache.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod cache;
mod config;
mod error;
mod layout;
mod manager;

pub use cache::TtlCache;
pub use config::{PartitionMeta, TopicConfig, HASH_STRATEGY};
pub use error::{TopicError, TopicResult};
pub use layout::TopicLayout;
pub use manager::{TopicManager, TopicManagerConfig};
