//! Timber Server - the HTTP intake in front of the broker.
//!
//! Two POST endpoints decode JSON request bodies and delegate to the
//! broker facade:
//!
//! - `POST /create-topic` creates a topic (201, or 400 with a message)
//! - `POST /produce` appends a message and returns its metadata (200, or
//!   400 with a message)
//!
//! Anything but POST on these routes is answered with 405 by the method
//! router.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod http;
