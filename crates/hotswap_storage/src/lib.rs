//! Working memory and virtual time for hotswap.
//!
//! This crate provides:
//! - [`EventStore`] - Append-only working memory with id and insertion-order lookup
//! - [`LogicalClock`] - Manually advanced pseudo clock

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod store;

pub use clock::LogicalClock;
pub use store::{EventStore, Sequence};
