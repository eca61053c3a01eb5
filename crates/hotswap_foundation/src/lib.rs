//! Core types, values, events, and errors for hotswap.
//!
//! This crate provides:
//! - [`Value`] - Scalar payload values carried by events
//! - [`EventId`] and [`Event`] - Immutable timestamped facts
//! - [`Timestamp`] and [`Duration`] - Logical millisecond time
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod time;
pub mod value;

pub use error::{Error, ErrorContext, ErrorKind, SemanticLimit};
pub use event::{Event, EventId};
pub use time::{Duration, Timestamp};
pub use value::Value;

/// Result type alias using hotswap's Error type.
pub type Result<T> = std::result::Result<T, Error>;
