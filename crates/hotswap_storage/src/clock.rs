//! Pseudo clock for event-time processing.
//!
//! The clock never moves on its own. Callers advance it explicitly, usually
//! to the timestamp of the event they just inserted.

use hotswap_foundation::{Duration, Error, Result, Timestamp};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A manually advanced, monotonically non-decreasing virtual clock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogicalClock {
    now: Timestamp,
}

impl LogicalClock {
    /// Creates a clock at the session epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at the given time.
    #[must_use]
    pub const fn starting_at(now: Timestamp) -> Self {
        Self { now }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    /// Moves the clock forward by `delta`.
    ///
    /// Returns true if time actually moved (a zero delta is a no-op).
    ///
    /// # Errors
    /// Returns `InvalidAdvance` if `delta` is negative or would overflow.
    pub fn advance(&mut self, delta: Duration) -> Result<bool> {
        if delta.is_negative() {
            return Err(Error::invalid_advance(delta.millis()));
        }
        let next = self
            .now
            .checked_add(delta)
            .ok_or_else(|| Error::invalid_advance(delta.millis()))?;

        let moved = next != self.now;
        if moved {
            trace!(from = %self.now, to = %next, "clock advanced");
        }
        self.now = next;
        Ok(moved)
    }

    /// Moves the clock to `max(now, target)`.
    ///
    /// Returns true if time actually moved. Targets in the past are ignored.
    pub fn advance_to(&mut self, target: Timestamp) -> bool {
        if target > self.now {
            trace!(from = %self.now, to = %target, "clock advanced");
            self.now = target;
            true
        } else {
            false
        }
    }
}
