//! Append-only working memory.
//!
//! The `EventStore` holds every event inserted into a session, in insertion
//! order. Events are never removed or modified; each one is assigned a
//! [`Sequence`] number equal to its insertion position.

use hotswap_foundation::{Error, Event, EventId, Result};
use im::{HashMap, Vector};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Insertion position of an event (0-based).
pub type Sequence = usize;

/// Append-only store of events.
///
/// Backed by persistent collections, so cloning the store for a snapshot
/// is O(1) and inserts are O(log n).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventStore {
    /// Events in insertion order.
    events: Vector<Event>,
    /// Map from event id to insertion sequence.
    index: HashMap<EventId, Sequence>,
}

impl EventStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event, returning its sequence number.
    ///
    /// # Errors
    /// Returns `DuplicateId` if an event with the same id is already held.
    pub fn insert(&mut self, event: Event) -> Result<Sequence> {
        if self.index.contains_key(event.id()) {
            return Err(Error::duplicate_id(event.id().clone()));
        }

        let seq = self.events.len();
        trace!(id = %event.id(), seq, timestamp = %event.timestamp(), "event stored");
        self.index.insert(event.id().clone(), seq);
        self.events.push_back(event);
        Ok(seq)
    }

    /// Returns all events in insertion order.
    ///
    /// Each call starts a fresh pass over the store.
    pub fn all_events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    /// Returns all events paired with their sequence numbers.
    pub fn sequenced(&self) -> impl Iterator<Item = (Sequence, &Event)> + '_ {
        self.events.iter().enumerate()
    }

    /// Gets an event by id.
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.index.get(id).and_then(|&seq| self.events.get(seq))
    }

    /// Gets an event by sequence number.
    #[must_use]
    pub fn get_by_sequence(&self, seq: Sequence) -> Option<&Event> {
        self.events.get(seq)
    }

    /// Returns the sequence number of an event.
    #[must_use]
    pub fn sequence_of(&self, id: &EventId) -> Option<Sequence> {
        self.index.get(id).copied()
    }

    /// Returns true if an event with this id is held.
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the number of events held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
