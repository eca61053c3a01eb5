//! Events: the immutable, timestamped facts held in working memory.

use std::fmt;
use std::sync::Arc;

use im::OrdMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::value::Value;

/// Unique identifier of an event within a session.
///
/// Cloning is O(1).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EventId(Arc<str>);

impl EventId {
    /// Creates an event id from any string-like value.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

/// A timestamped fact.
///
/// Events are immutable once created: the builder methods consume `self`
/// and there are no setters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    id: EventId,
    timestamp: Timestamp,
    #[cfg_attr(feature = "serde", serde(default))]
    fields: OrdMap<String, Value>,
}

impl Event {
    /// Creates an event with no payload fields.
    #[must_use]
    pub fn new(id: impl Into<EventId>, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            fields: OrdMap::new(),
        }
    }

    /// Returns this event with a payload field added.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the event id.
    #[must_use]
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Returns the logical timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Gets a payload field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterates payload fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({} {}", self.id, self.timestamp)?;
        for (name, value) in &self.fields {
            write!(f, " :{name} {value:?}")?;
        }
        write!(f, ")")
    }
}
