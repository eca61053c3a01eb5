//! Activations and the agenda that orders them.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

use hotswap_foundation::EventId;

use crate::pattern::{Bindings, Match};

// =============================================================================
// Activation
// =============================================================================

/// Lifecycle of an activation. `Fired` and `Discarded` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// Queued, waiting to fire
    Pending,
    /// The rule's actions ran for this tuple
    Fired,
    /// Dropped before firing (rule removed or changed)
    Discarded,
}

/// A rule activation: one rule matched against one event tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    /// Creation order, unique within an agenda
    pub sequence: u64,
    /// Which rule
    pub rule: String,
    /// Rule salience at creation
    pub salience: i32,
    /// Matched events, one per pattern variable
    pub events: Vec<EventId>,
    /// Value-variable bindings
    pub bindings: Bindings,
    /// Current state
    pub state: ActivationState,
}

impl Activation {
    /// Returns true if this activation is for `rule` over `events`.
    #[must_use]
    pub fn is_for(&self, rule: &str, events: &[EventId]) -> bool {
        self.rule == rule && self.events == events
    }

    fn priority(&self) -> (i32, Reverse<u64>) {
        (self.salience, Reverse(self.sequence))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} [", self.sequence, self.rule)?;
        for (i, id) in self.events.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "]")
    }
}

// =============================================================================
// Agenda
// =============================================================================

/// Heap entry ordered by activation priority.
#[derive(Clone, Debug)]
struct Queued(Activation);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.0.sequence == other.0.sequence
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.priority().cmp(&other.0.priority())
    }
}

/// Queue of pending activations.
///
/// Firing order is higher salience first, then creation order. Pending
/// tuples are indexed per rule so duplicate checks do not scan the queue.
#[derive(Clone, Debug, Default)]
pub struct Agenda {
    pending: BinaryHeap<Queued>,
    keys: HashMap<String, HashSet<Vec<EventId>>>,
    next_sequence: u64,
}

impl Agenda {
    /// Creates an empty agenda.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new pending activation and returns its sequence number.
    pub fn push(&mut self, rule: &str, salience: i32, found: Match) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.keys
            .entry(rule.to_string())
            .or_default()
            .insert(found.events.clone());
        self.pending.push(Queued(Activation {
            sequence,
            rule: rule.to_string(),
            salience,
            events: found.events,
            bindings: found.bindings,
            state: ActivationState::Pending,
        }));
        sequence
    }

    /// Returns true if an activation for `rule` over `events` is pending.
    #[must_use]
    pub fn contains(&self, rule: &str, events: &[EventId]) -> bool {
        self.keys.get(rule).is_some_and(|tuples| tuples.contains(events))
    }

    /// Removes and returns the highest-priority activation.
    pub fn pop_next(&mut self) -> Option<Activation> {
        let Queued(activation) = self.pending.pop()?;
        if let Some(tuples) = self.keys.get_mut(&activation.rule) {
            tuples.remove(&activation.events);
            if tuples.is_empty() {
                self.keys.remove(&activation.rule);
            }
        }
        Some(activation)
    }

    /// Drops every pending activation of `rule`, returning them as `Discarded`.
    pub fn discard_rule(&mut self, rule: &str) -> Vec<Activation> {
        if self.keys.remove(rule).is_none() {
            return Vec::new();
        }
        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_vec()
            .into_iter()
            .partition(|q| q.0.rule == rule);
        self.pending = BinaryHeap::from(kept);
        dropped
            .into_iter()
            .map(|Queued(mut activation)| {
                activation.state = ActivationState::Discarded;
                activation
            })
            .collect()
    }

    /// Drops pending activations rejected by `keep`, returning them as
    /// `Discarded`.
    pub fn discard_where(&mut self, mut keep: impl FnMut(&Activation) -> bool) -> Vec<Activation> {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_vec()
            .into_iter()
            .partition(|q| keep(&q.0));
        self.pending = BinaryHeap::from(kept);
        dropped
            .into_iter()
            .map(|Queued(mut activation)| {
                if let Some(tuples) = self.keys.get_mut(&activation.rule) {
                    tuples.remove(&activation.events);
                    if tuples.is_empty() {
                        self.keys.remove(&activation.rule);
                    }
                }
                activation.state = ActivationState::Discarded;
                activation
            })
            .collect()
    }

    /// Pending activations in firing order.
    #[must_use]
    pub fn in_order(&self) -> Vec<&Activation> {
        let mut ordered: Vec<_> = self.pending.iter().map(|q| &q.0).collect();
        ordered.sort_by_key(|a| Reverse(a.priority()));
        ordered
    }

    /// Number of pending activations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
