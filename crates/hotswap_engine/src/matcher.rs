//! Production matcher: evaluation, refraction, and firing.
//!
//! The matcher owns every piece of per-session rule state:
//! - the [`Agenda`] of pending activations,
//! - per-rule refraction memory (tuples already fired),
//! - per-name fired counters, which survive rule removal,
//! - emitted records waiting to be drained.
//!
//! Rule sets are passed in by reference on every call, so a hot swap is a
//! call to [`Matcher::install`] followed by using the new set.

use std::collections::{BTreeMap, BTreeSet};

use hotswap_foundation::{Error, Event, EventId, Result, SemanticLimit, Timestamp};
use hotswap_storage::{EventStore, Sequence};
use tracing::{debug, info, trace, warn};

use crate::agenda::{Activation, ActivationState, Agenda};
use crate::pattern::PatternMatcher;
use crate::rule::{Action, RuleSet, RuleSetDiff};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default kill-switch threshold per [`Matcher::fire_all`] call.
pub const DEFAULT_MAX_ACTIVATIONS: usize = 10_000;

// =============================================================================
// Policy and Memory
// =============================================================================

/// Which facts a newly installed (added or changed) rule may fire against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RetroactivePolicy {
    /// Every fact in working memory, including those inserted before the update
    #[default]
    AllFacts,
    /// Only tuples containing at least one fact inserted after the update
    NewFactsOnly,
}

/// Refraction memory for one rule definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleMemory {
    /// Tuples this definition already fired for
    fired: BTreeSet<Vec<EventId>>,
    /// Tuples made only of events below this sequence are ignored
    horizon: Sequence,
}

impl RuleMemory {
    /// Creates empty memory with the given horizon.
    #[must_use]
    pub fn new(horizon: Sequence) -> Self {
        Self {
            fired: BTreeSet::new(),
            horizon,
        }
    }

    /// Returns true if this definition already fired for `events`.
    #[must_use]
    pub fn has_fired(&self, events: &[EventId]) -> bool {
        self.fired.contains(events)
    }

    /// Number of distinct tuples fired.
    #[must_use]
    pub fn fired_tuples(&self) -> usize {
        self.fired.len()
    }

    /// The first store sequence this definition may fire for.
    #[must_use]
    pub fn horizon(&self) -> Sequence {
        self.horizon
    }
}

/// A record produced by an `(emit :tag)` action.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Emission {
    /// Rule that fired
    pub rule: String,
    /// Emitted tag
    pub tag: String,
    /// Matched events
    pub events: Vec<EventId>,
    /// Clock time at firing
    pub at: Timestamp,
}

/// The durable part of matcher state, captured in session snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatcherState {
    /// Fired count per rule name
    pub counts: BTreeMap<String, u64>,
    /// Refraction memory per active rule
    pub memories: BTreeMap<String, RuleMemory>,
}

// =============================================================================
// Matcher
// =============================================================================

/// Evaluates rule sets against the event store and fires activations.
#[derive(Clone, Debug)]
pub struct Matcher {
    agenda: Agenda,
    state: MatcherState,
    emissions: Vec<Emission>,
    policy: RetroactivePolicy,
    /// Maximum activations per `fire_all` call
    max_activations: usize,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    /// Creates a new matcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agenda: Agenda::new(),
            state: MatcherState::default(),
            emissions: Vec::new(),
            policy: RetroactivePolicy::default(),
            max_activations: DEFAULT_MAX_ACTIVATIONS,
        }
    }

    /// Sets the maximum activations (kill switch threshold).
    #[must_use]
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations = max;
        self
    }

    /// Sets the retroactive policy for future installs.
    #[must_use]
    pub fn with_policy(mut self, policy: RetroactivePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Restores counters and refraction memory from a snapshot.
    #[must_use]
    pub fn with_state(mut self, state: MatcherState) -> Self {
        self.state = state;
        self
    }

    /// Returns the retroactive policy.
    #[must_use]
    pub fn policy(&self) -> RetroactivePolicy {
        self.policy
    }

    /// Returns the kill switch threshold.
    #[must_use]
    pub fn max_activations(&self) -> usize {
        self.max_activations
    }

    /// Returns counters and refraction memory.
    #[must_use]
    pub fn state(&self) -> &MatcherState {
        &self.state
    }

    /// Applies a rule-set diff.
    ///
    /// Removed and changed rules lose their pending activations and their
    /// refraction memory; added and changed rules start with fresh memory
    /// whose horizon follows the retroactive policy. Unchanged rules keep
    /// everything. Fired counters are never touched.
    ///
    /// Returns the discarded activations.
    pub fn install(&mut self, diff: &RuleSetDiff, store_len: usize) -> Vec<Activation> {
        let mut discarded = Vec::new();

        for name in diff.retired() {
            let dropped = self.agenda.discard_rule(name);
            if !dropped.is_empty() {
                debug!(rule = name, count = dropped.len(), "discarded pending activations");
            }
            discarded.extend(dropped);
            self.state.memories.remove(name);
        }

        let horizon = match self.policy {
            RetroactivePolicy::AllFacts => 0,
            RetroactivePolicy::NewFactsOnly => store_len,
        };
        for name in diff.installed() {
            self.state
                .memories
                .insert(name.to_string(), RuleMemory::new(horizon));
        }

        debug!(%diff, horizon, discarded = discarded.len(), "rule set installed");
        discarded
    }

    /// Scans `rules` against every event and queues new activations.
    ///
    /// Tuples already fired by the current definition, tuples below the
    /// rule's horizon, and tuples already pending are skipped.
    ///
    /// Returns the number of activations created.
    pub fn evaluate(&mut self, rules: &RuleSet, store: &EventStore, now: Timestamp) -> usize {
        self.prune_stale(rules, store, now);
        let mut created = 0;

        for rule in rules.rules().iter().filter(|r| r.enabled) {
            let memory = self.state.memories.entry(rule.name.clone()).or_default();

            for found in PatternMatcher::match_pattern(&rule.pattern, store, now) {
                if memory.has_fired(&found.events)
                    || found
                        .newest_sequence()
                        .is_some_and(|seq| seq < memory.horizon)
                    || self.agenda.contains(&rule.name, &found.events)
                {
                    continue;
                }

                let seq = self.agenda.push(&rule.name, rule.salience, found);
                trace!(rule = %rule.name, activation = seq, "activation created");
                created += 1;
            }
        }

        debug!(created, pending = self.agenda.len(), %now, "evaluation complete");
        created
    }

    /// Discards pending activations whose clock guards stopped holding at
    /// `now`, such as a `within` window that closed while they waited.
    fn prune_stale(&mut self, rules: &RuleSet, store: &EventStore, now: Timestamp) {
        if self.agenda.is_empty() {
            return;
        }
        let stale = self.agenda.discard_where(|activation| {
            let Some(rule) = rules.get(&activation.rule) else {
                return true;
            };
            let tuple: Option<Vec<&Event>> =
                activation.events.iter().map(|id| store.get(id)).collect();
            tuple.is_some_and(|tuple| rule.pattern.clock_guards_hold(&tuple, now))
        });
        if !stale.is_empty() {
            debug!(count = stale.len(), %now, "discarded stale activations");
        }
    }

    /// Fires every pending activation in agenda order.
    ///
    /// Returns the number fired.
    ///
    /// # Errors
    /// Returns `LimitExceeded` when more than `max_activations` would fire in
    /// one call; activations not yet fired stay pending.
    pub fn fire_all(&mut self, rules: &RuleSet, now: Timestamp) -> Result<usize> {
        let mut fired = 0;

        while !self.agenda.is_empty() {
            if fired >= self.max_activations {
                warn!(
                    limit = self.max_activations,
                    pending = self.agenda.len(),
                    "kill switch triggered"
                );
                return Err(Error::limit_exceeded(SemanticLimit::MaxActivations {
                    limit: self.max_activations,
                    context: Some(format!("{} activations still pending", self.agenda.len())),
                }));
            }

            let Some(activation) = self.agenda.pop_next() else {
                break;
            };
            if self.fire(activation, rules, now).is_some() {
                fired += 1;
            }
        }

        if fired > 0 {
            debug!(fired, %now, "fired activations");
        }
        Ok(fired)
    }

    /// Fires one activation, returning it in the `Fired` state.
    ///
    /// Returns `None` if its rule is no longer in `rules`.
    fn fire(&mut self, mut activation: Activation, rules: &RuleSet, now: Timestamp) -> Option<Activation> {
        let rule = rules.get(&activation.rule)?;

        self.state
            .memories
            .entry(rule.name.clone())
            .or_default()
            .fired
            .insert(activation.events.clone());
        *self.state.counts.entry(rule.name.clone()).or_insert(0) += 1;

        for action in &rule.actions {
            match action {
                Action::Emit(tag) => self.emissions.push(Emission {
                    rule: rule.name.clone(),
                    tag: tag.clone(),
                    events: activation.events.clone(),
                    at: now,
                }),
                Action::Log(message) => {
                    info!(rule = %rule.name, events = ?activation.events, "{message}");
                }
            }
        }

        activation.state = ActivationState::Fired;
        trace!(activation = %activation, "fired");
        Some(activation)
    }

    /// Times `name` has fired over the life of the session (0 if never).
    #[must_use]
    pub fn fired_count(&self, name: &str) -> u64 {
        self.state.counts.get(name).copied().unwrap_or(0)
    }

    /// Fired counts for every rule name that ever fired.
    #[must_use]
    pub fn fired_counts(&self) -> &BTreeMap<String, u64> {
        &self.state.counts
    }

    /// Refraction memory of an active rule.
    #[must_use]
    pub fn memory(&self, name: &str) -> Option<&RuleMemory> {
        self.state.memories.get(name)
    }

    /// Pending activations in firing order.
    #[must_use]
    pub fn pending(&self) -> Vec<&Activation> {
        self.agenda.in_order()
    }

    /// Returns true if activations are waiting to fire.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.agenda.is_empty()
    }

    /// Takes every emission recorded since the last drain.
    pub fn drain_emissions(&mut self) -> Vec<Emission> {
        std::mem::take(&mut self.emissions)
    }
}

// =============================================================================
// Tests
// =============================================================================
