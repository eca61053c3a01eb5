//! Rule sessions.
//!
//! A [`Session`] owns working memory, the logical clock, the active rule
//! set and the matcher. It is the public surface for inserting events,
//! advancing time, firing rules and swapping the rule set in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use hotswap_engine::{Activation, Emission, Matcher, MatcherState, RuleSet, RuleSetDiff};
use hotswap_foundation::{Duration, Error, ErrorKind, Event, Result, Timestamp};
use hotswap_storage::{EventStore, LogicalClock, Sequence};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SessionConfig;

/// Live state of an open session.
struct Live {
    store: EventStore,
    clock: LogicalClock,
    rules: Arc<RuleSet>,
    matcher: Matcher,
    config: SessionConfig,
    /// Set whenever facts, time or rules change since the last evaluation.
    dirty: bool,
}

/// A rule session over a growing set of events.
pub struct Session {
    live: Option<Live>,
}

impl Session {
    /// Opens a session with an initial rule set.
    #[must_use]
    pub fn open(rules: RuleSet, config: SessionConfig) -> Self {
        let mut matcher = Matcher::new()
            .with_policy(config.retroactive)
            .with_max_activations(config.max_activations);
        matcher.install(&RuleSet::empty().diff(&rules), 0);

        info!(
            version = rules.version(),
            package = rules.package().unwrap_or("-"),
            rules = rules.len(),
            start = %config.initial_time,
            "session opened"
        );

        Self {
            live: Some(Live {
                store: EventStore::new(),
                clock: LogicalClock::starting_at(config.initial_time),
                rules: Arc::new(rules),
                matcher,
                config,
                dirty: true,
            }),
        }
    }

    /// Opens a session with the default configuration.
    #[must_use]
    pub fn with_rules(rules: RuleSet) -> Self {
        Self::open(rules, SessionConfig::default())
    }

    fn live(&self) -> Result<&Live> {
        self.live.as_ref().ok_or_else(Error::session_closed)
    }

    fn live_mut(&mut self) -> Result<&mut Live> {
        self.live.as_mut().ok_or_else(Error::session_closed)
    }

    // -------------------------------------------------------------------------
    // Facts and time
    // -------------------------------------------------------------------------

    /// Inserts an event without touching the clock.
    ///
    /// # Errors
    /// Returns `DuplicateId` or `SessionClosed`.
    pub fn insert(&mut self, event: Event) -> Result<Sequence> {
        let live = self.live_mut()?;
        let seq = live.store.insert(event)?;
        live.dirty = true;
        Ok(seq)
    }

    /// Inserts an event, then advances the clock to its timestamp if later.
    ///
    /// # Errors
    /// Returns `DuplicateId` (clock untouched) or `SessionClosed`.
    pub fn insert_and_advance(&mut self, event: Event) -> Result<Sequence> {
        let live = self.live_mut()?;
        let timestamp = event.timestamp();
        let seq = live.store.insert(event)?;
        live.clock.advance_to(timestamp);
        live.dirty = true;
        Ok(seq)
    }

    /// Advances the clock by `delta`, returning the new time.
    ///
    /// # Errors
    /// Returns `InvalidAdvance` for negative or overflowing deltas, or
    /// `SessionClosed`.
    pub fn advance(&mut self, delta: Duration) -> Result<Timestamp> {
        let live = self.live_mut()?;
        if live.clock.advance(delta)? {
            live.dirty = true;
        }
        Ok(live.clock.now())
    }

    /// Returns the current virtual time.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn now(&self) -> Result<Timestamp> {
        Ok(self.live()?.clock.now())
    }

    /// Returns working memory.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn events(&self) -> Result<&EventStore> {
        Ok(&self.live()?.store)
    }

    // -------------------------------------------------------------------------
    // Matching and firing
    // -------------------------------------------------------------------------

    /// Queues activations for every new match, returning how many.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn evaluate(&mut self) -> Result<usize> {
        let live = self.live_mut()?;
        // One snapshot of the rule set for the whole pass
        let rules = Arc::clone(&live.rules);
        let created = live.matcher.evaluate(&rules, &live.store, live.clock.now());
        live.dirty = false;
        Ok(created)
    }

    /// Evaluates (if anything changed) and fires every pending activation.
    ///
    /// Returns the number of rules fired; `Ok(0)` when nothing matched.
    ///
    /// # Errors
    /// Returns `LimitExceeded` if the kill switch triggers (unfired
    /// activations stay pending), or `SessionClosed`.
    pub fn fire_all_rules(&mut self) -> Result<usize> {
        let live = self.live_mut()?;
        if !live.dirty && !live.matcher.has_pending() {
            return Ok(0);
        }

        let rules = Arc::clone(&live.rules);
        let now = live.clock.now();
        if live.dirty {
            live.matcher.evaluate(&rules, &live.store, now);
            live.dirty = false;
        }
        live.matcher.fire_all(&rules, now)
    }

    /// Activations waiting to fire, in firing order.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn pending_activations(&self) -> Result<Vec<Activation>> {
        Ok(self
            .live()?
            .matcher
            .pending()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Times the named rule has fired over the life of the session.
    ///
    /// Counts survive removal of the rule; unknown names report 0.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn fired_count(&self, name: &str) -> Result<u64> {
        Ok(self.live()?.matcher.fired_count(name))
    }

    /// Fired counts for every rule name that ever fired.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn fired_counts(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self.live()?.matcher.fired_counts().clone())
    }

    /// Takes every `(emit ...)` record produced since the last drain.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn drain_emissions(&mut self) -> Result<Vec<Emission>> {
        Ok(self.live_mut()?.matcher.drain_emissions())
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Returns the active rule set.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn rule_set(&self) -> Result<Arc<RuleSet>> {
        Ok(Arc::clone(&self.live()?.rules))
    }

    /// Replaces the active rule set.
    ///
    /// Unchanged rules keep their refraction memory; added and changed rules
    /// are matched against existing facts on the next evaluation; removed and
    /// changed rules lose their pending activations.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn update_rules(&mut self, next: RuleSet) -> Result<RuleSetDiff> {
        let live = self.live_mut()?;
        let diff = live.rules.diff(&next);
        let discarded = live.matcher.install(&diff, live.store.len());

        info!(
            from = live.rules.version(),
            to = next.version(),
            added = ?diff.added,
            removed = ?diff.removed,
            changed = ?diff.changed,
            discarded = discarded.len(),
            "rule set updated"
        );

        live.rules = Arc::new(next);
        live.dirty = true;
        Ok(diff)
    }

    /// Returns the session configuration.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn config(&self) -> Result<&SessionConfig> {
        Ok(&self.live()?.config)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Releases all session state. Every later call fails with
    /// `SessionClosed`; disposing twice is a no-op.
    pub fn dispose(&mut self) {
        if let Some(live) = self.live.take() {
            info!(
                events = live.store.len(),
                now = %live.clock.now(),
                "session disposed"
            );
        }
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.live.is_none()
    }

    /// Captures everything needed to rebuild this session.
    ///
    /// Pending activations are not captured; they are re-derived on restore.
    ///
    /// # Errors
    /// Returns `SessionClosed`.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let live = self.live()?;
        Ok(SessionSnapshot {
            config: live.config.clone(),
            now: live.clock.now(),
            store: live.store.clone(),
            rules: (*live.rules).clone(),
            matcher: live.matcher.state().clone(),
        })
    }

    /// Rebuilds a session from a snapshot.
    ///
    /// # Errors
    /// Returns a `SerializationError` if refraction memory names a rule
    /// outside the rule set or a horizon past the end of the store.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self> {
        let SessionSnapshot {
            config,
            now,
            store,
            rules,
            matcher,
        } = snapshot;

        for (name, memory) in &matcher.memories {
            if !rules.contains(name) {
                return Err(Error::new(ErrorKind::SerializationError(format!(
                    "snapshot holds memory for unknown rule '{name}'"
                ))));
            }
            if memory.horizon() > store.len() {
                return Err(Error::new(ErrorKind::SerializationError(format!(
                    "snapshot horizon {} for rule '{name}' exceeds {} events",
                    memory.horizon(),
                    store.len()
                ))));
            }
        }

        debug!(events = store.len(), %now, version = rules.version(), "session restored");

        Ok(Self {
            live: Some(Live {
                matcher: Matcher::new()
                    .with_policy(config.retroactive)
                    .with_max_activations(config.max_activations)
                    .with_state(matcher),
                store,
                clock: LogicalClock::starting_at(now),
                rules: Arc::new(rules),
                config,
                dirty: true,
            }),
        })
    }
}

/// Serializable session state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session configuration
    pub config: SessionConfig,
    /// Clock time
    pub now: Timestamp,
    /// Working memory
    pub store: EventStore,
    /// Active rule set
    pub rules: RuleSet,
    /// Fired counts and refraction memory
    pub matcher: MatcherState,
}
