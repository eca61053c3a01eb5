//! Thread-safe session handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use hotswap_engine::{RuleSet, RuleSetDiff};
use hotswap_foundation::{Duration, Event, Result, Timestamp};
use hotswap_storage::Sequence;
use parking_lot::Mutex;

use crate::session::Session;

/// A [`Session`] shared between threads.
///
/// Every call holds the lock for its whole duration, so an update never
/// interleaves with an evaluation.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    /// Wraps a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// See [`Session::insert_and_advance`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn insert_and_advance(&self, event: Event) -> Result<Sequence> {
        self.inner.lock().insert_and_advance(event)
    }

    /// See [`Session::advance`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn advance(&self, delta: Duration) -> Result<Timestamp> {
        self.inner.lock().advance(delta)
    }

    /// See [`Session::fire_all_rules`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn fire_all_rules(&self) -> Result<usize> {
        self.inner.lock().fire_all_rules()
    }

    /// See [`Session::update_rules`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn update_rules(&self, next: RuleSet) -> Result<RuleSetDiff> {
        self.inner.lock().update_rules(next)
    }

    /// See [`Session::fired_count`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn fired_count(&self, name: &str) -> Result<u64> {
        self.inner.lock().fired_count(name)
    }

    /// See [`Session::fired_counts`].
    ///
    /// # Errors
    /// Propagates the session error.
    pub fn fired_counts(&self) -> Result<BTreeMap<String, u64>> {
        self.inner.lock().fired_counts()
    }

    /// See [`Session::dispose`].
    pub fn dispose(&self) {
        self.inner.lock().dispose();
    }
}
