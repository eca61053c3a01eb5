//! Session lifecycle tests
//!
//! Opening, inserting, advancing time, the kill switch, and disposal.

use hotswap_engine::{RuleCompiler, RuleSet};
use hotswap_foundation::{Duration, ErrorKind, Event, EventId, SemanticLimit, Timestamp};
use hotswap_runtime::{Session, SessionConfig};

fn one_rule() -> RuleSet {
    RuleCompiler::compile_source("(rule: One :where [[?e :event]])").unwrap()
}

// =============================================================================
// Facts and Time
// =============================================================================

#[test]
fn session_starts_at_configured_time() {
    let config = SessionConfig::new().with_initial_time(Timestamp::from_millis(1_000));
    let session = Session::open(one_rule(), config);
    assert_eq!(session.now().unwrap().millis(), 1_000);
    assert!(session.events().unwrap().is_empty());
    assert_eq!(session.config().unwrap().max_activations, 10_000);
}

#[test]
fn insert_and_advance_never_rewinds_the_clock() {
    let mut session = Session::with_rules(one_rule());
    session.insert_and_advance(Event::new("late", 9_000)).unwrap();
    session.insert_and_advance(Event::new("early", 1_000)).unwrap();

    assert_eq!(session.now().unwrap().millis(), 9_000);
    assert_eq!(session.events().unwrap().len(), 2);
    assert_eq!(session.fire_all_rules().unwrap(), 2);
}

#[test]
fn plain_insert_leaves_clock_alone() {
    let mut session = Session::with_rules(one_rule());
    session.insert(Event::new("1", 5_000)).unwrap();
    assert_eq!(session.now().unwrap(), Timestamp::ZERO);
}

#[test]
fn duplicate_insert_fails_without_side_effects() {
    let mut session = Session::with_rules(one_rule());
    session.insert_and_advance(Event::new("1", 0)).unwrap();
    session.fire_all_rules().unwrap();

    let err = session.insert_and_advance(Event::new("1", 50_000)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateId(ref id) if *id == EventId::new("1")));
    assert_eq!(session.now().unwrap().millis(), 0);
    assert_eq!(session.fire_all_rules().unwrap(), 0);
}

#[test]
fn advance_drives_time_guards() {
    let rules = RuleCompiler::compile_source(
        "(rule: Stale :where [[?e :event]] :guard [(older-than ?e 10s)])",
    )
    .unwrap();
    let mut session = Session::with_rules(rules);
    session.insert_and_advance(Event::new("1", 0)).unwrap();
    assert_eq!(session.fire_all_rules().unwrap(), 0);

    assert_eq!(session.advance(Duration::from_secs(10)).unwrap().millis(), 10_000);
    assert_eq!(session.fire_all_rules().unwrap(), 1);
}

#[test]
fn negative_advance_is_rejected() {
    let mut session = Session::with_rules(one_rule());
    let err = session.advance(Duration::from_millis(-1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidAdvance { delta: -1 }));
    assert_eq!(session.now().unwrap(), Timestamp::ZERO);
}

// =============================================================================
// Firing
// =============================================================================

#[test]
fn fire_with_nothing_to_do_returns_zero() {
    let mut session = Session::with_rules(RuleSet::empty());
    assert_eq!(session.fire_all_rules().unwrap(), 0);
    session.insert_and_advance(Event::new("1", 0)).unwrap();
    assert_eq!(session.fire_all_rules().unwrap(), 0);
    assert!(session.fired_counts().unwrap().is_empty());
}

#[test]
fn evaluate_then_inspect_pending() {
    let mut session = Session::with_rules(one_rule());
    session.insert_and_advance(Event::new("1", 0)).unwrap();
    assert_eq!(session.evaluate().unwrap(), 1);

    let pending = session.pending_activations().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].rule, "One");
    assert_eq!(session.fire_all_rules().unwrap(), 1);
    assert!(session.pending_activations().unwrap().is_empty());
}

#[test]
fn kill_switch_stops_runaway_firing() {
    let config = SessionConfig::new().with_max_activations(2);
    let mut session = Session::open(one_rule(), config);
    for i in 0..5 {
        session.insert(Event::new(format!("e{i}"), i)).unwrap();
    }

    let err = session.fire_all_rules().unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxActivations { limit: 2, .. })
    ));
    assert_eq!(session.fired_count("One").unwrap(), 2);
    assert_eq!(session.pending_activations().unwrap().len(), 3);

    // Each later call fires up to the limit again
    assert!(session.fire_all_rules().is_err());
    assert_eq!(session.fire_all_rules().unwrap(), 1);
    assert_eq!(session.fired_count("One").unwrap(), 5);
}

// =============================================================================
// Disposal
// =============================================================================

#[test]
fn dispose_closes_every_operation() {
    let mut session = Session::with_rules(one_rule());
    session.insert_and_advance(Event::new("1", 0)).unwrap();
    session.dispose();
    assert!(session.is_disposed());

    assert!(session.insert(Event::new("2", 0)).unwrap_err().is_session_closed());
    assert!(session.insert_and_advance(Event::new("2", 0)).unwrap_err().is_session_closed());
    assert!(session.advance(Duration::from_secs(1)).unwrap_err().is_session_closed());
    assert!(session.now().unwrap_err().is_session_closed());
    assert!(session.events().unwrap_err().is_session_closed());
    assert!(session.evaluate().unwrap_err().is_session_closed());
    assert!(session.fire_all_rules().unwrap_err().is_session_closed());
    assert!(session.pending_activations().unwrap_err().is_session_closed());
    assert!(session.fired_count("One").unwrap_err().is_session_closed());
    assert!(session.fired_counts().unwrap_err().is_session_closed());
    assert!(session.drain_emissions().unwrap_err().is_session_closed());
    assert!(session.rule_set().unwrap_err().is_session_closed());
    assert!(session.update_rules(RuleSet::empty()).unwrap_err().is_session_closed());
    assert!(session.config().unwrap_err().is_session_closed());
    assert!(session.snapshot().unwrap_err().is_session_closed());
}

#[test]
fn dispose_is_idempotent() {
    let mut session = Session::with_rules(one_rule());
    session.dispose();
    session.dispose();
    assert!(session.is_disposed());
}
