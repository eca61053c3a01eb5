//! Hot rule update tests
//!
//! Replacing the rule set of a running session: added, removed, changed,
//! and renamed rules, under both retroactive policies.

use hotswap_engine::{RuleCompiler, RuleSet};
use hotswap_foundation::Event;
use hotswap_runtime::{RetroactivePolicy, Session, SessionConfig};

const ONE: &str = "(rule: SimpleTestRule-One :where [[?e :event]])";
const TWO: &str = "(rule: SimpleTestRule-Two
                     :where [[?a :event] [?b :event]]
                     :guard [(after ?b ?a 20s 30s)])";
const THREE: &str = "(rule: SimpleTestRule-Three :where [[?e :event]])";

fn rules(parts: &[&str]) -> RuleSet {
    RuleCompiler::compile_source(&parts.join("\n")).unwrap()
}

fn insert_and_fire(session: &mut Session, id: &str, timestamp: i64) -> usize {
    session
        .insert_and_advance(Event::new(id, timestamp))
        .unwrap();
    session.fire_all_rules().unwrap()
}

fn count(session: &Session, name: &str) -> u64 {
    session.fired_count(name).unwrap()
}

// =============================================================================
// Reference Scenario
// =============================================================================

#[test]
fn original_rules_only() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 5_000);

    assert_eq!(count(&session, "SimpleTestRule-One"), 2);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 0);

    insert_and_fire(&mut session, "3", 21_000);
    assert_eq!(count(&session, "SimpleTestRule-One"), 3);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
    assert_eq!(session.now().unwrap().millis(), 21_000);
}

#[test]
fn added_rule_fires_retroactively() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 5_000);

    let diff = session.update_rules(rules(&[ONE, TWO, THREE])).unwrap();
    assert_eq!(diff.added, vec!["SimpleTestRule-Three"]);
    assert_eq!(diff.unchanged.len(), 2);

    insert_and_fire(&mut session, "3", 21_000);

    assert_eq!(count(&session, "SimpleTestRule-One"), 3);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
    assert_eq!(count(&session, "SimpleTestRule-Three"), 3);
}

#[test]
fn update_is_visible_without_new_events() {
    let mut session = Session::with_rules(rules(&[ONE]));
    insert_and_fire(&mut session, "1", 0);
    assert_eq!(session.fire_all_rules().unwrap(), 0);

    session.update_rules(rules(&[ONE, THREE])).unwrap();
    assert_eq!(session.fire_all_rules().unwrap(), 1);
    assert_eq!(count(&session, "SimpleTestRule-One"), 1);
}

// =============================================================================
// Removal, Change, Rename
// =============================================================================

#[test]
fn removed_rule_stops_firing() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);

    session.update_rules(rules(&[ONE])).unwrap();
    insert_and_fire(&mut session, "2", 25_000);

    assert_eq!(count(&session, "SimpleTestRule-One"), 2);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 0);
}

#[test]
fn removal_discards_unfired_activations_and_keeps_counts() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 25_000);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);

    session.insert_and_advance(Event::new("3", 50_000)).unwrap();
    session.evaluate().unwrap();
    assert!(
        session
            .pending_activations()
            .unwrap()
            .iter()
            .any(|a| a.rule == "SimpleTestRule-Two")
    );

    session.update_rules(rules(&[ONE])).unwrap();
    assert!(
        session
            .pending_activations()
            .unwrap()
            .iter()
            .all(|a| a.rule != "SimpleTestRule-Two")
    );

    session.fire_all_rules().unwrap();
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
    assert_eq!(count(&session, "SimpleTestRule-One"), 3);
}

#[test]
fn removed_then_readded_rule_refires() {
    let mut session = Session::with_rules(rules(&[ONE, THREE]));
    insert_and_fire(&mut session, "1", 0);
    session.update_rules(rules(&[ONE])).unwrap();
    session.fire_all_rules().unwrap();
    session.update_rules(rules(&[ONE, THREE])).unwrap();
    session.fire_all_rules().unwrap();

    assert_eq!(count(&session, "SimpleTestRule-Three"), 2);
}

#[test]
fn changed_rule_refires_against_existing_facts() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 15_000);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 0);

    let widened = "(rule: SimpleTestRule-Two
                     :where [[?a :event] [?b :event]]
                     :guard [(after ?b ?a 10s 30s)])";
    let diff = session.update_rules(rules(&[ONE, widened])).unwrap();
    assert_eq!(diff.changed, vec!["SimpleTestRule-Two"]);

    assert_eq!(session.fire_all_rules().unwrap(), 1);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
    assert_eq!(count(&session, "SimpleTestRule-One"), 2);
}

#[test]
fn changed_rule_counter_continues() {
    let mut session = Session::with_rules(rules(&[ONE]));
    insert_and_fire(&mut session, "1", 0);

    session
        .update_rules(rules(&["(rule: SimpleTestRule-One :salience 5 :where [[?e :event]])"]))
        .unwrap();
    session.fire_all_rules().unwrap();

    assert_eq!(count(&session, "SimpleTestRule-One"), 2);
}

#[test]
fn renamed_rule_is_remove_plus_add() {
    let mut session = Session::with_rules(rules(&[ONE]));
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 1_000);

    let diff = session
        .update_rules(rules(&["(rule: SimpleTestRule-Uno :where [[?e :event]])"]))
        .unwrap();
    assert_eq!(diff.removed, vec!["SimpleTestRule-One"]);
    assert_eq!(diff.added, vec!["SimpleTestRule-Uno"]);

    session.fire_all_rules().unwrap();
    assert_eq!(count(&session, "SimpleTestRule-One"), 2);
    assert_eq!(count(&session, "SimpleTestRule-Uno"), 2);
}

#[test]
fn identical_update_changes_nothing() {
    let mut session = Session::with_rules(rules(&[ONE, TWO]));
    insert_and_fire(&mut session, "1", 0);

    let diff = session.update_rules(rules(&[ONE, TWO])).unwrap();
    assert!(diff.is_noop());
    assert_eq!(session.fire_all_rules().unwrap(), 0);
    assert_eq!(count(&session, "SimpleTestRule-One"), 1);
}

#[test]
fn update_to_empty_set() {
    let mut session = Session::with_rules(rules(&[ONE]));
    insert_and_fire(&mut session, "1", 0);
    session.update_rules(RuleSet::empty()).unwrap();

    assert_eq!(insert_and_fire(&mut session, "2", 1), 0);
    assert_eq!(count(&session, "SimpleTestRule-One"), 1);
}

// =============================================================================
// Retroactive Policy
// =============================================================================

#[test]
fn new_facts_only_limits_added_rules() {
    let config = SessionConfig::new().with_retroactive(RetroactivePolicy::NewFactsOnly);
    let mut session = Session::open(rules(&[ONE, TWO]), config);
    insert_and_fire(&mut session, "1", 0);
    insert_and_fire(&mut session, "2", 5_000);

    session.update_rules(rules(&[ONE, TWO, THREE])).unwrap();
    assert_eq!(session.fire_all_rules().unwrap(), 0);

    insert_and_fire(&mut session, "3", 21_000);
    assert_eq!(count(&session, "SimpleTestRule-One"), 3);
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
    assert_eq!(count(&session, "SimpleTestRule-Three"), 1);
}

#[test]
fn new_facts_only_still_joins_with_old_facts() {
    let config = SessionConfig::new().with_retroactive(RetroactivePolicy::NewFactsOnly);
    let mut session = Session::open(rules(&[ONE]), config);
    insert_and_fire(&mut session, "1", 0);

    session.update_rules(rules(&[ONE, TWO])).unwrap();
    insert_and_fire(&mut session, "2", 25_000);

    // (1, 2) contains a new fact, so it may fire
    assert_eq!(count(&session, "SimpleTestRule-Two"), 1);
}

// =============================================================================
// Emissions
// =============================================================================

#[test]
fn emissions_follow_the_active_rules() {
    let mut session = Session::with_rules(rules(&["(rule: A :where [[?e :event]] :then [(emit :a)])"]));
    insert_and_fire(&mut session, "1", 0);

    session
        .update_rules(rules(&["(rule: B :where [[?e :event]] :then [(emit :b)])"]))
        .unwrap();
    insert_and_fire(&mut session, "2", 10);

    let tags: Vec<String> = session
        .drain_emissions()
        .unwrap()
        .into_iter()
        .map(|e| format!("{}:{}", e.tag, e.events[0]))
        .collect();
    assert_eq!(tags, vec!["a:1", "b:1", "b:2"]);
}
