//! Integration tests for pattern matching
//!
//! Tests tuple enumeration, field tests, joins, and temporal guards.

use hotswap_engine::{Match, PatternMatcher, RuleCompiler};
use hotswap_foundation::{Event, Timestamp, Value};
use hotswap_storage::EventStore;

fn store(events: Vec<Event>) -> EventStore {
    let mut store = EventStore::new();
    for event in events {
        store.insert(event).unwrap();
    }
    store
}

fn matches(rule_source: &str, store: &EventStore, now: i64) -> Vec<Match> {
    let rules = RuleCompiler::compile_source(rule_source).unwrap();
    PatternMatcher::match_pattern(&rules.rules()[0].pattern, store, Timestamp::from_millis(now))
}

fn tuples(found: &[Match]) -> Vec<Vec<&str>> {
    found
        .iter()
        .map(|m| m.events.iter().map(|id| id.as_str()).collect())
        .collect()
}

// =============================================================================
// Tuples
// =============================================================================

#[test]
fn single_variable_matches_every_event() {
    let s = store(vec![Event::new("1", 0), Event::new("2", 5_000)]);
    let found = matches("(rule: R :where [[?e :event]])", &s, 5_000);
    assert_eq!(tuples(&found), vec![vec!["1"], vec!["2"]]);
    assert_eq!(found[1].sequences, vec![1]);
    assert_eq!(found[1].newest_sequence(), Some(1));
}

#[test]
fn pairs_are_ordered_and_distinct() {
    let s = store(vec![Event::new("1", 0), Event::new("2", 1), Event::new("3", 2)]);
    let found = matches("(rule: R :where [[?a :event] [?b :event]])", &s, 2);
    assert_eq!(found.len(), 6);
    assert!(found.iter().all(|m| m.events[0] != m.events[1]));
    assert_eq!(tuples(&found)[0], vec!["1", "2"]);
}

#[test]
fn empty_store_has_no_matches() {
    let found = matches("(rule: R :where [[?e :event]])", &EventStore::new(), 0);
    assert!(found.is_empty());
}

// =============================================================================
// Field Tests
// =============================================================================

#[test]
fn literal_and_presence_tests() {
    let s = store(vec![
        Event::new("a", 0).with_field("kind", "login").with_field("ip", "10.0.0.1"),
        Event::new("b", 1).with_field("kind", "login"),
        Event::new("c", 2).with_field("kind", "logout").with_field("ip", "10.0.0.2"),
    ]);

    let logins = matches(r#"(rule: R :where [[?e :kind "login"]])"#, &s, 2);
    assert_eq!(tuples(&logins), vec![vec!["a"], vec!["b"]]);

    let with_ip = matches("(rule: R :where [[?e :ip _]])", &s, 2);
    assert_eq!(tuples(&with_ip), vec![vec!["a"], vec!["c"]]);

    let both = matches(r#"(rule: R :where [[?e :kind "login"] [?e :ip _]])"#, &s, 2);
    assert_eq!(tuples(&both), vec![vec!["a"]]);
}

#[test]
fn literal_types_must_agree() {
    let s = store(vec![Event::new("a", 0).with_field("n", 1_i64)]);
    assert_eq!(matches("(rule: R :where [[?e :n 1]])", &s, 0).len(), 1);
    assert!(matches("(rule: R :where [[?e :n 1.0]])", &s, 0).is_empty());
    assert!(matches(r#"(rule: R :where [[?e :n "1"]])"#, &s, 0).is_empty());
}

#[test]
fn shared_value_variable_joins_events() {
    let s = store(vec![
        Event::new("f1", 0).with_field("user", "alice"),
        Event::new("f2", 1).with_field("user", "bob"),
        Event::new("f3", 2).with_field("user", "alice"),
    ]);
    let found = matches(
        "(rule: R :where [[?a :user ?u] [?b :user ?u]] :guard [(after ?b ?a)])",
        &s,
        2,
    );
    assert_eq!(tuples(&found), vec![vec!["f1", "f3"]]);
    assert_eq!(found[0].bindings.get("u"), Some(&Value::from("alice")));
    assert_eq!(found[0].bindings.len(), 1);
}

// =============================================================================
// Temporal Guards
// =============================================================================

#[test]
fn after_window_is_inclusive() {
    let s = store(vec![
        Event::new("0", 0),
        Event::new("20", 20_000),
        Event::new("30", 30_000),
        Event::new("31", 31_000),
    ]);
    let found = matches(
        "(rule: R :where [[?a :event] [?b :event]] :guard [(after ?b ?a 20s 30s)])",
        &s,
        31_000,
    );
    assert_eq!(tuples(&found), vec![vec!["0", "20"], vec!["0", "30"]]);
}

#[test]
fn after_uses_timestamps_not_insertion_order() {
    let s = store(vec![Event::new("late", 25_000), Event::new("early", 0)]);
    let found = matches(
        "(rule: R :where [[?a :event] [?b :event]] :guard [(after ?b ?a 20s 30s)])",
        &s,
        25_000,
    );
    assert_eq!(tuples(&found), vec![vec!["early", "late"]]);
}

#[test]
fn within_and_older_than_depend_on_now() {
    let s = store(vec![Event::new("old", 0), Event::new("new", 9_000)]);
    let within = "(rule: R :where [[?e :event]] :guard [(within ?e 5s)])";
    let older = "(rule: R :where [[?e :event]] :guard [(older-than ?e 5s)])";

    assert_eq!(tuples(&matches(within, &s, 10_000)), vec![vec!["new"]]);
    assert_eq!(tuples(&matches(older, &s, 10_000)), vec![vec!["old"]]);

    assert!(matches(within, &s, 20_000).is_empty());
    assert_eq!(matches(older, &s, 20_000).len(), 2);
}
