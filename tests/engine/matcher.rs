//! Integration tests for the Matcher
//!
//! Tests refraction, retroactive matching after installs, agenda order,
//! and the activation kill switch.

use hotswap_engine::{ActivationState, Matcher, RetroactivePolicy, RuleCompiler, RuleSet};
use hotswap_foundation::{ErrorKind, Event, SemanticLimit, Timestamp};
use hotswap_storage::EventStore;

fn compile(source: &str) -> RuleSet {
    RuleCompiler::compile_source(source).unwrap()
}

fn install(matcher: &mut Matcher, old: &RuleSet, new: &RuleSet, store: &EventStore) {
    matcher.install(&old.diff(new), store.len());
}

fn run(matcher: &mut Matcher, rules: &RuleSet, store: &EventStore, now: i64) -> usize {
    let now = Timestamp::from_millis(now);
    matcher.evaluate(rules, store, now);
    matcher.fire_all(rules, now).unwrap()
}

#[test]
fn each_tuple_fires_once() {
    let rules = compile("(rule: One :where [[?e :event]])");
    let mut matcher = Matcher::new();
    install(&mut matcher, &RuleSet::empty(), &rules, &EventStore::new());

    let mut store = EventStore::new();
    store.insert(Event::new("1", 0)).unwrap();
    assert_eq!(run(&mut matcher, &rules, &store, 0), 1);
    assert_eq!(run(&mut matcher, &rules, &store, 0), 0);

    store.insert(Event::new("2", 10)).unwrap();
    assert_eq!(run(&mut matcher, &rules, &store, 10), 1);
    assert_eq!(matcher.fired_count("One"), 2);
    assert_eq!(matcher.memory("One").unwrap().fired_tuples(), 2);
}

#[test]
fn evaluate_does_not_duplicate_pending() {
    let rules = compile("(rule: One :where [[?e :event]])");
    let mut store = EventStore::new();
    store.insert(Event::new("1", 0)).unwrap();

    let mut matcher = Matcher::new();
    assert_eq!(matcher.evaluate(&rules, &store, Timestamp::ZERO), 1);
    assert_eq!(matcher.evaluate(&rules, &store, Timestamp::ZERO), 0);
    assert_eq!(matcher.pending().len(), 1);
    assert_eq!(matcher.pending()[0].state, ActivationState::Pending);
}

#[test]
fn added_rule_matches_existing_facts() {
    let v1 = compile("(rule: One :where [[?e :event]])");
    let v2 = compile("(rule: One :where [[?e :event]]) (rule: Three :where [[?e :event]])");
    let mut store = EventStore::new();
    let mut matcher = Matcher::new();
    install(&mut matcher, &RuleSet::empty(), &v1, &store);

    store.insert(Event::new("1", 0)).unwrap();
    store.insert(Event::new("2", 5_000)).unwrap();
    run(&mut matcher, &v1, &store, 5_000);

    install(&mut matcher, &v1, &v2, &store);
    assert_eq!(run(&mut matcher, &v2, &store, 5_000), 2);
    assert_eq!(matcher.fired_count("One"), 2);
    assert_eq!(matcher.fired_count("Three"), 2);
}

#[test]
fn new_facts_only_sets_a_horizon() {
    let v1 = compile("(rule: One :where [[?e :event]])");
    let v2 = compile("(rule: One :where [[?e :event]]) (rule: Three :where [[?e :event]])");
    let mut store = EventStore::new();
    let mut matcher = Matcher::new().with_policy(RetroactivePolicy::NewFactsOnly);
    assert_eq!(matcher.policy(), RetroactivePolicy::NewFactsOnly);

    store.insert(Event::new("1", 0)).unwrap();
    store.insert(Event::new("2", 5_000)).unwrap();
    install(&mut matcher, &RuleSet::empty(), &v1, &store);
    // Initial rules see history only under AllFacts
    assert_eq!(run(&mut matcher, &v1, &store, 5_000), 0);

    install(&mut matcher, &v1, &v2, &store);
    store.insert(Event::new("3", 21_000)).unwrap();
    run(&mut matcher, &v2, &store, 21_000);

    assert_eq!(matcher.memory("Three").unwrap().horizon(), 2);
    assert_eq!(matcher.fired_count("Three"), 1);
    assert_eq!(matcher.fired_count("One"), 1);
}

#[test]
fn removal_discards_pending_and_keeps_count() {
    let v1 = compile("(rule: One :where [[?e :event]]) (rule: Gone :where [[?e :event]])");
    let v2 = compile("(rule: One :where [[?e :event]])");
    let mut store = EventStore::new();
    let mut matcher = Matcher::new();
    install(&mut matcher, &RuleSet::empty(), &v1, &store);

    store.insert(Event::new("1", 0)).unwrap();
    run(&mut matcher, &v1, &store, 0);
    store.insert(Event::new("2", 1)).unwrap();
    matcher.evaluate(&v1, &store, Timestamp::from_millis(1));

    let discarded = matcher.install(&v1.diff(&v2), store.len());
    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].rule, "Gone");
    assert_eq!(discarded[0].state, ActivationState::Discarded);
    assert!(matcher.memory("Gone").is_none());

    assert_eq!(matcher.fire_all(&v2, Timestamp::from_millis(1)).unwrap(), 1);
    assert_eq!(matcher.fired_count("Gone"), 1);
    assert_eq!(matcher.fired_count("One"), 2);
}

#[test]
fn changed_rule_refires_and_counter_continues() {
    let v1 = compile("(rule: R :where [[?e :event]])");
    let v2 = compile("(rule: R :salience 1 :where [[?e :event]])");
    let mut store = EventStore::new();
    store.insert(Event::new("1", 0)).unwrap();

    let mut matcher = Matcher::new();
    install(&mut matcher, &RuleSet::empty(), &v1, &store);
    run(&mut matcher, &v1, &store, 0);

    install(&mut matcher, &v1, &v2, &store);
    assert_eq!(run(&mut matcher, &v2, &store, 0), 1);
    assert_eq!(matcher.fired_count("R"), 2);
}

#[test]
fn salience_then_creation_order() {
    let rules = compile(
        "(rule: Low :where [[?e :event]])
         (rule: High :salience 10 :where [[?e :event]])",
    );
    let mut store = EventStore::new();
    store.insert(Event::new("1", 0)).unwrap();
    store.insert(Event::new("2", 0)).unwrap();

    let mut matcher = Matcher::new();
    matcher.evaluate(&rules, &store, Timestamp::ZERO);
    let order: Vec<String> = matcher
        .pending()
        .iter()
        .map(|a| format!("{}:{}", a.rule, a.events[0]))
        .collect();
    assert_eq!(order, vec!["High:1", "High:2", "Low:1", "Low:2"]);
}

#[test]
fn kill_switch_leaves_remainder_pending() {
    let rules = compile("(rule: One :where [[?e :event]])");
    let mut store = EventStore::new();
    for i in 0..5 {
        store.insert(Event::new(format!("{i}"), i)).unwrap();
    }

    let mut matcher = Matcher::new().with_max_activations(3);
    matcher.evaluate(&rules, &store, Timestamp::from_millis(4));
    let err = matcher.fire_all(&rules, Timestamp::from_millis(4)).unwrap_err();

    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxActivations { limit: 3, .. })
    ));
    assert_eq!(matcher.fired_count("One"), 3);
    assert_eq!(matcher.pending().len(), 2);

    assert_eq!(matcher.fire_all(&rules, Timestamp::from_millis(4)).unwrap(), 2);
    assert_eq!(matcher.fired_count("One"), 5);
}

#[test]
fn emit_actions_are_recorded() {
    let rules = compile("(rule: Pair :where [[?a :event] [?b :event]] :guard [(after ?b ?a 1s 1s)] :then [(emit :pair)])");
    let mut store = EventStore::new();
    store.insert(Event::new("a", 0)).unwrap();
    store.insert(Event::new("b", 1_000)).unwrap();

    let mut matcher = Matcher::new();
    run(&mut matcher, &rules, &store, 1_000);

    let emissions = matcher.drain_emissions();
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].tag, "pair");
    assert_eq!(emissions[0].at, Timestamp::from_millis(1_000));
    assert!(matcher.drain_emissions().is_empty());
}
