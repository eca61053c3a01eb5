//! Integration tests for LogicalClock
//!
//! Tests monotonic advancement and rejection of backward moves.

use hotswap_foundation::{Duration, ErrorKind, Timestamp};
use hotswap_storage::LogicalClock;
use proptest::prelude::*;

#[test]
fn clock_starts_at_epoch_or_given_time() {
    assert_eq!(LogicalClock::new().now(), Timestamp::ZERO);
    assert_eq!(
        LogicalClock::starting_at(Timestamp::from_millis(500)).now(),
        Timestamp::from_millis(500)
    );
}

#[test]
fn advance_moves_forward() {
    let mut clock = LogicalClock::new();
    assert!(clock.advance(Duration::from_secs(20)).unwrap());
    assert_eq!(clock.now().millis(), 20_000);
    assert!(!clock.advance(Duration::ZERO).unwrap());
    assert_eq!(clock.now().millis(), 20_000);
}

#[test]
fn negative_advance_is_rejected() {
    let mut clock = LogicalClock::starting_at(Timestamp::from_millis(100));
    let err = clock.advance(Duration::from_millis(-1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidAdvance { delta: -1 }));
    assert_eq!(clock.now().millis(), 100);
}

#[test]
fn overflowing_advance_is_rejected() {
    let mut clock = LogicalClock::starting_at(Timestamp::from_millis(i64::MAX));
    assert!(clock.advance(Duration::from_millis(1)).is_err());
    assert_eq!(clock.now().millis(), i64::MAX);
}

#[test]
fn advance_to_ignores_the_past() {
    let mut clock = LogicalClock::starting_at(Timestamp::from_millis(5_000));
    assert!(!clock.advance_to(Timestamp::from_millis(1_000)));
    assert_eq!(clock.now().millis(), 5_000);
    assert!(clock.advance_to(Timestamp::from_millis(21_000)));
    assert_eq!(clock.now().millis(), 21_000);
}

proptest! {
    #[test]
    fn clock_never_moves_backwards(steps in prop::collection::vec(-1_000i64..1_000, 0..50)) {
        let mut clock = LogicalClock::new();
        let mut previous = clock.now();
        for step in steps {
            let result = clock.advance(Duration::from_millis(step));
            prop_assert_eq!(result.is_err(), step < 0);
            prop_assert!(clock.now() >= previous);
            previous = clock.now();
        }
    }

    #[test]
    fn advance_to_is_max(start in 0i64..10_000, targets in prop::collection::vec(0i64..20_000, 0..20)) {
        let mut clock = LogicalClock::starting_at(Timestamp::from_millis(start));
        let mut expected = start;
        for target in targets {
            clock.advance_to(Timestamp::from_millis(target));
            expected = expected.max(target);
            prop_assert_eq!(clock.now().millis(), expected);
        }
    }
}
