//! Integration tests for Timestamp and Duration
//!
//! Tests logical time arithmetic and formatting.

use hotswap_foundation::{Duration, Timestamp};
use proptest::prelude::*;

#[test]
fn since_measures_signed_gap() {
    let a = Timestamp::from_millis(0);
    let b = Timestamp::from_millis(21_000);
    assert_eq!(b.since(a), Duration::from_secs(21));
    assert_eq!(a.since(b), Duration::from_millis(-21_000));
    assert!(a.since(b).is_negative());
}

#[test]
fn checked_add_overflows_to_none() {
    let t = Timestamp::from_millis(i64::MAX - 1);
    assert_eq!(t.checked_add(Duration::from_millis(1)), Some(Timestamp::from_millis(i64::MAX)));
    assert_eq!(t.checked_add(Duration::from_millis(2)), None);
}

#[test]
fn durations_order_by_length() {
    assert!(Duration::from_secs(20) < Duration::from_secs(30));
    assert!(Duration::ZERO < Duration::from_millis(1));
}

#[test]
fn display_formats() {
    assert_eq!(Timestamp::from_millis(5_000).to_string(), "@5000ms");
    assert_eq!(Duration::from_secs(20).to_string(), "20s");
    assert_eq!(Duration::from_millis(120_000).to_string(), "2m");
    assert_eq!(Duration::from_millis(1_500).to_string(), "1500ms");
    assert_eq!(Duration::ZERO.to_string(), "0ms");
}

proptest! {
    #[test]
    fn add_then_since_recovers_duration(start in -1_000_000_000i64..1_000_000_000, delta in 0i64..1_000_000_000) {
        let t = Timestamp::from_millis(start);
        let later = t.checked_add(Duration::from_millis(delta)).unwrap();
        prop_assert_eq!(later.since(t), Duration::from_millis(delta));
        prop_assert!(later >= t);
    }
}
