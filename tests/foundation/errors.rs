//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use hotswap_foundation::{Error, ErrorContext, ErrorKind, EventId, SemanticLimit};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_duplicate_id() {
    let err = Error::duplicate_id(EventId::new("e-42"));
    assert!(matches!(err.kind, ErrorKind::DuplicateId(_)));
    assert!(format!("{err}").contains("e-42"));
}

#[test]
fn error_duplicate_rule_name() {
    let err = Error::duplicate_rule_name("SimpleTestRule-One");
    assert!(matches!(err.kind, ErrorKind::DuplicateRuleName(ref n) if n == "SimpleTestRule-One"));
}

#[test]
fn error_invalid_advance() {
    let err = Error::invalid_advance(-5);
    assert!(matches!(err.kind, ErrorKind::InvalidAdvance { delta: -5 }));
    assert!(format!("{err}").contains("-5ms"));
}

#[test]
fn error_session_closed() {
    let err = Error::session_closed();
    assert!(err.is_session_closed());
    assert_eq!(format!("{err}"), "session is closed");
}

#[test]
fn error_invalid_rule() {
    let err = Error::invalid_rule("Two", "guard refers to ?c");
    let msg = format!("{err}");
    assert!(msg.contains("Two"));
    assert!(msg.contains("?c"));
    assert!(!err.is_session_closed());
}

// =============================================================================
// Semantic Limits
// =============================================================================

#[test]
fn limit_exceeded_displays_limit_and_context() {
    let err = Error::limit_exceeded(SemanticLimit::MaxActivations {
        limit: 10,
        context: Some("3 activations still pending".to_string()),
    });
    let msg = format!("{err}");
    assert!(msg.contains("max activations (10)"));
    assert!(msg.contains("3 activations still pending"));
}

#[test]
fn limit_without_context() {
    let limit = SemanticLimit::MaxActivations {
        limit: 1,
        context: None,
    };
    assert_eq!(limit.to_string(), "max activations (1) exceeded");
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn context_attaches_to_error() {
    let err = Error::session_closed().with_context(
        ErrorContext::new()
            .with_source("rules/added.rules")
            .with_position(3, 7)
            .with_frame("update_rules"),
    );
    let ctx = err.context.unwrap();
    assert_eq!(ctx.source.as_deref(), Some("rules/added.rules"));
    assert_eq!((ctx.line, ctx.column), (Some(3), Some(7)));
    assert_eq!(ctx.stack, vec!["update_rules"]);
    assert!(ctx.to_string().starts_with("at rules/added.rules:3:7"));
}

#[test]
fn scenario_mismatch_display() {
    let err = Error::new(ErrorKind::ScenarioMismatch {
        rule: "Three".to_string(),
        expected: 3,
        actual: 0,
    });
    assert_eq!(
        err.to_string(),
        "scenario mismatch for rule Three: expected 3, got 0"
    );
}
