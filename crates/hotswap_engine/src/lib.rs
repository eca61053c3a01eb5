//! Rule sets, pattern matching, agenda, and firing for hotswap.
//!
//! This crate provides:
//! - [`PatternCompiler`] and [`PatternMatcher`] - Clause and guard matching over events
//! - [`RuleCompiler`] and [`RuleSet`] - Versioned rule collections and their diffs
//! - [`Agenda`] - Pending activations ordered by salience, then creation
//! - [`Matcher`] - Evaluation, refraction, firing, and per-rule statistics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agenda;
pub mod matcher;
pub mod pattern;
pub mod rule;

pub use agenda::{Activation, ActivationState, Agenda};
pub use matcher::{
    DEFAULT_MAX_ACTIVATIONS, Emission, Matcher, MatcherState, RetroactivePolicy, RuleMemory,
};
pub use pattern::{
    Bindings, CompiledBinding, CompiledClause, CompiledGuard, CompiledPattern, Match,
    PatternCompiler, PatternMatcher,
};
pub use rule::{Action, CompiledRule, RuleCompiler, RuleSet, RuleSetDiff};
