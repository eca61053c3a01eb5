//! Compiled rules and versioned rule sets.
//!
//! A [`RuleSet`] is the unit of hot update: it is immutable once built and
//! is swapped as a whole. [`RuleSet::diff`] classifies every rule name of
//! two consecutive sets so the matcher can keep or reset per-rule state.

pub mod compiler;

pub use compiler::RuleCompiler;

use std::collections::HashSet;
use std::fmt;

use hotswap_foundation::{Error, Result};

use crate::pattern::CompiledPattern;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Compiled Rule
// =============================================================================

/// An action performed each time a rule fires.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    /// Record a tagged emission
    Emit(String),
    /// Write a log line
    Log(String),
}

/// A compiled rule ready for execution.
///
/// Two rules with the same name are the same definition iff they compare
/// equal.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompiledRule {
    /// Rule name, unique within a rule set
    pub name: String,
    /// Priority (higher fires first)
    pub salience: i32,
    /// Whether rule is enabled
    pub enabled: bool,
    /// Compiled pattern for matching
    pub pattern: CompiledPattern,
    /// Actions run on each firing
    pub actions: Vec<Action>,
}

impl CompiledRule {
    /// Creates a new compiled rule.
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: CompiledPattern) -> Self {
        Self {
            name: name.into(),
            salience: 0,
            enabled: true,
            pattern,
            actions: Vec::new(),
        }
    }

    /// Sets the salience (priority).
    #[must_use]
    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = salience;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// A versioned collection of uniquely named rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RuleSetParts"))]
pub struct RuleSet {
    package: Option<String>,
    version: u64,
    rules: Vec<CompiledRule>,
}

/// Unchecked field layout of a [`RuleSet`] on the wire.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RuleSetParts {
    package: Option<String>,
    version: u64,
    rules: Vec<CompiledRule>,
}

#[cfg(feature = "serde")]
impl TryFrom<RuleSetParts> for RuleSet {
    type Error = Error;

    fn try_from(parts: RuleSetParts) -> Result<Self> {
        let set = Self::new(parts.rules)?.with_version(parts.version);
        Ok(match parts.package {
            Some(package) => set.with_package(package),
            None => set,
        })
    }
}

impl RuleSet {
    /// An empty rule set at version 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a rule set at version 1.
    ///
    /// # Errors
    /// Returns `DuplicateRuleName` if two rules share a name.
    pub fn new(rules: Vec<CompiledRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(Error::duplicate_rule_name(&rule.name));
            }
        }
        Ok(Self {
            package: None,
            version: 1,
            rules,
        })
    }

    /// Sets the version marker.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets the package name.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Returns the version marker.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the package name, if any.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Returns the rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Returns true if a rule with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns rule names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifies every rule name of `self` (old) and `next` (new).
    #[must_use]
    pub fn diff(&self, next: &RuleSet) -> RuleSetDiff {
        let mut diff = RuleSetDiff::default();

        for rule in &next.rules {
            match self.get(&rule.name) {
                None => diff.added.push(rule.name.clone()),
                Some(old) if old == rule => diff.unchanged.push(rule.name.clone()),
                Some(_) => diff.changed.push(rule.name.clone()),
            }
        }
        for rule in &self.rules {
            if !next.contains(&rule.name) {
                diff.removed.push(rule.name.clone());
            }
        }

        diff
    }
}

// =============================================================================
// Rule Set Diff
// =============================================================================

/// Result of comparing two rule sets by rule name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleSetDiff {
    /// Same name, identical definition
    pub unchanged: Vec<String>,
    /// Only in the new set
    pub added: Vec<String>,
    /// Only in the old set
    pub removed: Vec<String>,
    /// Same name, different definition
    pub changed: Vec<String>,
}

impl RuleSetDiff {
    /// Returns true if the update changes no rule.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Names whose matching state starts fresh (added or changed).
    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(&self.changed)
            .map(String::as_str)
    }

    /// Names whose pending activations must be dropped (removed or changed).
    pub fn retired(&self) -> impl Iterator<Item = &str> {
        self.removed
            .iter()
            .chain(&self.changed)
            .map(String::as_str)
    }
}

impl fmt::Display for RuleSetDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} -{} ~{} ={}",
            self.added.len(),
            self.removed.len(),
            self.changed.len(),
            self.unchanged.len()
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
