//! Pattern matching over the event store.
//!
//! This module compiles declaration clauses and guards into runtime
//! patterns and finds every tuple of distinct events that satisfies them.

use hotswap_foundation::{Duration, Error, Event, EventId, Result, Timestamp, Value};
use hotswap_language::declaration::{ClauseDecl, ClauseTest, GuardDecl};
use hotswap_storage::{EventStore, Sequence};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Compiled Pattern Types
// =============================================================================

/// A compiled clause constraining one event field.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompiledClause {
    /// Payload field to inspect
    pub field: String,
    /// What to bind/match for the value
    pub binding: CompiledBinding,
}

/// What the value part of a clause binds to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompiledBinding {
    /// Bind to a value variable: `[?e :user ?u]`
    Variable(String),
    /// Match against a literal value: `[?e :kind "login"]`
    Literal(Value),
    /// Require presence only: `[?e :ip _]`
    Wildcard,
}

/// A compiled temporal guard. Variables are positions in the match tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompiledGuard {
    /// `later.ts - earlier.ts` lies within `[min, max]`
    After {
        /// Tuple position of the later event
        later: usize,
        /// Tuple position of the earlier event
        earlier: usize,
        /// Minimum gap (inclusive)
        min: Duration,
        /// Maximum gap (inclusive)
        max: Option<Duration>,
    },
    /// `now - ts <= window`
    Within {
        /// Tuple position
        var: usize,
        /// Maximum age
        window: Duration,
    },
    /// `now - ts >= age`
    OlderThan {
        /// Tuple position
        var: usize,
        /// Minimum age
        age: Duration,
    },
}

impl CompiledGuard {
    /// The tuple position after which every variable of this guard is bound.
    fn ready_at(&self) -> usize {
        match *self {
            Self::After { later, earlier, .. } => later.max(earlier),
            Self::Within { var, .. } | Self::OlderThan { var, .. } => var,
        }
    }

    /// Checks the guard against a (partially) bound tuple.
    fn check(&self, tuple: &[&Event], now: Timestamp) -> bool {
        match *self {
            Self::After {
                later,
                earlier,
                min,
                max,
            } => {
                let gap = tuple[later].timestamp().since(tuple[earlier].timestamp());
                gap >= min && max.is_none_or(|max| gap <= max)
            }
            Self::Within { var, window } => now.since(tuple[var].timestamp()) <= window,
            Self::OlderThan { var, age } => now.since(tuple[var].timestamp()) >= age,
        }
    }
}

/// A compiled pattern: one slot per event variable, in order of first
/// appearance, each with the clauses and guards checked when it is bound.
///
/// Built by [`PatternCompiler`] or the checked [`CompiledPattern::from_parts`];
/// decoding goes through the same check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PatternParts"))]
pub struct CompiledPattern {
    /// Event variable names (without `?`)
    vars: Vec<String>,
    /// Clauses per variable slot
    clauses: Vec<Vec<CompiledClause>>,
    /// Guards per slot, placed at the slot where they become checkable
    guards: Vec<Vec<CompiledGuard>>,
}

/// Unchecked field layout of a [`CompiledPattern`] on the wire.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct PatternParts {
    vars: Vec<String>,
    clauses: Vec<Vec<CompiledClause>>,
    guards: Vec<Vec<CompiledGuard>>,
}

#[cfg(feature = "serde")]
impl TryFrom<PatternParts> for CompiledPattern {
    type Error = Error;

    fn try_from(parts: PatternParts) -> Result<Self> {
        Self::from_parts(parts.vars, parts.clauses, parts.guards)
    }
}

impl CompiledPattern {
    fn new() -> Self {
        Self::default()
    }

    /// Assembles a pattern from per-slot clauses and guards.
    ///
    /// # Errors
    /// Returns `InvalidRule` unless there is exactly one clause list and one
    /// guard list per variable, variable names are unique, and every guard
    /// sits at or after the slot of each variable it reads.
    pub fn from_parts(
        vars: Vec<String>,
        clauses: Vec<Vec<CompiledClause>>,
        guards: Vec<Vec<CompiledGuard>>,
    ) -> Result<Self> {
        let invalid = |message: String| Error::invalid_rule("<pattern>", message);

        if clauses.len() != vars.len() || guards.len() != vars.len() {
            return Err(invalid(format!(
                "{} variables but {} clause slots and {} guard slots",
                vars.len(),
                clauses.len(),
                guards.len()
            )));
        }
        for (i, var) in vars.iter().enumerate() {
            if vars[..i].contains(var) {
                return Err(invalid(format!("variable ?{var} appears twice")));
            }
        }
        for (slot, placed) in guards.iter().enumerate() {
            if let Some(guard) = placed.iter().find(|g| g.ready_at() > slot) {
                return Err(invalid(format!(
                    "guard {guard:?} at slot {slot} reads an unbound slot"
                )));
            }
        }

        Ok(Self {
            vars,
            clauses,
            guards,
        })
    }

    /// Number of events in each match tuple.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.vars.len()
    }

    /// Event variable names in slot order.
    #[must_use]
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// Clauses checked when `slot` is bound.
    #[must_use]
    pub fn clauses_at(&self, slot: usize) -> &[CompiledClause] {
        self.clauses.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Guards checked once `slot` is bound.
    #[must_use]
    pub fn guards_at(&self, slot: usize) -> &[CompiledGuard] {
        self.guards.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Re-checks the clock-relative guards of a complete tuple at `now`.
    ///
    /// Pairwise `after` guards do not depend on the clock and are skipped.
    #[must_use]
    pub fn clock_guards_hold(&self, tuple: &[&Event], now: Timestamp) -> bool {
        tuple.len() == self.arity()
            && self
                .guards
                .iter()
                .flatten()
                .filter(|g| !matches!(g, CompiledGuard::After { .. }))
                .all(|g| g.check(tuple, now))
    }

    /// Returns the slot of an event variable, adding it if new.
    fn slot(&mut self, var: &str) -> usize {
        if let Some(pos) = self.vars.iter().position(|v| v == var) {
            return pos;
        }
        self.vars.push(var.to_string());
        self.clauses.push(Vec::new());
        self.guards.push(Vec::new());
        self.vars.len() - 1
    }

    fn existing_slot(&self, var: &str) -> Option<usize> {
        self.vars.iter().position(|v| v == var)
    }
}

// =============================================================================
// Pattern Compiler
// =============================================================================

/// Compiles declaration clauses and guards into runtime patterns.
pub struct PatternCompiler;

impl PatternCompiler {
    /// Compile declaration clauses and guards into a runtime pattern.
    ///
    /// # Errors
    /// Returns `InvalidRule` if a guard names a variable no clause binds.
    pub fn compile(
        rule: &str,
        clauses: &[ClauseDecl],
        guards: &[GuardDecl],
    ) -> Result<CompiledPattern> {
        let mut compiled = CompiledPattern::new();

        for clause in clauses {
            let slot = compiled.slot(&clause.var);
            let (field, binding) = match &clause.test {
                ClauseTest::AnyEvent => continue,
                ClauseTest::FieldEquals { field, value } => {
                    (field, CompiledBinding::Literal(value.clone()))
                }
                ClauseTest::FieldPresent { field } => (field, CompiledBinding::Wildcard),
                ClauseTest::FieldBinds { field, var } => {
                    (field, CompiledBinding::Variable(var.clone()))
                }
            };
            compiled.clauses[slot].push(CompiledClause {
                field: field.clone(),
                binding,
            });
        }

        let slot_of = |var: &str| {
            compiled.existing_slot(var).ok_or_else(|| {
                Error::invalid_rule(
                    rule,
                    format!("guard refers to unbound variable ?{var}"),
                )
            })
        };

        let mut placed = Vec::with_capacity(guards.len());
        for guard in guards {
            placed.push(match guard {
                GuardDecl::After {
                    later,
                    earlier,
                    min,
                    max,
                } => CompiledGuard::After {
                    later: slot_of(later)?,
                    earlier: slot_of(earlier)?,
                    min: *min,
                    max: *max,
                },
                GuardDecl::Within { var, window } => CompiledGuard::Within {
                    var: slot_of(var)?,
                    window: *window,
                },
                GuardDecl::OlderThan { var, age } => CompiledGuard::OlderThan {
                    var: slot_of(var)?,
                    age: *age,
                },
            });
        }

        for guard in placed {
            compiled.guards[guard.ready_at()].push(guard);
        }

        Ok(compiled)
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// Value-variable bindings from pattern matching, in binding order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bindings {
    values: Vec<(String, Value)>,
}

impl Bindings {
    /// Create empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding by variable name.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Value> {
        self.values
            .iter()
            .find_map(|(name, value)| (name == var).then_some(value))
    }

    /// Iterate all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, var: String, value: Value) {
        self.values.push((var, value));
    }

    fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }
}

/// One satisfying assignment of events to a pattern's variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    /// Matched event ids, one per pattern variable
    pub events: Vec<EventId>,
    /// Store sequence of each matched event
    pub sequences: Vec<Sequence>,
    /// Value-variable bindings
    pub bindings: Bindings,
}

impl Match {
    /// The sequence of the most recently inserted event in the tuple.
    #[must_use]
    pub fn newest_sequence(&self) -> Option<Sequence> {
        self.sequences.iter().copied().max()
    }
}

// =============================================================================
// Pattern Matching
// =============================================================================

/// Pattern matcher that executes patterns against an event store.
pub struct PatternMatcher;

impl PatternMatcher {
    /// Find every tuple of distinct events satisfying a pattern.
    ///
    /// Tuples are produced in lexicographic order of insertion sequence.
    #[must_use]
    pub fn match_pattern(pattern: &CompiledPattern, store: &EventStore, now: Timestamp) -> Vec<Match> {
        let mut results = Vec::new();
        if pattern.arity() == 0 {
            return results;
        }

        let candidates: Vec<(Sequence, &Event)> = store.sequenced().collect();
        let mut search = Search {
            pattern,
            candidates: &candidates,
            now,
            tuple: Vec::with_capacity(pattern.arity()),
            sequences: Vec::with_capacity(pattern.arity()),
            bindings: Bindings::new(),
            results: &mut results,
        };
        search.extend();

        results
    }

    /// Checks one event against the clauses of a slot, extending `bindings`.
    ///
    /// On failure, `bindings` may hold partial additions; callers truncate.
    fn try_bind_clauses(
        clauses: &[CompiledClause],
        event: &Event,
        bindings: &mut Bindings,
    ) -> bool {
        for clause in clauses {
            let Some(value) = event.field(&clause.field) else {
                return false;
            };
            match &clause.binding {
                CompiledBinding::Variable(var) => {
                    if let Some(existing) = bindings.get(var) {
                        // Must match existing binding (unification)
                        if existing != value {
                            return false;
                        }
                    } else {
                        bindings.push(var.clone(), value.clone());
                    }
                }
                CompiledBinding::Literal(lit) => {
                    if value != lit {
                        return false;
                    }
                }
                CompiledBinding::Wildcard => {}
            }
        }
        true
    }
}

/// Depth-first search state for one pattern.
struct Search<'a> {
    pattern: &'a CompiledPattern,
    candidates: &'a [(Sequence, &'a Event)],
    now: Timestamp,
    tuple: Vec<&'a Event>,
    sequences: Vec<Sequence>,
    bindings: Bindings,
    results: &'a mut Vec<Match>,
}

impl Search<'_> {
    fn extend(&mut self) {
        let slot = self.tuple.len();
        if slot == self.pattern.arity() {
            self.results.push(Match {
                events: self.tuple.iter().map(|e| e.id().clone()).collect(),
                sequences: self.sequences.clone(),
                bindings: self.bindings.clone(),
            });
            return;
        }

        let candidates = self.candidates;
        for &(seq, event) in candidates {
            if self.sequences.contains(&seq) {
                continue;
            }

            let mark = self.bindings.len();
            if PatternMatcher::try_bind_clauses(&self.pattern.clauses[slot], event, &mut self.bindings) {
                self.tuple.push(event);
                self.sequences.push(seq);

                let now = self.now;
                if self.pattern.guards[slot]
                    .iter()
                    .all(|g| g.check(&self.tuple, now))
                {
                    self.extend();
                }

                self.tuple.pop();
                self.sequences.pop();
            }
            self.bindings.truncate(mark);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
