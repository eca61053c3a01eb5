//! Rule declarations and the analyzer that extracts them from AST forms.
//!
//! A rule file contains at most one `ruleset:` header followed by any
//! number of `rule:` forms:
//!
//! ```text
//! (ruleset: cep.sample :version 2)
//!
//! (rule: SimpleTestRule-Three
//!   :salience 10
//!   :where [[?e :event] [?e :kind "login"]]
//!   :guard [(within ?e 30s)]
//!   :then  [(emit :login) (log "login seen")])
//! ```

use std::collections::HashSet;

use hotswap_foundation::{Duration, Error, ErrorKind, Result, Value};

use crate::ast::Ast;
use crate::span::Span;

/// Reserved clause keyword matching any event.
const ANY_EVENT: &str = "event";

// =============================================================================
// Declarations
// =============================================================================

/// A fully analyzed rule file.
#[derive(Clone, Debug, PartialEq)]
pub struct RulesFile {
    /// The `ruleset:` header, if present.
    pub header: Option<RuleSetHeader>,
    /// Rules in source order.
    pub rules: Vec<RuleDecl>,
}

impl RulesFile {
    /// Returns the declared version, defaulting to 1.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.header.as_ref().map_or(1, |h| h.version)
    }

    /// Returns the declared package name, if any.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.header.as_ref().map(|h| h.package.as_str())
    }
}

/// `(ruleset: package :version N)`
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSetHeader {
    /// Package name
    pub package: String,
    /// Rule set version
    pub version: u64,
    /// Source span
    pub span: Span,
}

/// A rule declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleDecl {
    /// Rule name
    pub name: String,
    /// Priority (higher fires first), default 0
    pub salience: i32,
    /// Enabled flag
    pub enabled: bool,
    /// Event clauses
    pub clauses: Vec<ClauseDecl>,
    /// Temporal guards
    pub guards: Vec<GuardDecl>,
    /// Actions run on each firing
    pub actions: Vec<ActionDecl>,
    /// Source span
    pub span: Span,
}

impl RuleDecl {
    /// Creates a new rule with the given name and no conditions.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            salience: 0,
            enabled: true,
            clauses: Vec::new(),
            guards: Vec::new(),
            actions: Vec::new(),
            span,
        }
    }

    /// Returns the event variables in order of first appearance.
    #[must_use]
    pub fn event_vars(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.clauses
            .iter()
            .map(|c| c.var.as_str())
            .filter(|v| seen.insert(*v))
            .collect()
    }
}

/// A single clause constraining one event variable: `[?e :field value]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClauseDecl {
    /// Event variable name (without `?`)
    pub var: String,
    /// What the clause requires of the event
    pub test: ClauseTest,
    /// Source span
    pub span: Span,
}

/// The requirement a clause places on an event.
#[derive(Clone, Debug, PartialEq)]
pub enum ClauseTest {
    /// `[?e :event]`
    AnyEvent,
    /// `[?e :field literal]`
    FieldEquals {
        /// Payload field name
        field: String,
        /// Required value
        value: Value,
    },
    /// `[?e :field _]`
    FieldPresent {
        /// Payload field name
        field: String,
    },
    /// `[?e :field ?v]`
    FieldBinds {
        /// Payload field name
        field: String,
        /// Value variable name (without `?`)
        var: String,
    },
}

/// A temporal guard over bound event variables.
#[derive(Clone, Debug, PartialEq)]
pub enum GuardDecl {
    /// `(after ?later ?earlier MIN MAX)`
    After {
        /// Variable of the later event
        later: String,
        /// Variable of the earlier event
        earlier: String,
        /// Minimum gap (inclusive)
        min: Duration,
        /// Maximum gap (inclusive), unbounded if `None`
        max: Option<Duration>,
    },
    /// `(within ?e DUR)`: the event is at most `DUR` old at evaluation time
    Within {
        /// Event variable
        var: String,
        /// Maximum age
        window: Duration,
    },
    /// `(older-than ?e DUR)`: the event is at least `DUR` old at evaluation time
    OlderThan {
        /// Event variable
        var: String,
        /// Minimum age
        age: Duration,
    },
}

impl GuardDecl {
    /// Returns the event variables this guard reads.
    #[must_use]
    pub fn vars(&self) -> Vec<&str> {
        match self {
            Self::After { later, earlier, .. } => vec![later.as_str(), earlier.as_str()],
            Self::Within { var, .. } | Self::OlderThan { var, .. } => vec![var.as_str()],
        }
    }
}

/// An action performed when a rule fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionDecl {
    /// `(emit :tag)`: record a tagged emission
    Emit(String),
    /// `(log "message")`: write a log line
    Log(String),
}

// =============================================================================
// Analyzer
// =============================================================================

/// Extracts rule declarations from parsed forms.
pub struct DeclarationAnalyzer;

impl DeclarationAnalyzer {
    /// Analyzes every top-level form of a rule file.
    ///
    /// # Errors
    /// Returns a `ParseError` for unknown forms or malformed options, and
    /// `InvalidRule` for rules whose conditions are inconsistent.
    pub fn analyze_file(forms: &[Ast]) -> Result<RulesFile> {
        let mut header: Option<RuleSetHeader> = None;
        let mut rules = Vec::new();

        for form in forms {
            if let Some(h) = Self::analyze_header(form)? {
                if header.is_some() {
                    return Err(parse_error(h.span, "duplicate ruleset: header"));
                }
                header = Some(h);
            } else if let Some(rule) = Self::analyze_rule(form)? {
                rules.push(rule);
            } else {
                return Err(parse_error(
                    form.span(),
                    "expected (ruleset: ...) or (rule: ...)",
                ));
            }
        }

        Ok(RulesFile { header, rules })
    }

    /// Analyzes a `(ruleset: package :version N)` form.
    ///
    /// Returns `Ok(None)` if the form is not a ruleset header.
    ///
    /// # Errors
    /// Returns an error if the header is malformed.
    pub fn analyze_header(ast: &Ast) -> Result<Option<RuleSetHeader>> {
        let Some((elements, span)) = Self::headed_list(ast, "ruleset:") else {
            return Ok(None);
        };

        let package = match elements.get(1) {
            Some(Ast::Symbol(s, _) | Ast::String(s, _)) => s.clone(),
            Some(other) => {
                return Err(parse_error(
                    other.span(),
                    &format!("ruleset package must be a symbol, got {}", other.type_name()),
                ));
            }
            None => return Err(parse_error(span, "ruleset: requires a package name")),
        };

        let mut header = RuleSetHeader {
            package,
            version: 1,
            span,
        };

        for (key, value) in Self::options(&elements[2..], span)? {
            match key {
                "version" => {
                    header.version = match value {
                        Ast::Int(n, _) => u64::try_from(*n).map_err(|_| {
                            parse_error(value.span(), ":version must be non-negative")
                        })?,
                        other => {
                            return Err(parse_error(
                                other.span(),
                                &format!(":version must be an integer, got {}", other.type_name()),
                            ));
                        }
                    };
                }
                other => {
                    return Err(parse_error(
                        value.span(),
                        &format!("unknown ruleset option :{other}"),
                    ));
                }
            }
        }

        Ok(Some(header))
    }

    /// Analyzes a `(rule: name ...)` form.
    ///
    /// Returns `Ok(None)` if the form is not a rule.
    ///
    /// # Errors
    /// Returns an error if the rule is malformed or inconsistent.
    pub fn analyze_rule(ast: &Ast) -> Result<Option<RuleDecl>> {
        let Some((elements, span)) = Self::headed_list(ast, "rule:") else {
            return Ok(None);
        };

        let name = match elements.get(1) {
            Some(Ast::Symbol(s, _) | Ast::String(s, _)) => s.clone(),
            Some(other) => {
                return Err(parse_error(
                    other.span(),
                    &format!("rule name must be a symbol, got {}", other.type_name()),
                ));
            }
            None => return Err(parse_error(span, "rule: requires a name")),
        };

        let mut rule = RuleDecl::new(name, span);

        for (key, value) in Self::options(&elements[2..], span)? {
            match key {
                "salience" => {
                    rule.salience = match value {
                        Ast::Int(n, _) => i32::try_from(*n)
                            .map_err(|_| parse_error(value.span(), ":salience out of range"))?,
                        other => {
                            return Err(parse_error(
                                other.span(),
                                &format!(":salience must be an integer, got {}", other.type_name()),
                            ));
                        }
                    };
                }
                "enabled" => {
                    rule.enabled = match value {
                        Ast::Bool(b, _) => *b,
                        other => {
                            return Err(parse_error(
                                other.span(),
                                &format!(":enabled must be a bool, got {}", other.type_name()),
                            ));
                        }
                    };
                }
                "where" => {
                    for clause in Self::vector_items(value, ":where")? {
                        rule.clauses.push(Self::analyze_clause(clause)?);
                    }
                }
                "guard" => {
                    for guard in Self::vector_items(value, ":guard")? {
                        rule.guards.push(Self::analyze_guard(guard)?);
                    }
                }
                "then" => {
                    for action in Self::vector_items(value, ":then")? {
                        rule.actions.push(Self::analyze_action(action)?);
                    }
                }
                other => {
                    return Err(parse_error(
                        value.span(),
                        &format!("unknown rule option :{other}"),
                    ));
                }
            }
        }

        Self::validate(&rule)?;
        Ok(Some(rule))
    }

    /// Checks cross-clause consistency of a rule.
    fn validate(rule: &RuleDecl) -> Result<()> {
        if rule.clauses.is_empty() {
            return Err(Error::invalid_rule(
                &rule.name,
                "a rule needs at least one :where clause",
            ));
        }

        let event_vars: HashSet<&str> = rule.event_vars().into_iter().collect();

        for clause in &rule.clauses {
            if let ClauseTest::FieldBinds { var, .. } = &clause.test {
                if event_vars.contains(var.as_str()) {
                    return Err(Error::invalid_rule(
                        &rule.name,
                        format!("?{var} is used both as an event and as a field value"),
                    ));
                }
            }
        }

        for guard in &rule.guards {
            for var in guard.vars() {
                if !event_vars.contains(var) {
                    return Err(Error::invalid_rule(
                        &rule.name,
                        format!("guard refers to ?{var}, which no :where clause binds"),
                    ));
                }
            }
            if let GuardDecl::After {
                later,
                earlier,
                min,
                max,
            } = guard
            {
                if later == earlier {
                    return Err(Error::invalid_rule(
                        &rule.name,
                        format!("(after ?{later} ?{earlier}) compares an event with itself"),
                    ));
                }
                if max.is_some_and(|max| max < *min) {
                    return Err(Error::invalid_rule(
                        &rule.name,
                        "after: minimum gap exceeds maximum gap",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Analyzes `[?e :event]` or `[?e :field value]`.
    fn analyze_clause(ast: &Ast) -> Result<ClauseDecl> {
        let Ast::Vector(items, span) = ast else {
            return Err(parse_error(
                ast.span(),
                &format!("clause must be a vector, got {}", ast.type_name()),
            ));
        };
        let span = *span;

        let var = match items.first() {
            Some(item) => Self::variable(item)?,
            None => return Err(parse_error(span, "empty clause")),
        };

        let field = match items.get(1) {
            Some(Ast::Keyword(k, _)) => k.clone(),
            Some(other) => {
                return Err(parse_error(
                    other.span(),
                    &format!("clause field must be a keyword, got {}", other.type_name()),
                ));
            }
            None => return Err(parse_error(span, "clause requires a field keyword")),
        };

        let test = match (field.as_str(), items.get(2)) {
            (ANY_EVENT, None) => ClauseTest::AnyEvent,
            (ANY_EVENT, Some(extra)) => {
                return Err(parse_error(
                    extra.span(),
                    "[?e :event] takes no value; :event is reserved",
                ));
            }
            (_, None) => {
                return Err(parse_error(span, &format!("clause :{field} needs a value")));
            }
            (_, Some(Ast::Symbol(s, _))) if s == "_" => ClauseTest::FieldPresent { field },
            (_, Some(value)) => {
                if let Some(var) = value.as_variable() {
                    ClauseTest::FieldBinds {
                        field,
                        var: var.to_string(),
                    }
                } else {
                    ClauseTest::FieldEquals {
                        field,
                        value: Self::literal(value)?,
                    }
                }
            }
        };

        if let Some(extra) = items.get(3) {
            return Err(parse_error(extra.span(), "clause has too many elements"));
        }

        Ok(ClauseDecl { var, test, span })
    }

    /// Analyzes `(after ...)`, `(within ...)`, or `(older-than ...)`.
    fn analyze_guard(ast: &Ast) -> Result<GuardDecl> {
        let (head, args, span) = Self::call(ast, "guard")?;

        match (head, args) {
            ("after", [later, earlier]) => Ok(GuardDecl::After {
                later: Self::variable(later)?,
                earlier: Self::variable(earlier)?,
                min: Duration::ZERO,
                max: None,
            }),
            ("after", [later, earlier, min, max]) => Ok(GuardDecl::After {
                later: Self::variable(later)?,
                earlier: Self::variable(earlier)?,
                min: Self::duration(min)?,
                max: Some(Self::duration(max)?),
            }),
            ("within", [var, window]) => Ok(GuardDecl::Within {
                var: Self::variable(var)?,
                window: Self::duration(window)?,
            }),
            ("older-than", [var, age]) => Ok(GuardDecl::OlderThan {
                var: Self::variable(var)?,
                age: Self::duration(age)?,
            }),
            ("after" | "within" | "older-than", _) => Err(parse_error(
                span,
                &format!("wrong number of arguments to {head}"),
            )),
            (other, _) => Err(parse_error(span, &format!("unknown guard: {other}"))),
        }
    }

    /// Analyzes `(emit :tag)` or `(log "message")`.
    fn analyze_action(ast: &Ast) -> Result<ActionDecl> {
        let (head, args, span) = Self::call(ast, "action")?;

        match (head, args) {
            ("emit", [Ast::Keyword(tag, _) | Ast::String(tag, _)]) => {
                Ok(ActionDecl::Emit(tag.clone()))
            }
            ("log", [Ast::String(message, _)]) => Ok(ActionDecl::Log(message.clone())),
            ("emit", _) => Err(parse_error(span, "emit takes a single keyword")),
            ("log", _) => Err(parse_error(span, "log takes a single string")),
            (other, _) => Err(parse_error(span, &format!("unknown action: {other}"))),
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Matches `(head ...)`, returning the elements and span.
    fn headed_list<'a>(ast: &'a Ast, head: &str) -> Option<(&'a [Ast], Span)> {
        match ast {
            Ast::List(elements, span) if elements.first().and_then(Ast::as_symbol) == Some(head) => {
                Some((elements, *span))
            }
            _ => None,
        }
    }

    /// Splits `:key value` pairs.
    fn options(items: &[Ast], span: Span) -> Result<Vec<(&str, &Ast)>> {
        let mut pairs = Vec::new();
        let mut iter = items.iter();
        while let Some(key) = iter.next() {
            let Ast::Keyword(name, _) = key else {
                return Err(parse_error(
                    key.span(),
                    &format!("expected keyword, got {}", key.type_name()),
                ));
            };
            let Some(value) = iter.next() else {
                return Err(parse_error(span, &format!("missing value for :{name}")));
            };
            pairs.push((name.as_str(), value));
        }
        Ok(pairs)
    }

    fn vector_items<'a>(ast: &'a Ast, option: &str) -> Result<&'a [Ast]> {
        match ast {
            Ast::Vector(items, _) => Ok(items),
            other => Err(parse_error(
                other.span(),
                &format!("{option} must be a vector, got {}", other.type_name()),
            )),
        }
    }

    /// Matches `(head args...)` with a symbol head.
    fn call<'a>(ast: &'a Ast, what: &str) -> Result<(&'a str, &'a [Ast], Span)> {
        match ast {
            Ast::List(elements, span) => match elements.split_first() {
                Some((Ast::Symbol(head, _), args)) => Ok((head.as_str(), args, *span)),
                _ => Err(parse_error(*span, &format!("{what} must start with a symbol"))),
            },
            other => Err(parse_error(
                other.span(),
                &format!("{what} must be a list, got {}", other.type_name()),
            )),
        }
    }

    fn variable(ast: &Ast) -> Result<String> {
        ast.as_variable().map(str::to_string).ok_or_else(|| {
            parse_error(
                ast.span(),
                &format!("expected ?variable, got {}", ast.type_name()),
            )
        })
    }

    fn duration(ast: &Ast) -> Result<Duration> {
        let millis = match ast {
            Ast::Duration(ms, _) | Ast::Int(ms, _) => *ms,
            other => {
                return Err(parse_error(
                    other.span(),
                    &format!("expected duration, got {}", other.type_name()),
                ));
            }
        };
        if millis < 0 {
            return Err(parse_error(ast.span(), "durations cannot be negative"));
        }
        Ok(Duration::from_millis(millis))
    }

    fn literal(ast: &Ast) -> Result<Value> {
        Ok(match ast {
            Ast::Nil(_) => Value::Nil,
            Ast::Bool(b, _) => Value::Bool(*b),
            Ast::Int(n, _) => Value::Int(*n),
            Ast::Float(n, _) => Value::Float(*n),
            Ast::String(s, _) => Value::from(s.as_str()),
            other => {
                return Err(parse_error(
                    other.span(),
                    &format!("unsupported literal in clause: {}", other.type_name()),
                ));
            }
        })
    }
}

fn parse_error(span: Span, message: &str) -> Error {
    Error::new(ErrorKind::ParseError {
        message: message.to_string(),
        line: span.line,
        column: span.column,
        context: String::new(),
    })
}
