//! Error types for the hotswap system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::event::EventId;

/// The main error type for hotswap operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a duplicate event id error.
    #[must_use]
    pub fn duplicate_id(id: EventId) -> Self {
        Self::new(ErrorKind::DuplicateId(id))
    }

    /// Creates a duplicate rule name error.
    #[must_use]
    pub fn duplicate_rule_name(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateRuleName(name.into()))
    }

    /// Creates an invalid clock advance error.
    #[must_use]
    pub fn invalid_advance(delta: i64) -> Self {
        Self::new(ErrorKind::InvalidAdvance { delta })
    }

    /// Creates a session closed error.
    #[must_use]
    pub fn session_closed() -> Self {
        Self::new(ErrorKind::SessionClosed)
    }

    /// Creates an invalid rule error.
    #[must_use]
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        })
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true if this error was caused by a closed session.
    #[must_use]
    pub fn is_session_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::SessionClosed)
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// An event with the same id is already in working memory.
    #[error("duplicate event id: {0}")]
    DuplicateId(EventId),

    /// Two rules in one rule set share a name.
    #[error("duplicate rule name: {0}")]
    DuplicateRuleName(String),

    /// The clock was asked to move backwards or past the representable range.
    #[error("invalid clock advance: {delta}ms")]
    InvalidAdvance {
        /// The requested delta in milliseconds.
        delta: i64,
    },

    /// The session has been disposed.
    #[error("session is closed")]
    SessionClosed,

    /// Parse error in rule source text.
    #[error("parse error at {line}:{column}: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Line number (1-indexed).
        line: u32,
        /// Column number (1-indexed).
        column: u32,
        /// The source line where the error occurred.
        context: String,
    },

    /// A rule is well-formed but semantically invalid.
    #[error("invalid rule {rule}: {message}")]
    InvalidRule {
        /// The offending rule.
        rule: String,
        /// What is wrong with it.
        message: String,
    },

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// I/O error while reading or writing rule files, snapshots, or scenarios.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A replayed scenario did not produce the expected fired counts.
    #[error("scenario mismatch for rule {rule}: expected {expected}, got {actual}")]
    ScenarioMismatch {
        /// Rule whose count differed.
        rule: String,
        /// Expected fired count.
        expected: u64,
        /// Observed fired count.
        actual: u64,
    },
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum rule activations per firing pass exceeded.
    MaxActivations {
        /// The configured limit.
        limit: usize,
        /// Additional context about which rule(s) caused the issue.
        context: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxActivations { limit, context } => {
                write!(f, "max activations ({limit}) exceeded")?;
                if let Some(ctx) = context {
                    write!(f, ": {ctx}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Source file or rule name.
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<usize>,
    /// Column number in source.
    pub column: Option<usize>,
    /// Stack of operations that led to the error.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
            if let (Some(line), Some(col)) = (self.line, self.column) {
                write!(f, ":{line}:{col}")?;
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
