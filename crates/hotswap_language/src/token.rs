//! Lexical units of the rule language.
//!
//! The lexer yields a flat `Vec<Token>` ending in `Eof`; the parser walks it.

use crate::span::Span;

/// One lexical unit and where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// What was read
    pub kind: TokenKind,
    /// Where it was read
    pub span: Span,
}

impl Token {
    /// Pairs a kind with its span.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Kinds of lexical unit.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,

    // Literals
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// Integer literal like `42` or `-17`
    Int(i64),
    /// Float literal like `3.14`
    Float(f64),
    /// Duration literal like `500ms`, `20s`, `5m`, `1h` (in milliseconds)
    Duration(i64),
    /// String literal like `"hello"`
    String(String),
    /// Symbol like `rule:`, `?e`, or `SimpleTestRule-One`
    Symbol(String),
    /// Keyword like `:event` or `:salience`
    Keyword(String),

    // Meta
    /// Comment text (including `;`)
    Comment(String),
    /// End of input
    Eof,
    /// Unreadable input, with the reason
    Error(String),
}

impl TokenKind {
    /// Comments are skipped by the parser.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(self, Self::Comment(_))
    }

    /// Name used in "expected X, found Y" messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Nil => "nil",
            Self::True => "true",
            Self::False => "false",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Duration(_) => "duration",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Keyword(_) => "keyword",
            Self::Comment(_) => "comment",
            Self::Eof => "end of input",
            Self::Error(_) => "error",
        }
    }
}
