//! Abstract syntax tree for rule files.

use crate::span::Span;

/// An AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// `nil`
    Nil(Span),
    /// `true` or `false`
    Bool(bool, Span),
    /// Integer literal like `42`
    Int(i64, Span),
    /// Float literal like `3.14`
    Float(f64, Span),
    /// Duration literal like `20s`, in milliseconds
    Duration(i64, Span),
    /// String literal like `"hello"`
    String(String, Span),
    /// Symbol like `rule:` or `?e`
    Symbol(String, Span),
    /// Keyword like `:event`
    Keyword(String, Span),
    /// List form like `(after ?b ?a 20s 30s)`
    List(Vec<Ast>, Span),
    /// Vector form like `[?e :event]`
    Vector(Vec<Ast>, Span),
}

impl Ast {
    /// Returns the source span of this AST node.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Nil(s)
            | Self::Bool(_, s)
            | Self::Int(_, s)
            | Self::Float(_, s)
            | Self::Duration(_, s)
            | Self::String(_, s)
            | Self::Symbol(_, s)
            | Self::Keyword(_, s)
            | Self::List(_, s)
            | Self::Vector(_, s) => *s,
        }
    }

    /// Returns a human-readable name for this node's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil(_) => "nil",
            Self::Bool(_, _) => "bool",
            Self::Int(_, _) => "int",
            Self::Float(_, _) => "float",
            Self::Duration(_, _) => "duration",
            Self::String(_, _) => "string",
            Self::Symbol(_, _) => "symbol",
            Self::Keyword(_, _) => "keyword",
            Self::List(_, _) => "list",
            Self::Vector(_, _) => "vector",
        }
    }

    /// Returns the symbol name if this is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s, _) => Some(s),
            _ => None,
        }
    }

    /// Returns the variable name (without `?`) if this is a `?var` symbol.
    #[must_use]
    pub fn as_variable(&self) -> Option<&str> {
        self.as_symbol()
            .and_then(|s| s.strip_prefix('?'))
            .filter(|name| !name.is_empty())
    }
}
