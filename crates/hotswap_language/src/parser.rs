//! Parser for rule files.
//!
//! The parser converts a stream of tokens into an abstract syntax tree.

use hotswap_foundation::{Error, ErrorKind, Result};

use crate::ast::Ast;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parser for rule source text.
pub struct Parser<'src> {
    /// The lexer providing tokens.
    lexer: Lexer<'src>,
    /// Current token (lookahead).
    current: Token,
    /// Source text (for error messages).
    source: &'src str,
}

impl<'src> Parser<'src> {
    /// Creates a new parser for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            source,
        }
    }

    /// Parses a single form from the source.
    ///
    /// # Errors
    /// Returns an error if the source cannot be parsed.
    pub fn parse(&mut self) -> Result<Ast> {
        self.skip_trivia();
        self.parse_form()
    }

    /// Parses all top-level forms from the source.
    ///
    /// # Errors
    /// Returns an error if the source cannot be parsed.
    pub fn parse_all(&mut self) -> Result<Vec<Ast>> {
        let mut forms = Vec::new();
        self.skip_trivia();

        while self.current.kind != TokenKind::Eof {
            forms.push(self.parse_form()?);
            self.skip_trivia();
        }

        Ok(forms)
    }

    fn parse_form(&mut self) -> Result<Ast> {
        self.skip_trivia();

        let span = self.current.span;
        let atom = match &self.current.kind {
            TokenKind::Nil => Ast::Nil(span),
            TokenKind::True => Ast::Bool(true, span),
            TokenKind::False => Ast::Bool(false, span),
            TokenKind::Int(n) => Ast::Int(*n, span),
            TokenKind::Float(n) => Ast::Float(*n, span),
            TokenKind::Duration(ms) => Ast::Duration(*ms, span),
            TokenKind::String(s) => Ast::String(s.clone(), span),
            TokenKind::Symbol(name) => Ast::Symbol(name.clone(), span),
            TokenKind::Keyword(name) => Ast::Keyword(name.clone(), span),
            TokenKind::LParen => return self.parse_list(),
            TokenKind::LBracket => return self.parse_vector(),
            TokenKind::Eof => return Err(self.error("unexpected end of input")),
            TokenKind::Error(msg) => return Err(self.error(msg)),
            TokenKind::RParen | TokenKind::RBracket => {
                return Err(self.error(&format!("unexpected {}", self.current.kind.name())));
            }
            TokenKind::Comment(_) => {
                self.advance();
                return self.parse_form();
            }
        };
        self.advance();
        Ok(atom)
    }

    /// Parses a list: `(...)`.
    fn parse_list(&mut self) -> Result<Ast> {
        let (elements, span) =
            self.parse_delimited(&TokenKind::LParen, &TokenKind::RParen, "list")?;
        Ok(Ast::List(elements, span))
    }

    /// Parses a vector: `[...]`.
    fn parse_vector(&mut self) -> Result<Ast> {
        let (elements, span) =
            self.parse_delimited(&TokenKind::LBracket, &TokenKind::RBracket, "vector")?;
        Ok(Ast::Vector(elements, span))
    }

    fn parse_delimited(
        &mut self,
        open: &TokenKind,
        close: &TokenKind,
        what: &str,
    ) -> Result<(Vec<Ast>, Span)> {
        let start_span = self.current.span;
        self.expect(open)?;

        let mut elements = Vec::new();
        self.skip_trivia();

        while self.current.kind != *close {
            if self.current.kind == TokenKind::Eof {
                return Err(self.error_at(start_span, &format!("unterminated {what}")));
            }
            elements.push(self.parse_form()?);
            self.skip_trivia();
        }

        let end_span = self.current.span;
        self.expect(close)?;

        Ok((elements, start_span.through(end_span)))
    }

    fn skip_trivia(&mut self) {
        while self.current.kind.is_trivia() {
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<()> {
        let matches =
            std::mem::discriminant(&self.current.kind) == std::mem::discriminant(expected);

        if matches {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                expected.name(),
                self.current.kind.name()
            )))
        }
    }

    fn error(&self, message: &str) -> Error {
        self.error_at(self.current.span, message)
    }

    fn error_at(&self, span: Span, message: &str) -> Error {
        Error::new(ErrorKind::ParseError {
            message: message.to_string(),
            line: span.line,
            column: span.column,
            context: source_line(self.source, span.line),
        })
    }
}

/// Returns the 1-based `line` of `source`, or an empty string.
fn source_line(source: &str, line: u32) -> String {
    let index = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    source.lines().nth(index).unwrap_or_default().to_string()
}

/// Fills in the source line of a `ParseError` raised without access to the text.
pub(crate) fn attach_source_line(mut error: Error, source: &str) -> Error {
    if let ErrorKind::ParseError { line, context, .. } = &mut error.kind {
        if context.is_empty() {
            *context = source_line(source, *line);
        }
    }
    error
}
