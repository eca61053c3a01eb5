//! Lexer for rule files.
//!
//! The lexer converts source text into a stream of tokens.

use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Lexer for rule source text.
pub struct Lexer<'src> {
    /// Source text being tokenized.
    source: &'src str,
    /// Remaining source text.
    rest: &'src str,
    /// Current byte offset in source.
    position: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let Some(c) = self.peek_char() else {
            return Token::new(
                TokenKind::Eof,
                Span::new(start, start, start_line, start_column),
            );
        };

        let kind = match c {
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            ';' => self.scan_comment(),
            ':' => self.scan_keyword(),
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(),
            '-' | '+' => {
                // Could be number or symbol
                if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number()
                } else {
                    self.scan_symbol()
                }
            }
            c if is_symbol_start(c) => self.scan_symbol(),
            c => {
                self.advance();
                TokenKind::Error(format!("unexpected character: {c}"))
            }
        };

        Token::new(
            kind,
            Span::new(start, self.position, start_line, start_column),
        )
    }

    /// Tokenizes all source and returns a vector of tokens.
    ///
    /// Comments are included in the output.
    #[must_use]
    pub fn tokenize_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    /// Skips whitespace. Commas count as whitespace.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == ',' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_comment(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        TokenKind::Comment(text)
    }

    fn scan_keyword(&mut self) -> TokenKind {
        self.advance(); // consume ':'
        let name = self.scan_symbol_text();
        if name.is_empty() {
            TokenKind::Error("expected keyword name after ':'".into())
        } else {
            TokenKind::Keyword(name)
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // consume opening '"'
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(c) => {
                            return TokenKind::Error(format!("invalid escape sequence: \\{c}"));
                        }
                        None => {
                            return TokenKind::Error(
                                "unexpected end of input in string escape".into(),
                            );
                        }
                    };
                    self.advance();
                    text.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => {
                    return TokenKind::Error("unterminated string literal".into());
                }
            }
        }
        TokenKind::String(text)
    }

    /// Scans an integer, float, or duration literal.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.position;
        let mut has_dot = false;

        if self.peek_char() == Some('-') || self.peek_char() == Some('+') {
            self.advance();
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.'
                && !has_dot
                && self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let digits_end = self.position;
        while self.peek_char().is_some_and(char::is_alphabetic) {
            self.advance();
        }
        let text = &self.source[start..digits_end];
        let suffix = &self.source[digits_end..self.position];

        if !suffix.is_empty() {
            if has_dot {
                return TokenKind::Error(format!("durations must be whole numbers: {text}{suffix}"));
            }
            return scan_duration(text, suffix);
        }

        if has_dot {
            match text.parse::<f64>() {
                Ok(n) => TokenKind::Float(n),
                Err(e) => TokenKind::Error(format!("invalid float: {e}")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(e) => TokenKind::Error(format!("invalid integer: {e}")),
            }
        }
    }

    fn scan_symbol(&mut self) -> TokenKind {
        let name = self.scan_symbol_text();

        match name.as_str() {
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Symbol(name),
        }
    }

    /// Scans symbol text (used for both symbols and keywords).
    fn scan_symbol_text(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.peek_char() {
            if is_symbol_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.source[start..self.position].to_string()
    }
}

fn scan_duration(digits: &str, suffix: &str) -> TokenKind {
    let scale = match suffix {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => return TokenKind::Error(format!("unknown duration unit: {other}")),
    };
    match digits.parse::<i64>().ok().and_then(|n| n.checked_mul(scale)) {
        Some(millis) => TokenKind::Duration(millis),
        None => TokenKind::Error(format!("duration out of range: {digits}{suffix}")),
    }
}

/// Returns true if `c` can start a symbol.
fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic()
        || matches!(
            c,
            '_' | '+' | '-' | '*' | '/' | '!' | '?' | '<' | '>' | '=' | '&' | '%' | '$'
        )
}

/// Returns true if `c` can appear in a symbol (not at start).
fn is_symbol_char(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit() || c == '.' || c == ':'
}
