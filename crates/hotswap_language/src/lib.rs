//! Rule-definition language for hotswap.
//!
//! Rule files are S-expressions:
//!
//! ```text
//! (ruleset: cep.sample :version 2)
//!
//! (rule: SimpleTestRule-Two
//!   :where [[?a :event] [?b :event]]
//!   :guard [(after ?b ?a 20s 30s)]
//!   :then  [(emit :pair)])
//! ```
//!
//! This crate provides:
//! - [`Lexer`] and [`Parser`] - Source text to [`Ast`]
//! - [`DeclarationAnalyzer`] - [`Ast`] to [`RulesFile`] declarations
//! - [`parse_rules`] - Both steps in one call
//! - [`header_version`] - The `:version` of a leading `ruleset:` form, read
//!   from tokens only

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod declaration;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::Ast;
pub use declaration::{
    ActionDecl, ClauseDecl, ClauseTest, DeclarationAnalyzer, GuardDecl, RuleDecl, RuleSetHeader,
    RulesFile,
};
pub use lexer::Lexer;
pub use parser::Parser;
pub use span::Span;
pub use token::{Token, TokenKind};

use hotswap_foundation::Result;

/// Parses and analyzes a complete rule file.
///
/// # Errors
/// Returns a `ParseError` for malformed text and `InvalidRule` for
/// well-formed rules with semantic problems.
pub fn parse_rules(source: &str) -> Result<RulesFile> {
    let forms = Parser::new(source).parse_all()?;
    DeclarationAnalyzer::analyze_file(&forms).map_err(|e| parser::attach_source_line(e, source))
}

/// Reads the `:version` of a leading `ruleset:` header without parsing the
/// rest of the file.
///
/// Returns 1 for a header without `:version`, and `None` when the first
/// form is not a well-formed header.
#[must_use]
pub fn header_version(source: &str) -> Option<u64> {
    let mut tokens = Lexer::tokenize_all(source)
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !k.is_trivia());

    if tokens.next()? != TokenKind::LParen
        || tokens.next()? != TokenKind::Symbol("ruleset:".into())
    {
        return None;
    }
    let (TokenKind::Symbol(_) | TokenKind::String(_)) = tokens.next()? else {
        return None;
    };

    let mut version = 1;
    loop {
        match tokens.next()? {
            TokenKind::RParen => return Some(version),
            TokenKind::Keyword(key) => {
                let value = tokens.next()?;
                if key == "version" {
                    let TokenKind::Int(n) = value else {
                        return None;
                    };
                    version = u64::try_from(n).ok()?;
                }
            }
            _ => return None,
        }
    }
}
