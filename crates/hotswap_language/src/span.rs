//! Where a token or form sits in a rule file.

/// Byte range plus the line and column of its first character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
    /// Line of `start`, counted from 1.
    pub line: u32,
    /// Column of `start`, counted from 1.
    pub column: u32,
}

impl Span {
    /// Creates a span.
    #[must_use]
    pub const fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Extends this span up to the end of `last`, keeping the start position.
    #[must_use]
    pub const fn through(self, last: Self) -> Self {
        Self { end: last.end, ..self }
    }

    /// Slices `source` to the covered bytes.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}
