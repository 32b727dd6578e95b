//! Source position tracking.
//!
//! Every token, AST node and compile error carries a [`SourcePosition`] so
//! failures can be reported against the original program text.

use std::fmt;

/// Represents a position in source code.
///
/// Lines and columns are 1-indexed, the offset is a character offset from
/// the start of the source.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition {
///     line: 10,
///     column: 5,
///     offset: 150,
/// };
///
/// assert_eq!(pos.line, 10);
/// assert_eq!(pos.to_string(), "line 10, column 5");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Character offset from the start of the source
    pub offset: usize,
}

impl SourcePosition {
    /// Create a position from a line and column, with a zero offset
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
