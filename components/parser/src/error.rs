//! Parser error helpers

use crate::lexer::Token;
use core_types::{CompileError, ErrorKind, SourcePosition};

/// Create an unexpected token error
pub fn unexpected_token(found: &Token, expected: &str, position: SourcePosition) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedToken {
            found: found.to_string(),
            expected: expected.to_string(),
        },
        position,
    )
}

/// Create an error for `end name` closing the wrong declaration
pub fn wrong_end_suffix(found: &str, expected: &str, position: SourcePosition) -> CompileError {
    CompileError::new(
        ErrorKind::WrongEndSuffix {
            found: found.to_string(),
            expected: expected.to_string(),
        },
        position,
    )
}
