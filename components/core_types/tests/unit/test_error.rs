//! Unit tests for CompileError and ErrorKind

use core_types::{CompileError, ErrorKind, SourcePosition};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_unexpected_token_message() {
        let kind = ErrorKind::UnexpectedToken {
            found: "then".to_string(),
            expected: ";".to_string(),
        };
        assert_eq!(kind.to_string(), "Unexpected token then, expected ;");
    }

    #[test]
    fn test_wrong_end_suffix_message() {
        let kind = ErrorKind::WrongEndSuffix {
            found: "g".to_string(),
            expected: "f".to_string(),
        };
        assert_eq!(kind.to_string(), "Wrong end suffix g, expected f");
    }

    #[test]
    fn test_unknown_field_message() {
        let kind = ErrorKind::UnknownField {
            field: "z".to_string(),
            record: "{x integer, y integer}".to_string(),
        };
        assert_eq!(kind.to_string(), "Unknown field z in {x integer, y integer}");
    }

    #[test]
    fn test_tuple_size_mismatch_message() {
        let kind = ErrorKind::TupleSizeMismatch { found: 3, expected: 2 };
        assert_eq!(kind.to_string(), "Tuple with 3 items when 2 were expected");
    }

    #[test]
    fn test_no_return_message() {
        let kind = ErrorKind::NoReturn("f(integer)".to_string());
        assert_eq!(kind.to_string(), "No return for function f(integer)");
    }

    #[test]
    fn test_error_kind_clone_eq() {
        let kind1 = ErrorKind::UnknownVariable("x".to_string());
        let kind2 = kind1.clone();
        assert_eq!(kind1, kind2);
    }
}

#[cfg(test)]
mod compile_error_tests {
    use super::*;

    #[test]
    fn test_message_has_no_position() {
        let error = CompileError::new(ErrorKind::UnreachableCode, SourcePosition::new(2, 3));
        assert_eq!(error.message(), "Unreachable code");
    }

    #[test]
    fn test_display_has_position() {
        let error = CompileError::new(
            ErrorKind::CantMutateConst("limit".to_string()),
            SourcePosition::new(5, 1),
        );
        assert_eq!(error.to_string(), "Can't mutate const limit at line 5, column 1");
    }

    #[test]
    fn test_compile_error_is_std_error() {
        let error = CompileError::new(ErrorKind::UnexpectedYield, SourcePosition::new(1, 1));
        let boxed: Box<dyn std::error::Error> = Box::new(error);
        assert!(boxed.to_string().starts_with("Unexpected yield"));
    }
}
