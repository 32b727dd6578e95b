//! Unit tests for SourcePosition

use core_types::SourcePosition;

#[cfg(test)]
mod source_position_tests {
    use super::*;

    #[test]
    fn test_default_position_is_zeroed() {
        let pos = SourcePosition::default();
        assert_eq!(pos.line, 0);
        assert_eq!(pos.column, 0);
        assert_eq!(pos.offset, 0);
    }

    #[test]
    fn test_position_is_copy() {
        let pos1 = SourcePosition::new(7, 3);
        let pos2 = pos1;
        assert_eq!(pos1, pos2);
    }

    #[test]
    fn test_position_display() {
        let pos = SourcePosition {
            line: 12,
            column: 1,
            offset: 240,
        };
        assert_eq!(format!("{}", pos), "line 12, column 1");
    }

    #[test]
    fn test_position_inequality() {
        assert_ne!(SourcePosition::new(1, 2), SourcePosition::new(2, 1));
    }
}
