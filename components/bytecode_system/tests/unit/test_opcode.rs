//! Unit tests for the instruction set encoding

use bytecode_system::{LangOp, NoArgOp, Opcode};

#[test]
fn test_every_opcode_round_trips_through_its_word() {
    for op in Opcode::ALL {
        assert_eq!(Opcode::from_code(op.code()), Some(*op));
    }
    for op in NoArgOp::ALL {
        assert_eq!(NoArgOp::from_code(op.code()), Some(*op));
    }
    for op in LangOp::ALL {
        assert_eq!(LangOp::from_code(op.code()), Some(*op));
    }
}

#[test]
fn test_fixed_encodings() {
    assert_eq!(Opcode::Push.code(), 5);
    assert_eq!(Opcode::Ext.code(), 22);
    assert_eq!(NoArgOp::Not.code(), 23);
    assert_eq!(LangOp::CreateString.code(), 0);
    assert_eq!(LangOp::YieldGeneratorItem.code(), 16);
}

#[test]
fn test_zero_is_not_a_two_word_opcode() {
    assert_eq!(Opcode::from_code(0), None);
}
