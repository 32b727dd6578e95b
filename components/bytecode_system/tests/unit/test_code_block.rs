//! Unit tests for CodeBlock emission and back-patching

use bytecode_system::{CodeBlock, LangOp, NoArgOp, Opcode};

#[test]
fn test_if_shape_back_patching() {
    let mut block = CodeBlock::new("global");
    block.emit_push(1);
    let false_jump = block.emit_jz();
    block.emit_push(2);
    let end_jump = block.emit_jmp(0);
    block.set_loc(false_jump);
    block.emit_push(3);
    block.set_loc(end_jump);

    assert_eq!(block.codes[false_jump], 8);
    assert_eq!(block.codes[end_jump], 10);
}

#[test]
fn test_rewrite_read_into_move() {
    let mut block = CodeBlock::new("f(text)");
    block.emit(Opcode::PushLocal, -5);
    let loc = block.current_loc() - 1;
    block.set_opcode(loc, Opcode::PushLocalMove);
    assert_eq!(block.opcode_at(loc), Some(Opcode::PushLocalMove));
    assert_eq!(block.codes[loc + 1], -5);
}

#[test]
fn test_ext_and_noarg_encodings() {
    let mut block = CodeBlock::new("global");
    block.emit_ext(LangOp::CreateBlob);
    block.emit_noarg(NoArgOp::Suspend);
    assert_eq!(block.codes, vec![22, 2, 1, 1]);
}

#[test]
fn test_negative_zero_float_is_distinct_constant() {
    let mut block = CodeBlock::new("global");
    let a = block.add_float_const(0.0);
    let b = block.add_float_const(-0.0);
    assert_ne!(a, b);
}
