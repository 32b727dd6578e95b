//! Unit tests for the text persistence format

use bytecode_system::{CodeBlock, LangOp, LoadError, Opcode, Program};
use std::io::Write;

fn sample_program() -> Program {
    let mut callee = CodeBlock::new("f(integer)");
    callee.emit(Opcode::PushLocal, -5);
    callee.emit(Opcode::Ret, 1);

    let mut root = CodeBlock::new("global");
    let s = root.add_str_const("it's done");
    let f = root.add_float_const(2.5);
    root.emit_push(s);
    root.emit_ext(LangOp::CreateString);
    root.emit(Opcode::PushF, f);
    Program::new(vec![callee], vec![root])
}

#[test]
fn test_program_entry_follows_callables() {
    let program = sample_program();
    assert_eq!(program.entry, 1);
    assert_eq!(program.blocks.len(), 2);
}

#[test]
fn test_save_and_load_through_a_file() {
    let program = sample_program();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(program.to_text().as_bytes()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let loaded = Program::from_text(&text).unwrap();
    assert_eq!(loaded, program);
}

#[test]
fn test_float_lines() {
    let text = sample_program().to_text();
    assert!(text.lines().any(|l| l == "2.5"));
}

#[test]
fn test_entry_past_block_count_is_rejected() {
    assert_eq!(Program::from_text("0 3\n"), Err(LoadError::InvalidEntry(3)));
}
