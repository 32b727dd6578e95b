//! Code generation tests

use bytecode_system::{disassemble, LangOp, NativeSignature, Opcode, Program};
use compiler::Compiler;

fn natives() -> Vec<NativeSignature> {
    vec![
        NativeSignature::procedure("print", &["text"]),
        NativeSignature::function("text", &["integer"], "text"),
    ]
}

fn compile(source: &str) -> (Compiler, Program) {
    let mut compiler = Compiler::with_natives(&natives()).unwrap();
    let program = compiler.compile_source(source).unwrap();
    (compiler, program)
}

fn opcodes(codes: &[i64]) -> Vec<Opcode> {
    codes
        .chunks(2)
        .filter_map(|pair| Opcode::from_code(pair[0]))
        .collect()
}

#[test]
fn test_global_var_is_a_single_push() {
    let (_, program) = compile("var a := 42;");
    let root = &program.blocks[program.entry];
    assert_eq!(root.codes, vec![Opcode::Push.code(), 42]);
}

/// Stack depth after running a straight-line block of pushes and allocations
fn pushed_slots(codes: &[i64]) -> usize {
    let mut stack: Vec<i64> = Vec::new();
    for pair in codes.chunks(2) {
        match (Opcode::from_code(pair[0]), pair[1]) {
            (Some(Opcode::Push), value) => stack.push(value),
            (Some(Opcode::Swap), _) => {}
            (Some(Opcode::Ext), op) if op == LangOp::CreateString.code() => {}
            (Some(Opcode::Ext), op) if op == LangOp::CreateBlob.code() => {
                let size = stack.pop().unwrap() as usize;
                stack.truncate(stack.len() - size);
                stack.push(-1);
            }
            other => panic!("unexpected instruction {:?}", other),
        }
    }
    stack.len()
}

#[test]
fn test_composite_values_push_their_slot_count() {
    let cases = [
        ("var t := (1, 'a');", 2),
        ("var v := 3 as integer | (a integer, b text);", 3),
        ("var w := (1, 'a') as integer | (a integer, b text);", 3),
        ("var r := {x: 1, y: 'b'};", 1),
    ];
    for (source, slots) in cases {
        let (compiler, program) = compile(source);
        let root = &program.blocks[program.entry];
        assert_eq!(pushed_slots(&root.codes), slots, "{}", source);
        assert_eq!(compiler.global_slot_count(), slots, "{}", source);
    }
}

#[test]
fn test_declarations_produce_callable_blocks_only() {
    let (compiler, program) = compile("procedure hello() begin print('hi'); end hello;");
    assert_eq!(program.entry, program.blocks.len());
    let index = compiler
        .code_blocks()
        .iter()
        .position(|b| b.name == "hello()")
        .unwrap();
    let ops = opcodes(&compiler.code_blocks()[index].codes);
    assert_eq!(ops.last(), Some(&Opcode::Ret));
    assert!(ops.contains(&Opcode::CallNative));
}

#[test]
fn test_array_helpers_are_generated_once() {
    let (compiler, _) = compile("var a := [1, 2]; var b := [3]; var n := length(a);");
    let helpers = compiler
        .code_blocks()
        .iter()
        .filter(|b| b.name == "last_index([integer])")
        .count();
    assert_eq!(helpers, 1);
    assert!(compiler.context().function("index_of(integer,[integer])").is_some());
}

#[test]
fn test_last_read_in_scope_becomes_move() {
    let (compiler, _) = compile(
        "procedure p() begin var s := 'x'; print(s); print(s); end p;",
    );
    let block = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "p()")
        .unwrap();
    let ops = opcodes(&block.codes);
    let copies = ops.iter().filter(|op| **op == Opcode::PushLocal).count();
    let moves = ops.iter().filter(|op| **op == Opcode::PushLocalMove).count();
    assert_eq!((copies, moves), (1, 1));
}

#[test]
fn test_read_inside_loop_is_never_moved() {
    let (compiler, _) = compile(
        "procedure p() begin var s := 'x'; while true loop print(s); end loop; end p;",
    );
    let block = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "p()")
        .unwrap();
    assert!(!opcodes(&block.codes).contains(&Opcode::PushLocalMove));
}

#[test]
fn test_parameters_sit_below_frame_header() {
    let (compiler, _) = compile("function id(a integer, b integer) integer begin return b; end id;");
    let block = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "id(integer,integer)")
        .unwrap();
    assert_eq!(
        block.codes,
        vec![Opcode::PushLocal.code(), -5, Opcode::Ret.code(), 1]
    );
}

#[test]
fn test_exit_jumps_past_loop() {
    let (_, program) = compile("begin var i := 0; while true loop exit; end loop; end;");
    let root = &program.blocks[program.entry];
    let listing = disassemble(root, None);
    assert!(listing.contains("JMP"));
    let ops = opcodes(&root.codes);
    assert_eq!(ops.iter().filter(|op| **op == Opcode::Jmp).count(), 2);
}

#[test]
fn test_variant_conversion_appends_discriminant() {
    let (compiler, program) = compile("var v := 7 as integer | text;");
    let root = &program.blocks[program.entry];
    let id = compiler.context().types.lookup("integer").unwrap().global_id();
    assert_eq!(
        root.codes,
        vec![Opcode::Push.code(), 7, Opcode::Push.code(), id]
    );
    assert_eq!(compiler.global_slot_count(), 2);
}

#[test]
fn test_statements_compile_one_at_a_time() {
    let mut compiler = Compiler::with_natives(&natives()).unwrap();
    let stmts = parser::Parser::new("var a := 1; print(text(a));")
        .parse_program()
        .unwrap();
    let first = compiler.compile_statement(&stmts[0]).unwrap().unwrap();
    let second = compiler.compile_statement(&stmts[1]).unwrap().unwrap();
    assert_eq!(first.codes.len(), 2);
    assert_eq!(second.codes[0], Opcode::PushGlobal.code());
}
