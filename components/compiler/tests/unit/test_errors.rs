//! Compile error tests

use bytecode_system::NativeSignature;
use compiler::Compiler;
use core_types::{CompileError, ErrorKind};

fn compiler() -> Compiler {
    Compiler::with_natives(&[
        NativeSignature::procedure("print", &["text"]),
        NativeSignature::function("text", &["integer"], "text"),
    ])
    .unwrap()
}

fn compile_error(source: &str) -> CompileError {
    compiler().compile_source(source).unwrap_err()
}

#[test]
fn test_unknown_variable() {
    let err = compile_error("var a := b;");
    assert_eq!(err.kind, ErrorKind::UnknownVariable("b".to_string()));
    assert_eq!(err.to_string(), "Unknown variable b at line 1, column 10");
}

#[test]
fn test_variable_declared_twice() {
    let err = compile_error("var a := 1;\nvar a := 2;");
    assert_eq!(err.kind, ErrorKind::VariableAlreadyExists("a".to_string()));
    assert_eq!(err.position.line, 2);
}

#[test]
fn test_shadowing_in_nested_block_is_allowed() {
    compiler()
        .compile_source("var a := 1; begin var a := 'x'; print(a); end;")
        .unwrap();
}

#[test]
fn test_const_cannot_be_assigned() {
    let err = compile_error("const c := 1; c := 2;");
    assert_eq!(err.kind, ErrorKind::CantMutateConst("c".to_string()));
    assert_eq!(err.message(), "Can't mutate const c");
}

#[test]
fn test_exit_outside_loop() {
    let err = compile_error("exit;");
    assert_eq!(err.kind, ErrorKind::UnexpectedExit);
}

#[test]
fn test_exit_does_not_cross_a_frame() {
    let err = compile_error(
        "while true loop
           procedure p() begin exit; end p;
         end loop;",
    );
    assert_eq!(err.kind, ErrorKind::UnexpectedExit);
}

#[test]
fn test_return_outside_frame() {
    let err = compile_error("return;");
    assert_eq!(err.kind, ErrorKind::UnexpectedReturn);
}

#[test]
fn test_return_value_from_procedure() {
    let err = compile_error("procedure p() begin return 1; end p;");
    assert_eq!(err.kind, ErrorKind::UnexpectedReturnWithValue);
}

#[test]
fn test_return_without_value_from_function() {
    let err = compile_error("function f() integer begin return; end f;");
    assert_eq!(err.kind, ErrorKind::UnexpectedReturnWithoutValue);
}

#[test]
fn test_function_falling_off_the_end() {
    let err = compile_error(
        "function f(a integer) integer begin
           if a > 0 then return 1; end if;
         end f;",
    );
    assert_eq!(err.kind, ErrorKind::NoReturn("f(integer)".to_string()));
}

#[test]
fn test_failed_function_is_not_registered() {
    let mut compiler = compiler();
    compiler
        .compile_source("function f() integer begin var a := 1; end f;")
        .unwrap_err();
    assert!(compiler.context().function("f()").is_none());
    compiler
        .compile_source("function f() integer begin return 1; end f;")
        .unwrap();
    assert!(compiler.context().function("f()").is_some());
}

#[test]
fn test_statement_after_return() {
    let err = compile_error("procedure p() begin return; print('x'); end p;");
    assert_eq!(err.kind, ErrorKind::UnreachableCode);
}

#[test]
fn test_unknown_function_reports_signature() {
    let err = compile_error("var a := foo(1, 'x');");
    assert_eq!(err.kind, ErrorKind::UnknownFunction("foo(integer,text)".to_string()));
}

#[test]
fn test_unknown_procedure() {
    let err = compile_error("print(1);");
    assert_eq!(err.kind, ErrorKind::UnknownProcedure("print(integer)".to_string()));
}

#[test]
fn test_tuple_destructuring_arity() {
    let err = compile_error("var (a, b) := (1, 2, 3);");
    assert_eq!(
        err.kind,
        ErrorKind::TupleSizeMismatch {
            found: 3,
            expected: 2
        }
    );
}

#[test]
fn test_unknown_record_field() {
    let err = compile_error("var r := {x: 1}; var y := r.y;");
    assert_eq!(
        err.kind,
        ErrorKind::UnknownField {
            field: "y".to_string(),
            record: "{x integer}".to_string()
        }
    );
}

#[test]
fn test_type_declared_twice() {
    let err = compile_error("type t integer; type t text;");
    assert_eq!(err.kind, ErrorKind::TypeAlreadyExists("t".to_string()));
}

#[test]
fn test_duplicate_parameter() {
    let err = compile_error("procedure p(a integer, a text) begin end p;");
    assert_eq!(err.kind, ErrorKind::ParameterAlreadyExists("a".to_string()));
}

#[test]
fn test_function_declared_twice() {
    let err = compile_error(
        "function f() integer begin return 1; end f;
         function f() integer begin return 2; end f;",
    );
    assert_eq!(err.kind, ErrorKind::FunctionAlreadyExists("f()".to_string()));
}

#[test]
fn test_kindof_without_else_must_cover_every_member() {
    let err = compile_error(
        "var v := 1 as integer | text;
         kindof v when integer i then print(text(i)); end kindof;",
    );
    assert_eq!(err.kind, ErrorKind::VariantKindNotManaged("text".to_string()));
    assert_eq!(err.message(), "Variant kind text not managed");
}

#[test]
fn test_kindof_branch_outside_variant() {
    let err = compile_error(
        "var v := 1 as integer | text;
         kindof v when real r then print('r'); else print('?'); end kindof;",
    );
    assert_eq!(err.kind, ErrorKind::UnknownKind("real".to_string()));
}

#[test]
fn test_unknown_directive() {
    let err = compile_error("@pause@;");
    assert_eq!(err.kind, ErrorKind::UnknownDirective("pause".to_string()));
}

#[test]
fn test_yield_outside_generator() {
    let err = compile_error("procedure p() begin yield 1; end p;");
    assert_eq!(err.kind, ErrorKind::UnexpectedYield);
}

#[test]
fn test_compiler_recovers_after_error() {
    let mut compiler = compiler();
    compiler
        .compile_source("procedure p() begin print(missing); end p;")
        .unwrap_err();
    let program = compiler.compile_source("var a := 1;").unwrap();
    assert_eq!(program.blocks[program.entry].codes.len(), 2);
    assert_eq!(compiler.global_slot_count(), 1);
}
