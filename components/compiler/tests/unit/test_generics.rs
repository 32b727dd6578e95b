//! Generic instantiation and variant dispatch tests

use bytecode_system::NativeSignature;
use compiler::{Callable, Compiler};
use core_types::ErrorKind;

fn compiler() -> Compiler {
    Compiler::with_natives(&[
        NativeSignature::procedure("print", &["text"]),
        NativeSignature::function("text", &["integer"], "text"),
    ])
    .unwrap()
}

fn blocks_named(compiler: &Compiler, name: &str) -> usize {
    compiler
        .code_blocks()
        .iter()
        .filter(|b| b.name == name)
        .count()
}

#[test]
fn test_instantiated_once_per_signature() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function twice(x any) any begin return x + x; end twice;
             var a := twice(1);
             var b := twice(2);
             var c := twice(a);",
        )
        .unwrap();
    assert_eq!(blocks_named(&compiler, "twice(integer)"), 1);
    let function = compiler.context().function("twice(integer)").unwrap();
    assert_eq!(compiler.context().types.key(function.return_type), "integer");
}

#[test]
fn test_generic_return_type_is_inferred_per_instance() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function first(x any) any begin return [x]; end first;
             var a := first(1);
             var b := first('s');",
        )
        .unwrap();
    let types = &compiler.context().types;
    let ints = compiler.context().function("first(integer)").unwrap();
    let texts = compiler.context().function("first(text)").unwrap();
    assert_eq!(types.key(ints.return_type), "[integer]");
    assert_eq!(types.key(texts.return_type), "[text]");
}

#[test]
fn test_most_specific_generic_wins() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function pick(a any, b any) text begin return 'loose'; end pick;
             function pick(a integer, b any) text begin return 'tight'; end pick;
             var r := pick(1, 2);
             var s := pick('x', 2);",
        )
        .unwrap();
    let tight = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "pick(integer,integer)")
        .unwrap();
    assert_eq!(tight.str_consts, vec!["tight".to_string()]);
    let loose = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "pick(text,integer)")
        .unwrap();
    assert_eq!(loose.str_consts, vec!["loose".to_string()]);
}

#[test]
fn test_later_generic_parameter_breaks_ties() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function pick(a any, b integer) text begin return 'first'; end pick;
             function pick(a integer, b any) text begin return 'second'; end pick;
             var r := pick(1, 2);",
        )
        .unwrap();
    let block = compiler
        .code_blocks()
        .iter()
        .find(|b| b.name == "pick(integer,integer)")
        .unwrap();
    assert_eq!(block.str_consts, vec!["second".to_string()]);
}

#[test]
fn test_generic_declared_twice() {
    let err = compiler()
        .compile_source(
            "function same(x any) any begin return x; end same;
             function same(y any) any begin return y; end same;",
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FunctionAlreadyExists("same(any)".to_string()));
}

#[test]
fn test_generic_return_without_parameters_is_rejected() {
    let err = compiler()
        .compile_source("function f() any begin return 1; end f;")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AnyNotAllowed);
}

#[test]
fn test_variant_argument_gets_a_dispatcher() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function describe(x integer) text begin return text(x); end describe;
             function describe(x text) text begin return x; end describe;
             var v := 1 as integer | text;
             var d := describe(v);",
        )
        .unwrap();
    let dispatcher = compiler
        .context()
        .function("describe(integer|text)")
        .unwrap();
    assert!(matches!(dispatcher.callable, Callable::Block(_)));
    assert_eq!(
        compiler.context().types.key(dispatcher.return_type),
        "text"
    );
}

#[test]
fn test_dispatcher_reused_for_second_call() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "function describe(x integer) text begin return text(x); end describe;
             function describe(x text) text begin return x; end describe;
             var v := 1 as integer | text;
             var d := describe(v);
             var e := describe(v);",
        )
        .unwrap();
    assert_eq!(blocks_named(&compiler, "describe(integer|text)"), 1);
}

#[test]
fn test_dispatcher_instantiates_generic_members() {
    let mut compiler = compiler();
    compiler
        .compile_source(
            "procedure show(x any) begin print('value'); end show;
             var v := 'a' as integer | text;
             show(v);",
        )
        .unwrap();
    assert!(compiler.context().procedure("show(integer|text)").is_some());
    assert!(compiler.context().procedure("show(integer)").is_some());
    assert!(compiler.context().procedure("show(text)").is_some());
}

#[test]
fn test_dispatcher_missing_member_overload() {
    let err = compiler()
        .compile_source(
            "procedure show(x integer) begin print(text(x)); end show;
             var v := 'a' as integer | text;
             show(v);",
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownProcedure("show(text)".to_string()));
}
