//! Native library through compiled calls

use super::{output, run, Run};
use compiler::Compiler;
use interpreter::{native_signatures, MachineErrorKind, SharedOutput, StackMachine, GET_CHAR_TRAP};

#[test]
fn test_text_conversions() {
    let source = "print(text(42));
                  print(text(2.5));
                  print(text(3 > 2));
                  print(text(char_at('abc', 1)));
                  print(text([true, false]));
                  print(text(['a', 'b']));";
    assert_eq!(output(source), "42\n2.5\ntrue\nb\n[true,false]\n[a, b]\n");
}

#[test]
fn test_text_functions() {
    let source = "print(subtext('hello', 1, 3));
                  print(subtext('hello', 2));
                  print(trim('  x  '));
                  print(text(index_of('lo', 'hello')));
                  print(text(index_of(char_at('z', 0), 'hello')));
                  print(text(char_code('A', 0)));
                  print(concat('ab', 'cd'));";
    assert_eq!(output(source), "ell\nllo\nx\n3\n-1\n65\nabcd\n");
}

#[test]
fn test_split_and_join_back() {
    let source = "var parts := split('a,b,c', ',');
                  print(text(length(parts)));
                  print(text(parts));";
    assert_eq!(output(source), "3\n[a, b, c]\n");
}

#[test]
fn test_numeric_functions() {
    let source = "print(text(abs(-4)));
                  print(text(sqrt(16.0)));
                  print(text(floor(2.7)));
                  print(text(ceil(2.1)));
                  print(text(integer('42abc') + 1));
                  print(text(integer('nope')));";
    assert_eq!(output(source), "4\n4\n2\n3\n43\n0\n");
}

#[test]
fn test_random_stays_in_range() {
    let Run { machine, result, .. } = run("var r := random(3, 5);");
    assert!(result.is_ok());
    let (value, _) = machine.slot(0).unwrap();
    assert!((3..=5).contains(&value));
}

#[test]
fn test_print_function_returns_its_argument() {
    assert_eq!(output("var s := print('echo'); write(s);"), "echo\necho");
}

#[test]
fn test_subtext_out_of_range() {
    let run = run("var s := subtext('abc', 2, 5);");
    let err = run.result.unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::RefAccessOutOfBound);
    assert!(err.ip.is_some());
}

#[test]
fn test_get_char_trap_and_resume() {
    let mut compiler = Compiler::with_natives(&native_signatures()).unwrap();
    let program = compiler
        .compile_source("var c := get_char(); print(text(c));")
        .unwrap();
    let out = SharedOutput::new();
    let mut machine = StackMachine::new().with_output(out.clone());
    machine.set_code_blocks(program.blocks.clone());

    let err = machine.execute(program.entry).unwrap_err();
    assert_eq!(err.trap_name(), Some(GET_CHAR_TRAP));
    assert_eq!(err.code_block_id, None);
    machine.answer_trap(65).unwrap();
    machine.resume().unwrap();
    for block in program.entry + 1..program.blocks.len() {
        machine.execute(block).unwrap();
    }
    assert_eq!(out.contents(), "A\n");
}

#[test]
fn test_trap_handler_feeds_input() {
    let mut compiler = Compiler::with_natives(&native_signatures()).unwrap();
    let program = compiler
        .compile_source(
            "var n := 0;
             var stop := char_at('.', 0);
             while get_char() <> stop loop n := n + 1; end loop;
             print(text(n));",
        )
        .unwrap();
    let out = SharedOutput::new();
    let mut machine = StackMachine::new().with_output(out.clone());
    let mut input = b"abc.".iter();
    machine
        .run_program(&program, |name| {
            assert_eq!(name, GET_CHAR_TRAP);
            Some(input.next().map_or(-1, |b| i64::from(*b)))
        })
        .unwrap();
    assert_eq!(out.contents(), "3\n");
}
