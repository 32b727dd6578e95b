//! Persistence Pipeline Integration Tests
//!
//! Tests Source -> Compiler -> text bytecode -> loader -> StackMachine, the
//! path a program takes through `compile` and `run`.

use bytecode_system::Program;
use integration_tests::{compile, run};

fn round_trip(source: &str) -> (Program, Program) {
    let program = compile(source);
    let loaded = Program::from_text(&program.to_text()).unwrap();
    (program, loaded)
}

/// Test: a loaded program is identical and prints the same output
#[test]
fn test_loaded_program_runs_the_same() {
    let (program, loaded) = round_trip(
        "function greet(name text) text begin return 'hi ' || name; end greet;
         print(greet('ann'));
         print(text(2.5 * 2.0));",
    );
    assert_eq!(loaded, program);
    let (_, direct, result) = run(&program);
    result.unwrap();
    let (_, reloaded, result) = run(&loaded);
    result.unwrap();
    assert_eq!(direct.contents(), "hi ann\n5\n");
    assert_eq!(reloaded.contents(), direct.contents());
}

/// Test: text constants with quotes, spaces and newlines survive
#[test]
fn test_awkward_constants_survive() {
    let (program, loaded) = round_trip("print('it''s  a\nline'); print('');");
    assert_eq!(loaded, program);
    let (_, out, result) = run(&loaded);
    result.unwrap();
    assert_eq!(out.contents(), "it's  a\nline\n\n");
}

/// Test: generators and exceptions run from a loaded file
#[test]
fn test_loaded_generators_and_exceptions() {
    let (_, loaded) = round_trip(
        "generator evens(n integer) integer begin
           for i in 0..n loop if i % 2 = 0 then yield i; end if; end loop;
         end evens;
         var sum := 0;
         for e in evens(6) loop sum := sum + e; end loop;
         begin raise sum; exception when 12 then print('twelve'); end;",
    );
    let (machine, out, result) = run(&loaded);
    result.unwrap();
    assert_eq!(out.contents(), "twelve\n");
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test: the entry index separates callables from top-level blocks
#[test]
fn test_entry_index_preserved() {
    let (program, loaded) = round_trip(
        "procedure p() begin print('p'); end p;
         p(); p();",
    );
    assert!(program.entry >= 1);
    assert_eq!(loaded.entry, program.entry);
    assert_eq!(loaded.blocks.len() - loaded.entry, 2);
    let (_, out, result) = run(&loaded);
    result.unwrap();
    assert_eq!(out.contents(), "p\np\n");
}
