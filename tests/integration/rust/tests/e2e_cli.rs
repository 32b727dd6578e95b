//! End-to-End CLI Integration Tests
//!
//! Tests the complete toolchain through the lang_cli Runtime API.
//! This is the highest level integration test - source file to output.

use interpreter::{MachineConfig, MachineErrorKind, SharedOutput};
use lang_cli::{CliError, Runtime};
use std::fs;
use tempfile::TempDir;

fn runtime() -> (Runtime, SharedOutput) {
    let out = SharedOutput::new();
    (Runtime::new().unwrap().with_output(out.clone()), out)
}

/// Test: compile to a file, then run the file on another runtime
#[test]
fn test_e2e_compile_and_run() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("primes.pl");
    let output = dir.path().join("primes.plwc");
    fs::write(
        &source,
        "function is_prime(n integer) boolean begin
           if n < 2 then return false; end if;
           var d := 2;
           while d * d <= n loop
             if n % d = 0 then return false; end if;
             d := d + 1;
           end loop;
           return true;
         end is_prime;
         for i in 1..20 loop
           if is_prime(i) then write(text(i) || ' '); end if;
         end loop;",
    )
    .unwrap();

    let (mut compiler_side, _) = runtime();
    compiler_side
        .compile_file(source.to_str().unwrap(), output.to_str().unwrap())
        .unwrap();

    let (mut runner, out) = runtime();
    runner.run_file(output.to_str().unwrap()).unwrap();
    assert_eq!(out.contents(), "2 3 5 7 11 13 17 19 ");
}

/// Test: REPL-style evaluation keeps functions and globals
#[test]
fn test_e2e_statement_by_statement() {
    let (mut runtime, out) = runtime();
    runtime
        .eval("function sq(n integer) integer begin return n * n; end sq;")
        .unwrap();
    runtime.eval("var names := ['x'];").unwrap();
    runtime.eval("names := names || ['y'];").unwrap();
    runtime.eval("print(text(sq(length(names) + 1)));").unwrap();
    runtime.eval("print(text(names));").unwrap();
    assert_eq!(out.contents(), "9\n[x, y]\n");
}

/// Test: a compile error in one entry does not poison the session
#[test]
fn test_e2e_session_survives_errors() {
    let (mut runtime, out) = runtime();
    runtime.eval("var n := 1;").unwrap();
    assert!(matches!(
        runtime.eval("n := 'one';").unwrap_err(),
        CliError::Compile(_)
    ));
    let err = runtime.eval("raise 4;").unwrap_err();
    match err {
        CliError::Runtime(e) => assert_eq!(e.kind, MachineErrorKind::UncaughtException(4)),
        other => panic!("expected a runtime error, got {}", other),
    }
    runtime.eval("print(text(n + 1));").unwrap();
    assert_eq!(out.contents(), "2\n");
}

/// Test: a small stack limit turns deep recursion into a runtime error
#[test]
fn test_e2e_stack_limit() {
    let config = MachineConfig::default()
        .with_stack_size(64)
        .with_max_stack_size(64);
    let mut runtime = Runtime::with_config(config)
        .unwrap()
        .with_output(SharedOutput::new());
    let err = runtime
        .exec_source(
            "function down(n integer) integer begin
               if n = 0 then return 0; end if;
               return down(n - 1);
             end down;
             print(text(down(1000)));",
        )
        .unwrap_err();
    match err {
        CliError::Runtime(e) => assert_eq!(e.kind, MachineErrorKind::StackAccessOutOfBound),
        other => panic!("expected a runtime error, got {}", other),
    }
}

/// Test: get_char reads the runtime's input, then reports end of input
#[test]
fn test_e2e_get_char_until_end_of_input() {
    let out = SharedOutput::new();
    let mut runtime = Runtime::new()
        .unwrap()
        .with_output(out.clone())
        .with_input(&b"hi"[..]);
    runtime
        .exec_source("for i in 1..3 loop write(text(get_char())); end loop;")
        .unwrap();
    // -1 has no character, it renders as the replacement character
    assert_eq!(out.contents(), "hi\u{FFFD}");
}
