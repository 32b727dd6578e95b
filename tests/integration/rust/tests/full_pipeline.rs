//! Full Pipeline Integration Tests
//!
//! Tests the complete flow: Source -> Parser -> Compiler -> code blocks ->
//! StackMachine -> output and heap state.

use integration_tests::{compile, output_of, run};
use interpreter::MachineErrorKind;

/// Test: copy on write keeps the shared source intact
#[test]
fn test_copy_on_write_scenario() {
    let source = "var a := [1,2,3]; var b := a; b[0] := 9; print(text(a[0]));";
    assert_eq!(output_of(source), "1\n");
}

/// Test: a uniquely owned array is mutated in place
#[test]
fn test_unique_array_mutated_in_place() {
    let (machine, _, result) = run(&compile("var a := [1, 2, 3]; a[1] := 5;"));
    result.unwrap();
    let (handle, is_ref) = machine.slot(0).unwrap();
    assert!(is_ref);
    assert_eq!(machine.heap().total_count(), 1);
    assert_eq!(machine.heap().ref_count(handle).unwrap(), 1);
}

/// Test: generator scenario allocates and frees exactly one blob
#[test]
fn test_generator_scenario() {
    let program = compile(
        "generator g() integer begin yield 1; yield 2; end g;
         var sum := 0;
         for x in g() loop sum := sum * 10 + x; end loop;",
    );
    let (machine, _, result) = run(&program);
    result.unwrap();
    assert_eq!(machine.slot(0), Some((12, false)));
    assert_eq!(machine.heap().total_count(), 1);
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test: a generator yields in order and ends after the last yield
#[test]
fn test_generator_order() {
    let source = "generator countdown(n integer) integer begin
                    var k := n;
                    while k > 0 loop yield k; k := k - 1; end loop;
                  end countdown;
                  for v in countdown(4) loop write(text(v)); end loop;
                  print('.');";
    assert_eq!(output_of(source), "4321.\n");
}

/// Test: raise three frames up lands in the handler with the frame restored
#[test]
fn test_raise_three_frames_up() {
    let program = compile(
        "procedure c() begin var tmp := [1, 2]; raise 5; end c;
         procedure b() begin var s := 'x'; c(); end b;
         procedure a() begin b(); end a;
         var seen := 0;
         begin a(); exception when 5 then seen := 5; end;
         print(text(seen));",
    );
    let (machine, out, result) = run(&program);
    result.unwrap();
    assert_eq!(out.contents(), "5\n");
    assert_eq!(machine.bp(), 0);
    assert_eq!(machine.sp(), 1);
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test: uncaught exceptions surface as runtime errors
#[test]
fn test_uncaught_exception() {
    let (_, _, result) = run(&compile("raise 12;"));
    assert_eq!(
        result.unwrap_err().kind,
        MachineErrorKind::UncaughtException(12)
    );
}

/// Test: a program without live globals leaves nothing on the heap
#[test]
fn test_no_leaks_after_clearing_globals() {
    let program = compile(
        "var words := split('a b c', ' ');
         var joined := '';
         for w in words loop joined := joined || w; end loop;
         var p := {name: joined, tags: ['t1', 't2']};
         var q := p;
         q.name := 'other';
         print(p.name || q.name);",
    );
    let (mut machine, out, result) = run(&program);
    result.unwrap();
    assert_eq!(out.contents(), "abcother\n");
    machine.clear_stack().unwrap();
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test: records, tuples of values and nested functions together
#[test]
fn test_program_with_records_and_functions() {
    let source = "function dist2(p {x integer, y integer}) integer begin
                    return p.x * p.x + p.y * p.y;
                  end dist2;
                  var total := 0;
                  for i in 1..3 loop total := total + dist2({x: i, y: i}); end loop;
                  print(text(total));";
    assert_eq!(output_of(source), "28\n");
}
