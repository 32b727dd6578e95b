//! Exceptions: raise, stack scan and handlers

use super::{assert_no_leaks, output, run};
use interpreter::MachineErrorKind;

#[test]
fn test_handler_in_same_block() {
    let source = "var r := 0;
                  begin raise 3; exception when 3 then r := 30; end;
                  print(text(r));";
    assert_eq!(output(source), "30\n");
}

#[test]
fn test_else_branch() {
    let source = "var r := 0;
                  begin raise 9; exception when 1 then r := 1; else r := 2; end;
                  print(text(r));";
    assert_eq!(output(source), "2\n");
}

#[test]
fn test_raise_three_frames_up() {
    let source = "procedure inner() begin var s := 'temp'; raise 5; end inner;
                  procedure middle() begin var t := 'more'; inner(); end middle;
                  procedure outer() begin middle(); end outer;
                  var caught := 0;
                  begin outer(); exception when 5 then caught := 1; end;
                  print(text(caught));";
    let run = run(source);
    assert!(run.result.is_ok(), "{:?}", run.result);
    assert_eq!(run.out.contents(), "1\n");
    // back at the root frame with only the global left
    assert_eq!(run.machine.bp(), 0);
    assert_eq!(run.machine.sp(), 1);
    assert_eq!(run.machine.heap().live_count(), 0);
}

#[test]
fn test_handler_reraises_to_outer() {
    let source = "var r := 0;
                  begin
                    begin raise 4; exception when 1 then r := 1; end;
                  exception when 4 then r := 4;
                  end;
                  print(text(r));";
    assert_eq!(output(source), "4\n");
}

#[test]
fn test_uncaught_exception() {
    let run = run("procedure fail() begin raise 7; end fail; fail();");
    let err = run.result.unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::UncaughtException(7));
    assert_eq!(run.machine.sp(), 0);
}

#[test]
fn test_function_returns_from_handler() {
    let source = "function safe(d integer) integer begin
                    begin return 10 / d; exception when 1 then return -1; end;
                  end safe;
                  print(text(safe(2)));";
    assert_eq!(output(source), "5\n");
}

#[test]
fn test_unwinding_releases_references() {
    assert_no_leaks(
        "procedure deep(n integer) begin
           var s := 'level' || text(n);
           if n = 0 then raise 2; end if;
           deep(n - 1);
         end deep;
         begin deep(3); exception when 2 then print('caught'); end;",
    );
}
