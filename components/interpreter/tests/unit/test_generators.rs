//! Generators: reified frames resumed by `for` loops

use super::{assert_no_leaks, output, run};

#[test]
fn test_yields_in_order() {
    let source = "generator g() integer begin yield 1; yield 2; end g;
                  for x in g() loop print(text(x)); end loop;";
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn test_generator_allocates_one_frame_blob() {
    let source = "generator g() integer begin yield 1; yield 2; end g;
                  var total := 0;
                  for x in g() loop total := total + x; end loop;";
    let run = run(source);
    assert!(run.result.is_ok());
    assert_eq!(run.machine.slot(0), Some((3, false)));
    assert_eq!(run.machine.heap().total_count(), 1);
    assert_eq!(run.machine.heap().live_count(), 0);
}

#[test]
fn test_locals_survive_between_yields() {
    let source = "generator squares(n integer) integer begin
                    for i in 1..n loop yield i * i; end loop;
                  end squares;
                  var total := 0;
                  for v in squares(4) loop total := total + v; end loop;
                  print(text(total));";
    assert_eq!(output(source), "30\n");
}

#[test]
fn test_generator_of_text() {
    let source = "generator words() text begin
                    var prefix := 'w';
                    yield prefix || '1';
                    yield prefix || '2';
                  end words;
                  for w in words() loop print(w); end loop;";
    assert_eq!(output(source), "w1\nw2\n");
}

#[test]
fn test_empty_generator_runs_no_iteration() {
    let source = "generator none(n integer) integer begin
                    for i in 1..n loop yield i; end loop;
                  end none;
                  for v in none(0) loop print('never'); end loop;
                  print('done');";
    assert_eq!(output(source), "done\n");
}

#[test]
fn test_exit_drops_suspended_generator() {
    assert_no_leaks(
        "generator words() text begin yield 'a'; yield 'b'; yield 'c'; end words;
         for w in words() loop exit when w = 'b'; end loop;",
    );
}

#[test]
fn test_nested_generators() {
    let source = "generator upto(n integer) integer begin for i in 1..n loop yield i; end loop; end upto;
                  for a in upto(2) loop
                    for b in upto(a) loop write(text(a * 10 + b) || ' '); end loop;
                  end loop;";
    assert_eq!(output(source), "11 21 22 ");
}
