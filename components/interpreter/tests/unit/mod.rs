//! Unit test runner for interpreter

mod test_exceptions;
mod test_generators;
mod test_natives;

use compiler::Compiler;
use interpreter::{native_signatures, MachineResult, SharedOutput, StackMachine};

/// Outcome of compiling and running a source text
pub struct Run {
    pub machine: StackMachine,
    pub out: SharedOutput,
    pub result: MachineResult<()>,
}

/// Compile with the native library and run every root block
pub fn run(source: &str) -> Run {
    let mut compiler = Compiler::with_natives(&native_signatures()).unwrap();
    let program = compiler.compile_source(source).unwrap();
    let out = SharedOutput::new();
    let mut machine = StackMachine::new().with_output(out.clone());
    let result = machine.run_program(&program, |_| None);
    Run {
        machine,
        out,
        result,
    }
}

/// Run a program that must succeed, returning what it printed
pub fn output(source: &str) -> String {
    let run = run(source);
    if let Err(err) = &run.result {
        panic!("{} failed: {}\n{}", source, err, run.machine.dump());
    }
    run.out.contents()
}

/// Run a program, drop its globals and check nothing is left on the heap
pub fn assert_no_leaks(source: &str) {
    let mut run = run(source);
    assert!(run.result.is_ok(), "{:?}", run.result);
    run.machine.clear_stack().unwrap();
    assert_eq!(run.machine.heap().live_count(), 0, "{}", run.machine.dump());
}
