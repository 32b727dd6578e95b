//! Integration test suite for Corten Lang
//!
//! This crate provides integration tests that verify components work
//! together across component boundaries: parse, compile, persist and run.

use bytecode_system::Program;
use compiler::Compiler;
use interpreter::{native_signatures, MachineResult, SharedOutput, StackMachine};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use compiler;
    pub use core_types;
    pub use interpreter;
    pub use lang_cli;
    pub use memory_manager;
    pub use parser;
}

/// Compile `source` against the native library
///
/// # Panics
/// When the source does not compile.
pub fn compile(source: &str) -> Program {
    let mut compiler = Compiler::with_natives(&native_signatures()).expect("natives register");
    compiler
        .compile_source(source)
        .unwrap_or_else(|e| panic!("compile failed: {}", e))
}

/// Run a program on a fresh machine with captured output
pub fn run(program: &Program) -> (StackMachine, SharedOutput, MachineResult<()>) {
    let out = SharedOutput::new();
    let mut machine = StackMachine::new().with_output(out.clone());
    let result = machine.run_program(program, |_| None);
    (machine, out, result)
}

/// Compile and run, returning the printed output
///
/// # Panics
/// When compiling or running fails.
pub fn output_of(source: &str) -> String {
    let (machine, out, result) = run(&compile(source));
    if let Err(err) = result {
        panic!("run failed: {}\n{}", err, machine.dump());
    }
    out.contents()
}
