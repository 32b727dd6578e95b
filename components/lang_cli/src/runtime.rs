//! Runtime orchestration for compiling and running programs
//!
//! The Runtime struct pairs a persistent [`Compiler`] with a
//! [`StackMachine`]:
//! - whole files are compiled to a [`Program`] and run block by block
//! - REPL input is compiled one statement at a time against the same
//!   global scope, so globals survive between lines
//! - the `@get_char` trap is answered from the configured input

use crate::error::{CliError, CliResult};
use bytecode_system::{disassemble, Program, Word};
use compiler::Compiler;
use core_types::ErrorKind;
use interpreter::{native_signatures, MachineConfig, StackMachine, GET_CHAR_TRAP};
use log::{debug, info, warn};
use parser::Parser;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};

/// Compiler and machine pair driving every CLI command
pub struct Runtime {
    /// Keeps types, callables and globals across statements
    compiler: Compiler,
    /// Persistent machine, globals live at the bottom of its stack
    machine: StackMachine,
    /// Byte source for `get_char`
    input: Box<dyn Read>,
    /// Whether to print the listing before running
    print_bytecode: bool,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("machine", &self.machine)
            .field("global_slots", &self.compiler.global_slot_count())
            .field("print_bytecode", &self.print_bytecode)
            .finish()
    }
}

impl Runtime {
    /// Create a runtime reading stdin and writing stdout
    ///
    /// # Example
    /// ```
    /// use lang_cli::Runtime;
    ///
    /// let runtime = Runtime::new().unwrap();
    /// assert_eq!(runtime.machine().sp(), 0);
    /// ```
    pub fn new() -> CliResult<Self> {
        Self::with_config(MachineConfig::default())
    }

    /// Create a runtime whose machine uses the given configuration
    pub fn with_config(config: MachineConfig) -> CliResult<Self> {
        Ok(Self {
            compiler: Compiler::with_natives(&native_signatures())?,
            machine: StackMachine::with_config(config),
            input: Box::new(io::stdin()),
            print_bytecode: false,
        })
    }

    /// Send program output to `out` instead of stdout
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.machine = std::mem::take(&mut self.machine).with_output(out);
        self
    }

    /// Read `get_char` bytes from `input` instead of stdin
    pub fn with_input(mut self, input: impl Read + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    /// Enable bytecode printing
    pub fn with_print_bytecode(mut self, enabled: bool) -> Self {
        self.print_bytecode = enabled;
        self
    }

    /// The machine, for inspection
    pub fn machine(&self) -> &StackMachine {
        &self.machine
    }

    /// Parse and compile a whole source text
    pub fn compile_source(&mut self, source: &str) -> CliResult<Program> {
        let program = self.compiler.compile_source(source)?;
        debug!(
            "program has {} blocks, entry {}",
            program.blocks.len(),
            program.entry
        );
        Ok(program)
    }

    /// Compile `source_path` and write the text bytecode to `output_path`
    ///
    /// # Errors
    /// Returns `CliError` if a file cannot be read or written, or the
    /// source does not compile
    ///
    /// # Example
    /// ```no_run
    /// use lang_cli::Runtime;
    ///
    /// let mut runtime = Runtime::new().unwrap();
    /// runtime.compile_file("hello.pl", "hello.plwc").unwrap();
    /// ```
    pub fn compile_file(&mut self, source_path: &str, output_path: &str) -> CliResult<Program> {
        let source = fs::read_to_string(source_path)?;
        let program = self.compile_source(&source)?;
        fs::write(output_path, program.to_text())?;
        info!("wrote {} blocks to {}", program.blocks.len(), output_path);
        Ok(program)
    }

    /// Read a text bytecode file
    pub fn load_file(path: &str) -> CliResult<Program> {
        let text = fs::read_to_string(path)?;
        Ok(Program::from_text(&text)?)
    }

    /// Run every top-level block of a program on this runtime's machine
    ///
    /// On success the stack is cleared and any object still alive is
    /// reported as a leak.
    pub fn run_program(&mut self, program: &Program) -> CliResult<()> {
        if self.print_bytecode {
            print!("{}", Self::disassemble(program));
        }
        let input = &mut self.input;
        let result = self
            .machine
            .run_program(program, |name| answer_trap(name, input.as_mut()));
        self.machine.flush()?;
        result?;
        self.check_leaks()
    }

    /// Load and run a text bytecode file
    pub fn run_file(&mut self, path: &str) -> CliResult<()> {
        let program = Self::load_file(path)?;
        self.run_program(&program)
    }

    /// Compile and run a source text in memory
    ///
    /// # Example
    /// ```
    /// use interpreter::SharedOutput;
    /// use lang_cli::Runtime;
    ///
    /// let out = SharedOutput::new();
    /// let mut runtime = Runtime::new().unwrap().with_output(out.clone());
    /// runtime.exec_source("print(text(3 * 4));").unwrap();
    /// assert_eq!(out.contents(), "12\n");
    /// ```
    pub fn exec_source(&mut self, source: &str) -> CliResult<()> {
        let program = self.compile_source(source)?;
        self.run_program(&program)
    }

    /// Read, compile and run a source file
    pub fn exec_file(&mut self, path: &str) -> CliResult<()> {
        let source = fs::read_to_string(path)?;
        self.exec_source(&source)
    }

    /// Listing of every block, callables first
    pub fn disassemble(program: &Program) -> String {
        let mut out = String::new();
        for (index, block) in program.blocks.iter().enumerate() {
            let role = if index < program.entry { "callable" } else { "top-level" };
            out.push_str(&format!("block {} {} ({})\n", index, block.name, role));
            out.push_str(&disassemble(block, None));
        }
        out
    }

    /// Compile and run each statement of a REPL entry
    ///
    /// Globals declared by earlier entries stay visible. When a statement
    /// fails, the stack goes back to the global slots and the remaining
    /// statements are skipped. An uncaught exception unwinds no further
    /// than the globals that existed before the failing statement.
    pub fn eval(&mut self, source: &str) -> CliResult<()> {
        let statements = Parser::new(source).parse_program()?;
        for stmt in &statements {
            let globals = self.compiler.global_slot_count();
            let root = match self.compiler.compile_statement(stmt) {
                Ok(Some(root)) => root,
                Ok(None) => continue,
                Err(err) => {
                    self.machine.reset_stack(self.compiler.global_slot_count())?;
                    return Err(err.into());
                }
            };
            let mut blocks = self.compiler.code_blocks().to_vec();
            blocks.push(root);
            let entry = blocks.len() - 1;
            self.machine.set_code_blocks(blocks);
            self.machine.set_global_floor(globals);

            let input = &mut self.input;
            let result = self
                .machine
                .execute_with_traps(entry, |name| answer_trap(name, input.as_mut()));
            self.machine.flush()?;
            if let Err(err) = result {
                self.machine.reset_stack(self.compiler.global_slot_count())?;
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Machine state: registers, stack, current block and heap
    pub fn dump(&self) -> String {
        self.machine.dump()
    }

    fn check_leaks(&mut self) -> CliResult<()> {
        self.machine.clear_stack()?;
        let live = self.machine.heap().live_count();
        if live > 0 {
            warn!("{} heap objects still alive after the program ended", live);
        }
        Ok(())
    }
}

/// Whether an error only means the input stopped in the middle of a statement
pub fn is_incomplete_input(err: &CliError) -> bool {
    matches!(
        err,
        CliError::Compile(e)
            if matches!(&e.kind, ErrorKind::UnexpectedToken { found, .. } if found == "end of file")
    )
}

/// Answer a trap raised by a native, `None` leaves it unanswered
fn answer_trap(name: &str, input: &mut dyn Read) -> Option<Word> {
    if name != GET_CHAR_TRAP {
        return None;
    }
    let mut byte = [0u8; 1];
    Some(match input.read(&mut byte) {
        Ok(1) => Word::from(byte[0]),
        _ => -1,
    })
}
