//! Reference-counted stack machine
//!
//! Runs the code blocks produced by the compiler on a single word stack with
//! a reference bitmap. Heap values live in a [`memory_manager::RefManager`]
//! and are copied on write.
//!
//! # Overview
//!
//! - [`StackMachine`] - Registers, stack, run loop and host API
//! - [`MachineConfig`] - Stack sizing and instruction tracing
//! - [`MachineError`] - Runtime error with the block and ip it happened at
//! - [`native_signatures`] - Native library to register with the compiler
//!
//! Natives that need the host, like `get_char`, stop the run loop with a
//! trap. The host answers with [`StackMachine::answer_trap`] and carries on
//! with [`StackMachine::resume`].
//!
//! # Example
//!
//! ```
//! use compiler::Compiler;
//! use interpreter::{native_signatures, SharedOutput, StackMachine};
//!
//! let mut compiler = Compiler::with_natives(&native_signatures()).unwrap();
//! let program = compiler
//!     .compile_source("var n := 6 * 7; print(text(n));")
//!     .unwrap();
//!
//! let out = SharedOutput::new();
//! let mut machine = StackMachine::new().with_output(out.clone());
//! machine.run_program(&program, |_| None).unwrap();
//! assert_eq!(out.contents(), "42\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod dispatch;
pub mod error;
mod lang_ops;
pub mod natives;
pub mod vm;

// Re-export main types at crate root
pub use config::MachineConfig;
pub use error::{MachineError, MachineErrorKind, MachineResult};
pub use natives::{native_functions, native_signatures, NativeFunction, GET_CHAR_TRAP};
pub use vm::{real_to_word, word_to_real, SharedOutput, StackMachine};
