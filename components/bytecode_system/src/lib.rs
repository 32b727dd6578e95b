//! Bytecode system for the stack machine
//!
//! This crate provides the artifact shared between the compiler and the
//! interpreter: the instruction set, code blocks with their constant
//! pools, the text persistence format and the native call ABI.
//!
//! # Overview
//!
//! - [`Opcode`], [`NoArgOp`], [`LangOp`] - Instruction set
//! - [`CodeBlock`] - Instruction words plus string and float pools
//! - [`Program`] - Blocks plus entry index, with text save/load
//! - [`NativeSignature`] - Declaration of a host function
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeBlock, LangOp, Program};
//!
//! let mut block = CodeBlock::new("global");
//! let id = block.add_str_const("hello");
//! block.emit_push(id);
//! block.emit_ext(LangOp::CreateString);
//!
//! let program = Program::new(vec![], vec![block]);
//! let text = program.to_text();
//! let restored = Program::from_text(&text).unwrap();
//! assert_eq!(restored.entry, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod code_block;
pub mod disasm;
pub mod native;
pub mod opcode;
pub mod persist;

// Re-export main types at crate root
pub use code_block::CodeBlock;
pub use disasm::disassemble;
pub use native::NativeSignature;
pub use opcode::{LangOp, NoArgOp, Opcode, Word};
pub use persist::{LoadError, Program};
