//! Semantic compiler
//!
//! Type-checks the syntax tree and lowers it to stack machine bytecode.
//!
//! # Overview
//!
//! - [`TypeRegistry`] - Canonical structural types and their slot layout
//! - [`Context`] - Types, callables, generic declarations and code blocks
//! - [`Compiler`] - Scope chain and code generation, one statement at a time
//!
//! Generic declarations (any parameter typed `any`) are compiled once per
//! concrete argument signature. A call with a variant argument and no exact
//! overload gets a synthesized dispatcher that switches on the variant's
//! member and forwards to the per-member overload.
//!
//! # Example
//!
//! ```
//! use compiler::Compiler;
//!
//! let mut compiler = Compiler::new();
//! let program = compiler
//!     .compile_source(
//!         "function twice(x any) any begin return x + x; end twice;
//!          var a := twice(21);
//!          var b := twice(1.5);",
//!     )
//!     .unwrap();
//! assert!(compiler.context().function("twice(integer)").is_some());
//! assert!(compiler.context().function("twice(real)").is_some());
//! assert_eq!(program.blocks.len() - program.entry, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod calls;
pub mod compiler;
pub mod context;
mod expressions;
pub mod scope;
mod statements;
pub mod types;

// Re-export main types at crate root
pub use compiler::{Completion, Compiler};
pub use context::{callable_key, Callable, Context, Function, Procedure};
pub use types::{TypeId, TypeRegistry};
