//! Corten Lang CLI Library
//!
//! Provides the Runtime struct and supporting modules for the
//! `corten-lang` driver:
//! - `compile <src> <out>` writes the text bytecode format
//! - `run <file>` executes a bytecode file
//! - `exec <src>` compiles and runs in memory
//! - `disasm <file>` prints block listings
//! - `repl` starts an interactive session

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod repl;
pub mod runtime;

pub use cli::{Cli, Command};
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
