//! Core types shared by the language front end, compiler and tools.
//!
//! This crate provides source location tracking and the compile-time
//! error taxonomy used by the parser and the semantic compiler.
//!
//! # Overview
//!
//! - [`SourcePosition`] - Source code location (line, column, offset)
//! - [`CompileError`] - A parse or compile error anchored to a position
//! - [`ErrorKind`] - The closed set of parse and compile failures
//!
//! # Examples
//!
//! ```
//! use core_types::{CompileError, ErrorKind, SourcePosition};
//!
//! let error = CompileError::new(
//!     ErrorKind::UnknownVariable("count".to_string()),
//!     SourcePosition::new(3, 7),
//! );
//! assert_eq!(error.to_string(), "Unknown variable count at line 3, column 7");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;

pub use error::{CompileError, CompileResult, ErrorKind};
pub use source::SourcePosition;
