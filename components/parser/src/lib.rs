//! Language front end
//!
//! Turns source text into the abstract syntax tree the compiler consumes.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes source code, one token of lookahead
//! - [`Token`] - Identifiers, literals, keywords, punctuators and directives
//! - [`Parser`] - Recursive descent parser producing [`Stmt`] trees
//! - [`parse_type_str`] - Parses a standalone type such as `[char]`
//!
//! # Example
//!
//! ```
//! use parser::{Parser, StmtKind};
//!
//! let mut parser = Parser::new("const answer := 6 * 7;");
//! let program = parser.parse_program().unwrap();
//! match &program[0].kind {
//!     StmtKind::Var { names, is_const, .. } => {
//!         assert_eq!(names, &vec!["answer".to_string()]);
//!         assert!(*is_const);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{Keyword, Lexer, Punctuator, Token};
pub use parser::{parse_type_str, Parser};
