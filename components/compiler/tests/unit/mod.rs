//! Unit test runner for compiler

mod test_codegen;
mod test_errors;
mod test_generics;
