//! Unit test runner for parser

mod test_declarations;
mod test_statements;
