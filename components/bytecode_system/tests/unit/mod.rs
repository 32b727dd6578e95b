//! Unit test runner for bytecode_system

mod test_code_block;
mod test_opcode;
mod test_persist;
