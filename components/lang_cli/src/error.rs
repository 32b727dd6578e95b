//! Error types for the CLI

use bytecode_system::LoadError;
use core_types::CompileError;
use interpreter::MachineError;
use std::fmt;

/// Process exit code for usage and I/O failures
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code for parse and compile errors
pub const EXIT_COMPILE_ERROR: i32 = 2;
/// Process exit code for runtime errors
pub const EXIT_RUNTIME_ERROR: i32 = 3;

/// CLI-specific errors
#[derive(Debug)]
pub enum CliError {
    /// File I/O error
    IoError(std::io::Error),

    /// Parse or compile error, with its source position
    Compile(CompileError),

    /// Malformed bytecode file
    Load(LoadError),

    /// Error raised while running bytecode
    Runtime(MachineError),

    /// REPL error
    ReplError(String),
}

impl CliError {
    /// Exit code the process reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Compile(_) => EXIT_COMPILE_ERROR,
            CliError::Runtime(_) => EXIT_RUNTIME_ERROR,
            CliError::IoError(_) | CliError::Load(_) | CliError::ReplError(_) => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::IoError(e) => write!(f, "File error: {}", e),
            CliError::Compile(e) => write!(f, "{}", e),
            CliError::Load(e) => write!(f, "Load error: {}", e),
            CliError::Runtime(e) => write!(f, "Runtime error: {}", e),
            CliError::ReplError(s) => write!(f, "REPL error: {}", s),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::IoError(e) => Some(e),
            CliError::Compile(e) => Some(e),
            CliError::Load(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::ReplError(_) => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError(err)
    }
}

impl From<CompileError> for CliError {
    fn from(err: CompileError) -> Self {
        CliError::Compile(err)
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        CliError::Load(err)
    }
}

impl From<MachineError> for CliError {
    fn from(err: MachineError) -> Self {
        CliError::Runtime(err)
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
