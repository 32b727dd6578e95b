//! Runtime errors of the stack machine

use bytecode_system::Word;
use memory_manager::RefError;
use thiserror::Error;

/// What stopped the run loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineErrorKind {
    /// A native asked the host for something, e.g. `@get_char`
    #[error("trap {0}")]
    Trap(String),
    /// The program executed a `@suspend@` directive
    #[error("suspended")]
    Suspended,
    /// Read or write outside the live stack, or stack overflow
    #[error("stack access out of bound")]
    StackAccessOutOfBound,
    /// Jump, call or opcode fetch outside a code block
    #[error("code access out of bound")]
    CodeAccessOutOfBound,
    /// String or float constant index outside the pool
    #[error("const access out of bound")]
    ConstAccessOutOfBound,
    /// A slot that should hold a handle holds a scalar
    #[error("invalid ref type")]
    InvalidRefType,
    /// Offset outside a blob or a text
    #[error("ref access out of bound")]
    RefAccessOutOfBound,
    /// Negative or inconsistent size operand
    #[error("invalid size")]
    InvalidSize,
    /// Integer division or remainder by zero
    #[error("div by zero")]
    DivByZero,
    /// Heap failure
    #[error("refman error: {0}")]
    RefManager(#[from] RefError),
    /// Word that names no operation
    #[error("unknown op")]
    UnknownOp,
    /// A native found a different argument count than it expects
    #[error("wrong number of arguments provided to a native call")]
    NativeArgCountMismatch,
    /// Writing to the output sink failed
    #[error("output error: {0}")]
    Output(String),
    /// `raise` reached the bottom of the stack
    #[error("uncaught exception {0}")]
    UncaughtException(Word),
}

/// A runtime error with the code location it happened at
///
/// # Examples
///
/// ```
/// use interpreter::{MachineError, MachineErrorKind};
///
/// let error = MachineError::new(MachineErrorKind::DivByZero).at(2, 14);
/// assert_eq!(error.to_string(), "div by zero in block 2 at ip 14");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .kind, location(.code_block_id, .ip))]
pub struct MachineError {
    /// What went wrong
    pub kind: MachineErrorKind,
    /// Block that was running
    pub code_block_id: Option<usize>,
    /// Offset just after the failing instruction
    pub ip: Option<usize>,
}

fn location(code_block_id: &Option<usize>, ip: &Option<usize>) -> String {
    match (code_block_id, ip) {
        (Some(block), Some(ip)) => format!(" in block {} at ip {}", block, ip),
        _ => String::new(),
    }
}

impl MachineError {
    /// Error without a location yet
    pub fn new(kind: MachineErrorKind) -> Self {
        Self {
            kind,
            code_block_id: None,
            ip: None,
        }
    }

    /// Host trap raised by a native
    pub fn trap(name: impl Into<String>) -> Self {
        Self::new(MachineErrorKind::Trap(name.into()))
    }

    /// Stamp the code location
    pub fn at(mut self, code_block_id: usize, ip: usize) -> Self {
        self.code_block_id = Some(code_block_id);
        self.ip = Some(ip);
        self
    }

    /// Whether this is a host trap
    pub fn is_trap(&self) -> bool {
        matches!(self.kind, MachineErrorKind::Trap(_))
    }

    /// Name of the trap, if this is one
    pub fn trap_name(&self) -> Option<&str> {
        match &self.kind {
            MachineErrorKind::Trap(name) => Some(name),
            _ => None,
        }
    }
}

impl From<MachineErrorKind> for MachineError {
    fn from(kind: MachineErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<RefError> for MachineError {
    fn from(error: RefError) -> Self {
        Self::new(MachineErrorKind::RefManager(error))
    }
}

/// Result type for machine operations
pub type MachineResult<T> = Result<T, MachineError>;
