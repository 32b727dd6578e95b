//! Heap access errors

use bytecode_system::Word;
use thiserror::Error;

/// Failure of a heap operation
///
/// All of these are fatal to the running machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// Handle out of range or already released
    #[error("invalid refId {0}")]
    InvalidRefId(Word),
    /// Object is not of the kind the operation requires
    #[error("invalid ref type")]
    InvalidRefType,
    /// Operation not defined for this kind of object
    #[error("invalid ref tag")]
    InvalidRefTag,
    /// Slot offset outside the object
    #[error("invalid ref offset")]
    InvalidRefOffset,
}
