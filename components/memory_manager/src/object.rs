//! Heap object representation
//!
//! Provides the three kinds of counted objects the machine allocates.

use bytecode_system::Word;

/// Kind tag of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTag {
    /// Reified exception handler
    ExceptionHandler = 1,
    /// Immutable-by-convention text
    String = 2,
    /// Slot array with reference bitmap
    Blob = 3,
}

impl RefTag {
    /// Name used in heap dumps
    pub fn name(self) -> &'static str {
        match self {
            RefTag::ExceptionHandler => "exception_handler",
            RefTag::String => "string",
            RefTag::Blob => "blob",
        }
    }
}

/// A variable-length array of slots with a parallel reference bitmap
///
/// Backing store for records, arrays, reference tuples and generator frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Blob {
    /// Slot values
    pub slots: Vec<Word>,
    /// `true` where the slot holds a heap handle
    pub map: Vec<bool>,
}

impl Blob {
    /// Create a blob from slots and their reference bits
    ///
    /// The bitmap is padded or truncated to the slot count.
    pub fn new(slots: Vec<Word>, mut map: Vec<bool>) -> Self {
        map.resize(slots.len(), false);
        Self { slots, map }
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Grow or shrink, new slots are zero and not references
    pub fn resize(&mut self, size: usize) {
        self.slots.resize(size, 0);
        self.map.resize(size, false);
    }

    /// Handles of every slot marked as a reference
    pub fn refs(&self) -> impl Iterator<Item = Word> + '_ {
        self.slots
            .iter()
            .zip(self.map.iter())
            .filter(|(_, is_ref)| **is_ref)
            .map(|(slot, _)| *slot)
    }
}

/// Saved resume point of an `exception` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Block holding the clause
    pub code_block_id: Word,
    /// Offset of the clause
    pub ip: Word,
    /// Base pointer of the protected frame
    pub bp: Word,
}

/// A counted heap object
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    /// Reified exception handler
    ExceptionHandler(ExceptionHandler),
    /// Text value
    String(String),
    /// Slot array
    Blob(Blob),
}

impl HeapObject {
    /// Kind tag of this object
    pub fn tag(&self) -> RefTag {
        match self {
            HeapObject::ExceptionHandler(_) => RefTag::ExceptionHandler,
            HeapObject::String(_) => RefTag::String,
            HeapObject::Blob(_) => RefTag::Blob,
        }
    }
}
