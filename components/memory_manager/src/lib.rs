//! Memory Manager - reference-counted heap
//!
//! This component provides:
//! - An arena of heap objects addressed by integer handles
//! - Deterministic reference counting with cascading release
//! - Copy-on-write through [`RefManager::make_mutable`]
//! - Structural comparison of heap values
//!
//! # Example
//!
//! ```
//! use memory_manager::{Blob, HeapObject, RefManager};
//!
//! let mut heap = RefManager::new();
//! let s = heap.add_ref(HeapObject::String("hi".to_string()));
//! let blob = heap.add_ref(HeapObject::Blob(Blob::new(vec![s], vec![true])));
//!
//! heap.dec_ref_count(blob).unwrap();
//! assert_eq!(heap.live_count(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod object;
pub mod ref_manager;

// Re-export main types
pub use error::RefError;
pub use object::{Blob, ExceptionHandler, HeapObject, RefTag};
pub use ref_manager::RefManager;
