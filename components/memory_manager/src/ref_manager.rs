//! Reference manager - the counted heap arena
//!
//! Objects live in a vector of slots addressed by their index. Released
//! indices go to a free list and are reused last-in first-out.

use bytecode_system::Word;
use log::trace;

use crate::error::RefError;
use crate::object::{Blob, ExceptionHandler, HeapObject};

#[derive(Debug, Clone)]
struct Ref {
    ref_count: usize,
    object: HeapObject,
}

/// Arena of reference-counted heap objects
///
/// # Examples
///
/// ```
/// use memory_manager::{Blob, HeapObject, RefManager};
///
/// let mut heap = RefManager::new();
/// let a = heap.add_ref(HeapObject::Blob(Blob::new(vec![1, 2, 3], vec![])));
/// heap.inc_ref_count(a).unwrap();
///
/// // Shared: mutation goes to a fresh copy
/// let b = heap.make_mutable(a).unwrap();
/// assert_ne!(a, b);
/// assert_eq!(heap.ref_count(a).unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RefManager {
    refs: Vec<Option<Ref>>,
    free_ids: Vec<usize>,
}

impl RefManager {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids ever allocated
    pub fn total_count(&self) -> usize {
        self.refs.len()
    }

    /// Number of ids waiting for reuse
    pub fn free_count(&self) -> usize {
        self.free_ids.len()
    }

    /// Number of live objects, non-zero at exit means a leak
    pub fn live_count(&self) -> usize {
        self.refs.len() - self.free_ids.len()
    }

    /// Whether `id` names a live object
    pub fn is_valid_ref_id(&self, id: Word) -> bool {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.refs.get(idx))
            .map_or(false, Option::is_some)
    }

    /// Store a new object with a count of one, returning its handle
    pub fn add_ref(&mut self, object: HeapObject) -> Word {
        let entry = Some(Ref {
            ref_count: 1,
            object,
        });
        let id = match self.free_ids.pop() {
            Some(id) => {
                self.refs[id] = entry;
                id
            }
            None => {
                self.refs.push(entry);
                self.refs.len() - 1
            }
        };
        id as Word
    }

    fn entry(&self, id: Word) -> Result<&Ref, RefError> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.refs.get(idx))
            .and_then(Option::as_ref)
            .ok_or(RefError::InvalidRefId(id))
    }

    fn entry_mut(&mut self, id: Word) -> Result<&mut Ref, RefError> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.refs.get_mut(idx))
            .and_then(Option::as_mut)
            .ok_or(RefError::InvalidRefId(id))
    }

    /// Object behind a handle
    pub fn get_ref(&self, id: Word) -> Result<&HeapObject, RefError> {
        Ok(&self.entry(id)?.object)
    }

    /// Current count of a handle
    pub fn ref_count(&self, id: Word) -> Result<usize, RefError> {
        Ok(self.entry(id)?.ref_count)
    }

    /// Text behind a string handle
    pub fn get_string(&self, id: Word) -> Result<&str, RefError> {
        match &self.entry(id)?.object {
            HeapObject::String(s) => Ok(s),
            _ => Err(RefError::InvalidRefType),
        }
    }

    /// Mutable text behind a string handle
    pub fn get_string_mut(&mut self, id: Word) -> Result<&mut String, RefError> {
        match &mut self.entry_mut(id)?.object {
            HeapObject::String(s) => Ok(s),
            _ => Err(RefError::InvalidRefType),
        }
    }

    /// Blob behind a handle
    pub fn get_blob(&self, id: Word) -> Result<&Blob, RefError> {
        match &self.entry(id)?.object {
            HeapObject::Blob(b) => Ok(b),
            _ => Err(RefError::InvalidRefType),
        }
    }

    /// Mutable blob behind a handle
    pub fn get_blob_mut(&mut self, id: Word) -> Result<&mut Blob, RefError> {
        match &mut self.entry_mut(id)?.object {
            HeapObject::Blob(b) => Ok(b),
            _ => Err(RefError::InvalidRefType),
        }
    }

    /// Exception handler behind a handle
    pub fn get_exception_handler(&self, id: Word) -> Result<ExceptionHandler, RefError> {
        match &self.entry(id)?.object {
            HeapObject::ExceptionHandler(h) => Ok(*h),
            _ => Err(RefError::InvalidRefType),
        }
    }

    /// Add one owner
    pub fn inc_ref_count(&mut self, id: Word) -> Result<(), RefError> {
        self.add_ref_count(id, 1)
    }

    /// Add `count` owners at once
    pub fn add_ref_count(&mut self, id: Word, count: usize) -> Result<(), RefError> {
        self.entry_mut(id)?.ref_count += count;
        Ok(())
    }

    /// Drop one owner, destroying the object when none remain
    ///
    /// Destroying a blob releases every slot its bitmap marks as a reference.
    pub fn dec_ref_count(&mut self, id: Word) -> Result<(), RefError> {
        let entry = self.entry_mut(id)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(());
        }
        let idx = id as usize;
        let released = self.refs[idx].take();
        if let Some(Ref {
            object: HeapObject::Blob(blob),
            ..
        }) = released
        {
            for child in blob.refs() {
                self.dec_ref_count(child)?;
            }
        }
        self.free_ids.push(idx);
        trace!("released ref {}", id);
        Ok(())
    }

    /// Structural equality of two handles
    ///
    /// Strings compare by text, blobs by size, bitmap and slots, recursing
    /// into nested references. Exception handlers are not comparable.
    pub fn compare_refs(&self, a: Word, b: Word) -> Result<bool, RefError> {
        let ref_a = self.entry(a)?;
        let ref_b = self.entry(b)?;
        if a == b {
            return Ok(true);
        }
        match (&ref_a.object, &ref_b.object) {
            (HeapObject::String(sa), HeapObject::String(sb)) => Ok(sa == sb),
            (HeapObject::Blob(ba), HeapObject::Blob(bb)) => {
                if ba.size() != bb.size() || ba.map != bb.map {
                    return Ok(false);
                }
                for i in 0..ba.size() {
                    let equal = if ba.map[i] {
                        self.compare_refs(ba.slots[i], bb.slots[i])?
                    } else {
                        ba.slots[i] == bb.slots[i]
                    };
                    if !equal {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (HeapObject::ExceptionHandler(_), _) | (_, HeapObject::ExceptionHandler(_)) => {
                Err(RefError::InvalidRefTag)
            }
            _ => Ok(false),
        }
    }

    /// Establish sole ownership before an in-place write
    ///
    /// Returns `id` unchanged when it has one owner. Otherwise the blob is
    /// copied, its nested references gain an owner, the original loses
    /// one, and the copy's handle is returned.
    pub fn make_mutable(&mut self, id: Word) -> Result<Word, RefError> {
        let entry = self.entry(id)?;
        if entry.ref_count == 1 {
            return Ok(id);
        }
        let copy = match &entry.object {
            HeapObject::Blob(blob) => blob.clone(),
            _ => return Err(RefError::InvalidRefTag),
        };
        for child in copy.refs() {
            self.inc_ref_count(child)?;
        }
        self.entry_mut(id)?.ref_count -= 1;
        let new_id = self.add_ref(HeapObject::Blob(copy));
        trace!("copy on write {} -> {}", id, new_id);
        Ok(new_id)
    }

    /// Live objects with their handle and count
    pub fn iter(&self) -> impl Iterator<Item = (Word, usize, &HeapObject)> {
        self.refs.iter().enumerate().filter_map(|(i, r)| {
            r.as_ref()
                .map(|r| (i as Word, r.ref_count, &r.object))
        })
    }
}
