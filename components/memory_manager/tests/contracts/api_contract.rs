//! Contract tests verifying the memory_manager API
//! These tests exercise counting, cascading release and copy-on-write
//! through the public surface only.

use memory_manager::{Blob, ExceptionHandler, HeapObject, RefError, RefManager, RefTag};

fn text(heap: &mut RefManager, s: &str) -> i64 {
    heap.add_ref(HeapObject::String(s.to_string()))
}

/// Releasing an outer blob cascades through nested references
#[test]
fn contract_cascading_release() {
    let mut heap = RefManager::new();
    let inner_text = text(&mut heap, "leaf");
    let inner = heap.add_ref(HeapObject::Blob(Blob::new(vec![inner_text, 42], vec![true, false])));
    let outer = heap.add_ref(HeapObject::Blob(Blob::new(vec![inner], vec![true])));
    assert_eq!(heap.live_count(), 3);

    heap.dec_ref_count(outer).unwrap();
    assert_eq!(heap.live_count(), 0);
    assert_eq!(heap.free_count(), heap.total_count());
}

/// A shared nested reference survives its container
#[test]
fn contract_shared_child_survives() {
    let mut heap = RefManager::new();
    let child = text(&mut heap, "kept");
    heap.inc_ref_count(child).unwrap();
    let outer = heap.add_ref(HeapObject::Blob(Blob::new(vec![child], vec![true])));
    heap.dec_ref_count(outer).unwrap();
    assert_eq!(heap.get_string(child).unwrap(), "kept");
    assert_eq!(heap.ref_count(child).unwrap(), 1);
}

/// add_ref_count adds several owners at once
#[test]
fn contract_add_ref_count() {
    let mut heap = RefManager::new();
    let s = text(&mut heap, "s");
    heap.add_ref_count(s, 3).unwrap();
    assert_eq!(heap.ref_count(s).unwrap(), 4);
}

/// Copy-on-write leaves the original untouched
#[test]
fn contract_copy_on_write() {
    let mut heap = RefManager::new();
    let a = heap.add_ref(HeapObject::Blob(Blob::new(vec![1, 2, 3], vec![])));
    heap.inc_ref_count(a).unwrap();

    let b = heap.make_mutable(a).unwrap();
    heap.get_blob_mut(b).unwrap().slots[0] = 9;

    assert_eq!(heap.get_blob(a).unwrap().slots, vec![1, 2, 3]);
    assert_eq!(heap.get_blob(b).unwrap().slots, vec![9, 2, 3]);
    assert_eq!(heap.ref_count(a).unwrap(), 1);
    assert_eq!(heap.ref_count(b).unwrap(), 1);
}

/// Structural comparison recurses through nested references
#[test]
fn contract_compare_refs() {
    let mut heap = RefManager::new();
    let s1 = text(&mut heap, "same");
    let s2 = text(&mut heap, "same");
    let s3 = text(&mut heap, "other");
    let a = heap.add_ref(HeapObject::Blob(Blob::new(vec![s1, 1], vec![true, false])));
    let b = heap.add_ref(HeapObject::Blob(Blob::new(vec![s2, 1], vec![true, false])));
    let c = heap.add_ref(HeapObject::Blob(Blob::new(vec![s3, 1], vec![true, false])));
    let d = heap.add_ref(HeapObject::Blob(Blob::new(vec![s1], vec![true])));

    assert!(heap.compare_refs(a, b).unwrap());
    assert!(!heap.compare_refs(a, c).unwrap());
    assert!(!heap.compare_refs(a, d).unwrap());
    assert!(!heap.compare_refs(s1, a).unwrap());
}

/// Handlers are not comparable
#[test]
fn contract_compare_handlers_fails() {
    let mut heap = RefManager::new();
    let h = heap.add_ref(HeapObject::ExceptionHandler(ExceptionHandler {
        code_block_id: 0,
        ip: 8,
        bp: 0,
    }));
    let s = text(&mut heap, "s");
    assert_eq!(heap.compare_refs(h, s), Err(RefError::InvalidRefTag));
    assert_eq!(heap.get_ref(h).unwrap().tag(), RefTag::ExceptionHandler);
    assert_eq!(heap.get_exception_handler(h).unwrap().ip, 8);
}

/// iter lists only live objects
#[test]
fn contract_iter_live_objects() {
    let mut heap = RefManager::new();
    let a = text(&mut heap, "a");
    let _b = text(&mut heap, "b");
    heap.dec_ref_count(a).unwrap();
    let live: Vec<i64> = heap.iter().map(|(id, _, _)| id).collect();
    assert_eq!(live, vec![1]);
}
