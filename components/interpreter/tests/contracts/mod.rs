//! Contract tests for the stack machine API
//!
//! Hand-assembled blocks pin down the stack effect of each operation.

use bytecode_system::{CodeBlock, LangOp, Opcode};
use interpreter::{MachineConfig, MachineErrorKind, SharedOutput, StackMachine};
use memory_manager::HeapObject;

fn machine(blocks: Vec<CodeBlock>) -> StackMachine {
    let mut machine = StackMachine::new().with_output(SharedOutput::new());
    machine.set_code_blocks(blocks);
    machine
}

fn push_string(block: &mut CodeBlock, text: &str) {
    let index = block.add_str_const(text);
    block.emit_push(index);
    block.emit_ext(LangOp::CreateString);
}

fn push_blob(block: &mut CodeBlock, values: &[i64]) {
    for value in values {
        block.emit_push(*value);
    }
    block.emit_push(values.len() as i64);
    block.emit_ext(LangOp::CreateBlob);
}

fn blob_slots(machine: &StackMachine, handle: i64) -> Vec<i64> {
    machine.heap().get_blob(handle).unwrap().slots.clone()
}

/// Test a block leaves exactly its pushes on the stack
#[test]
fn test_execute_contract() {
    let mut block = CodeBlock::new("root");
    block.emit_push(1);
    block.emit_push(2);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.sp(), 2);
    assert_eq!(machine.ip(), 4);
}

/// Test CONCAT_STRING consumes its operands
#[test]
fn test_concat_string_contract() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "ab");
    push_string(&mut block, "cd");
    block.emit_push(2);
    block.emit_ext(LangOp::ConcatString);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    let (handle, is_ref) = machine.slot(0).unwrap();
    assert!(is_ref);
    assert_eq!(machine.heap().get_string(handle).unwrap(), "abcd");
    assert_eq!(machine.heap().live_count(), 1);
}

/// Test CONCAT_STRING refuses a scalar operand
#[test]
fn test_concat_string_rejects_scalar() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "ab");
    block.emit_push(0);
    block.emit_push(2);
    block.emit_ext(LangOp::ConcatString);
    let mut machine = machine(vec![block]);
    let err = machine.execute(0).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::InvalidRefType);
}

/// Test READ_BLOB copies a range and drops the blob handle
#[test]
fn test_read_blob_contract() {
    let mut block = CodeBlock::new("root");
    push_blob(&mut block, &[5, 6, 7]);
    block.emit_push(1);
    block.emit_push(2);
    block.emit_ext(LangOp::ReadBlob);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.slot(0), Some((6, false)));
    assert_eq!(machine.slot(1), Some((7, false)));
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test READ_BLOB past the end
#[test]
fn test_read_blob_out_of_bound() {
    let mut block = CodeBlock::new("root");
    push_blob(&mut block, &[5]);
    block.emit_push(1);
    block.emit_push(1);
    block.emit_ext(LangOp::ReadBlob);
    let mut machine = machine(vec![block]);
    let err = machine.execute(0).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::RefAccessOutOfBound);
}

/// Test WRITE_BLOB overwrites in place and releases the old reference
#[test]
fn test_write_blob_contract() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "old");
    block.emit_push(1);
    block.emit_ext(LangOp::CreateBlob);
    block.emit(Opcode::Dup, 1);
    block.emit_push(0);
    push_string(&mut block, "new");
    block.emit_push(1);
    block.emit_ext(LangOp::WriteBlob);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();

    assert_eq!(machine.sp(), 1);
    let (blob, _) = machine.slot(0).unwrap();
    let nested = blob_slots(&machine, blob)[0];
    assert_eq!(machine.heap().get_string(nested).unwrap(), "new");
    assert_eq!(machine.heap().live_count(), 2);
}

/// Test SLICE_BLOB clamps its range
#[test]
fn test_slice_blob_contract() {
    let mut block = CodeBlock::new("root");
    push_blob(&mut block, &[1, 2, 3, 4]);
    block.emit_push(-3);
    block.emit_push(2);
    block.emit_ext(LangOp::SliceBlob);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    let (slice, _) = machine.slot(0).unwrap();
    assert_eq!(blob_slots(&machine, slice), vec![1, 2]);
    assert_eq!(machine.heap().live_count(), 1);
}

/// Test GET_BLOB_INDEX_OF_ITEM compares references structurally
#[test]
fn test_index_of_item_contract() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "x");
    push_string(&mut block, "y");
    block.emit_push(2);
    block.emit_ext(LangOp::CreateBlob);
    // [item][array][item size] with the item pushed first
    push_string(&mut block, "y");
    block.emit(Opcode::Swap, 2);
    block.emit_push(1);
    block.emit_ext(LangOp::GetBlobIndexOfItem);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.slot(0), Some((1, false)));
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test CREATE_BLOB_REPEAT_ITEM shares the repeated reference
#[test]
fn test_repeat_item_contract() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "r");
    block.emit_push(3);
    block.emit_push(1);
    block.emit_ext(LangOp::CreateBlobRepeatItem);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    let (blob, _) = machine.slot(0).unwrap();
    let slots = blob_slots(&machine, blob);
    assert_eq!(slots.len(), 3);
    assert_eq!(machine.heap().ref_count(slots[0]).unwrap(), 3);
}

/// Test a zero count releases the item
#[test]
fn test_repeat_item_zero_count() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "r");
    block.emit_push(0);
    block.emit_push(1);
    block.emit_ext(LangOp::CreateBlobRepeatItem);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.heap().live_count(), 1);
}

/// Test a negative count is rejected
#[test]
fn test_repeat_item_negative_count() {
    let mut block = CodeBlock::new("root");
    block.emit_push(9);
    block.emit_push(-1);
    block.emit_push(1);
    block.emit_ext(LangOp::CreateBlobRepeatItem);
    let mut machine = machine(vec![block]);
    let err = machine.execute(0).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::InvalidSize);
}

/// Test PUSH_GLOBAL_FOR_MUTATE splits a shared blob
#[test]
fn test_push_for_mutate_contract() {
    let mut block = CodeBlock::new("root");
    push_blob(&mut block, &[1]);
    block.emit(Opcode::PushGlobal, 0);
    block.emit(Opcode::PushGlobalForMutate, 1);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    let (a, _) = machine.slot(0).unwrap();
    let (b, _) = machine.slot(1).unwrap();
    let (c, _) = machine.slot(2).unwrap();
    assert_ne!(a, b);
    assert_eq!(b, c);
    assert_eq!(machine.heap().ref_count(a).unwrap(), 1);
    assert_eq!(machine.heap().ref_count(b).unwrap(), 2);
}

/// Test PUSH_GLOBAL_MOVE clears its source
#[test]
fn test_push_move_contract() {
    let mut block = CodeBlock::new("root");
    push_blob(&mut block, &[1]);
    block.emit(Opcode::PushGlobalMove, 0);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.slot(0), Some((-1, false)));
    let (moved, is_ref) = machine.slot(1).unwrap();
    assert!(is_ref);
    assert_eq!(machine.heap().ref_count(moved).unwrap(), 1);
}

/// Test EQ compares groups of slots and releases them
#[test]
fn test_eq_contract() {
    let mut block = CodeBlock::new("root");
    push_string(&mut block, "same");
    block.emit_push(4);
    push_string(&mut block, "same");
    block.emit_push(4);
    block.emit(Opcode::Eq, 2);
    let mut machine = machine(vec![block]);
    machine.execute(0).unwrap();
    assert_eq!(machine.sp(), 1);
    assert_eq!(machine.slot(0), Some((1, false)));
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test RAISE_EXCEPTION restores the handler frame
#[test]
fn test_raise_contract() {
    let mut root = CodeBlock::new("root");
    let handler = root.emit_push(0);
    root.emit_ext(LangOp::CreateExceptionHandler);
    root.emit_push(0);
    root.emit(Opcode::Call, 1);
    let end = root.emit_jmp(0);
    root.set_loc(handler);
    root.emit_push(100);
    root.set_loc(end);

    let mut thrower = CodeBlock::new("thrower()");
    push_string(&mut thrower, "dropped");
    thrower.emit_push(42);
    thrower.emit_ext(LangOp::RaiseException);

    let mut machine = machine(vec![root, thrower]);
    machine.execute(0).unwrap();
    assert_eq!(machine.slot(0), Some((42, false)));
    assert_eq!(machine.slot(1), Some((100, false)));
    assert_eq!(machine.sp(), 2);
    assert_eq!(machine.heap().live_count(), 0);
}

/// Test a generator frame is saved on yield and resumed from its blob
#[test]
fn test_generator_contract() {
    // generator: local := 5; yield local; yield local + 1; end
    let mut gen = CodeBlock::new("gen()");
    gen.emit_push(5);
    gen.emit(Opcode::PushLocal, 0);
    gen.emit_push(1);
    gen.emit_ext(LangOp::YieldGeneratorItem);
    gen.emit(Opcode::PushLocal, 0);
    gen.emit_push(1);
    gen.emit(Opcode::NoArg, bytecode_system::NoArgOp::Add.code());
    gen.emit_push(1);
    gen.emit_ext(LangOp::YieldGeneratorItem);
    gen.emit_push(0);
    gen.emit_push(1);
    gen.emit_ext(LangOp::YieldGeneratorItem);

    // no arguments, generator body in block 0
    let mut root = CodeBlock::new("root");
    root.emit_push(0);
    root.emit_push(0);
    root.emit_ext(LangOp::CreateGenerator);
    for _ in 0..2 {
        root.emit(Opcode::PushGlobal, 0);
        root.emit_ext(LangOp::GetGeneratorNextItem);
    }
    root.emit(Opcode::PushGlobal, 0);
    root.emit_ext(LangOp::HasGeneratorEnded);
    root.emit(Opcode::PushGlobal, 0);
    root.emit_ext(LangOp::GetGeneratorNextItem);
    root.emit(Opcode::PushGlobal, 0);
    root.emit_ext(LangOp::HasGeneratorEnded);

    let mut machine = machine(vec![gen, root]);
    machine.execute(1).unwrap();
    let values: Vec<i64> = (1..machine.sp()).map(|i| machine.slot(i).unwrap().0).collect();
    assert_eq!(values, vec![5, 6, 0, 0, 1]);
    let (generator, _) = machine.slot(0).unwrap();
    match machine.heap().get_ref(generator).unwrap() {
        HeapObject::Blob(blob) => assert_eq!(blob.slots[..3], [0, 24, 5]),
        other => panic!("unexpected {:?}", other),
    }
}

/// Test resuming an ended generator
#[test]
fn test_resume_ended_generator() {
    let mut gen = CodeBlock::new("gen()");
    gen.emit_push(0);
    gen.emit_push(1);
    gen.emit_ext(LangOp::YieldGeneratorItem);

    let mut root = CodeBlock::new("root");
    root.emit_push(0);
    root.emit_push(0);
    root.emit_ext(LangOp::CreateGenerator);
    for _ in 0..2 {
        root.emit(Opcode::PushGlobal, 0);
        root.emit_ext(LangOp::GetGeneratorNextItem);
    }
    let mut machine = machine(vec![gen, root]);
    let err = machine.execute(1).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::CodeAccessOutOfBound);
}

/// Test native calls check the pushed argument count
#[test]
fn test_native_arg_count_contract() {
    let mut block = CodeBlock::new("root");
    block.emit_push(1);
    block.emit_push(1);
    // index 26 is now(), which takes no argument
    block.emit(Opcode::CallNative, 26);
    let mut machine = machine(vec![block]);
    let err = machine.execute(0).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::NativeArgCountMismatch);
}

/// Test the stack limit from the configuration
#[test]
fn test_max_stack_contract() {
    let mut block = CodeBlock::new("root");
    let top = block.code_size();
    block.emit_push(1);
    block.emit_jmp(top);
    let mut machine = StackMachine::with_config(MachineConfig::default().with_max_stack_size(64));
    machine.set_code_blocks(vec![block]);
    let err = machine.execute(0).unwrap_err();
    assert_eq!(err.kind, MachineErrorKind::StackAccessOutOfBound);
    assert_eq!(machine.sp(), 64);
}
