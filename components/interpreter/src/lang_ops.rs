//! `EXT` operations: strings, blobs, exceptions and generators
//!
//! Every operation takes ownership of the handles it pops. Whatever it
//! keeps is retained, the rest is released before it returns.

use bytecode_system::{LangOp, Word};
use log::debug;
use memory_manager::{Blob, ExceptionHandler, HeapObject};

use crate::error::{MachineErrorKind, MachineResult};
use crate::vm::{StackMachine, FRAME_HEADER_SIZE};

/// Slots in front of a generator's saved locals: block and ip
const GENERATOR_HEADER_SIZE: usize = 2;

/// Clamp a `[begin, end)` slot range into `0..size`
fn clamp_range(begin: Word, end: Word, size: usize) -> (usize, usize) {
    let size = size as Word;
    let begin = begin.clamp(0, size);
    let end = end.clamp(begin, size);
    (begin as usize, end as usize)
}

impl StackMachine {
    pub(crate) fn lang_op(&mut self, op: LangOp) -> MachineResult<()> {
        match op {
            LangOp::CreateString => self.create_string(),
            LangOp::ConcatString => self.concat_string(),
            LangOp::CreateBlob => {
                let size = self.pop_size()?;
                let (slots, map) = self.take_top(size)?;
                let blob = self.ref_man.add_ref(HeapObject::Blob(Blob::new(slots, map)));
                self.push(blob, true)
            }
            LangOp::ReadBlob => self.read_blob(),
            LangOp::WriteBlob => self.write_blob(),
            LangOp::ConcatBlob => self.concat_blob(),
            LangOp::GetBlobMutableOffset => self.get_blob_mutable_offset(),
            LangOp::GetBlobSize => {
                let blob = self.pop_ref()?;
                let size = self.ref_man.get_blob(blob)?.size();
                self.ref_man.dec_ref_count(blob)?;
                self.push(size as Word, false)
            }
            LangOp::GetBlobIndexOfItem => self.get_blob_index_of_item(),
            LangOp::SliceBlob => self.slice_blob(),
            LangOp::CreateBlobRepeatItem => self.create_blob_repeat_item(),
            LangOp::CreateExceptionHandler => {
                let ip = self.pop_scalar()?;
                let handler = self
                    .ref_man
                    .add_ref(HeapObject::ExceptionHandler(ExceptionHandler {
                        code_block_id: self.code_block_id as Word,
                        ip,
                        bp: self.bp as Word,
                    }));
                self.push(handler, true)
            }
            LangOp::RaiseException => self.raise_exception(),
            LangOp::CreateGenerator => self.create_generator(),
            LangOp::GetGeneratorNextItem => self.get_generator_next_item(),
            LangOp::HasGeneratorEnded => {
                let generator = self.pop_ref()?;
                let (block, ip) = self.generator_position(generator)?;
                let ended = ip >= self.block_size(block)? as Word;
                self.ref_man.dec_ref_count(generator)?;
                self.push(Word::from(ended), false)
            }
            LangOp::YieldGeneratorItem => self.yield_generator_item(),
        }
    }

    fn create_string(&mut self) -> MachineResult<()> {
        let index = self.pop_scalar()?;
        let text = self
            .code_blocks
            .get(self.code_block_id)
            .and_then(|block| usize::try_from(index).ok().and_then(|i| block.str_consts.get(i)))
            .cloned()
            .ok_or(MachineErrorKind::ConstAccessOutOfBound)?;
        let handle = self.ref_man.add_ref(HeapObject::String(text));
        self.push(handle, true)
    }

    fn concat_string(&mut self) -> MachineResult<()> {
        let count = self.pop_size()?;
        let (handles, map) = self.take_top(count)?;
        if map.iter().any(|is_ref| !is_ref) {
            return Err(MachineErrorKind::InvalidRefType.into());
        }
        let mut text = String::new();
        for handle in &handles {
            text.push_str(self.ref_man.get_string(*handle)?);
        }
        self.release_all(&handles, &map)?;
        let handle = self.ref_man.add_ref(HeapObject::String(text));
        self.push(handle, true)
    }

    /// `[blob][offset][size]` to the `size` slots read
    fn read_blob(&mut self) -> MachineResult<()> {
        let size = self.pop_size()?;
        let offset = self.pop_scalar()?;
        let blob = self.pop_ref()?;
        let source = self.ref_man.get_blob(blob)?;
        let begin = usize::try_from(offset)
            .ok()
            .filter(|begin| begin + size <= source.size())
            .ok_or(MachineErrorKind::RefAccessOutOfBound)?;
        let slots = source.slots[begin..begin + size].to_vec();
        let map = source.map[begin..begin + size].to_vec();
        for (value, is_ref) in slots.iter().zip(&map) {
            self.retain(*value, *is_ref)?;
            self.push(*value, *is_ref)?;
        }
        self.ref_man.dec_ref_count(blob)?;
        Ok(())
    }

    /// `[blob][offset][values][size]`, the values move into the blob
    fn write_blob(&mut self) -> MachineResult<()> {
        let size = self.pop_size()?;
        let (values, map) = self.take_top(size)?;
        let offset = self.pop_scalar()?;
        let blob = self.pop_ref()?;
        let target = self.ref_man.get_blob_mut(blob)?;
        let begin = usize::try_from(offset)
            .ok()
            .filter(|begin| begin + size <= target.size())
            .ok_or(MachineErrorKind::RefAccessOutOfBound)?;
        let mut old = Vec::with_capacity(size);
        for (i, (value, is_ref)) in values.into_iter().zip(map).enumerate() {
            old.push((target.slots[begin + i], target.map[begin + i]));
            target.slots[begin + i] = value;
            target.map[begin + i] = is_ref;
        }
        for (value, is_ref) in old {
            self.release(value, is_ref)?;
        }
        self.ref_man.dec_ref_count(blob)?;
        Ok(())
    }

    fn concat_blob(&mut self) -> MachineResult<()> {
        let count = self.pop_size()?;
        let (handles, map) = self.take_top(count)?;
        let mut joined = Blob::default();
        for handle in &handles {
            let part = self.ref_man.get_blob(*handle)?;
            joined.slots.extend_from_slice(&part.slots);
            joined.map.extend_from_slice(&part.map);
        }
        for child in joined.refs().collect::<Vec<_>>() {
            self.ref_man.inc_ref_count(child)?;
        }
        self.release_all(&handles, &map)?;
        let handle = self.ref_man.add_ref(HeapObject::Blob(joined));
        self.push(handle, true)
    }

    /// `[blob][offset]` to a uniquely owned handle of the nested reference
    fn get_blob_mutable_offset(&mut self) -> MachineResult<()> {
        let offset = self.pop_scalar()?;
        let blob = self.pop_ref()?;
        let source = self.ref_man.get_blob(blob)?;
        let index = usize::try_from(offset)
            .ok()
            .filter(|i| source.map.get(*i).copied().unwrap_or(false))
            .ok_or(MachineErrorKind::RefAccessOutOfBound)?;
        let nested = source.slots[index];
        let unique = self.ref_man.make_mutable(nested)?;
        self.ref_man.get_blob_mut(blob)?.slots[index] = unique;
        self.ref_man.inc_ref_count(unique)?;
        self.ref_man.dec_ref_count(blob)?;
        self.push(unique, true)
    }

    /// `[item][array][item size]` to the item index or -1
    fn get_blob_index_of_item(&mut self) -> MachineResult<()> {
        let item_size = self.pop_size()?;
        let array = self.pop_ref()?;
        let (item, item_map) = self.take_top(item_size)?;
        let mut found = -1;
        if item_size > 0 {
            let blob = self.ref_man.get_blob(array)?;
            'items: for (index, start) in (0..blob.size() / item_size)
                .map(|index| (index, index * item_size))
            {
                for k in 0..item_size {
                    let equal = match (blob.map[start + k], item_map[k]) {
                        (true, true) => self.ref_man.compare_refs(blob.slots[start + k], item[k])?,
                        (false, false) => blob.slots[start + k] == item[k],
                        _ => false,
                    };
                    if !equal {
                        continue 'items;
                    }
                }
                found = index as Word;
                break;
            }
        }
        self.release_all(&item, &item_map)?;
        self.ref_man.dec_ref_count(array)?;
        self.push(found, false)
    }

    /// `[blob][begin][end]`, the range is clamped to the blob
    fn slice_blob(&mut self) -> MachineResult<()> {
        let end = self.pop_scalar()?;
        let begin = self.pop_scalar()?;
        let blob = self.pop_ref()?;
        let source = self.ref_man.get_blob(blob)?;
        let (begin, end) = clamp_range(begin, end, source.size());
        let slice = Blob::new(
            source.slots[begin..end].to_vec(),
            source.map[begin..end].to_vec(),
        );
        for child in slice.refs().collect::<Vec<_>>() {
            self.ref_man.inc_ref_count(child)?;
        }
        self.ref_man.dec_ref_count(blob)?;
        let handle = self.ref_man.add_ref(HeapObject::Blob(slice));
        self.push(handle, true)
    }

    /// `[item][count][item size]` to a blob holding `count` copies
    fn create_blob_repeat_item(&mut self) -> MachineResult<()> {
        let item_size = self.pop_size()?;
        let count = self.pop_size()?;
        let (item, item_map) = self.take_top(item_size)?;
        let mut blob = Blob::default();
        if count == 0 {
            self.release_all(&item, &item_map)?;
        } else {
            for (value, is_ref) in item.iter().zip(&item_map) {
                if *is_ref {
                    self.ref_man.add_ref_count(*value, count - 1)?;
                }
            }
            for _ in 0..count {
                blob.slots.extend_from_slice(&item);
                blob.map.extend_from_slice(&item_map);
            }
        }
        let handle = self.ref_man.add_ref(HeapObject::Blob(blob));
        self.push(handle, true)
    }

    /// Unwind to the nearest handler, leaving the code in the handler's slot
    ///
    /// The scan never goes below the global floor, so globals outlive an
    /// uncaught exception.
    fn raise_exception(&mut self) -> MachineResult<()> {
        let code = self.pop_scalar()?;
        while self.sp() > self.global_floor {
            let top = self.sp() - 1;
            let (value, is_ref) = (self.stack[top], self.stack_map[top]);
            if is_ref {
                if let HeapObject::ExceptionHandler(handler) = self.ref_man.get_ref(value)? {
                    let handler = *handler;
                    debug!(
                        "exception {} caught in block {} at ip {}",
                        code, handler.code_block_id, handler.ip
                    );
                    self.ref_man.dec_ref_count(value)?;
                    self.stack[top] = code;
                    self.stack_map[top] = false;
                    self.code_block_id = usize::try_from(handler.code_block_id)
                        .map_err(|_| MachineErrorKind::CodeAccessOutOfBound)?;
                    self.ip = usize::try_from(handler.ip)
                        .map_err(|_| MachineErrorKind::CodeAccessOutOfBound)?;
                    self.bp = usize::try_from(handler.bp)
                        .map_err(|_| MachineErrorKind::StackAccessOutOfBound)?;
                    return Ok(());
                }
            }
            self.truncate(top);
            self.release(value, is_ref)?;
        }
        Err(MachineErrorKind::UncaughtException(code).into())
    }

    /// `[args][argc][block]` to a generator that has not started yet
    fn create_generator(&mut self) -> MachineResult<()> {
        let block = self.pop_scalar()?;
        self.block_size(block)?;
        let argc = self.pop_size()?;
        let (args, args_map) = self.take_top(argc)?;
        let mut slots = vec![block, 0];
        slots.extend(args);
        let mut map = vec![false; GENERATOR_HEADER_SIZE];
        map.extend(args_map);
        let handle = self.ref_man.add_ref(HeapObject::Blob(Blob::new(slots, map)));
        self.push(handle, true)
    }

    fn generator_position(&self, generator: Word) -> MachineResult<(Word, Word)> {
        let blob = self.ref_man.get_blob(generator)?;
        if blob.size() < GENERATOR_HEADER_SIZE {
            return Err(MachineErrorKind::RefAccessOutOfBound.into());
        }
        Ok((blob.slots[0], blob.slots[1]))
    }

    /// Resume the generator on top, which stays as the frame's first header slot
    fn get_generator_next_item(&mut self) -> MachineResult<()> {
        let top = self
            .sp()
            .checked_sub(1)
            .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
        if !self.stack_map[top] {
            return Err(MachineErrorKind::InvalidRefType.into());
        }
        let generator = self.stack[top];
        let (block, ip) = self.generator_position(generator)?;
        let size = self.block_size(block)?;
        let ip = usize::try_from(ip)
            .ok()
            .filter(|ip| *ip < size)
            .ok_or(MachineErrorKind::CodeAccessOutOfBound)?;
        self.open_frame(block as usize, ip)?;

        let saved = self.ref_man.get_blob_mut(generator)?;
        let locals = saved.slots[GENERATOR_HEADER_SIZE..].to_vec();
        let locals_map = saved.map[GENERATOR_HEADER_SIZE..].to_vec();
        for is_ref in &mut saved.map[GENERATOR_HEADER_SIZE..] {
            *is_ref = false;
        }
        for (value, is_ref) in locals.into_iter().zip(locals_map) {
            self.push(value, is_ref)?;
        }
        Ok(())
    }

    /// `[item][size]`: save the locals and hand the item to the resumer
    fn yield_generator_item(&mut self) -> MachineResult<()> {
        let size = self.pop_size()?;
        let bp = self.bp;
        if bp < FRAME_HEADER_SIZE || self.sp() < bp + size {
            return Err(MachineErrorKind::StackAccessOutOfBound.into());
        }
        let slot = bp - FRAME_HEADER_SIZE;
        if !self.stack_map[slot] {
            return Err(MachineErrorKind::InvalidRefType.into());
        }
        let generator = self.stack[slot];
        let (item, item_map) = self.take_top(size)?;
        let (locals, locals_map) = self.take_top(self.sp() - bp)?;

        let resume_ip = self.ip as Word;
        let saved = self.ref_man.get_blob_mut(generator)?;
        saved.resize(GENERATOR_HEADER_SIZE + locals.len());
        saved.slots[1] = resume_ip;
        saved.slots[GENERATOR_HEADER_SIZE..].copy_from_slice(&locals);
        saved.map[GENERATOR_HEADER_SIZE..].copy_from_slice(&locals_map);

        self.restore_frame()?;
        self.truncate(slot);
        self.stack.extend(item);
        self.stack_map.extend(item_map);
        self.ref_man.dec_ref_count(generator)?;
        Ok(())
    }
}
