//! The stack machine
//!
//! One word stack with a parallel reference bitmap. A call frame looks like
//! `[args][argc][ret block][ret ip][old bp]` with the base pointer just past
//! the header, so the last argument sits at `bp - 5` and locals start at `bp`.
//! Globals are the bottom of the stack, addressed absolutely.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use bytecode_system::{disassemble, CodeBlock, Program, Word};
use log::{debug, trace};
use memory_manager::RefManager;

use crate::config::MachineConfig;
use crate::error::{MachineError, MachineErrorKind, MachineResult};
use crate::natives::{native_functions, NativeFunction};

/// Words of a call frame header: argc, return block, return ip, old bp
pub const FRAME_HEADER_SIZE: usize = 4;

/// Reinterpret a word as the real it carries
pub fn word_to_real(word: Word) -> f64 {
    f64::from_bits(word as u64)
}

/// Store a real in a word
pub fn real_to_word(value: f64) -> Word {
    value.to_bits() as Word
}

/// Output sink that can be read back, shared between the machine and a host
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use interpreter::SharedOutput;
///
/// let out = SharedOutput::new();
/// let mut writer = out.clone();
/// write!(writer, "hi").unwrap();
/// assert_eq!(out.contents(), "hi");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Forget what was written
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reference-counted stack machine
///
/// # Examples
///
/// ```
/// use bytecode_system::{CodeBlock, NoArgOp, Opcode};
/// use interpreter::StackMachine;
///
/// let mut block = CodeBlock::new("root");
/// block.emit_push(40);
/// block.emit_push(2);
/// block.emit_noarg(NoArgOp::Add);
///
/// let mut machine = StackMachine::new();
/// machine.set_code_blocks(vec![block]);
/// machine.execute(0).unwrap();
/// assert_eq!(machine.slot(0), Some((42, false)));
/// ```
pub struct StackMachine {
    pub(crate) stack: Vec<Word>,
    pub(crate) stack_map: Vec<bool>,
    pub(crate) bp: usize,
    pub(crate) ip: usize,
    pub(crate) code_block_id: usize,
    pub(crate) code_blocks: Vec<CodeBlock>,
    pub(crate) ref_man: RefManager,
    pub(crate) natives: Vec<NativeFunction>,
    pub(crate) out: Box<dyn Write>,
    /// Slots at the bottom that an uncaught raise leaves in place
    pub(crate) global_floor: usize,
    config: MachineConfig,
}

impl fmt::Debug for StackMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackMachine")
            .field("sp", &self.stack.len())
            .field("bp", &self.bp)
            .field("ip", &self.ip)
            .field("code_block_id", &self.code_block_id)
            .field("code_blocks", &self.code_blocks.len())
            .field("ref_man", &self.ref_man)
            .field("natives", &self.natives.len())
            .field("out", &"dyn Write")
            .field("global_floor", &self.global_floor)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for StackMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StackMachine {
    /// Machine with the default configuration writing to stdout
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    /// Machine with the given configuration writing to stdout
    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            stack: Vec::with_capacity(config.stack_size),
            stack_map: Vec::with_capacity(config.stack_size),
            bp: 0,
            ip: 0,
            code_block_id: 0,
            code_blocks: Vec::new(),
            ref_man: RefManager::new(),
            natives: native_functions(),
            out: Box::new(io::stdout()),
            global_floor: 0,
            config,
        }
    }

    /// Replace the output sink used by `write` and `print`
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Replace the native table, indices must match the compiler's registration
    pub fn with_natives(mut self, natives: Vec<NativeFunction>) -> Self {
        self.natives = natives;
        self
    }

    /// Machine configuration
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Install the code blocks, indices are the ones baked into `CALL`
    pub fn set_code_blocks(&mut self, code_blocks: Vec<CodeBlock>) {
        self.code_blocks = code_blocks;
    }

    /// Installed code blocks
    pub fn code_blocks(&self) -> &[CodeBlock] {
        &self.code_blocks
    }

    /// The heap
    pub fn heap(&self) -> &RefManager {
        &self.ref_man
    }

    /// Keep the bottom `slots` slots when an exception goes uncaught
    pub fn set_global_floor(&mut self, slots: usize) {
        self.global_floor = slots;
    }

    /// Number of bottom slots an uncaught exception does not unwind
    pub fn global_floor(&self) -> usize {
        self.global_floor
    }

    /// Stack pointer, the number of live slots
    pub fn sp(&self) -> usize {
        self.stack.len()
    }

    /// Current base pointer
    pub fn bp(&self) -> usize {
        self.bp
    }

    /// Offset of the next instruction
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Block being run
    pub fn code_block_id(&self) -> usize {
        self.code_block_id
    }

    /// Value and reference bit of an absolute slot
    pub fn slot(&self, index: usize) -> Option<(Word, bool)> {
        Some((*self.stack.get(index)?, *self.stack_map.get(index)?))
    }

    /// Run a block from its first instruction with an empty frame
    pub fn execute(&mut self, code_block_id: usize) -> MachineResult<()> {
        if code_block_id >= self.code_blocks.len() {
            return Err(MachineError::new(MachineErrorKind::CodeAccessOutOfBound));
        }
        self.code_block_id = code_block_id;
        self.ip = 0;
        self.bp = 0;
        self.run()
    }

    /// Continue after a trap or a suspension
    pub fn resume(&mut self) -> MachineResult<()> {
        self.run()
    }

    /// Hand a trap its result, which replaces the argument count slot
    pub fn answer_trap(&mut self, value: Word) -> MachineResult<()> {
        let top = self
            .sp()
            .checked_sub(1)
            .ok_or_else(|| MachineError::new(MachineErrorKind::StackAccessOutOfBound))?;
        self.stack[top] = value;
        self.stack_map[top] = false;
        Ok(())
    }

    /// Run a block to completion, answering traps through `on_trap`
    ///
    /// Suspensions are resumed right away. A trap `on_trap` cannot answer
    /// is returned to the caller.
    pub fn execute_with_traps<F>(&mut self, code_block_id: usize, mut on_trap: F) -> MachineResult<()>
    where
        F: FnMut(&str) -> Option<Word>,
    {
        let mut result = self.execute(code_block_id);
        loop {
            match result {
                Ok(()) => return Ok(()),
                Err(err) if err.kind == MachineErrorKind::Suspended => {
                    debug!("resuming after suspend in block {}", self.code_block_id);
                    result = self.resume();
                }
                Err(err) => match err.trap_name().and_then(&mut on_trap) {
                    Some(value) => {
                        self.answer_trap(value)?;
                        result = self.resume();
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Install a program and run its root blocks in order
    pub fn run_program<F>(&mut self, program: &Program, mut on_trap: F) -> MachineResult<()>
    where
        F: FnMut(&str) -> Option<Word>,
    {
        self.set_code_blocks(program.blocks.clone());
        for block in program.entry..program.blocks.len() {
            self.execute_with_traps(block, &mut on_trap)?;
        }
        Ok(())
    }

    /// Bring the stack back to `len` slots after a failed statement
    ///
    /// Slots above are released, missing globals are zero.
    pub fn reset_stack(&mut self, len: usize) -> MachineResult<()> {
        while self.sp() > len {
            let (value, is_ref) = self.pop()?;
            self.release(value, is_ref)?;
        }
        self.stack.resize(len, 0);
        self.stack_map.resize(len, false);
        self.bp = 0;
        self.global_floor = self.global_floor.min(len);
        Ok(())
    }

    /// Release every slot, leaving the heap empty unless something leaked
    pub fn clear_stack(&mut self) -> MachineResult<()> {
        self.reset_stack(0)
    }

    /// Flush the output sink
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Human-readable machine state: registers, stack and current block
    pub fn dump(&self) -> String {
        let mut text = format!(
            "sp {} bp {} ip {} block {}\n",
            self.sp(),
            self.bp,
            self.ip,
            self.code_block_id
        );
        for (index, (value, is_ref)) in self.stack.iter().zip(&self.stack_map).enumerate() {
            let marker = if index == self.bp { ">" } else { " " };
            let kind = if *is_ref { "ref" } else { "" };
            text.push_str(&format!("{}{:>5}: {} {}\n", marker, index, value, kind));
        }
        if let Some(block) = self.code_blocks.get(self.code_block_id) {
            text.push_str(&disassemble(block, Some(self.ip)));
        }
        for (id, count, object) in self.ref_man.iter() {
            text.push_str(&format!("ref {} x{}: {:?}\n", id, count, object));
        }
        text
    }

    fn run(&mut self) -> MachineResult<()> {
        loop {
            let block = self
                .code_blocks
                .get(self.code_block_id)
                .ok_or_else(|| self.located(MachineErrorKind::CodeAccessOutOfBound.into()))?;
            if self.ip + 1 >= block.codes.len() {
                return Ok(());
            }
            let code = block.codes[self.ip];
            let arg = block.codes[self.ip + 1];
            self.ip += 2;
            if self.config.trace {
                trace!(
                    "block {} ip {} sp {} bp {}: {} {}",
                    self.code_block_id,
                    self.ip - 2,
                    self.sp(),
                    self.bp,
                    code,
                    arg
                );
            }
            self.dispatch(code, arg).map_err(|err| self.located(err))?;
        }
    }

    fn located(&self, err: MachineError) -> MachineError {
        if err.is_trap() || err.code_block_id.is_some() {
            err
        } else {
            err.at(self.code_block_id, self.ip)
        }
    }

    // Stack primitives shared by the dispatcher, the lang ops and the natives

    pub(crate) fn push(&mut self, value: Word, is_ref: bool) -> MachineResult<()> {
        if self.stack.len() >= self.config.max_stack_size {
            return Err(MachineErrorKind::StackAccessOutOfBound.into());
        }
        self.stack.push(value);
        self.stack_map.push(is_ref);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> MachineResult<(Word, bool)> {
        match (self.stack.pop(), self.stack_map.pop()) {
            (Some(value), Some(is_ref)) => Ok((value, is_ref)),
            _ => Err(MachineErrorKind::StackAccessOutOfBound.into()),
        }
    }

    /// Pop a plain value, a handle here is a code generation fault
    pub(crate) fn pop_scalar(&mut self) -> MachineResult<Word> {
        match self.pop()? {
            (value, false) => Ok(value),
            (_, true) => Err(MachineErrorKind::InvalidRefType.into()),
        }
    }

    /// Pop a handle, the caller owns its count
    pub(crate) fn pop_ref(&mut self) -> MachineResult<Word> {
        match self.pop()? {
            (value, true) => Ok(value),
            (_, false) => Err(MachineErrorKind::InvalidRefType.into()),
        }
    }

    /// Pop a non-negative count
    pub(crate) fn pop_size(&mut self) -> MachineResult<usize> {
        let size = self.pop_scalar()?;
        usize::try_from(size).map_err(|_| MachineErrorKind::InvalidSize.into())
    }

    /// Detach the top `count` slots, the caller owns their counts
    pub(crate) fn take_top(&mut self, count: usize) -> MachineResult<(Vec<Word>, Vec<bool>)> {
        let at = self
            .sp()
            .checked_sub(count)
            .ok_or_else(|| MachineError::new(MachineErrorKind::StackAccessOutOfBound))?;
        Ok((self.stack.split_off(at), self.stack_map.split_off(at)))
    }

    /// Cut the stack down to `len` without touching counts
    pub(crate) fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
        self.stack_map.truncate(len);
    }

    /// Index of an absolute slot, checked against the live stack
    pub(crate) fn check_index(&self, index: Word) -> MachineResult<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.sp())
            .ok_or_else(|| MachineErrorKind::StackAccessOutOfBound.into())
    }

    /// Index of a slot relative to the base pointer
    pub(crate) fn local_index(&self, offset: Word) -> MachineResult<usize> {
        self.check_index(self.bp as Word + offset)
    }

    pub(crate) fn release(&mut self, value: Word, is_ref: bool) -> MachineResult<()> {
        if is_ref {
            self.ref_man.dec_ref_count(value)?;
        }
        Ok(())
    }

    pub(crate) fn retain(&mut self, value: Word, is_ref: bool) -> MachineResult<()> {
        if is_ref {
            self.ref_man.inc_ref_count(value)?;
        }
        Ok(())
    }

    /// Pop `count` slots releasing their handles
    pub(crate) fn drop_top(&mut self, count: usize) -> MachineResult<()> {
        let (values, map) = self.take_top(count)?;
        self.release_all(&values, &map)
    }

    pub(crate) fn release_all(&mut self, values: &[Word], map: &[bool]) -> MachineResult<()> {
        for (value, is_ref) in values.iter().zip(map) {
            self.release(*value, *is_ref)?;
        }
        Ok(())
    }

    /// Word stored in a frame header slot
    pub(crate) fn header_word(&self, index: usize) -> MachineResult<usize> {
        self.stack
            .get(index)
            .and_then(|word| usize::try_from(*word).ok())
            .ok_or_else(|| MachineErrorKind::StackAccessOutOfBound.into())
    }

    /// Restore the caller's registers from the frame header below `bp`
    pub(crate) fn restore_frame(&mut self) -> MachineResult<()> {
        let bp = self.bp;
        if bp < FRAME_HEADER_SIZE {
            return Err(MachineErrorKind::StackAccessOutOfBound.into());
        }
        let old_bp = self.header_word(bp - 1)?;
        let ret_ip = self.header_word(bp - 2)?;
        let ret_block = self.header_word(bp - 3)?;
        self.bp = old_bp;
        self.ip = ret_ip;
        self.code_block_id = ret_block;
        Ok(())
    }

    /// Push the return point and open a frame at the current stack top
    pub(crate) fn open_frame(&mut self, code_block_id: usize, ip: usize) -> MachineResult<()> {
        self.push(self.code_block_id as Word, false)?;
        self.push(self.ip as Word, false)?;
        self.push(self.bp as Word, false)?;
        self.bp = self.sp();
        self.code_block_id = code_block_id;
        self.ip = ip;
        Ok(())
    }

    /// Code size of a block, checked
    pub(crate) fn block_size(&self, code_block_id: Word) -> MachineResult<usize> {
        usize::try_from(code_block_id)
            .ok()
            .and_then(|id| self.code_blocks.get(id))
            .map(CodeBlock::code_size)
            .ok_or_else(|| MachineErrorKind::CodeAccessOutOfBound.into())
    }
}
