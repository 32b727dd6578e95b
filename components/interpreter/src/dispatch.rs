//! Instruction dispatch
//!
//! Two-word opcodes and the `NOARG` arithmetic group. `EXT` operations live
//! in [`crate::lang_ops`].

use bytecode_system::{LangOp, NoArgOp, Opcode, Word};

use crate::error::{MachineError, MachineErrorKind, MachineResult};
use crate::vm::{real_to_word, word_to_real, StackMachine, FRAME_HEADER_SIZE};

fn boolean(value: bool) -> Word {
    Word::from(value)
}

impl StackMachine {
    pub(crate) fn dispatch(&mut self, code: Word, arg: Word) -> MachineResult<()> {
        let op = Opcode::from_code(code).ok_or(MachineErrorKind::UnknownOp)?;
        match op {
            Opcode::NoArg => {
                let op = NoArgOp::from_code(arg).ok_or(MachineErrorKind::UnknownOp)?;
                self.noarg(op)
            }
            Opcode::Jz => {
                if self.pop_scalar()? == 0 {
                    self.jump(arg)?;
                }
                Ok(())
            }
            Opcode::Jnz => {
                if self.pop_scalar()? != 0 {
                    self.jump(arg)?;
                }
                Ok(())
            }
            Opcode::Jmp => self.jump(arg),
            Opcode::Push => self.push(arg, false),
            Opcode::PushF => {
                let value = self
                    .code_blocks
                    .get(self.code_block_id)
                    .and_then(|block| usize::try_from(arg).ok().and_then(|i| block.float_consts.get(i)))
                    .copied()
                    .ok_or(MachineErrorKind::ConstAccessOutOfBound)?;
                self.push(real_to_word(value), false)
            }
            Opcode::PushGlobal => {
                let index = self.check_index(arg)?;
                self.push_copy(index)
            }
            Opcode::PushLocal => {
                let index = self.local_index(arg)?;
                self.push_copy(index)
            }
            Opcode::PushGlobalMove => {
                let index = self.check_index(arg)?;
                self.push_moved(index)
            }
            Opcode::PushLocalMove => {
                let index = self.local_index(arg)?;
                self.push_moved(index)
            }
            Opcode::PushGlobalForMutate => {
                let index = self.check_index(arg)?;
                self.push_for_mutate(index)
            }
            Opcode::PushLocalForMutate => {
                let index = self.local_index(arg)?;
                self.push_for_mutate(index)
            }
            Opcode::PopGlobal => {
                let index = self.check_index(arg)?;
                self.pop_into(index)
            }
            Opcode::PopLocal => {
                let index = self.local_index(arg)?;
                self.pop_into(index)
            }
            Opcode::PopVoid => {
                let count = usize::try_from(arg).map_err(|_| MachineErrorKind::InvalidSize)?;
                self.drop_top(count)
            }
            Opcode::Call => self.call(arg),
            Opcode::CallNative => self.call_native(arg),
            Opcode::Ret => self.ret(arg),
            Opcode::Eq => self.equal(arg),
            Opcode::Dup => {
                let count = usize::try_from(arg).map_err(|_| MachineErrorKind::InvalidSize)?;
                let from = self
                    .sp()
                    .checked_sub(count)
                    .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
                for index in from..from + count {
                    self.push_copy(index)?;
                }
                Ok(())
            }
            Opcode::Swap => {
                let count = usize::try_from(arg).map_err(|_| MachineErrorKind::InvalidSize)?;
                let from = self
                    .sp()
                    .checked_sub(count)
                    .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
                self.stack[from..].reverse();
                self.stack_map[from..].reverse();
                Ok(())
            }
            Opcode::Ext => {
                let op = LangOp::from_code(arg).ok_or(MachineErrorKind::UnknownOp)?;
                self.lang_op(op)
            }
        }
    }

    fn jump(&mut self, target: Word) -> MachineResult<()> {
        let size = self.block_size(self.code_block_id as Word)?;
        self.ip = usize::try_from(target)
            .ok()
            .filter(|ip| *ip <= size)
            .ok_or(MachineErrorKind::CodeAccessOutOfBound)?;
        Ok(())
    }

    fn push_copy(&mut self, index: usize) -> MachineResult<()> {
        let (value, is_ref) = (self.stack[index], self.stack_map[index]);
        self.retain(value, is_ref)?;
        self.push(value, is_ref)
    }

    fn push_moved(&mut self, index: usize) -> MachineResult<()> {
        let (value, is_ref) = (self.stack[index], self.stack_map[index]);
        self.push(value, is_ref)?;
        self.stack[index] = -1;
        self.stack_map[index] = false;
        Ok(())
    }

    fn push_for_mutate(&mut self, index: usize) -> MachineResult<()> {
        if self.stack_map[index] {
            let unique = self.ref_man.make_mutable(self.stack[index])?;
            self.stack[index] = unique;
        }
        self.push_copy(index)
    }

    fn pop_into(&mut self, index: usize) -> MachineResult<()> {
        let (value, is_ref) = self.pop()?;
        if index >= self.sp() {
            return Err(MachineErrorKind::StackAccessOutOfBound.into());
        }
        let (old, old_is_ref) = (self.stack[index], self.stack_map[index]);
        self.stack[index] = value;
        self.stack_map[index] = is_ref;
        self.release(old, old_is_ref)
    }

    fn call(&mut self, block: Word) -> MachineResult<()> {
        self.block_size(block)?;
        self.check_argc()?;
        self.open_frame(block as usize, 0)
    }

    fn call_native(&mut self, index: Word) -> MachineResult<()> {
        let native = usize::try_from(index)
            .ok()
            .and_then(|i| self.natives.get(i))
            .copied()
            .ok_or(MachineErrorKind::CodeAccessOutOfBound)?;
        self.check_argc()?;
        native(self)
    }

    /// The argument count on top must leave room for the arguments below it
    fn check_argc(&self) -> MachineResult<usize> {
        let top = self
            .sp()
            .checked_sub(1)
            .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
        usize::try_from(self.stack[top])
            .ok()
            .filter(|argc| *argc <= top)
            .ok_or_else(|| MachineErrorKind::StackAccessOutOfBound.into())
    }

    fn ret(&mut self, count: Word) -> MachineResult<()> {
        let count = usize::try_from(count).map_err(|_| MachineErrorKind::InvalidSize)?;
        let bp = self.bp;
        if bp < FRAME_HEADER_SIZE || self.sp() < bp + count {
            return Err(MachineErrorKind::StackAccessOutOfBound.into());
        }
        let argc = self.header_word(bp - FRAME_HEADER_SIZE)?;
        let base = (bp - FRAME_HEADER_SIZE)
            .checked_sub(argc)
            .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
        let (results, result_map) = self.take_top(count)?;
        self.restore_frame()?;
        let (frame, frame_map) = self.take_top(self.sp() - base)?;
        self.release_all(&frame, &frame_map)?;
        self.stack.extend(results);
        self.stack_map.extend(result_map);
        Ok(())
    }

    fn equal(&mut self, size: Word) -> MachineResult<()> {
        let size = usize::try_from(size).map_err(|_| MachineErrorKind::InvalidSize)?;
        let (right, right_map) = self.take_top(size)?;
        let (left, left_map) = self.take_top(size)?;
        let mut equal = true;
        for i in 0..size {
            equal = match (left_map[i], right_map[i]) {
                (true, true) => self.ref_man.compare_refs(left[i], right[i])?,
                (false, false) => left[i] == right[i],
                _ => false,
            };
            if !equal {
                break;
            }
        }
        self.release_all(&left, &left_map)?;
        self.release_all(&right, &right_map)?;
        self.push(boolean(equal), false)
    }

    fn noarg(&mut self, op: NoArgOp) -> MachineResult<()> {
        match op {
            NoArgOp::Suspend => Err(MachineError::new(MachineErrorKind::Suspended)),
            NoArgOp::Add => self.binary(|a, b| Ok(a.wrapping_add(b))),
            NoArgOp::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b))),
            NoArgOp::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b))),
            NoArgOp::Div => self.binary(|a, b| {
                if b == 0 {
                    return Err(MachineErrorKind::DivByZero.into());
                }
                Ok(a.wrapping_div(b))
            }),
            NoArgOp::Rem => self.binary(|a, b| {
                if b == 0 {
                    return Err(MachineErrorKind::DivByZero.into());
                }
                Ok(a.wrapping_rem(b))
            }),
            NoArgOp::AddF => self.binary_real(|a, b| real_to_word(a + b)),
            NoArgOp::SubF => self.binary_real(|a, b| real_to_word(a - b)),
            NoArgOp::MulF => self.binary_real(|a, b| real_to_word(a * b)),
            NoArgOp::DivF => self.binary_real(|a, b| real_to_word(a / b)),
            NoArgOp::Gt => self.binary(|a, b| Ok(boolean(a > b))),
            NoArgOp::Lt => self.binary(|a, b| Ok(boolean(a < b))),
            NoArgOp::Gte => self.binary(|a, b| Ok(boolean(a >= b))),
            NoArgOp::Lte => self.binary(|a, b| Ok(boolean(a <= b))),
            NoArgOp::GtF => self.binary_real(|a, b| boolean(a > b)),
            NoArgOp::LtF => self.binary_real(|a, b| boolean(a < b)),
            NoArgOp::GteF => self.binary_real(|a, b| boolean(a >= b)),
            NoArgOp::LteF => self.binary_real(|a, b| boolean(a <= b)),
            NoArgOp::And => self.binary(|a, b| Ok(boolean(a != 0 && b != 0))),
            NoArgOp::Or => self.binary(|a, b| Ok(boolean(a != 0 || b != 0))),
            NoArgOp::Neg => self.unary(Word::wrapping_neg),
            NoArgOp::NegF => self.unary(|a| real_to_word(-word_to_real(a))),
            NoArgOp::Not => self.unary(|a| boolean(a == 0)),
        }
    }

    fn binary<F>(&mut self, f: F) -> MachineResult<()>
    where
        F: FnOnce(Word, Word) -> MachineResult<Word>,
    {
        let right = self.pop_scalar()?;
        let left = self.pop_scalar()?;
        let value = f(left, right)?;
        self.push(value, false)
    }

    fn binary_real<F>(&mut self, f: F) -> MachineResult<()>
    where
        F: FnOnce(f64, f64) -> Word,
    {
        self.binary(|a, b| Ok(f(word_to_real(a), word_to_real(b))))
    }

    fn unary<F>(&mut self, f: F) -> MachineResult<()>
    where
        F: FnOnce(Word) -> Word,
    {
        let value = self.pop_scalar()?;
        self.push(f(value), false)
    }
}
