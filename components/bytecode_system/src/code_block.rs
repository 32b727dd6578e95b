//! Code blocks - the unit of compiled code
//!
//! One block per function, procedure, generic instantiation and top-level
//! statement. Blocks are addressed everywhere by their dense index.

use crate::opcode::{LangOp, NoArgOp, Opcode, Word};

/// A compiled code block with its constant pools
///
/// # Examples
///
/// ```
/// use bytecode_system::{CodeBlock, NoArgOp, Opcode};
///
/// let mut block = CodeBlock::new("main");
/// block.emit_push(2);
/// block.emit_push(3);
/// block.emit_noarg(NoArgOp::Add);
/// assert_eq!(block.code_size(), 6);
/// assert_eq!(block.codes[0], Opcode::Push.code());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// Block name, a function key for callables
    pub name: String,
    /// Instruction words, always an even count
    pub codes: Vec<Word>,
    /// Deduplicated string constants
    pub str_consts: Vec<String>,
    /// Deduplicated float constants
    pub float_consts: Vec<f64>,
}

impl CodeBlock {
    /// Create an empty block
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes: Vec::new(),
            str_consts: Vec::new(),
            float_consts: Vec::new(),
        }
    }

    /// Number of code words
    pub fn code_size(&self) -> usize {
        self.codes.len()
    }

    /// Whether no code was emitted
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Offset of the last emitted word
    ///
    /// After emitting an instruction this is the location of its operand.
    pub fn current_loc(&self) -> usize {
        self.codes.len().saturating_sub(1)
    }

    /// Patch the operand at `loc` with the current code size
    pub fn set_loc(&mut self, loc: usize) {
        let target = self.codes.len() as Word;
        if let Some(word) = self.codes.get_mut(loc) {
            *word = target;
        }
    }

    /// Emit a two-word instruction, returning the operand location
    pub fn emit(&mut self, op: Opcode, arg: Word) -> usize {
        self.codes.push(op.code());
        self.codes.push(arg);
        self.current_loc()
    }

    /// Emit `NOARG op`
    pub fn emit_noarg(&mut self, op: NoArgOp) {
        self.emit(Opcode::NoArg, op.code());
    }

    /// Emit `EXT op`
    pub fn emit_ext(&mut self, op: LangOp) {
        self.emit(Opcode::Ext, op.code());
    }

    /// Emit `PUSH value`, returning the operand location
    pub fn emit_push(&mut self, value: Word) -> usize {
        self.emit(Opcode::Push, value)
    }

    /// Emit `JZ` with a placeholder target
    pub fn emit_jz(&mut self) -> usize {
        self.emit(Opcode::Jz, 0)
    }

    /// Emit `JNZ` with a placeholder target
    pub fn emit_jnz(&mut self) -> usize {
        self.emit(Opcode::Jnz, 0)
    }

    /// Emit `JMP` to a known target
    pub fn emit_jmp(&mut self, target: usize) -> usize {
        self.emit(Opcode::Jmp, target as Word)
    }

    /// Emit `POP_VOID count` unless count is zero
    pub fn emit_pop_void(&mut self, count: usize) {
        if count > 0 {
            self.emit(Opcode::PopVoid, count as Word);
        }
    }

    /// Rewrite the opcode word at `loc`
    pub fn set_opcode(&mut self, loc: usize, op: Opcode) {
        if let Some(word) = self.codes.get_mut(loc) {
            *word = op.code();
        }
    }

    /// Opcode stored at `loc`, if any
    pub fn opcode_at(&self, loc: usize) -> Option<Opcode> {
        self.codes.get(loc).copied().and_then(Opcode::from_code)
    }

    /// Intern a string constant, returning its pool index
    pub fn add_str_const(&mut self, value: &str) -> Word {
        if let Some(idx) = self.str_consts.iter().position(|s| s == value) {
            return idx as Word;
        }
        self.str_consts.push(value.to_string());
        (self.str_consts.len() - 1) as Word
    }

    /// Intern a float constant, returning its pool index
    pub fn add_float_const(&mut self, value: f64) -> Word {
        if let Some(idx) = self
            .float_consts
            .iter()
            .position(|f| f.to_bits() == value.to_bits())
        {
            return idx as Word;
        }
        self.float_consts.push(value);
        (self.float_consts.len() - 1) as Word
    }
}
