//! Text persistence of compiled programs
//!
//! Layout:
//!
//! ```text
//! <blockCount> <entryBlockIndex>
//! <nameLength> <name>            per block
//! <stringCount>
//! <length> <text>                per string
//! <floatCount>
//! <float>                        per float
//! <codeSize>
//! <word> <word> ...              50 words per line
//! ```

use crate::code_block::CodeBlock;
use crate::opcode::Word;
use thiserror::Error;

const WORDS_PER_LINE: usize = 50;

/// A loaded or compiled program
///
/// Blocks before `entry` are callables, blocks from `entry` on are the
/// top-level statements, executed in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// All code blocks in index order
    pub blocks: Vec<CodeBlock>,
    /// Index of the first top-level block
    pub entry: usize,
}

impl Program {
    /// Assemble a program from callable blocks and top-level blocks
    pub fn new(callables: Vec<CodeBlock>, roots: Vec<CodeBlock>) -> Self {
        let entry = callables.len();
        let mut blocks = callables;
        blocks.extend(roots);
        Self { blocks, entry }
    }

    /// Render the program in the text format
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {}\n", self.blocks.len(), self.entry);
        for block in &self.blocks {
            out.push_str(&format!("{} {}\n", block.name.chars().count(), block.name));
            out.push_str(&format!("{}\n", block.str_consts.len()));
            for s in &block.str_consts {
                out.push_str(&format!("{} {}\n", s.chars().count(), s));
            }
            out.push_str(&format!("{}\n", block.float_consts.len()));
            for f in &block.float_consts {
                out.push_str(&format!("{}\n", f));
            }
            out.push_str(&format!("{}\n", block.codes.len()));
            for (i, word) in block.codes.iter().enumerate() {
                out.push_str(&format!("{} ", word));
                if i % WORDS_PER_LINE == WORDS_PER_LINE - 1 {
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }

    /// Parse a program from the text format
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{CodeBlock, Program};
    ///
    /// let mut block = CodeBlock::new("global");
    /// block.emit_push(1);
    /// let program = Program::new(vec![], vec![block]);
    /// let loaded = Program::from_text(&program.to_text()).unwrap();
    /// assert_eq!(loaded, program);
    /// ```
    pub fn from_text(text: &str) -> Result<Self, LoadError> {
        let mut reader = TextReader::new(text);
        let count = reader.read_count()?;
        let entry = reader.read_count()?;
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader.read_string()?;
            let mut block = CodeBlock::new(name);
            let str_count = reader.read_count()?;
            for _ in 0..str_count {
                block.str_consts.push(reader.read_string()?);
            }
            let float_count = reader.read_count()?;
            for _ in 0..float_count {
                block.float_consts.push(reader.read_float()?);
            }
            let code_size = reader.read_count()?;
            block.codes.reserve(code_size);
            for _ in 0..code_size {
                block.codes.push(reader.read_word()?);
            }
            blocks.push(block);
        }
        if entry > blocks.len() {
            return Err(LoadError::InvalidEntry(entry));
        }
        Ok(Self { blocks, entry })
    }
}

/// Errors raised while loading the text format
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    /// Input ended inside a block
    #[error("Unexpected end of file")]
    UnexpectedEof,
    /// A word that does not parse as an integer
    #[error("Invalid integer {0}")]
    InvalidInteger(String),
    /// A line that does not parse as a float
    #[error("Invalid float {0}")]
    InvalidFloat(String),
    /// Entry index past the block count
    #[error("Invalid entry block {0}")]
    InvalidEntry(usize),
}

struct TextReader {
    chars: Vec<char>,
    position: usize,
}

impl TextReader {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            position: 0,
        }
    }

    fn next_token(&mut self) -> Result<String, LoadError> {
        while self.position < self.chars.len() && self.chars[self.position].is_whitespace() {
            self.position += 1;
        }
        if self.position >= self.chars.len() {
            return Err(LoadError::UnexpectedEof);
        }
        let start = self.position;
        while self.position < self.chars.len() && !self.chars[self.position].is_whitespace() {
            self.position += 1;
        }
        Ok(self.chars[start..self.position].iter().collect())
    }

    fn read_word(&mut self) -> Result<Word, LoadError> {
        let token = self.next_token()?;
        token.parse().map_err(|_| LoadError::InvalidInteger(token))
    }

    fn read_count(&mut self) -> Result<usize, LoadError> {
        let token = self.next_token()?;
        token.parse().map_err(|_| LoadError::InvalidInteger(token))
    }

    fn read_float(&mut self) -> Result<f64, LoadError> {
        let token = self.next_token()?;
        token.parse().map_err(|_| LoadError::InvalidFloat(token))
    }

    // Length-prefixed: exactly one separator follows the length.
    fn read_string(&mut self) -> Result<String, LoadError> {
        let len = self.read_count()?;
        self.position += 1;
        if self.position + len > self.chars.len() {
            return Err(LoadError::UnexpectedEof);
        }
        let s = self.chars[self.position..self.position + len].iter().collect();
        self.position += len;
        Ok(s)
    }
}
