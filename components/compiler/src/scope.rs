//! Compiler scopes and variables
//!
//! Scopes form a chain from the global root to the innermost block. A frame
//! scope starts a new base pointer; every other scope continues the slot
//! numbering of its parent.

use crate::types::TypeId;

/// Which code block a location belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTarget {
    /// The block of the top-level statement being compiled
    Root,
    /// A block of the context
    Block(usize),
}

/// Opcode location inside a code block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLoc {
    /// Owning block
    pub target: CodeTarget,
    /// Index of the opcode word
    pub offset: usize,
}

/// Reads of a heap variable, tracked to turn its last read into a move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStat {
    tmp: Option<CodeLoc>,
    move_locs: Vec<CodeLoc>,
}

impl VariableStat {
    /// Remember the latest straight-line read
    pub fn add_read_loc(&mut self, loc: CodeLoc) {
        self.tmp = Some(loc);
    }

    /// The value is about to be replaced or dropped, its last read moves
    pub fn add_reset(&mut self) {
        if let Some(loc) = self.tmp.take() {
            self.move_locs.push(loc);
        }
    }

    /// Forget the pending read, used at control flow boundaries
    pub fn clear_tmp(&mut self) {
        self.tmp = None;
    }

    /// Reads to rewrite into moves
    pub fn move_locs(&self) -> &[CodeLoc] {
        &self.move_locs
    }
}

/// A declared variable or parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    /// Whether assignment is rejected
    pub is_const: bool,
    /// Slot relative to the base pointer, or absolute for globals
    pub offset: i64,
    /// Move tracking, only for single-slot heap values outside the root
    pub stat: Option<VariableStat>,
}

/// Kind of scope being opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Nested `begin`, branch or handler body
    Block,
    /// Body of a loop, target of `exit`
    Loop,
    /// Function or generator frame
    Function {
        /// Declared result, [`crate::types::INFER`] until the first `return`
        return_type: TypeId,
        /// Whether the frame runs as a generator
        is_generator: bool,
    },
    /// Procedure frame
    Procedure,
}

/// One level of the scope chain
#[derive(Debug, Clone)]
pub struct Scope {
    /// Starts a new base pointer
    pub is_frame: bool,
    /// Frame of a generator
    pub is_generator: bool,
    /// Target of `exit`
    pub is_loop: bool,
    /// Variables are addressed from the bottom of the stack
    pub is_global: bool,
    /// Result type of a function frame
    pub return_type: Option<TypeId>,
    /// Variables in declaration order
    pub variables: Vec<Variable>,
    /// Parameters of a function or procedure frame
    pub parameters: Vec<Variable>,
    /// Slots used by the variables of this scope
    pub variable_offset: usize,
    /// First slot of this scope
    pub offset: usize,
    /// `exit` jumps patched when the loop closes
    pub exit_locs: Vec<usize>,
}

impl Scope {
    /// The root scope of a compilation
    pub fn global() -> Self {
        Self {
            is_frame: false,
            is_generator: false,
            is_loop: false,
            is_global: true,
            return_type: None,
            variables: Vec::new(),
            parameters: Vec::new(),
            variable_offset: 0,
            offset: 0,
            exit_locs: Vec::new(),
        }
    }

    /// A scope nested in `parent`
    pub fn child(parent: &Scope, kind: ScopeKind) -> Self {
        let is_frame = matches!(kind, ScopeKind::Function { .. } | ScopeKind::Procedure);
        let (return_type, is_generator) = match kind {
            ScopeKind::Function {
                return_type,
                is_generator,
            } => (Some(return_type), is_generator),
            _ => (None, false),
        };
        Self {
            is_frame,
            is_generator,
            is_loop: kind == ScopeKind::Loop,
            is_global: parent.is_global && !is_frame,
            return_type,
            variables: Vec::new(),
            parameters: Vec::new(),
            variable_offset: 0,
            offset: if is_frame {
                0
            } else {
                parent.offset + parent.variable_offset
            },
            exit_locs: Vec::new(),
        }
    }

    /// Variable or parameter declared directly in this scope
    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .chain(self.parameters.iter())
            .find(|v| v.name == name)
    }

    /// Mutable variable or parameter declared directly in this scope
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables
            .iter_mut()
            .chain(self.parameters.iter_mut())
            .find(|v| v.name == name)
    }

    /// Give parameters their negative offsets below the frame header
    pub fn finalize_parameters(&mut self, slot_counts: &[usize]) {
        let mut offset = -4i64;
        for (param, slots) in self.parameters.iter_mut().zip(slot_counts).rev() {
            offset -= *slots as i64;
            param.offset = offset;
        }
    }
}
