//! Compiler driver - scope chain, code targets and the top-level entry points
//!
//! The statement and expression evaluators live in sibling modules as
//! further `impl Compiler` blocks.

use crate::context::Context;
use crate::scope::{CodeLoc, CodeTarget, Scope, ScopeKind, Variable, VariableStat};
use crate::types::TypeId;
use bytecode_system::{CodeBlock, NativeSignature, Opcode, Program};
use core_types::{CompileError, CompileResult, ErrorKind, SourcePosition};
use log::debug;
use parser::{Parser, Stmt, TypeExpr};

/// How a statement completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Falls through to the next statement
    Normal,
    /// Every path returns
    Return,
    /// Every path raises
    Raise,
}

/// Handle of a variable found by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarRef {
    scope: usize,
    is_param: bool,
    index: usize,
}

/// The semantic compiler
///
/// Holds the [`Context`] and the global scope across statements, so a
/// session can compile one statement at a time.
///
/// # Examples
///
/// ```
/// use compiler::Compiler;
/// use bytecode_system::NativeSignature;
///
/// let natives = vec![NativeSignature::procedure("print", &["text"])];
/// let mut compiler = Compiler::with_natives(&natives).unwrap();
/// let program = compiler
///     .compile_source("var greeting := 'hello'; print(greeting);")
///     .unwrap();
/// assert_eq!(program.blocks.len() - program.entry, 2);
/// ```
pub struct Compiler {
    pub(crate) ctx: Context,
    pub(crate) scopes: Vec<Scope>,
    root: CodeBlock,
    pub(crate) target: CodeTarget,
    /// Slots pushed by enclosing expressions that are still on the stack
    pub(crate) temps: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Create a compiler with the built-in types and no natives
    pub fn new() -> Self {
        Self {
            ctx: Context::new(),
            scopes: vec![Scope::global()],
            root: CodeBlock::new("global"),
            target: CodeTarget::Root,
            temps: 0,
        }
    }

    /// Create a compiler that can call the given host table
    pub fn with_natives(natives: &[NativeSignature]) -> CompileResult<Self> {
        let mut compiler = Self::new();
        compiler.ctx.register_natives(natives)?;
        Ok(compiler)
    }

    /// Tables built so far
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Blocks of every function, procedure and instantiation so far
    pub fn code_blocks(&self) -> &[CodeBlock] {
        &self.ctx.code_blocks
    }

    /// Slots occupied by global variables
    pub fn global_slot_count(&self) -> usize {
        self.scopes[0].variable_offset
    }

    /// Compile one top-level statement
    ///
    /// Returns the block to run, or `None` when the statement emits no
    /// top-level code (declarations). On error the scope chain is reset to
    /// the global scope.
    pub fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<Option<CodeBlock>> {
        self.root = CodeBlock::new("global");
        self.target = CodeTarget::Root;
        self.temps = 0;
        if let Err(err) = self.eval_statement(stmt) {
            self.scopes.truncate(1);
            return Err(err);
        }
        let block = std::mem::replace(&mut self.root, CodeBlock::new("global"));
        Ok(if block.is_empty() { None } else { Some(block) })
    }

    /// Compile statements into a program whose entry is the first root
    pub fn compile_program(&mut self, statements: &[Stmt]) -> CompileResult<Program> {
        let mut roots = Vec::new();
        for stmt in statements {
            if let Some(block) = self.compile_statement(stmt)? {
                roots.push(block);
            }
        }
        debug!(
            "compiled {} callable blocks and {} root blocks",
            self.ctx.code_blocks.len(),
            roots.len()
        );
        Ok(Program::new(self.ctx.code_blocks.clone(), roots))
    }

    /// Parse and compile a whole source text
    pub fn compile_source(&mut self, source: &str) -> CompileResult<Program> {
        let statements = Parser::new(source).parse_program()?;
        self.compile_program(&statements)
    }

    // ---- code targets ----

    pub(crate) fn code(&mut self) -> &mut CodeBlock {
        match self.target {
            CodeTarget::Root => &mut self.root,
            CodeTarget::Block(index) => &mut self.ctx.code_blocks[index],
        }
    }

    fn block_at(&mut self, target: CodeTarget) -> &mut CodeBlock {
        match target {
            CodeTarget::Root => &mut self.root,
            CodeTarget::Block(index) => &mut self.ctx.code_blocks[index],
        }
    }

    /// Location of the opcode word of the last emitted instruction
    pub(crate) fn last_op_loc(&mut self) -> CodeLoc {
        let offset = self.code().code_size().saturating_sub(2);
        CodeLoc {
            target: self.target,
            offset,
        }
    }

    // ---- errors and types ----

    pub(crate) fn error(kind: ErrorKind, position: SourcePosition) -> CompileError {
        CompileError::new(kind, position)
    }

    pub(crate) fn wrong_type(
        &self,
        found: TypeId,
        expected: &str,
        position: SourcePosition,
    ) -> CompileError {
        CompileError::new(
            ErrorKind::WrongType {
                found: self.ctx.types.key(found).to_string(),
                expected: expected.to_string(),
            },
            position,
        )
    }

    /// Fail unless `found` is exactly `expected`
    pub(crate) fn expect_type(
        &self,
        found: TypeId,
        expected: TypeId,
        position: SourcePosition,
    ) -> CompileResult<()> {
        if found == expected {
            Ok(())
        } else {
            Err(self.wrong_type(found, self.ctx.types.key(expected), position))
        }
    }

    pub(crate) fn slots(&self, ty: TypeId) -> usize {
        self.ctx.types.slot_count(ty)
    }

    pub(crate) fn key(&self, ty: TypeId) -> String {
        self.ctx.types.key(ty).to_string()
    }

    /// Resolve a type expression that must be concrete
    pub(crate) fn resolve_concrete(&mut self, expr: &TypeExpr) -> CompileResult<TypeId> {
        self.ctx.resolve_concrete(expr)
    }

    /// Resolve a type expression, allowing a top-level `any`
    pub(crate) fn resolve_type(&mut self, expr: &TypeExpr) -> CompileResult<TypeId> {
        self.ctx.resolve(expr)
    }

    // ---- scopes ----

    pub(crate) fn scope(&self) -> &Scope {
        let last = self.scopes.len() - 1;
        &self.scopes[last]
    }

    pub(crate) fn scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub(crate) fn push_scope(&mut self, kind: ScopeKind) {
        let scope = Scope::child(self.scope(), kind);
        self.scopes.push(scope);
    }

    /// Open a block scope whose first slot sits above `extra` pending slots
    pub(crate) fn push_scope_above_temps(&mut self, extra: usize) {
        let mut scope = Scope::child(self.scope(), ScopeKind::Block);
        scope.offset += extra;
        self.scopes.push(scope);
    }

    /// Close the innermost scope, turning last reads of its variables into moves
    pub(crate) fn pop_scope(&mut self) {
        let Some(mut scope) = self.scopes.pop() else {
            return;
        };
        for variable in scope.variables.iter_mut() {
            let Some(stat) = variable.stat.as_mut() else {
                continue;
            };
            stat.add_reset();
            for loc in stat.move_locs() {
                let block = self.block_at(loc.target);
                let moved = match block.opcode_at(loc.offset) {
                    Some(Opcode::PushGlobal) => Opcode::PushGlobalMove,
                    Some(Opcode::PushLocal) => Opcode::PushLocalMove,
                    _ => continue,
                };
                block.set_opcode(loc.offset, moved);
                debug!("move rewrite of {} at {}", variable.name, loc.offset);
            }
        }
    }

    /// Declare a variable in the innermost scope, returning its offset
    pub(crate) fn add_variable(&mut self, name: &str, ty: TypeId, is_const: bool) -> i64 {
        let slots = self.slots(ty);
        let tracked = self.ctx.types.is_ref(ty) && slots == 1 && self.scopes.len() > 1;
        let scope = self.scope_mut();
        let offset = (scope.offset + scope.variable_offset) as i64;
        scope.variable_offset += slots;
        scope.variables.push(Variable {
            name: name.to_string(),
            ty,
            is_const,
            offset,
            stat: if tracked {
                Some(VariableStat::default())
            } else {
                None
            },
        });
        offset
    }

    /// Find a visible variable
    ///
    /// Once the search leaves a frame only global constants stay visible.
    pub(crate) fn lookup_variable(&self, name: &str) -> Option<VarRef> {
        let mut crossed_frame = false;
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            let found = scope
                .variables
                .iter()
                .position(|v| v.name == name)
                .map(|index| (false, index))
                .or_else(|| {
                    scope
                        .parameters
                        .iter()
                        .position(|v| v.name == name)
                        .map(|index| (true, index))
                });
            if let Some((is_param, index)) = found {
                let var = VarRef {
                    scope: i,
                    is_param,
                    index,
                };
                let visible = !crossed_frame || (i == 0 && self.variable(var).is_const);
                return visible.then_some(var);
            }
            if scope.is_frame {
                crossed_frame = true;
            }
        }
        None
    }

    pub(crate) fn variable(&self, var: VarRef) -> &Variable {
        let scope = &self.scopes[var.scope];
        if var.is_param {
            &scope.parameters[var.index]
        } else {
            &scope.variables[var.index]
        }
    }

    fn variable_mut(&mut self, var: VarRef) -> &mut Variable {
        let scope = &mut self.scopes[var.scope];
        if var.is_param {
            &mut scope.parameters[var.index]
        } else {
            &mut scope.variables[var.index]
        }
    }

    pub(crate) fn is_global(&self, var: VarRef) -> bool {
        self.scopes[var.scope].is_global
    }

    /// Record the instruction just emitted as a read of `var`
    pub(crate) fn add_read_loc(&mut self, var: VarRef) {
        let loc = self.last_op_loc();
        if let Some(stat) = self.variable_mut(var).stat.as_mut() {
            stat.add_read_loc(loc);
        }
    }

    /// The variable's value is about to be replaced
    pub(crate) fn add_reset(&mut self, var: VarRef) {
        if let Some(stat) = self.variable_mut(var).stat.as_mut() {
            stat.add_reset();
        }
    }

    /// Forget pending reads from the innermost scope up to its frame
    pub(crate) fn clear_var_stat_tmp(&mut self) {
        for scope in self.scopes.iter_mut().skip(1).rev() {
            for variable in scope.variables.iter_mut() {
                if let Some(stat) = variable.stat.as_mut() {
                    stat.clear_tmp();
                }
            }
            if scope.is_frame {
                break;
            }
        }
    }

    /// Push every slot of a variable, by copy
    pub(crate) fn emit_push_variable(&mut self, var: VarRef) {
        let op = if self.is_global(var) {
            Opcode::PushGlobal
        } else {
            Opcode::PushLocal
        };
        let (offset, slots) = {
            let v = self.variable(var);
            (v.offset, self.slots(v.ty))
        };
        for i in 0..slots {
            self.code().emit(op, offset + i as i64);
        }
        if slots > 0 {
            self.add_read_loc(var);
        }
    }

    /// Pop the top slots into a variable, last slot first
    pub(crate) fn emit_pop_variable(&mut self, var: VarRef) {
        let op = if self.is_global(var) {
            Opcode::PopGlobal
        } else {
            Opcode::PopLocal
        };
        let (offset, slots) = {
            let v = self.variable(var);
            (v.offset, self.slots(v.ty))
        };
        for i in (0..slots).rev() {
            self.code().emit(op, offset + i as i64);
        }
    }

    /// Run `f` with the scope chain cut back to the global scope
    ///
    /// Used to compile instantiations and dispatchers in the middle of an
    /// expression as if they were declared at top level.
    pub(crate) fn detached<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        let saved_scopes = self.scopes.split_off(1);
        let saved_target = self.target;
        let saved_temps = std::mem::replace(&mut self.temps, 0);
        let result = f(self);
        self.scopes.truncate(1);
        self.scopes.extend(saved_scopes);
        self.target = saved_target;
        self.temps = saved_temps;
        result
    }
}
