//! Compiler context - the tables shared by every compiled statement
//!
//! Holds the type registry, the callable tables, the generic declarations
//! waiting for instantiation and every code block emitted so far. One
//! context per compilation, passed explicitly, never global.

use crate::types::{TypeId, TypeRegistry, ANY, INTEGER, NULL};
use bytecode_system::{CodeBlock, LangOp, NativeSignature, NoArgOp, Opcode};
use core_types::{CompileError, CompileResult, ErrorKind};
use log::debug;
use parser::{parse_type_str, FunctionDecl, ProcedureDecl, TypeExpr, TypeExprKind};
use std::collections::{HashMap, HashSet};

/// How a resolved call is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callable {
    /// Host function at this index of the native table
    Native(usize),
    /// A single language op, no call frame
    Internal(LangOp),
    /// Code block entered with `CALL`
    Block(usize),
    /// Code block wrapped into a generator object
    Generator(usize),
}

/// A concrete function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Declared name
    pub name: String,
    /// Parameter types
    pub params: Vec<TypeId>,
    /// Result type, or yielded item type for generators
    pub return_type: TypeId,
    /// Call target
    pub callable: Callable,
}

/// A concrete procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    /// Declared name
    pub name: String,
    /// Parameter types
    pub params: Vec<TypeId>,
    /// Call target
    pub callable: Callable,
}

/// A generic declaration, instantiated per concrete argument types
#[derive(Debug, Clone)]
pub struct Macro<D> {
    /// Declaration as written
    pub decl: D,
    /// Resolved parameter types, [`ANY`] where generic
    pub params: Vec<TypeId>,
}

impl<D> Macro<D> {
    fn accepts(&self, args: &[TypeId]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| *param == ANY || param == arg)
    }

    fn any_count(&self) -> usize {
        self.params.iter().filter(|p| **p == ANY).count()
    }

    fn first_any(&self) -> usize {
        self.params
            .iter()
            .position(|p| *p == ANY)
            .unwrap_or(self.params.len())
    }
}

/// Pick the most specific generic declaration for `args`
///
/// Fewest generic parameters wins; on a tie, the one whose first generic
/// parameter comes latest.
fn best_macro<'a, D>(candidates: &'a [Macro<D>], args: &[TypeId]) -> Option<&'a Macro<D>> {
    let mut best: Option<&Macro<D>> = None;
    for candidate in candidates.iter().filter(|m| m.accepts(args)) {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let better = candidate.any_count() < current.any_count()
                    || (candidate.any_count() == current.any_count()
                        && candidate.first_any() > current.first_any());
                Some(if better { candidate } else { current })
            }
        };
    }
    best
}

/// Signature key `name(k1,k2,...)` shared by natives and declarations
pub fn callable_key(types: &TypeRegistry, name: &str, params: &[TypeId]) -> String {
    format!(
        "{}({})",
        name,
        params
            .iter()
            .map(|t| types.key(*t))
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn macro_bucket(name: &str, count: usize) -> String {
    format!("{}({})", name, count)
}

/// Tables of one compilation
#[derive(Debug, Default)]
pub struct Context {
    /// Canonical types
    pub types: TypeRegistry,
    functions: HashMap<String, Function>,
    procedures: HashMap<String, Procedure>,
    macro_functions: HashMap<String, Vec<Macro<FunctionDecl>>>,
    macro_procedures: HashMap<String, Vec<Macro<ProcedureDecl>>>,
    macro_keys: HashSet<String>,
    /// Blocks of functions, procedures and instantiations, by index
    pub code_blocks: Vec<CodeBlock>,
}

impl Context {
    /// Create a context with only the built-in types
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a type expression into its canonical type
    ///
    /// `any` is returned as [`ANY`] only at the outermost level; nested
    /// positions require a concrete type.
    pub fn resolve(&mut self, expr: &TypeExpr) -> CompileResult<TypeId> {
        let err = |kind| CompileError::new(kind, expr.position);
        match &expr.kind {
            TypeExprKind::Named(name) => self
                .types
                .lookup(name)
                .ok_or_else(|| err(ErrorKind::UnknownType(name.clone()))),
            TypeExprKind::Null => Ok(NULL),
            TypeExprKind::Array(item) => {
                let item = self.resolve_concrete(item)?;
                Ok(self.array_type(item))
            }
            TypeExprKind::Sequence(item) => {
                let item = self.resolve_concrete(item)?;
                Ok(self.types.sequence(item).0)
            }
            TypeExprKind::Record(fields) => {
                let mut resolved: Vec<(String, TypeId)> = Vec::with_capacity(fields.len());
                for field in fields {
                    if resolved.iter().any(|(name, _)| *name == field.name) {
                        return Err(CompileError::new(
                            ErrorKind::FieldAlreadyExists(field.name.clone()),
                            field.position,
                        ));
                    }
                    resolved.push((field.name.clone(), self.resolve_concrete(&field.ty)?));
                }
                Ok(self.types.record(resolved).0)
            }
            TypeExprKind::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.resolve_concrete(item))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(self.types.tuple(items).0)
            }
            TypeExprKind::Variant(members) => {
                let mut resolved = Vec::with_capacity(members.len());
                for member in members {
                    let ty = self.resolve_concrete(member)?;
                    if self.types.variant_members(ty).is_some() {
                        return Err(CompileError::new(
                            ErrorKind::CantNestVariant(self.types.key(ty).to_string()),
                            member.position,
                        ));
                    }
                    if resolved.contains(&ty) {
                        return Err(CompileError::new(
                            ErrorKind::DuplicateVariantMember(self.types.key(ty).to_string()),
                            member.position,
                        ));
                    }
                    resolved.push(ty);
                }
                Ok(self.types.variant(resolved).0)
            }
        }
    }

    /// Resolve a type that must not be `any`
    pub fn resolve_concrete(&mut self, expr: &TypeExpr) -> CompileResult<TypeId> {
        let ty = self.resolve(expr)?;
        if ty == ANY {
            return Err(CompileError::new(ErrorKind::AnyNotAllowed, expr.position));
        }
        Ok(ty)
    }

    /// Intern an array type, generating its helper functions the first time
    pub fn array_type(&mut self, item: TypeId) -> TypeId {
        let (array, created) = self.types.array(item);
        if created {
            self.generate_array_helpers(array, item);
        }
        array
    }

    fn generate_array_helpers(&mut self, array: TypeId, item: TypeId) {
        let slots = self.types.slot_count(item);

        let length_callable = if slots == 1 {
            Callable::Internal(LangOp::GetBlobSize)
        } else {
            let mut block = CodeBlock::new(callable_key(&self.types, "length", &[array]));
            block.emit(Opcode::PushLocal, -5);
            block.emit_ext(LangOp::GetBlobSize);
            block.emit_push(slots as i64);
            block.emit_noarg(NoArgOp::Div);
            block.emit(Opcode::Ret, 1);
            Callable::Block(self.add_code_block(block))
        };
        self.add_function(Function {
            name: "length".to_string(),
            params: vec![array],
            return_type: INTEGER,
            callable: length_callable,
        });

        let mut block = CodeBlock::new(callable_key(&self.types, "last_index", &[array]));
        block.emit(Opcode::PushLocal, -5);
        match length_callable {
            Callable::Block(index) => {
                block.emit_push(1);
                block.emit(Opcode::Call, index as i64);
            }
            _ => block.emit_ext(LangOp::GetBlobSize),
        }
        block.emit_push(1);
        block.emit_noarg(NoArgOp::Sub);
        block.emit(Opcode::Ret, 1);
        let index = self.add_code_block(block);
        self.add_function(Function {
            name: "last_index".to_string(),
            params: vec![array],
            return_type: INTEGER,
            callable: Callable::Block(index),
        });

        let mut block = CodeBlock::new(callable_key(&self.types, "index_of", &[item, array]));
        for i in 0..=slots {
            block.emit(Opcode::PushLocal, -5 - slots as i64 + i as i64);
        }
        block.emit_push(slots as i64);
        block.emit_ext(LangOp::GetBlobIndexOfItem);
        block.emit(Opcode::Ret, 1);
        let index = self.add_code_block(block);
        self.add_function(Function {
            name: "index_of".to_string(),
            params: vec![item, array],
            return_type: INTEGER,
            callable: Callable::Block(index),
        });
        debug!("generated helpers for {}", self.types.key(array));
    }

    /// Append a code block, returning its index
    pub fn add_code_block(&mut self, block: CodeBlock) -> usize {
        self.code_blocks.push(block);
        self.code_blocks.len() - 1
    }

    /// Key of a callable with these parameter types
    pub fn key(&self, name: &str, params: &[TypeId]) -> String {
        callable_key(&self.types, name, params)
    }

    /// Look up a function by signature key
    pub fn function(&self, key: &str) -> Option<&Function> {
        self.functions.get(key)
    }

    /// Mutable function by signature key
    pub fn function_mut(&mut self, key: &str) -> Option<&mut Function> {
        self.functions.get_mut(key)
    }

    /// Register a function under its signature key
    pub fn add_function(&mut self, function: Function) {
        let key = self.key(&function.name, &function.params);
        self.functions.insert(key, function);
    }

    /// Drop a function, used to roll back a failed declaration
    pub fn remove_function(&mut self, key: &str) {
        self.functions.remove(key);
    }

    /// Look up a procedure by signature key
    pub fn procedure(&self, key: &str) -> Option<&Procedure> {
        self.procedures.get(key)
    }

    /// Register a procedure under its signature key
    pub fn add_procedure(&mut self, procedure: Procedure) {
        let key = self.key(&procedure.name, &procedure.params);
        self.procedures.insert(key, procedure);
    }

    /// Drop a procedure, used to roll back a failed declaration
    pub fn remove_procedure(&mut self, key: &str) {
        self.procedures.remove(key);
    }

    /// Whether a generic declaration already uses this full key
    pub fn has_macro(&self, key: &str) -> bool {
        self.macro_keys.contains(key)
    }

    /// Store a generic function
    pub fn add_macro_function(&mut self, key: String, decl: FunctionDecl, params: Vec<TypeId>) {
        let bucket = macro_bucket(&decl.name, params.len());
        self.macro_keys.insert(key);
        self.macro_functions
            .entry(bucket)
            .or_default()
            .push(Macro { decl, params });
    }

    /// Store a generic procedure
    pub fn add_macro_procedure(&mut self, key: String, decl: ProcedureDecl, params: Vec<TypeId>) {
        let bucket = macro_bucket(&decl.name, params.len());
        self.macro_keys.insert(key);
        self.macro_procedures
            .entry(bucket)
            .or_default()
            .push(Macro { decl, params });
    }

    /// Most specific generic function accepting `args`
    pub fn find_macro_function(&self, name: &str, args: &[TypeId]) -> Option<&Macro<FunctionDecl>> {
        self.macro_functions
            .get(&macro_bucket(name, args.len()))
            .and_then(|candidates| best_macro(candidates, args))
    }

    /// Most specific generic procedure accepting `args`
    pub fn find_macro_procedure(
        &self,
        name: &str,
        args: &[TypeId],
    ) -> Option<&Macro<ProcedureDecl>> {
        self.macro_procedures
            .get(&macro_bucket(name, args.len()))
            .and_then(|candidates| best_macro(candidates, args))
    }

    /// Register host functions and procedures by their table index
    pub fn register_natives(&mut self, natives: &[NativeSignature]) -> CompileResult<()> {
        for (index, native) in natives.iter().enumerate() {
            let mut params = Vec::with_capacity(native.params.len());
            for param in &native.params {
                let expr = parse_type_str(param)?;
                params.push(self.resolve_concrete(&expr)?);
            }
            let name = native.name.to_string();
            match native.result {
                Some(result) => {
                    let expr = parse_type_str(result)?;
                    let return_type = self.resolve_concrete(&expr)?;
                    self.add_function(Function {
                        name,
                        params,
                        return_type,
                        callable: Callable::Native(index),
                    });
                }
                None => self.add_procedure(Procedure {
                    name,
                    params,
                    callable: Callable::Native(index),
                }),
            }
        }
        debug!("registered {} natives", natives.len());
        Ok(())
    }
}
