//! Calls, declarations, generic instantiation and variant dispatch

use crate::compiler::{Completion, Compiler};
use crate::context::{Callable, Function, Procedure};
use crate::scope::{CodeTarget, ScopeKind, Variable};
use crate::types::{TypeId, ANY, INFER};
use bytecode_system::{CodeBlock, LangOp, Opcode};
use core_types::{CompileResult, ErrorKind, SourcePosition};
use log::debug;
use parser::{
    Block, Expr, ExprKind, FunctionDecl, KindofBranch, Param, ProcedureDecl, Stmt, StmtKind,
    TypeExpr, TypeExprKind,
};

impl Compiler {
    /// Emit a call whose arguments are already on the stack
    fn emit_call(&mut self, callable: Callable, arg_slots: usize) {
        match callable {
            Callable::Native(index) => {
                self.code().emit_push(arg_slots as i64);
                self.code().emit(Opcode::CallNative, index as i64);
            }
            Callable::Internal(op) => self.code().emit_ext(op),
            Callable::Generator(block) => {
                self.code().emit_push(arg_slots as i64);
                self.code().emit_push(block as i64);
                self.code().emit_ext(LangOp::CreateGenerator);
            }
            Callable::Block(block) => {
                self.code().emit_push(arg_slots as i64);
                self.code().emit(Opcode::Call, block as i64);
            }
        }
    }

    fn arg_slots(&self, args: &[TypeId]) -> usize {
        args.iter().map(|ty| self.slots(*ty)).sum()
    }

    fn variant_arg(&self, args: &[TypeId]) -> Option<usize> {
        args.iter()
            .position(|ty| self.ctx.types.variant_members(*ty).is_some())
    }

    /// Resolve and emit a function call on already pushed arguments
    ///
    /// Lookup order: exact signature, then a dispatcher over the first
    /// variant argument, then the most specific generic declaration.
    pub(crate) fn generate_function_call(
        &mut self,
        name: &str,
        args: &[TypeId],
        expected: Option<TypeId>,
        position: SourcePosition,
    ) -> CompileResult<TypeId> {
        let key = self.ctx.key(name, args);
        if self.ctx.function(&key).is_none() {
            if let Some(variant) = self.variant_arg(args) {
                self.generate_dispatch_function(name, args, variant, expected, position)?;
            } else if let Some(generic) = self.ctx.find_macro_function(name, args).cloned() {
                self.instantiate_function(generic.decl, args)?;
            }
        }
        let function = self
            .ctx
            .function(&key)
            .cloned()
            .ok_or_else(|| Self::error(ErrorKind::UnknownFunction(key.clone()), position))?;
        let arg_slots = self.arg_slots(args);
        self.emit_call(function.callable, arg_slots);
        Ok(match function.callable {
            Callable::Generator(_) => self.ctx.types.sequence(function.return_type).0,
            _ => function.return_type,
        })
    }

    /// A call used as a statement
    pub(crate) fn eval_procedure_call(
        &mut self,
        name: &str,
        args: &[Expr],
        position: SourcePosition,
    ) -> CompileResult<()> {
        let base = self.temps;
        let mut types = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.eval_expression(arg, None)?;
            self.temps += self.slots(ty);
            types.push(ty);
        }
        self.temps = base;
        let key = self.ctx.key(name, &types);
        if self.ctx.procedure(&key).is_none() {
            if let Some(variant) = self.variant_arg(&types) {
                self.generate_dispatch_procedure(name, &types, variant, position)?;
            } else if let Some(generic) = self.ctx.find_macro_procedure(name, &types).cloned() {
                self.instantiate_procedure(generic.decl, &types)?;
            }
        }
        let procedure = self
            .ctx
            .procedure(&key)
            .cloned()
            .ok_or_else(|| Self::error(ErrorKind::UnknownProcedure(key.clone()), position))?;
        let arg_slots = self.arg_slots(&types);
        self.emit_call(procedure.callable, arg_slots);
        Ok(())
    }

    /// Concrete parameters replacing the generic ones
    fn concrete_params(&self, params: &[Param], args: &[TypeId]) -> Vec<Param> {
        params
            .iter()
            .zip(args)
            .map(|(param, arg)| Param {
                name: param.name.clone(),
                ty: self.ctx.types.to_type_expr(*arg, param.position),
                position: param.position,
            })
            .collect()
    }

    fn instantiate_function(
        &mut self,
        mut decl: FunctionDecl,
        args: &[TypeId],
    ) -> CompileResult<()> {
        decl.params = self.concrete_params(&decl.params, args);
        if matches!(&decl.return_type.kind, TypeExprKind::Named(name) if name == "any") {
            decl.return_type = TypeExpr::named("_infer", decl.return_type.position);
        }
        debug!("instantiating {}", self.ctx.key(&decl.name, args));
        self.detached(|c| c.eval_function_decl(&decl))?;
        Ok(())
    }

    fn instantiate_procedure(
        &mut self,
        mut decl: ProcedureDecl,
        args: &[TypeId],
    ) -> CompileResult<()> {
        decl.params = self.concrete_params(&decl.params, args);
        debug!("instantiating {}", self.ctx.key(&decl.name, args));
        self.detached(|c| c.eval_procedure_decl(&decl))?;
        Ok(())
    }

    /// Parameters `arg0..argN` and the forwarded arguments, `v` standing for the variant
    fn dispatch_signature(
        &self,
        args: &[TypeId],
        variant: usize,
        position: SourcePosition,
    ) -> (Vec<Param>, Vec<Expr>) {
        let params = args
            .iter()
            .enumerate()
            .map(|(i, ty)| Param {
                name: format!("arg{}", i),
                ty: self.ctx.types.to_type_expr(*ty, position),
                position,
            })
            .collect();
        let forwarded = (0..args.len())
            .map(|i| {
                let name = if i == variant {
                    "v".to_string()
                } else {
                    format!("arg{}", i)
                };
                Expr::variable(name, position)
            })
            .collect();
        (params, forwarded)
    }

    /// `kindof argN when M v then <body> ... end` over every member
    fn dispatch_body(
        &self,
        args: &[TypeId],
        variant: usize,
        branch: Stmt,
        position: SourcePosition,
    ) -> Block {
        let members = self
            .ctx
            .types
            .variant_members(args[variant])
            .map(|m| m.to_vec())
            .unwrap_or_default();
        let whens = members
            .iter()
            .map(|member| KindofBranch {
                ty: self.ctx.types.to_type_expr(*member, position),
                var: "v".to_string(),
                body: Block::new(vec![branch.clone()], position),
                position,
            })
            .collect();
        let kindof = Stmt::new(
            StmtKind::Kindof {
                case: Expr::variable(format!("arg{}", variant), position),
                whens,
                otherwise: None,
            },
            position,
        );
        Block::new(vec![kindof], position)
    }

    fn generate_dispatch_function(
        &mut self,
        name: &str,
        args: &[TypeId],
        variant: usize,
        expected: Option<TypeId>,
        position: SourcePosition,
    ) -> CompileResult<()> {
        let key = self.ctx.key(name, args);
        if self.ctx.function(&key).is_some() {
            return Err(Self::error(ErrorKind::DuplicateDispatchMethod(key), position));
        }
        let (params, forwarded) = self.dispatch_signature(args, variant, position);
        let mut result = Expr::new(
            ExprKind::Call {
                name: name.to_string(),
                args: forwarded,
            },
            position,
        );
        if let Some(expected) = expected {
            result = Expr::new(
                ExprKind::As {
                    expr: Box::new(result),
                    ty: self.ctx.types.to_type_expr(expected, position),
                },
                position,
            );
        }
        let branch = Stmt::new(StmtKind::Return(Some(result)), position);
        let decl = FunctionDecl {
            name: name.to_string(),
            params,
            return_type: TypeExpr::named("_infer", position),
            body: self.dispatch_body(args, variant, branch, position),
            is_generator: false,
            position,
        };
        debug!("synthesizing dispatcher {}", key);
        self.detached(|c| c.eval_function_decl(&decl))?;
        Ok(())
    }

    fn generate_dispatch_procedure(
        &mut self,
        name: &str,
        args: &[TypeId],
        variant: usize,
        position: SourcePosition,
    ) -> CompileResult<()> {
        let key = self.ctx.key(name, args);
        if self.ctx.procedure(&key).is_some() {
            return Err(Self::error(ErrorKind::DuplicateDispatchMethod(key), position));
        }
        let (params, forwarded) = self.dispatch_signature(args, variant, position);
        let branch = Stmt::new(
            StmtKind::ProcedureCall {
                name: name.to_string(),
                args: forwarded,
            },
            position,
        );
        let decl = ProcedureDecl {
            name: name.to_string(),
            params,
            body: self.dispatch_body(args, variant, branch, position),
            position,
        };
        debug!("synthesizing dispatcher {}", key);
        self.detached(|c| c.eval_procedure_decl(&decl))?;
        Ok(())
    }

    /// Resolve parameter types, rejecting duplicate names
    fn resolve_params(&mut self, params: &[Param]) -> CompileResult<Vec<TypeId>> {
        let mut types = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(Self::error(
                    ErrorKind::ParameterAlreadyExists(param.name.clone()),
                    param.position,
                ));
            }
            types.push(self.resolve_type(&param.ty)?);
        }
        Ok(types)
    }

    /// Open the frame of a callable body compiled into block `index`
    ///
    /// Returns the state to restore with [`Compiler::leave_frame`].
    fn enter_frame(
        &mut self,
        index: usize,
        kind: ScopeKind,
        params: &[Param],
        types: &[TypeId],
    ) -> (CodeTarget, usize, usize) {
        let saved = (self.target, self.temps, self.scopes.len());
        self.target = CodeTarget::Block(index);
        self.temps = 0;
        self.push_scope(kind);
        if matches!(
            kind,
            ScopeKind::Function {
                is_generator: true,
                ..
            }
        ) {
            for (param, ty) in params.iter().zip(types) {
                self.add_variable(&param.name, *ty, false);
            }
        } else {
            let scope = self.scope_mut();
            for (param, ty) in params.iter().zip(types) {
                scope.parameters.push(Variable {
                    name: param.name.clone(),
                    ty: *ty,
                    is_const: false,
                    offset: 0,
                    stat: None,
                });
            }
            let slots: Vec<usize> = types.iter().map(|ty| self.slots(*ty)).collect();
            self.scope_mut().finalize_parameters(&slots);
        }
        saved
    }

    fn leave_frame(&mut self, saved: (CodeTarget, usize, usize), ok: bool) {
        let (target, temps, depth) = saved;
        if ok {
            self.pop_scope();
        }
        self.scopes.truncate(depth);
        self.target = target;
        self.temps = temps;
    }

    pub(crate) fn eval_function_decl(&mut self, decl: &FunctionDecl) -> CompileResult<Completion> {
        let params = self.resolve_params(&decl.params)?;
        if params.contains(&ANY) {
            let key = self.ctx.key(&decl.name, &params);
            if self.ctx.has_macro(&key) {
                return Err(Self::error(ErrorKind::FunctionAlreadyExists(key), decl.position));
            }
            debug!("storing generic function {}", key);
            self.ctx.add_macro_function(key, decl.clone(), params);
            return Ok(Completion::Normal);
        }
        let return_type = self.resolve_type(&decl.return_type)?;
        if return_type == ANY {
            return Err(Self::error(
                ErrorKind::AnyNotAllowed,
                decl.return_type.position,
            ));
        }
        let key = self.ctx.key(&decl.name, &params);
        if self.ctx.function(&key).is_some() {
            return Err(Self::error(ErrorKind::FunctionAlreadyExists(key), decl.position));
        }
        let index = self.ctx.add_code_block(CodeBlock::new(key.clone()));
        self.ctx.add_function(Function {
            name: decl.name.clone(),
            params: params.clone(),
            return_type,
            callable: if decl.is_generator {
                Callable::Generator(index)
            } else {
                Callable::Block(index)
            },
        });

        let kind = ScopeKind::Function {
            return_type,
            is_generator: decl.is_generator,
        };
        let saved = self.enter_frame(index, kind, &decl.params, &params);
        let body = self.function_body(decl, &key);
        let ok = body.is_ok();
        self.leave_frame(saved, ok);
        match body {
            Ok(inferred) => {
                if let Some(function) = self.ctx.function_mut(&key) {
                    function.return_type = inferred;
                }
                debug!("compiled function {} into block {}", key, index);
                Ok(Completion::Normal)
            }
            Err(err) => {
                self.ctx.remove_function(&key);
                Err(err)
            }
        }
    }

    /// Compile the body in the open frame, returning the final result type
    fn function_body(&mut self, decl: &FunctionDecl, key: &str) -> CompileResult<TypeId> {
        let completion = self.eval_block(&decl.body)?;
        let return_type = self.scope().return_type.unwrap_or(INFER);
        if decl.is_generator {
            let slots = self.slots(return_type);
            for _ in 0..slots {
                self.code().emit_push(0);
            }
            self.code().emit_push(slots as i64);
            self.code().emit_ext(LangOp::YieldGeneratorItem);
        } else if completion == Completion::Normal || return_type == INFER {
            return Err(Self::error(
                ErrorKind::NoReturn(key.to_string()),
                decl.body.position,
            ));
        }
        Ok(return_type)
    }

    pub(crate) fn eval_procedure_decl(&mut self, decl: &ProcedureDecl) -> CompileResult<Completion> {
        let params = self.resolve_params(&decl.params)?;
        let key = self.ctx.key(&decl.name, &params);
        if params.contains(&ANY) {
            if self.ctx.has_macro(&key) {
                return Err(Self::error(ErrorKind::ProcedureAlreadyExists(key), decl.position));
            }
            debug!("storing generic procedure {}", key);
            self.ctx.add_macro_procedure(key, decl.clone(), params);
            return Ok(Completion::Normal);
        }
        if self.ctx.procedure(&key).is_some() {
            return Err(Self::error(ErrorKind::ProcedureAlreadyExists(key), decl.position));
        }
        let index = self.ctx.add_code_block(CodeBlock::new(key.clone()));
        self.ctx.add_procedure(Procedure {
            name: decl.name.clone(),
            params: params.clone(),
            callable: Callable::Block(index),
        });

        let saved = self.enter_frame(index, ScopeKind::Procedure, &decl.params, &params);
        let body = self.eval_block(&decl.body).map(|completion| {
            if completion == Completion::Normal {
                self.code().emit(Opcode::Ret, 0);
            }
        });
        let ok = body.is_ok();
        self.leave_frame(saved, ok);
        match body {
            Ok(()) => {
                debug!("compiled procedure {} into block {}", key, index);
                Ok(Completion::Normal)
            }
            Err(err) => {
                self.ctx.remove_procedure(&key);
                Err(err)
            }
        }
    }
}
