//! Statement code generation

use crate::compiler::{Completion, Compiler, VarRef};
use crate::scope::ScopeKind;
use crate::types::{TypeId, BOOLEAN, EXCEPTION_HANDLER, INFER, INTEGER};
use bytecode_system::{LangOp, NoArgOp, Opcode};
use core_types::{CompileResult, ErrorKind, SourcePosition};
use parser::{Block, Expr, ExprKind, KindofBranch, Stmt, StmtKind, TypeExpr};

/// Completion of two alternative paths
pub(crate) fn merge(a: Completion, b: Completion) -> Completion {
    match (a, b) {
        (a, b) if a == b => a,
        (Completion::Normal, _) | (_, Completion::Normal) => Completion::Normal,
        _ => Completion::Return,
    }
}

impl Compiler {
    pub(crate) fn eval_statement(&mut self, stmt: &Stmt) -> CompileResult<Completion> {
        let position = stmt.position;
        match &stmt.kind {
            StmtKind::TypeDecl { name, ty } => self.eval_type_decl(name, ty, position),
            StmtKind::Var {
                names,
                value,
                is_const,
            } => self.eval_var(names, value, *is_const, position),
            StmtKind::Assign { target, value } => self.eval_assign(target, value),
            StmtKind::ProcedureCall { name, args } => {
                self.eval_procedure_call(name, args, position)?;
                Ok(Completion::Normal)
            }
            StmtKind::Block(block) => self.eval_block(block),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.eval_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => self.eval_while(condition, body),
            StmtKind::For {
                index,
                reverse,
                sequence,
                sequence_to,
                body,
            } => self.eval_for(index, *reverse, sequence, sequence_to.as_ref(), body),
            StmtKind::Exit { condition } => self.eval_exit(condition.as_ref(), position),
            StmtKind::Return(value) => self.eval_return(value.as_ref(), position),
            StmtKind::Yield(value) => self.eval_yield(value, position),
            StmtKind::Raise(value) => {
                let ty = self.eval_expression(value, None)?;
                self.expect_type(ty, INTEGER, value.position)?;
                self.code().emit_ext(LangOp::RaiseException);
                Ok(Completion::Raise)
            }
            StmtKind::Kindof {
                case,
                whens,
                otherwise,
            } => self.eval_kindof_statement(case, whens, otherwise.as_ref()),
            StmtKind::Function(decl) => self.eval_function_decl(decl),
            StmtKind::Procedure(decl) => self.eval_procedure_decl(decl),
            StmtKind::Directive(name) => match name.as_str() {
                "suspend" => {
                    self.code().emit_noarg(NoArgOp::Suspend);
                    Ok(Completion::Normal)
                }
                _ => Err(Self::error(ErrorKind::UnknownDirective(name.clone()), position)),
            },
        }
    }

    /// Statements in order; nothing may follow a return or raise
    pub(crate) fn eval_statements(&mut self, statements: &[Stmt]) -> CompileResult<Completion> {
        let mut result = Completion::Normal;
        for stmt in statements {
            if result != Completion::Normal {
                return Err(Self::error(ErrorKind::UnreachableCode, stmt.position));
            }
            result = self.eval_statement(stmt)?;
        }
        Ok(result)
    }

    fn eval_type_decl(
        &mut self,
        name: &str,
        ty: &TypeExpr,
        position: SourcePosition,
    ) -> CompileResult<Completion> {
        if self.ctx.types.lookup(name).is_some() {
            return Err(Self::error(
                ErrorKind::TypeAlreadyExists(name.to_string()),
                position,
            ));
        }
        let underlying = self.resolve_concrete(ty)?;
        self.ctx.types.named(name, underlying);
        Ok(Completion::Normal)
    }

    fn eval_var(
        &mut self,
        names: &[String],
        value: &Expr,
        is_const: bool,
        position: SourcePosition,
    ) -> CompileResult<Completion> {
        for (i, name) in names.iter().enumerate() {
            if self.scope().find(name).is_some() || names[..i].contains(name) {
                return Err(Self::error(
                    ErrorKind::VariableAlreadyExists(name.clone()),
                    position,
                ));
            }
        }
        let ty = self.eval_expression(value, None)?;
        if let [name] = names {
            self.add_variable(name, ty, is_const);
            return Ok(Completion::Normal);
        }
        let items = self
            .ctx
            .types
            .tuple_items(ty)
            .ok_or_else(|| self.wrong_type(ty, "tuple", value.position))?
            .to_vec();
        if items.len() != names.len() {
            return Err(Self::error(
                ErrorKind::TupleSizeMismatch {
                    found: items.len(),
                    expected: names.len(),
                },
                value.position,
            ));
        }
        for (name, item) in names.iter().zip(items) {
            self.add_variable(name, item, is_const);
        }
        Ok(Completion::Normal)
    }

    /// Find a variable that an assignment may write
    fn assignable_variable(&self, name: &str, position: SourcePosition) -> CompileResult<VarRef> {
        let var = self
            .lookup_variable(name)
            .ok_or_else(|| Self::error(ErrorKind::UnknownVariable(name.to_string()), position))?;
        if self.variable(var).is_const {
            return Err(Self::error(
                ErrorKind::CantMutateConst(name.to_string()),
                position,
            ));
        }
        Ok(var)
    }

    fn eval_assign(&mut self, target: &Expr, value: &Expr) -> CompileResult<Completion> {
        let base = self.temps;
        match &target.kind {
            ExprKind::Variable(name) => {
                let var = self.assignable_variable(name, target.position)?;
                let ty = self.variable(var).ty;
                let found = self.eval_expression(value, Some(ty))?;
                self.expect_type(found, ty, value.position)?;
                self.emit_pop_variable(var);
                self.add_reset(var);
            }
            ExprKind::Tuple(items) => {
                let mut vars = Vec::with_capacity(items.len());
                for item in items {
                    let ExprKind::Variable(name) = &item.kind else {
                        return Err(Self::error(
                            ErrorKind::UnassignableLeftExpression,
                            item.position,
                        ));
                    };
                    vars.push(self.assignable_variable(name, item.position)?);
                }
                let types = vars.iter().map(|v| self.variable(*v).ty).collect();
                let (tuple, _) = self.ctx.types.tuple(types);
                let found = self.eval_expression(value, Some(tuple))?;
                self.expect_type(found, tuple, value.position)?;
                for var in vars.iter().rev() {
                    self.emit_pop_variable(*var);
                }
                for var in vars {
                    self.add_reset(var);
                }
            }
            ExprKind::Index {
                indexed,
                index,
                index_to,
            } => {
                if index_to.is_some() {
                    return Err(Self::error(
                        ErrorKind::UnassignableLeftExpression,
                        target.position,
                    ));
                }
                let array = self.eval_for_mutate(indexed)?;
                let item = self
                    .ctx
                    .types
                    .array_item(array)
                    .ok_or_else(|| self.wrong_type(array, "array", indexed.position))?;
                self.temps += 1;
                let index_ty = self.eval_expression(index, None)?;
                self.expect_type(index_ty, INTEGER, index.position)?;
                let slots = self.slots(item);
                if slots > 1 {
                    self.code().emit_push(slots as i64);
                    self.code().emit_noarg(NoArgOp::Mul);
                }
                self.temps += 1;
                let found = self.eval_expression(value, Some(item))?;
                self.expect_type(found, item, value.position)?;
                self.code().emit_push(slots as i64);
                self.code().emit_ext(LangOp::WriteBlob);
            }
            ExprKind::Field { record, field } => {
                let record_ty = self.eval_for_mutate(record)?;
                let (offset, field_ty) = self.find_field(record_ty, field, record.position)?;
                self.temps += 1;
                self.code().emit_push(offset as i64);
                self.temps += 1;
                let found = self.eval_expression(value, Some(field_ty))?;
                self.expect_type(found, field_ty, value.position)?;
                let slots = self.slots(field_ty);
                self.code().emit_push(slots as i64);
                self.code().emit_ext(LangOp::WriteBlob);
            }
            _ => {
                return Err(Self::error(
                    ErrorKind::UnassignableLeftExpression,
                    target.position,
                ))
            }
        }
        self.temps = base;
        Ok(Completion::Normal)
    }

    /// Push a uniquely owned handle to the blob an assignment writes into
    fn eval_for_mutate(&mut self, expr: &Expr) -> CompileResult<TypeId> {
        match &expr.kind {
            ExprKind::Variable(name) => {
                let var = self.assignable_variable(name, expr.position)?;
                let op = if self.is_global(var) {
                    Opcode::PushGlobalForMutate
                } else {
                    Opcode::PushLocalForMutate
                };
                let (offset, ty) = {
                    let v = self.variable(var);
                    (v.offset, v.ty)
                };
                self.code().emit(op, offset);
                self.add_read_loc(var);
                Ok(ty)
            }
            ExprKind::Index {
                indexed,
                index,
                index_to: None,
            } => {
                let array = self.eval_for_mutate(indexed)?;
                let item = self
                    .ctx
                    .types
                    .array_item(array)
                    .ok_or_else(|| self.wrong_type(array, "array", indexed.position))?;
                if self.slots(item) != 1 {
                    return Err(Self::error(
                        ErrorKind::UnassignableLeftExpression,
                        expr.position,
                    ));
                }
                self.temps += 1;
                let index_ty = self.eval_expression(index, None)?;
                self.expect_type(index_ty, INTEGER, index.position)?;
                self.temps -= 1;
                self.code().emit_ext(LangOp::GetBlobMutableOffset);
                Ok(item)
            }
            ExprKind::Field { record, field } => {
                let record_ty = self.eval_for_mutate(record)?;
                let (offset, field_ty) = self.find_field(record_ty, field, record.position)?;
                if self.slots(field_ty) != 1 {
                    return Err(Self::error(
                        ErrorKind::UnassignableLeftExpression,
                        expr.position,
                    ));
                }
                self.code().emit_push(offset as i64);
                self.code().emit_ext(LangOp::GetBlobMutableOffset);
                Ok(field_ty)
            }
            _ => Err(Self::error(
                ErrorKind::UnassignableLeftExpression,
                expr.position,
            )),
        }
    }

    /// Offset and type of a record field
    pub(crate) fn find_field(
        &self,
        record: TypeId,
        field: &str,
        position: SourcePosition,
    ) -> CompileResult<(usize, TypeId)> {
        let fields = self
            .ctx
            .types
            .record_fields(record)
            .ok_or_else(|| self.wrong_type(record, "record", position))?;
        fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| (f.offset, f.ty))
            .ok_or_else(|| {
                Self::error(
                    ErrorKind::UnknownField {
                        field: field.to_string(),
                        record: self.key(record),
                    },
                    position,
                )
            })
    }

    /// A block in its own scope, with its exception clause if any
    pub(crate) fn eval_block(&mut self, block: &Block) -> CompileResult<Completion> {
        self.push_scope(ScopeKind::Block);
        let mut handler_loc = None;
        if block.exception.is_some() {
            self.clear_var_stat_tmp();
            handler_loc = Some(self.code().emit_push(0));
            self.code().emit_ext(LangOp::CreateExceptionHandler);
            self.add_variable("_exception_handler", EXCEPTION_HANDLER, true);
        }
        let result = self.eval_statements(&block.statements)?;
        if result == Completion::Normal {
            let slots = self.scope().variable_offset;
            self.code().emit_pop_void(slots);
        }
        self.pop_scope();
        let (Some(clause), Some(handler_loc)) = (&block.exception, handler_loc) else {
            return Ok(result);
        };

        let end_loc = (result == Completion::Normal).then(|| self.code().emit_jmp(0));
        self.code().set_loc(handler_loc);
        self.push_scope(ScopeKind::Block);
        self.clear_var_stat_tmp();
        self.add_variable("_exception_value", INTEGER, true);
        let error_code = self.variable_named("_exception_value", block.position)?;

        let mut handled: Option<Completion> = None;
        let mut handler_ends = Vec::new();
        for when in &clause.whens {
            self.emit_push_variable(error_code);
            self.temps += 1;
            let ty = self.eval_expression(&when.value, None)?;
            self.expect_type(ty, INTEGER, when.value.position)?;
            self.temps -= 1;
            self.code().emit(Opcode::Eq, 1);
            let next = self.code().emit_jz();
            let branch = self.eval_block(&when.body)?;
            handled = Some(handled.map_or(branch, |h| merge(h, branch)));
            if branch == Completion::Normal {
                handler_ends.push(self.code().emit_jmp(0));
            }
            self.code().set_loc(next);
            self.clear_var_stat_tmp();
        }
        let fallback = match &clause.otherwise {
            None => {
                self.emit_push_variable(error_code);
                self.code().emit_ext(LangOp::RaiseException);
                Completion::Raise
            }
            Some(otherwise) => self.eval_block(otherwise)?,
        };
        let handled = handled.map_or(fallback, |h| merge(h, fallback));
        for loc in handler_ends {
            self.code().set_loc(loc);
        }
        if handled == Completion::Normal {
            let slots = self.scope().variable_offset;
            self.code().emit_pop_void(slots);
        }
        self.pop_scope();
        if let Some(end_loc) = end_loc {
            self.code().set_loc(end_loc);
        }
        self.clear_var_stat_tmp();

        Ok(match result {
            Completion::Raise => handled,
            Completion::Return if handled != Completion::Normal => Completion::Return,
            _ => Completion::Normal,
        })
    }

    fn eval_if(
        &mut self,
        condition: &Expr,
        then_branch: &Block,
        else_branch: Option<&Stmt>,
    ) -> CompileResult<Completion> {
        let ty = self.eval_expression(condition, None)?;
        self.expect_type(ty, BOOLEAN, condition.position)?;
        let false_loc = self.code().emit_jz();
        self.clear_var_stat_tmp();
        let then_result = self.eval_block(then_branch)?;
        self.clear_var_stat_tmp();
        let Some(else_branch) = else_branch else {
            self.code().set_loc(false_loc);
            return Ok(Completion::Normal);
        };
        let end_loc = (then_result == Completion::Normal).then(|| self.code().emit_jmp(0));
        self.code().set_loc(false_loc);
        let else_result = self.eval_statement(else_branch)?;
        self.clear_var_stat_tmp();
        if let Some(end_loc) = end_loc {
            self.code().set_loc(end_loc);
        }
        Ok(merge(then_result, else_result))
    }

    /// Close a loop: jump back, patch the exits and drop the loop variables
    fn close_loop(&mut self, test_loc: usize, end_locs: &[usize]) {
        self.clear_var_stat_tmp();
        self.code().emit_jmp(test_loc);
        for loc in end_locs {
            self.code().set_loc(*loc);
        }
        let exits = std::mem::take(&mut self.scope_mut().exit_locs);
        for loc in exits {
            self.code().set_loc(loc);
        }
        let slots = self.scope().variable_offset;
        self.code().emit_pop_void(slots);
        self.pop_scope();
    }

    fn eval_loop_body(&mut self, body: &Block) -> CompileResult<()> {
        self.clear_var_stat_tmp();
        self.eval_block(body)?;
        self.clear_var_stat_tmp();
        Ok(())
    }

    fn eval_while(&mut self, condition: &Expr, body: &Block) -> CompileResult<Completion> {
        self.push_scope(ScopeKind::Loop);
        let test_loc = self.code().code_size();
        let ty = self.eval_expression(condition, None)?;
        self.expect_type(ty, BOOLEAN, condition.position)?;
        let end_loc = self.code().emit_jz();
        self.eval_loop_body(body)?;
        self.close_loop(test_loc, &[end_loc]);
        Ok(Completion::Normal)
    }

    pub(crate) fn variable_named(&self, name: &str, position: SourcePosition) -> CompileResult<VarRef> {
        self.lookup_variable(name)
            .ok_or_else(|| Self::error(ErrorKind::UnknownVariable(name.to_string()), position))
    }

    /// `var := var + step` on an integer variable
    fn emit_increment(&mut self, var: VarRef, step: usize, down: bool) {
        self.emit_push_variable(var);
        self.code().emit_push(step as i64);
        self.code()
            .emit_noarg(if down { NoArgOp::Sub } else { NoArgOp::Add });
        self.emit_pop_variable(var);
    }

    fn eval_for(
        &mut self,
        index: &str,
        reverse: bool,
        sequence: &Expr,
        sequence_to: Option<&Expr>,
        body: &Block,
    ) -> CompileResult<Completion> {
        self.push_scope(ScopeKind::Loop);
        let position = sequence.position;
        if let Some(sequence_to) = sequence_to {
            let (first, last) = if reverse {
                (sequence_to, sequence)
            } else {
                (sequence, sequence_to)
            };
            let ty = self.eval_expression(last, None)?;
            self.expect_type(ty, INTEGER, last.position)?;
            self.add_variable("_for_range_end_bound", INTEGER, true);
            let ty = self.eval_expression(first, None)?;
            self.expect_type(ty, INTEGER, first.position)?;
            self.add_variable(index, INTEGER, true);
            let bound = self.variable_named("_for_range_end_bound", position)?;
            let counter = self.variable_named(index, position)?;

            let test_loc = self.code().code_size();
            self.emit_push_variable(counter);
            self.emit_push_variable(bound);
            self.code()
                .emit_noarg(if reverse { NoArgOp::Gte } else { NoArgOp::Lte });
            let end_loc = self.code().emit_jz();
            self.eval_loop_body(body)?;
            self.emit_increment(counter, 1, reverse);
            self.close_loop(test_loc, &[end_loc]);
            return Ok(Completion::Normal);
        }

        let ty = self.eval_expression(sequence, None)?;
        if let Some(item) = self.ctx.types.sequence_item(ty) {
            self.add_variable("_for_sequence", ty, true);
            let generator = self.variable_named("_for_sequence", position)?;
            self.emit_push_variable(generator);
            self.code().emit_ext(LangOp::GetGeneratorNextItem);
            self.add_variable(index, item, true);
            let item_var = self.variable_named(index, position)?;

            let test_loc = self.code().code_size();
            self.emit_push_variable(generator);
            self.code().emit_ext(LangOp::HasGeneratorEnded);
            let end_loc = self.code().emit_jnz();
            self.eval_loop_body(body)?;
            self.emit_push_variable(generator);
            self.code().emit_ext(LangOp::GetGeneratorNextItem);
            self.emit_pop_variable(item_var);
            self.close_loop(test_loc, &[end_loc]);
            return Ok(Completion::Normal);
        }

        let Some(item) = self.ctx.types.array_item(ty) else {
            return Err(self.wrong_type(ty, "sequence or array", position));
        };
        let slots = self.slots(item);
        self.add_variable("_for_array", ty, true);
        let array = self.variable_named("_for_array", position)?;
        self.code().emit(Opcode::Dup, 1);
        self.generate_function_call("last_index", &[ty], None, position)?;
        if slots > 1 {
            self.code().emit_push(slots as i64);
            self.code().emit_noarg(NoArgOp::Mul);
        }
        self.add_variable("_for_last_index", INTEGER, true);
        let last = self.variable_named("_for_last_index", position)?;
        for _ in 0..slots {
            self.code().emit_push(0);
        }
        self.add_variable(index, item, true);
        let item_var = self.variable_named(index, position)?;
        if reverse {
            self.emit_push_variable(last);
        } else {
            self.code().emit_push(0);
        }
        self.add_variable("_for_index", INTEGER, false);
        let counter = self.variable_named("_for_index", position)?;

        let test_loc = self.code().code_size();
        self.emit_push_variable(counter);
        if reverse {
            self.code().emit_push(0);
            self.code().emit_noarg(NoArgOp::Gte);
        } else {
            self.emit_push_variable(last);
            self.code().emit_noarg(NoArgOp::Lte);
        }
        let end_loc = self.code().emit_jz();
        self.emit_push_variable(array);
        self.emit_push_variable(counter);
        self.code().emit_push(slots as i64);
        self.code().emit_ext(LangOp::ReadBlob);
        self.emit_pop_variable(item_var);
        self.eval_loop_body(body)?;
        self.emit_increment(counter, slots, reverse);
        self.close_loop(test_loc, &[end_loc]);
        Ok(Completion::Normal)
    }

    fn eval_exit(
        &mut self,
        condition: Option<&Expr>,
        position: SourcePosition,
    ) -> CompileResult<Completion> {
        let mut slots = 0;
        let mut loop_scope = None;
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.is_loop {
                loop_scope = Some(i);
                break;
            }
            if scope.is_frame {
                break;
            }
            slots += scope.variable_offset;
        }
        let loop_scope = loop_scope.ok_or_else(|| Self::error(ErrorKind::UnexpectedExit, position))?;
        let skip_loc = match condition {
            Some(condition) => {
                let ty = self.eval_expression(condition, None)?;
                self.expect_type(ty, BOOLEAN, condition.position)?;
                Some(self.code().emit_jz())
            }
            None => None,
        };
        self.code().emit_pop_void(slots);
        let exit_loc = self.code().emit_jmp(0);
        self.scopes[loop_scope].exit_locs.push(exit_loc);
        if let Some(skip_loc) = skip_loc {
            self.code().set_loc(skip_loc);
        }
        Ok(Completion::Normal)
    }

    /// Innermost frame scope index
    fn frame_scope(&self) -> Option<usize> {
        self.scopes.iter().rposition(|s| s.is_frame)
    }

    fn eval_return(
        &mut self,
        value: Option<&Expr>,
        position: SourcePosition,
    ) -> CompileResult<Completion> {
        let frame = self
            .frame_scope()
            .filter(|i| !self.scopes[*i].is_generator)
            .ok_or_else(|| Self::error(ErrorKind::UnexpectedReturn, position))?;
        match (self.scopes[frame].return_type, value) {
            (None, Some(_)) => Err(Self::error(ErrorKind::UnexpectedReturnWithValue, position)),
            (Some(_), None) => Err(Self::error(
                ErrorKind::UnexpectedReturnWithoutValue,
                position,
            )),
            (None, None) => {
                self.code().emit(Opcode::Ret, 0);
                Ok(Completion::Return)
            }
            (Some(return_type), Some(value)) => {
                let expected = (return_type != INFER).then_some(return_type);
                let ty = self.eval_expression(value, expected)?;
                if return_type == INFER {
                    self.scopes[frame].return_type = Some(ty);
                } else {
                    self.expect_type(ty, return_type, value.position)?;
                }
                let slots = self.slots(ty);
                self.code().emit(Opcode::Ret, slots as i64);
                Ok(Completion::Return)
            }
        }
    }

    fn eval_yield(&mut self, value: &Expr, position: SourcePosition) -> CompileResult<Completion> {
        let frame = self
            .frame_scope()
            .filter(|i| self.scopes[*i].is_generator)
            .ok_or_else(|| Self::error(ErrorKind::UnexpectedYield, position))?;
        let return_type = self.scopes[frame].return_type.unwrap_or(INFER);
        let expected = (return_type != INFER).then_some(return_type);
        let ty = self.eval_expression(value, expected)?;
        if return_type == INFER {
            self.scopes[frame].return_type = Some(ty);
        } else {
            self.expect_type(ty, return_type, value.position)?;
        }
        let slots = self.slots(ty);
        self.code().emit_push(slots as i64);
        self.code().emit_ext(LangOp::YieldGeneratorItem);
        Ok(Completion::Normal)
    }

    fn eval_kindof_statement(
        &mut self,
        case: &Expr,
        whens: &[KindofBranch],
        otherwise: Option<&Block>,
    ) -> CompileResult<Completion> {
        let case_ty = self.eval_expression(case, None)?;
        let members = self
            .ctx
            .types
            .variant_members(case_ty)
            .ok_or_else(|| self.wrong_type(case_ty, "variant", case.position))?
            .to_vec();
        let case_slots = self.slots(case_ty);
        let mut managed: Vec<TypeId> = Vec::new();
        let mut result: Option<Completion> = None;
        let mut end_locs = Vec::new();
        for when in whens {
            let ty = self.resolve_concrete(&when.ty)?;
            if !members.contains(&ty) {
                return Err(Self::error(ErrorKind::UnknownKind(self.key(ty)), when.position));
            }
            if managed.contains(&ty) {
                return Err(Self::error(
                    ErrorKind::VariantKindAlreadyManaged(self.key(ty)),
                    when.position,
                ));
            }
            managed.push(ty);
            let when_slots = self.slots(ty);
            self.code().emit(Opcode::Dup, 1);
            self.code().emit_push(ty.global_id());
            self.code().emit(Opcode::Eq, 1);
            let next = self.code().emit_jz();
            self.code().emit_pop_void(case_slots - when_slots);
            self.push_scope(ScopeKind::Block);
            self.add_variable(&when.var, ty, false);
            self.clear_var_stat_tmp();
            let branch = self.eval_block(&when.body)?;
            self.clear_var_stat_tmp();
            if branch == Completion::Normal {
                self.code().emit_pop_void(when_slots);
            }
            self.pop_scope();
            if branch == Completion::Normal {
                end_locs.push(self.code().emit_jmp(0));
            }
            result = Some(result.map_or(branch, |r| merge(r, branch)));
            self.code().set_loc(next);
        }
        self.code().emit_pop_void(case_slots);
        match otherwise {
            None => {
                if let Some(missing) = members.iter().find(|m| !managed.contains(m)) {
                    return Err(Self::error(
                        ErrorKind::VariantKindNotManaged(self.key(*missing)),
                        case.position,
                    ));
                }
            }
            Some(otherwise) => {
                self.clear_var_stat_tmp();
                let branch = self.eval_block(otherwise)?;
                self.clear_var_stat_tmp();
                result = Some(result.map_or(branch, |r| merge(r, branch)));
            }
        }
        for loc in end_locs {
            self.code().set_loc(loc);
        }
        Ok(result.unwrap_or(Completion::Normal))
    }
}
