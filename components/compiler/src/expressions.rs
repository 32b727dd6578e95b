//! Expression code generation
//!
//! Every expression leaves exactly `slot_count(result)` slots on the stack.
//! `temps` counts the slots enclosing expressions have pushed and not yet
//! consumed, so a `kindof` binding can find its slot below them.

use crate::compiler::Compiler;
use crate::types::{TypeId, BOOLEAN, CHAR, INTEGER, NULL, REAL, TEXT};
use bytecode_system::{LangOp, NoArgOp, Opcode};
use core_types::{CompileResult, ErrorKind, SourcePosition};
use parser::{BinaryOp, CaseArm, Expr, ExprKind, KindofArm, RecordField, TypeExpr, UnaryOp};

impl Compiler {
    /// Emit code for `expr`, returning its type
    ///
    /// `expected` only steers literals and dispatch; the caller still checks
    /// the returned type.
    pub(crate) fn eval_expression(
        &mut self,
        expr: &Expr,
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        let position = expr.position;
        match &expr.kind {
            ExprKind::Integer(value) => {
                self.code().emit_push(*value);
                Ok(INTEGER)
            }
            ExprKind::Real(value) => {
                let index = self.code().add_float_const(*value);
                self.code().emit(Opcode::PushF, index);
                Ok(REAL)
            }
            ExprKind::Text(value) => {
                let mut chars = value.chars();
                if let (Some(CHAR), Some(c), None) = (expected, chars.next(), chars.next()) {
                    self.code().emit_push(c as i64);
                    return Ok(CHAR);
                }
                let index = self.code().add_str_const(value);
                self.code().emit_push(index);
                self.code().emit_ext(LangOp::CreateString);
                Ok(TEXT)
            }
            ExprKind::Boolean(value) => {
                self.code().emit_push(i64::from(*value));
                Ok(BOOLEAN)
            }
            ExprKind::Null => Ok(NULL),
            ExprKind::Variable(name) => {
                let var = self.variable_named(name, position)?;
                self.emit_push_variable(var);
                Ok(self.variable(var).ty)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, position),
            ExprKind::Concat(items) => self.eval_concat(items),
            ExprKind::Tuple(items) => self.eval_tuple(items, expected),
            ExprKind::Array(items) => self.eval_array(items, expected, position),
            ExprKind::Record(fields) => self.eval_record(fields, expected),
            ExprKind::Index {
                indexed,
                index,
                index_to,
            } => self.eval_index(indexed, index, index_to.as_deref()),
            ExprKind::Field { record, field } => {
                let record_ty = self.eval_expression(record, None)?;
                let (offset, field_ty) = self.find_field(record_ty, field, position)?;
                let slots = self.slots(field_ty);
                self.code().emit_push(offset as i64);
                self.code().emit_push(slots as i64);
                self.code().emit_ext(LangOp::ReadBlob);
                Ok(field_ty)
            }
            ExprKind::Call { name, args } => {
                let base = self.temps;
                let mut types = Vec::with_capacity(args.len());
                for arg in args {
                    let ty = self.eval_expression(arg, None)?;
                    self.temps += self.slots(ty);
                    types.push(ty);
                }
                self.temps = base;
                self.generate_function_call(name, &types, expected, position)
            }
            ExprKind::As { expr, ty } => self.eval_as(expr, ty),
            ExprKind::Case {
                case,
                whens,
                otherwise,
            } => self.eval_case(case.as_deref(), whens, otherwise, expected),
            ExprKind::Kindof {
                case,
                whens,
                otherwise,
            } => self.eval_kindof(case, whens, otherwise.as_deref(), expected),
        }
    }

    /// Evaluate with `extra` more pending slots below
    fn eval_above(
        &mut self,
        extra: usize,
        expr: &Expr,
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        self.temps += extra;
        let result = self.eval_expression(expr, expected);
        self.temps -= extra;
        result
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> CompileResult<TypeId> {
        let ty = self.eval_expression(operand, None)?;
        match op {
            UnaryOp::Not => {
                self.expect_type(ty, BOOLEAN, operand.position)?;
                self.code().emit_noarg(NoArgOp::Not);
                Ok(BOOLEAN)
            }
            UnaryOp::Neg => {
                let neg = match ty {
                    INTEGER => NoArgOp::Neg,
                    REAL => NoArgOp::NegF,
                    _ => {
                        return Err(Self::error(
                            ErrorKind::UnknownUnaryOperator(op.as_str().to_string()),
                            operand.position,
                        ))
                    }
                };
                self.code().emit_noarg(neg);
                Ok(ty)
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: SourcePosition,
    ) -> CompileResult<TypeId> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let ty = self.eval_expression(left, None)?;
                self.expect_type(ty, BOOLEAN, left.position)?;
                let skip = if op == BinaryOp::And {
                    self.code().emit_jz()
                } else {
                    self.code().emit_jnz()
                };
                let ty = self.eval_expression(right, None)?;
                self.expect_type(ty, BOOLEAN, right.position)?;
                let end = self.code().emit_jmp(0);
                self.code().set_loc(skip);
                self.code().emit_push(i64::from(op == BinaryOp::Or));
                self.code().set_loc(end);
                Ok(BOOLEAN)
            }
            BinaryOp::Repeat => {
                let item = self.eval_expression(left, None)?;
                let slots = self.slots(item);
                let count = self.eval_above(slots, right, None)?;
                self.expect_type(count, INTEGER, right.position)?;
                self.code().emit_push(slots as i64);
                self.code().emit_ext(LangOp::CreateBlobRepeatItem);
                Ok(self.ctx.array_type(item))
            }
            BinaryOp::Rem => {
                let ty = self.eval_expression(left, None)?;
                self.expect_type(ty, INTEGER, left.position)?;
                let ty = self.eval_above(1, right, None)?;
                self.expect_type(ty, INTEGER, right.position)?;
                self.code().emit_noarg(NoArgOp::Rem);
                Ok(INTEGER)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let ty = self.eval_expression(left, None)?;
                let is_real = match ty {
                    INTEGER => false,
                    REAL => true,
                    _ => {
                        return Err(Self::error(
                            ErrorKind::UnknownBinaryOperator(op.as_str().to_string()),
                            position,
                        ))
                    }
                };
                let right_ty = self.eval_above(1, right, Some(ty))?;
                self.expect_type(right_ty, ty, right.position)?;
                let code = match (op, is_real) {
                    (BinaryOp::Add, false) => NoArgOp::Add,
                    (BinaryOp::Add, true) => NoArgOp::AddF,
                    (BinaryOp::Sub, false) => NoArgOp::Sub,
                    (BinaryOp::Sub, true) => NoArgOp::SubF,
                    (BinaryOp::Mul, false) => NoArgOp::Mul,
                    (BinaryOp::Mul, true) => NoArgOp::MulF,
                    (_, false) => NoArgOp::Div,
                    (_, true) => NoArgOp::DivF,
                };
                self.code().emit_noarg(code);
                Ok(ty)
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => {
                let ty = self.eval_expression(left, None)?;
                let is_real = match self.ctx.types.structural(ty) {
                    INTEGER => false,
                    REAL => true,
                    _ => {
                        return Err(Self::error(
                            ErrorKind::UnknownBinaryOperator(op.as_str().to_string()),
                            position,
                        ))
                    }
                };
                let right_ty = self.eval_above(1, right, Some(ty))?;
                self.expect_type(right_ty, ty, right.position)?;
                let code = match (op, is_real) {
                    (BinaryOp::Lt, false) => NoArgOp::Lt,
                    (BinaryOp::Lt, true) => NoArgOp::LtF,
                    (BinaryOp::Gt, false) => NoArgOp::Gt,
                    (BinaryOp::Gt, true) => NoArgOp::GtF,
                    (BinaryOp::Lte, false) => NoArgOp::Lte,
                    (BinaryOp::Lte, true) => NoArgOp::LteF,
                    (_, false) => NoArgOp::Gte,
                    (_, true) => NoArgOp::GteF,
                };
                self.code().emit_noarg(code);
                Ok(BOOLEAN)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let ty = self.eval_expression(left, None)?;
                let slots = self.slots(ty);
                let right_ty = self.eval_above(slots, right, Some(ty))?;
                self.expect_type(right_ty, ty, right.position)?;
                self.code().emit(Opcode::Eq, slots as i64);
                if op == BinaryOp::Ne {
                    self.code().emit_noarg(NoArgOp::Not);
                }
                Ok(BOOLEAN)
            }
            BinaryOp::In => {
                let item = self.eval_expression(left, None)?;
                let slots = self.slots(item);
                let array = self.eval_above(slots, right, None)?;
                let array_item = self
                    .ctx
                    .types
                    .array_item(array)
                    .ok_or_else(|| self.wrong_type(array, "array", right.position))?;
                self.expect_type(item, array_item, left.position)?;
                self.code().emit_push(slots as i64);
                self.code().emit_ext(LangOp::GetBlobIndexOfItem);
                self.code().emit_push(-1);
                self.code().emit(Opcode::Eq, 1);
                self.code().emit_noarg(NoArgOp::Not);
                Ok(BOOLEAN)
            }
        }
    }

    fn eval_concat(&mut self, items: &[Expr]) -> CompileResult<TypeId> {
        let mut first: Option<TypeId> = None;
        for (i, item) in items.iter().enumerate() {
            let ty = self.eval_above(i, item, first)?;
            match first {
                None => {
                    let structural = self.ctx.types.structural(ty);
                    if structural != TEXT && self.ctx.types.array_item(ty).is_none() {
                        return Err(self.wrong_type(ty, "text or array", item.position));
                    }
                    first = Some(ty);
                }
                Some(first) => self.expect_type(ty, first, item.position)?,
            }
        }
        let Some(ty) = first else {
            return Ok(NULL);
        };
        self.code().emit_push(items.len() as i64);
        if self.ctx.types.structural(ty) == TEXT {
            self.code().emit_ext(LangOp::ConcatString);
        } else {
            self.code().emit_ext(LangOp::ConcatBlob);
        }
        Ok(ty)
    }

    fn eval_tuple(&mut self, items: &[Expr], expected: Option<TypeId>) -> CompileResult<TypeId> {
        let hints = expected
            .and_then(|ty| self.ctx.types.tuple_items(ty))
            .filter(|hints| hints.len() == items.len())
            .map(|hints| hints.to_vec());
        let base = self.temps;
        let mut types = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let hint = hints.as_ref().map(|h| h[i]);
            let ty = self.eval_expression(item, hint)?;
            self.temps += self.slots(ty);
            types.push(ty);
        }
        self.temps = base;
        Ok(self.ctx.types.tuple(types).0)
    }

    fn eval_array(
        &mut self,
        items: &[Expr],
        expected: Option<TypeId>,
        position: SourcePosition,
    ) -> CompileResult<TypeId> {
        if items.is_empty() {
            let Some(expected) = expected else {
                return Err(Self::error(ErrorKind::UntypedEmptyArray, position));
            };
            if self.ctx.types.array_item(expected).is_none() {
                return Err(self.wrong_type(expected, "array", position));
            }
            self.code().emit_push(0);
            self.code().emit_ext(LangOp::CreateBlob);
            return Ok(expected);
        }
        let hint = expected.and_then(|ty| self.ctx.types.array_item(ty));
        let base = self.temps;
        let mut item_ty: Option<TypeId> = None;
        for item in items {
            let ty = self.eval_expression(item, item_ty.or(hint))?;
            match item_ty {
                None => item_ty = Some(ty),
                Some(first) => self.expect_type(ty, first, item.position)?,
            }
            self.temps += self.slots(ty);
        }
        self.temps = base;
        let item_ty = item_ty.unwrap_or(NULL);
        let slots = self.slots(item_ty);
        self.code().emit_push((items.len() * slots) as i64);
        self.code().emit_ext(LangOp::CreateBlob);
        Ok(self.ctx.array_type(item_ty))
    }

    fn eval_record(
        &mut self,
        fields: &[RecordField],
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        let hints: Vec<(String, TypeId)> = expected
            .and_then(|ty| self.ctx.types.record_fields(ty))
            .map(|fields| fields.iter().map(|f| (f.name.clone(), f.ty)).collect())
            .unwrap_or_default();
        let base = self.temps;
        let mut resolved: Vec<(String, TypeId)> = Vec::with_capacity(fields.len());
        for field in fields {
            if resolved.iter().any(|(name, _)| *name == field.name) {
                return Err(Self::error(
                    ErrorKind::FieldAlreadyExists(field.name.clone()),
                    field.position,
                ));
            }
            let hint = hints
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, ty)| *ty);
            let ty = self.eval_expression(&field.value, hint)?;
            self.temps += self.slots(ty);
            resolved.push((field.name.clone(), ty));
        }
        self.temps = base;
        let (record, _) = self.ctx.types.record(resolved);
        let slots = self.ctx.types.field_slot_count(record);
        self.code().emit_push(slots as i64);
        self.code().emit_ext(LangOp::CreateBlob);
        Ok(record)
    }

    fn eval_index(
        &mut self,
        indexed: &Expr,
        index: &Expr,
        index_to: Option<&Expr>,
    ) -> CompileResult<TypeId> {
        let array = self.eval_expression(indexed, None)?;
        let item = self
            .ctx
            .types
            .array_item(array)
            .ok_or_else(|| self.wrong_type(array, "array", indexed.position))?;
        let slots = self.slots(item);
        let ty = self.eval_above(1, index, None)?;
        self.expect_type(ty, INTEGER, index.position)?;
        if slots > 1 {
            self.code().emit_push(slots as i64);
            self.code().emit_noarg(NoArgOp::Mul);
        }
        let Some(index_to) = index_to else {
            self.code().emit_push(slots as i64);
            self.code().emit_ext(LangOp::ReadBlob);
            return Ok(item);
        };
        let ty = self.eval_above(2, index_to, None)?;
        self.expect_type(ty, INTEGER, index_to.position)?;
        self.code().emit_push(1);
        self.code().emit_noarg(NoArgOp::Add);
        if slots > 1 {
            self.code().emit_push(slots as i64);
            self.code().emit_noarg(NoArgOp::Mul);
        }
        self.code().emit_ext(LangOp::SliceBlob);
        Ok(array)
    }

    fn eval_as(&mut self, expr: &Expr, ty: &TypeExpr) -> CompileResult<TypeId> {
        let target = self.resolve_concrete(ty)?;
        let found = self.eval_expression(expr, Some(target))?;
        if found == target || self.ctx.types.structurally_equal(found, target) {
            return Ok(target);
        }
        if !self.ctx.types.contains(target, found) {
            return Err(self.wrong_type(found, &self.key(target), expr.position));
        }
        let target_slots = self.slots(target);
        let found_slots = self.slots(found);
        if self.ctx.types.variant_members(found).is_some() {
            let diff = target_slots - found_slots;
            if diff > 0 {
                for _ in 0..diff {
                    self.code().emit_push(0);
                }
                self.code().emit(Opcode::Swap, diff as i64 + 1);
            }
        } else {
            for _ in 0..target_slots - found_slots - 1 {
                self.code().emit_push(0);
            }
            self.code().emit_push(found.global_id());
        }
        Ok(target)
    }

    /// Check a branch result against the previous ones
    fn merge_branch(
        &self,
        result: &mut Option<TypeId>,
        ty: TypeId,
        position: SourcePosition,
    ) -> CompileResult<()> {
        match *result {
            None => {
                *result = Some(ty);
                Ok(())
            }
            Some(first) => self.expect_type(ty, first, position),
        }
    }

    fn eval_case(
        &mut self,
        case: Option<&Expr>,
        whens: &[CaseArm],
        otherwise: &Expr,
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        let case_ty = case.map(|c| self.eval_expression(c, None)).transpose()?;
        let case_slots = case_ty.map_or(0, |ty| self.slots(ty));
        let mut result: Option<TypeId> = None;
        let mut end_locs = Vec::with_capacity(whens.len());
        for arm in whens {
            let next = match case_ty {
                Some(case_ty) => {
                    self.code().emit(Opcode::Dup, case_slots as i64);
                    let ty = self.eval_above(2 * case_slots, &arm.when, Some(case_ty))?;
                    self.expect_type(ty, case_ty, arm.when.position)?;
                    self.code().emit(Opcode::Eq, case_slots as i64);
                    let next = self.code().emit_jz();
                    self.code().emit_pop_void(case_slots);
                    next
                }
                None => {
                    let ty = self.eval_expression(&arm.when, None)?;
                    self.expect_type(ty, BOOLEAN, arm.when.position)?;
                    self.code().emit_jz()
                }
            };
            let ty = self.eval_expression(&arm.then, result.or(expected))?;
            self.merge_branch(&mut result, ty, arm.then.position)?;
            end_locs.push(self.code().emit_jmp(0));
            self.code().set_loc(next);
        }
        self.code().emit_pop_void(case_slots);
        let ty = self.eval_expression(otherwise, result.or(expected))?;
        self.merge_branch(&mut result, ty, otherwise.position)?;
        for loc in end_locs {
            self.code().set_loc(loc);
        }
        Ok(ty)
    }

    fn eval_kindof(
        &mut self,
        case: &Expr,
        whens: &[KindofArm],
        otherwise: Option<&Expr>,
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        let case_ty = self.eval_expression(case, None)?;
        let members = self
            .ctx
            .types
            .variant_members(case_ty)
            .ok_or_else(|| self.wrong_type(case_ty, "variant", case.position))?
            .to_vec();
        let case_slots = self.slots(case_ty);
        let mut managed: Vec<TypeId> = Vec::with_capacity(whens.len());
        let mut result: Option<TypeId> = None;
        let mut end_locs = Vec::with_capacity(whens.len());
        for arm in whens {
            let ty = self.resolve_concrete(&arm.ty)?;
            if !members.contains(&ty) {
                return Err(Self::error(ErrorKind::UnknownKind(self.key(ty)), arm.position));
            }
            if managed.contains(&ty) {
                return Err(Self::error(
                    ErrorKind::VariantKindAlreadyManaged(self.key(ty)),
                    arm.position,
                ));
            }
            managed.push(ty);
            let when_slots = self.slots(ty);
            self.code().emit(Opcode::Dup, 1);
            self.code().emit_push(ty.global_id());
            self.code().emit(Opcode::Eq, 1);
            let next = self.code().emit_jz();
            self.code().emit_pop_void(case_slots - when_slots);

            let base = self.temps;
            self.push_scope_above_temps(base);
            self.add_variable(&arm.var, ty, true);
            self.temps = 0;
            let branch = self.eval_expression(&arm.then, result.or(expected));
            self.temps = base;
            let then_ty = branch?;
            self.merge_branch(&mut result, then_ty, arm.then.position)?;
            let then_slots = self.slots(then_ty);
            if when_slots > 0 {
                if then_slots > 0 {
                    self.code().emit(Opcode::Swap, (when_slots + then_slots) as i64);
                }
                self.code().emit_pop_void(when_slots);
                if then_slots > 1 {
                    self.code().emit(Opcode::Swap, then_slots as i64);
                }
            }
            self.pop_scope();
            end_locs.push(self.code().emit_jmp(0));
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
                let ty = self.eval_expression(otherwise, result.or(expected))?;
                self.merge_branch(&mut result, ty, otherwise.position)?;
            }
        }
        for loc in end_locs {
            self.code().set_loc(loc);
        }
        result.ok_or_else(|| self.wrong_type(case_ty, "kindof branch", case.position))
    }
}
