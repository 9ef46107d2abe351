//! Value-against-type checking.
//!
//! `check` succeeds silently or returns a structured mismatch. Union
//! branches are tried in declaration order and their failures collected;
//! the first accepting branch wins. Listing and mapping checks force
//! members through the member cache, so a check can also surface ordinary
//! evaluation errors — those propagate unchanged.

use crate::error::{CheckError, TypeMismatch};
use crate::eval::{Evaluator, Frame};
use crate::expr::{Expr, ExprKind};
use crate::member::MemberKey;
use crate::object::ObjectKind;
use crate::types::{IntWidth, Type, TypeId};
use crate::value::Value;
use rpkl_common::Span;
use std::sync::Arc;
use tracing::trace;

impl<'c> Evaluator<'c> {
    /// Check `value` against `ty`, reporting failures at `span`.
    pub fn check(&mut self, ty: TypeId, value: &Value, span: Span) -> Result<(), CheckError> {
        if self.ctx.types.skip_checks(ty) {
            return Ok(());
        }
        match self.ctx.types.get(ty).clone() {
            Type::Unknown | Type::Any | Type::TypeVariable { .. } => Ok(()),
            Type::Nothing => Err(TypeMismatch::Nothing { span }.into()),
            Type::StringLiteral(atom) => {
                let expected = self.ctx.resolve(atom);
                match value {
                    Value::Str(s) if s.as_ref() == expected => Ok(()),
                    _ => Err(TypeMismatch::Literal {
                        expected,
                        actual_value: self.render_value(value),
                        span,
                    }
                    .into()),
                }
            }
            Type::StringLiteralUnion { literals, .. } => {
                if let Value::Str(s) = value {
                    let matched = literals
                        .iter()
                        .any(|atom| self.ctx.interner.with_resolved(*atom, |t| t == s.as_ref()));
                    if matched {
                        return Ok(());
                    }
                }
                Err(TypeMismatch::LiteralSet {
                    expected: literals.iter().map(|a| self.ctx.resolve(*a)).collect(),
                    actual_value: self.render_value(value),
                    span,
                }
                .into())
            }
            Type::Module { class, is_final } => {
                let actual = self.class_of(value);
                let ok = if is_final {
                    actual == class
                } else {
                    self.is_subclass_cached(actual, class)
                };
                if ok {
                    Ok(())
                } else {
                    Err(self.simple_mismatch(ty, value, span).into())
                }
            }
            Type::FinalClass(class) => {
                if self.class_of(value) == class {
                    Ok(())
                } else {
                    Err(self.simple_mismatch(ty, value, span).into())
                }
            }
            Type::NonFinalClass(class) => {
                let actual = self.class_of(value);
                if self.is_subclass_cached(actual, class) {
                    Ok(())
                } else {
                    Err(self.simple_mismatch(ty, value, span).into())
                }
            }
            Type::Nullable(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    self.check(inner, value, span)
                }
            }
            Type::Union { members, .. } => {
                let mut branches = Vec::with_capacity(members.len());
                for member in &members {
                    match self.check(*member, value, span) {
                        Ok(()) => return Ok(()),
                        Err(CheckError::Mismatch(mismatch)) => branches.push(mismatch),
                        Err(eval_error) => return Err(eval_error),
                    }
                }
                trace!(ty = ?ty, "all union branches failed");
                Err(TypeMismatch::Union {
                    expected: self.ctx.display_type(ty),
                    actual_value: self.render_value(value),
                    span,
                    branches,
                }
                .into())
            }
            Type::Collection(element) => match value {
                Value::List(items) => self.check_elements(element, items.iter(), span),
                Value::Set(items) => self.check_elements(element, items.iter(), span),
                _ => Err(self.simple_mismatch(ty, value, span).into()),
            },
            Type::List(element) => match value {
                Value::List(items) => self.check_elements(element, items.iter(), span),
                _ => Err(self.simple_mismatch(ty, value, span).into()),
            },
            Type::Set(element) => match value {
                Value::Set(items) => self.check_elements(element, items.iter(), span),
                _ => Err(self.simple_mismatch(ty, value, span).into()),
            },
            Type::Map(key_ty, value_ty) => match value {
                Value::Map(entries) => {
                    let skip_keys = self.ctx.types.skip_checks(key_ty);
                    let skip_values = self.ctx.types.skip_checks(value_ty);
                    for (k, v) in entries.iter() {
                        if !skip_keys {
                            self.check(key_ty, k, span)?;
                        }
                        if !skip_values {
                            self.check(value_ty, v, span)?;
                        }
                    }
                    Ok(())
                }
                _ => Err(self.simple_mismatch(ty, value, span).into()),
            },
            Type::Listing(value_ty) => {
                let obj = match value {
                    Value::Object(obj) if self.heap.get(*obj).kind == ObjectKind::Listing => *obj,
                    _ => return Err(self.simple_mismatch(ty, value, span).into()),
                };
                self.check_object_members(obj, None, value_ty, span)
            }
            Type::Mapping(key_ty, value_ty) => {
                let obj = match value {
                    Value::Object(obj) if self.heap.get(*obj).kind == ObjectKind::Mapping => *obj,
                    _ => return Err(self.simple_mismatch(ty, value, span).into()),
                };
                self.check_object_members(obj, Some(key_ty), value_ty, span)
            }
            Type::Function { params, .. } => {
                self.check_function_arity(ty, value, Some(params.len()), span)
            }
            Type::FunctionN { arity } => {
                self.check_function_arity(ty, value, Some(arity as usize), span)
            }
            Type::FunctionClass => self.check_function_arity(ty, value, None, span),
            Type::Pair(first_ty, second_ty) => match value {
                Value::Pair(pair) => {
                    self.check(first_ty, &pair.0, span)?;
                    self.check(second_ty, &pair.1, span)
                }
                _ => Err(self.simple_mismatch(ty, value, span).into()),
            },
            Type::VarArgs(_) => Err(CheckError::Eval(Box::new(crate::error::EvalError::new(
                rpkl_common::diagnostics::diagnostic_codes::INTERNAL_STD_LIB_CLASS,
                vec![self.ctx.display_type(ty)],
                span,
            )))),
            Type::IntWidth(width) => self.check_int_width(width, value, span),
            // Mixin aliases delegate like any other; the aliased type is the
            // function type.
            Type::Alias { instantiated, .. } => self.check(instantiated, value, span),
            Type::Constrained { base, predicates } => {
                self.check(base, value, span)?;
                for predicate in &predicates {
                    self.check_predicate(predicate, value, span)?;
                }
                Ok(())
            }
        }
    }

    fn check_elements<'v>(
        &mut self,
        element_ty: TypeId,
        items: impl Iterator<Item = &'v Value>,
        span: Span,
    ) -> Result<(), CheckError> {
        if self.ctx.types.skip_checks(element_ty) {
            return Ok(());
        }
        for item in items {
            self.check(element_ty, item, span)?;
        }
        Ok(())
    }

    /// Check every non-property member of a listing or mapping: force the
    /// member through the cache, check its key (mappings only), then its
    /// materialized value. Mismatches point at the member's own span.
    fn check_object_members(
        &mut self,
        obj: crate::object::ObjectId,
        key_ty: Option<TypeId>,
        value_ty: TypeId,
        span: Span,
    ) -> Result<(), CheckError> {
        let skip_keys = key_ty.is_none_or(|t| self.ctx.types.skip_checks(t));
        let skip_values = self.ctx.types.skip_checks(value_ty);
        if skip_keys && skip_values {
            return Ok(());
        }
        for key in self.heap.visible_keys(obj) {
            if key.is_property() {
                continue;
            }
            let member_span = self
                .heap
                .find_member(obj, &key)
                .map(|(_, desc)| if desc.span.is_dummy() { span } else { desc.span })
                .unwrap_or(span);
            if let (Some(key_ty), MemberKey::Entry(entry_key)) = (key_ty, &key) {
                if !skip_keys {
                    self.check(key_ty, &entry_key.clone(), member_span)?;
                }
            }
            if !skip_values {
                let value = self
                    .read_member(obj, &key)?
                    .expect("visible key resolves to a member");
                self.check(value_ty, &value, member_span)?;
            }
        }
        Ok(())
    }

    fn check_function_arity(
        &mut self,
        ty: TypeId,
        value: &Value,
        arity: Option<usize>,
        span: Span,
    ) -> Result<(), CheckError> {
        match value {
            Value::Function(f) => match arity {
                // Argument types are erased at runtime; only arity counts.
                Some(expected) if f.arity() != expected => {
                    Err(self.simple_mismatch(ty, value, span).into())
                }
                _ => Ok(()),
            },
            _ => Err(self.simple_mismatch(ty, value, span).into()),
        }
    }

    fn check_int_width(
        &mut self,
        width: IntWidth,
        value: &Value,
        span: Span,
    ) -> Result<(), CheckError> {
        match value {
            Value::Int(i) => {
                if width.accepts(*i) {
                    Ok(())
                } else {
                    let (min, max) = width_bounds(width);
                    Err(TypeMismatch::Constraint {
                        predicate: format!("isBetween({min}, {max})"),
                        actual_value: self.render_value(value),
                        span,
                        operands: Vec::new(),
                    }
                    .into())
                }
            }
            _ => Err(TypeMismatch::Simple {
                expected: width.name().to_string(),
                actual_type: self.ctx.registry.class_name(self.class_of(value)),
                actual_value: self.render_value(value),
                span,
            }
            .into()),
        }
    }

    /// Evaluate one constraint predicate with `this` bound to the value
    /// under test.
    fn check_predicate(
        &mut self,
        predicate: &Arc<Expr>,
        value: &Value,
        span: Span,
    ) -> Result<(), CheckError> {
        let outer = self.frame().clone();
        self.frames.push(Frame {
            receiver: outer.receiver,
            owner: outer.owner,
            key: outer.key,
            locals: Vec::new(),
            custom_this: Some(value.clone()),
        });
        let verdict = self.evaluate_expr(predicate);
        let result = match verdict {
            Ok(Value::Bool(true)) => Ok(()),
            Ok(Value::Bool(false)) => {
                let operands = self.trace_operands(predicate);
                Err(TypeMismatch::Constraint {
                    predicate: self.render_predicate(predicate),
                    actual_value: self.render_value(value),
                    span,
                    operands,
                }
                .into())
            }
            Ok(other) => Err(CheckError::Eval(Box::new(self.operand_error(
                "constraint",
                &other,
                predicate.span,
            )))),
            Err(error) => Err(CheckError::Eval(Box::new(error))),
        };
        self.frames.pop();
        result
    }

    /// Power-assertion support: re-evaluate the failing predicate's direct
    /// operands and record their values. Best-effort; operand errors are
    /// dropped.
    fn trace_operands(&mut self, predicate: &Arc<Expr>) -> Vec<(String, String)> {
        let ExprKind::Binary(_, lhs, rhs) = &predicate.kind else {
            return Vec::new();
        };
        let mut operands = Vec::new();
        for side in [lhs.as_ref(), rhs.as_ref()] {
            if is_interesting_operand(side) {
                if let Ok(value) = self.evaluate_expr(side) {
                    operands.push((self.render_predicate_expr(side), self.render_value(&value)));
                }
            }
        }
        operands
    }

    fn render_predicate(&self, predicate: &Arc<Expr>) -> String {
        self.render_predicate_expr(predicate)
    }

    fn render_predicate_expr(&self, expr: &Expr) -> String {
        let interner = std::sync::Arc::clone(&self.ctx.interner);
        crate::expr::render_expr(expr, &move |atom| interner.resolve(atom))
    }

    fn simple_mismatch(&mut self, expected: TypeId, value: &Value, span: Span) -> TypeMismatch {
        TypeMismatch::Simple {
            expected: self.ctx.display_type(expected),
            actual_type: self.ctx.registry.class_name(self.class_of(value)),
            actual_value: self.render_value(value),
            span,
        }
    }
}

fn width_bounds(width: IntWidth) -> (i64, i64) {
    match width {
        IntWidth::Int8 => (i8::MIN as i64, i8::MAX as i64),
        IntWidth::Int16 => (i16::MIN as i64, i16::MAX as i64),
        IntWidth::Int32 => (i32::MIN as i64, i32::MAX as i64),
        IntWidth::UInt8 => (0, u8::MAX as i64),
        IntWidth::UInt16 => (0, u16::MAX as i64),
        IntWidth::UInt32 => (0, u32::MAX as i64),
        IntWidth::UInt => (0, i64::MAX),
    }
}

/// Only operands whose value is not obvious from the source are traced.
fn is_interesting_operand(expr: &Expr) -> bool {
    !matches!(
        expr.kind,
        ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Null
    )
}
