//! Expression evaluation and function application.

use crate::error::EvalError;
use crate::eval::{Evaluator, Frame};
use crate::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::function::{FunctionBody, FunctionValue};
use crate::member::MemberKey;
use crate::object::ObjectKind;
use crate::value::{DataSize, Duration, Value};
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, Span};
use std::rc::Rc;

impl<'c> Evaluator<'c> {
    pub fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(atom) => Ok(Value::string(&self.ctx.resolve(*atom))),
            ExprKind::Null => Ok(Value::null()),
            ExprKind::Duration(value, unit) => Ok(Value::Duration(Duration::new(*value, *unit))),
            ExprKind::DataSize(value, unit) => Ok(Value::DataSize(DataSize::new(*value, *unit))),
            ExprKind::This => {
                let frame = self.frame();
                Ok(frame
                    .custom_this
                    .clone()
                    .unwrap_or_else(|| frame.receiver.clone()))
            }
            ExprKind::Read(id) => self.read_name(*id, expr.span),
            ExprKind::Member(base, id) => {
                let base = self.evaluate_expr(base)?;
                self.read_property_value(&base, *id, expr.span)
            }
            ExprKind::Subscript(base, key) => {
                let base = self.evaluate_expr(base)?;
                let key = self.evaluate_expr(key)?;
                self.subscript(&base, &key, expr.span)
            }
            ExprKind::Unary(op, operand) => {
                let operand = self.evaluate_expr(operand)?;
                self.unary(*op, operand, expr.span)
            }
            ExprKind::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs, expr.span),
            ExprKind::If(cond, then, otherwise) => {
                match self.evaluate_expr(cond)? {
                    Value::Bool(true) => self.evaluate_expr(then),
                    Value::Bool(false) => self.evaluate_expr(otherwise),
                    other => Err(self.operand_error("if", &other, cond.span)),
                }
            }
            ExprKind::Let { name, value, body } => {
                let bound = self.evaluate_expr(value)?;
                self.frame_mut().locals.push((*name, bound));
                let result = self.evaluate_expr(body);
                self.frame_mut().locals.pop();
                result
            }
            ExprKind::Amend(parent, literal) => {
                let parent = self.evaluate_expr(parent)?;
                self.amend(&parent, literal, expr.span)
            }
            ExprKind::TypeDefault(ty) => self.default_value(*ty, expr.span),
            ExprKind::Call(callee, args) => {
                let callee = self.evaluate_expr(callee)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.evaluate_expr(arg)?);
                }
                match callee {
                    Value::Function(f) => self.call_function(&f, evaluated, expr.span),
                    other => Err(EvalError::new(
                        diagnostic_codes::NOT_A_FUNCTION,
                        vec![self.ctx.registry.class_name(self.class_of(&other))],
                        expr.span,
                    )),
                }
            }
            ExprKind::Lambda { params, body } => {
                let frame = self.frame();
                Ok(Value::Function(Rc::new(FunctionValue {
                    params: params.clone(),
                    captured_this: Some(frame.receiver.clone()),
                    captured_locals: frame.locals.clone(),
                    body: FunctionBody::Expr(body.clone()),
                })))
            }
            ExprKind::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate_expr(item)?);
                }
                Ok(Value::List(Rc::new(values)))
            }
            ExprKind::MapLit(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.evaluate_expr(key)?;
                    let value = self.evaluate_expr(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(Rc::new(map)))
            }
            ExprKind::PairLit(first, second) => {
                let first = self.evaluate_expr(first)?;
                let second = self.evaluate_expr(second)?;
                Ok(Value::Pair(Rc::new((first, second))))
            }
        }
    }

    /// Resolve a bare name: frame locals first, then the receiver's members.
    fn read_name(&mut self, id: Identifier, span: Span) -> Result<Value, EvalError> {
        if let Some((_, value)) = self
            .frame()
            .locals
            .iter()
            .rev()
            .find(|(name, _)| *name == id)
            .cloned()
        {
            return Ok(value);
        }
        let receiver = self.frame().receiver.clone();
        if let Value::Object(obj) = receiver {
            if let Some(value) = self.read_member(obj, &MemberKey::Property(id))? {
                return Ok(value);
            }
        }
        Err(EvalError::new(
            diagnostic_codes::UNDEFINED_NAME,
            vec![self.ctx.resolve(id.atom)],
            span,
        ))
    }

    /// `base.name`, including the intrinsic properties of scalar and
    /// collection values.
    pub fn read_property_value(
        &mut self,
        base: &Value,
        id: Identifier,
        span: Span,
    ) -> Result<Value, EvalError> {
        if let Value::Object(obj) = base {
            if let Some(value) = self.read_member(*obj, &MemberKey::Property(id))? {
                return Ok(value);
            }
        }
        if let Some(value) = self.intrinsic_property(base, &self.ctx.resolve(id.atom)) {
            return Ok(value);
        }
        Err(EvalError::new(
            diagnostic_codes::PROPERTY_NOT_DEFINED,
            vec![
                self.ctx.resolve(id.atom),
                self.ctx.registry.class_name(self.class_of(base)),
            ],
            span,
        ))
    }

    fn intrinsic_property(&self, base: &Value, name: &str) -> Option<Value> {
        match (base, name) {
            (Value::Str(s), "length") => Some(Value::Int(s.chars().count() as i64)),
            (Value::Str(s), "isEmpty") => Some(Value::Bool(s.is_empty())),
            (Value::List(l), "length") => Some(Value::Int(l.len() as i64)),
            (Value::List(l), "isEmpty") => Some(Value::Bool(l.is_empty())),
            (Value::Set(s), "length") => Some(Value::Int(s.len() as i64)),
            (Value::Set(s), "isEmpty") => Some(Value::Bool(s.is_empty())),
            (Value::Map(m), "length") => Some(Value::Int(m.len() as i64)),
            (Value::Map(m), "isEmpty") => Some(Value::Bool(m.is_empty())),
            (Value::Pair(p), "first") => Some(p.0.clone()),
            (Value::Pair(p), "second") => Some(p.1.clone()),
            (Value::IntSeq(s), "start") => Some(Value::Int(s.start)),
            (Value::IntSeq(s), "end") => Some(Value::Int(s.end)),
            (Value::IntSeq(s), "step") => Some(Value::Int(s.step)),
            (Value::Duration(d), "value") => Some(Value::Float(d.value)),
            (Value::DataSize(d), "value") => Some(Value::Float(d.value)),
            (Value::Object(obj), "length") => {
                let data = self.heap.get(*obj);
                if data.kind == ObjectKind::Listing {
                    Some(Value::Int(data.element_count as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn subscript(&mut self, base: &Value, key: &Value, span: Span) -> Result<Value, EvalError> {
        match base {
            Value::List(list) => match key {
                Value::Int(i) if *i >= 0 && (*i as usize) < list.len() => {
                    Ok(list[*i as usize].clone())
                }
                Value::Int(i) => Err(EvalError::new(
                    diagnostic_codes::ELEMENT_INDEX_OUT_OF_RANGE,
                    vec![i.to_string(), list.len().to_string()],
                    span,
                )),
                other => Err(self.operand_error("[]", other, span)),
            },
            Value::Map(map) => map.get(key).cloned().ok_or_else(|| {
                EvalError::new(
                    diagnostic_codes::KEY_NOT_FOUND,
                    vec![self.render_value(key)],
                    span,
                )
            }),
            Value::Object(obj) => {
                let data = self.heap.get(*obj);
                let member_key = match (data.kind, key) {
                    (ObjectKind::Listing, Value::Int(i)) => {
                        if *i < 0 || *i >= data.element_count as i64 {
                            return Err(EvalError::new(
                                diagnostic_codes::ELEMENT_INDEX_OUT_OF_RANGE,
                                vec![i.to_string(), data.element_count.to_string()],
                                span,
                            ));
                        }
                        MemberKey::Element(*i as u32)
                    }
                    _ => MemberKey::Entry(key.clone()),
                };
                match self.read_member(*obj, &member_key)? {
                    Some(value) => Ok(value),
                    None => Err(EvalError::new(
                        diagnostic_codes::KEY_NOT_FOUND,
                        vec![self.render_value(key)],
                        span,
                    )),
                }
            }
            other => Err(self.operand_error("[]", other, span)),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: Value, span: Span) -> Result<Value, EvalError> {
        match (op, operand) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::new(diagnostic_codes::INTEGER_OVERFLOW, vec![], span)),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Neg, Value::Duration(d)) => {
                Ok(Value::Duration(Duration::new(-d.value, d.unit)))
            }
            (op, operand) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                Err(self.operand_error(symbol, &operand, span))
            }
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Value, EvalError> {
        // && and || short-circuit; everything else is strict.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = match self.evaluate_expr(lhs)? {
                Value::Bool(b) => b,
                other => return Err(self.operand_error(op.symbol(), &other, lhs.span)),
            };
            if (op == BinaryOp::And && !left) || (op == BinaryOp::Or && left) {
                return Ok(Value::Bool(left));
            }
            let right = self.evaluate_expr(rhs)?;
            return match right {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Err(self.operand_error(op.symbol(), &other, rhs.span)),
            };
        }

        let left = self.evaluate_expr(lhs)?;
        let right = self.evaluate_expr(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(self.value_equals(&left, &right)?)),
            BinaryOp::Ne => Ok(Value::Bool(!self.value_equals(&left, &right)?)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = self.compare(&left, &right, op.symbol(), span)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Add => self.add(&left, &right, span),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.arith(op, &left, &right, span)
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn compare(
        &mut self,
        left: &Value,
        right: &Value,
        symbol: &str,
        span: Span,
    ) -> Result<std::cmp::Ordering, EvalError> {
        let partial = match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Value::Duration(a), Value::Duration(b)) => {
                a.total_seconds().partial_cmp(&b.total_seconds())
            }
            (Value::DataSize(a), Value::DataSize(b)) => {
                a.total_bytes().partial_cmp(&b.total_bytes())
            }
            _ => None,
        };
        partial.ok_or_else(|| self.operand_error(symbol, left, span))
    }

    fn add(&mut self, left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| EvalError::new(diagnostic_codes::INTEGER_OVERFLOW, vec![], span)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Str(a), Value::Str(b)) => {
                let mut s = a.to_string();
                s.push_str(b);
                Ok(Value::string(&s))
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::List(Rc::new(items)))
            }
            (Value::Duration(a), Value::Duration(b)) => {
                let b_in_a = b.total_seconds() / a.unit_seconds_factor();
                Ok(Value::Duration(Duration::new(a.value + b_in_a, a.unit)))
            }
            (Value::DataSize(a), Value::DataSize(b)) => {
                let b_in_a = b.total_bytes() / a.unit_bytes_factor();
                Ok(Value::DataSize(DataSize::new(a.value + b_in_a, a.unit)))
            }
            _ => Err(self.operand_error("+", left, span)),
        }
    }

    fn arith(
        &mut self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        span: Span,
    ) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    BinaryOp::Sub => a.checked_sub(*b),
                    BinaryOp::Mul => a.checked_mul(*b),
                    BinaryOp::Mod => a.checked_rem_euclid(*b),
                    // `/` is float division, as in the surface language.
                    BinaryOp::Div => return Ok(Value::Float(*a as f64 / *b as f64)),
                    _ => unreachable!(),
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::new(diagnostic_codes::INTEGER_OVERFLOW, vec![], span))
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = match left {
                    Value::Int(i) => *i as f64,
                    Value::Float(f) => *f,
                    _ => unreachable!(),
                };
                let b = match right {
                    Value::Int(i) => *i as f64,
                    Value::Float(f) => *f,
                    _ => unreachable!(),
                };
                Ok(Value::Float(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a % b,
                    _ => unreachable!(),
                }))
            }
            (Value::Duration(a), Value::Duration(b)) if op == BinaryOp::Sub => {
                let b_in_a = b.total_seconds() / a.unit_seconds_factor();
                Ok(Value::Duration(Duration::new(a.value - b_in_a, a.unit)))
            }
            (Value::DataSize(a), Value::DataSize(b)) if op == BinaryOp::Sub => {
                let b_in_a = b.total_bytes() / a.unit_bytes_factor();
                Ok(Value::DataSize(DataSize::new(a.value - b_in_a, a.unit)))
            }
            _ => Err(self.operand_error(op.symbol(), left, span)),
        }
    }

    pub(crate) fn operand_error(&self, symbol: &str, operand: &Value, span: Span) -> EvalError {
        EvalError::new(
            diagnostic_codes::WRONG_OPERAND_TYPE,
            vec![
                symbol.to_string(),
                self.ctx.registry.class_name(self.class_of(operand)),
            ],
            span,
        )
    }

    // =========================================================================
    // Function application
    // =========================================================================

    pub fn call_function(
        &mut self,
        function: &Rc<FunctionValue>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, EvalError> {
        if args.len() != function.arity() {
            return Err(EvalError::new(
                diagnostic_codes::WRONG_ARITY,
                vec![function.arity().to_string(), args.len().to_string()],
                span,
            ));
        }
        self.enter(span)?;
        let result = match &function.body {
            FunctionBody::Expr(body) => {
                let mut locals = function.captured_locals.clone();
                locals.extend(function.params.iter().copied().zip(args));
                self.frames.push(Frame {
                    receiver: function
                        .captured_this
                        .clone()
                        .unwrap_or_else(Value::null),
                    owner: None,
                    key: None,
                    locals,
                    custom_this: None,
                });
                let value = self.evaluate_expr(body);
                self.frames.pop();
                value
            }
            FunctionBody::Const(value) => Ok((**value).clone()),
            FunctionBody::TypeDefault(ty) => self.default_value(*ty, span),
            FunctionBody::IdentityMixin(_) => {
                Ok(args.into_iter().next().expect("arity checked above"))
            }
            FunctionBody::AmendWrapper { inner, literal } => {
                let produced = self.call_function(inner, args, span)?;
                self.amend(&produced, literal, span)
            }
        };
        self.leave();
        result
    }
}
