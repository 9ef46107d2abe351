//! Function values.
//!
//! A function closes over its parameter list, the receiver it was created
//! with, and the local bindings visible at its definition site. Functions are
//! amendable: applying an object literal to a function produces a wrapper
//! that calls the original and amends its result.

use crate::expr::{Expr, ObjectLiteral};
use crate::types::TypeId;
use crate::value::Value;
use rpkl_common::Identifier;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub params: Vec<Identifier>,
    /// The receiver captured at the definition site; `this` inside the body.
    pub captured_this: Option<Value>,
    /// Local bindings visible at the definition site (parent frame).
    pub captured_locals: Vec<(Identifier, Value)>,
    pub body: FunctionBody,
}

#[derive(Clone, Debug)]
pub enum FunctionBody {
    /// An ordinary lambda body.
    Expr(Arc<Expr>),
    /// A zero-argument function returning a precomputed value. Used for the
    /// `default` member of listings and mappings whose value type has a
    /// synthesizable default.
    Const(Box<Value>),
    /// A zero-argument function producing the default of a type on demand.
    /// Fails at call time when the type has none.
    TypeDefault(TypeId),
    /// The identity mixin: one parameter, returned unchanged. The captured
    /// type, when present, only affects the function's reported type.
    IdentityMixin(Option<TypeId>),
    /// A function amendment: call `inner`, then amend the result with
    /// `literal`, preserving `this`.
    AmendWrapper {
        inner: Rc<FunctionValue>,
        literal: Arc<ObjectLiteral>,
    },
}

impl FunctionValue {
    pub fn lambda(params: Vec<Identifier>, body: Arc<Expr>) -> Self {
        FunctionValue {
            params,
            captured_this: None,
            captured_locals: Vec::new(),
            body: FunctionBody::Expr(body),
        }
    }

    pub fn constant(value: Value) -> Self {
        FunctionValue {
            params: Vec::new(),
            captured_this: None,
            captured_locals: Vec::new(),
            body: FunctionBody::Const(Box::new(value)),
        }
    }

    pub fn identity_mixin(captured: Option<TypeId>) -> Self {
        FunctionValue {
            params: Vec::new(),
            captured_this: None,
            captured_locals: Vec::new(),
            body: FunctionBody::IdentityMixin(captured),
        }
    }

    /// Number of arguments the function expects.
    pub fn arity(&self) -> usize {
        match &self.body {
            FunctionBody::IdentityMixin(_) => 1,
            FunctionBody::AmendWrapper { inner, .. } => inner.arity(),
            FunctionBody::Const(_) | FunctionBody::TypeDefault(_) => 0,
            FunctionBody::Expr(_) => self.params.len(),
        }
    }
}
