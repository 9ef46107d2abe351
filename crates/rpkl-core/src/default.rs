//! Default-value synthesis.
//!
//! Every type shape knows how to produce its default, or declares that it
//! has none. `try_default` distinguishes "no default" (`Ok(None)`) from a
//! genuine failure (`Err`); the only shape that fails outright is
//! `VarArgs`, which is never instantiable.

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::function::{FunctionBody, FunctionValue};
use crate::member::{MemberBody, MemberDescriptor, MemberKey, MemberKind, MemberModifiers};
use crate::object::{ObjectId, ObjectKind};
use crate::types::{AliasKind, Type, TypeId};
use crate::value::Value;
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, Span};
use std::rc::Rc;

impl<'c> Evaluator<'c> {
    /// The default of `ty`, or an error when it has none.
    pub fn default_value(&mut self, ty: TypeId, span: Span) -> Result<Value, EvalError> {
        match self.try_default(ty, span)? {
            Some(value) => Ok(value),
            None => Err(EvalError::new(
                diagnostic_codes::NO_DEFAULT_VALUE,
                vec![self.ctx.display_type(ty)],
                span,
            )),
        }
    }

    /// The default of `ty`, `None` when the type has none.
    pub fn try_default(&mut self, ty: TypeId, span: Span) -> Result<Option<Value>, EvalError> {
        match self.ctx.types.get(ty).clone() {
            Type::Unknown
            | Type::Nothing
            | Type::Any
            | Type::TypeVariable { .. }
            | Type::Function { .. }
            | Type::FunctionN { .. }
            | Type::FunctionClass
            | Type::Pair(_, _)
            | Type::IntWidth(_) => Ok(None),
            Type::VarArgs(element) => Err(EvalError::new(
                diagnostic_codes::INTERNAL_STD_LIB_CLASS,
                vec![format!("VarArgs<{}>", self.ctx.display_type(element))],
                span,
            )),
            Type::StringLiteral(atom) => Ok(Some(Value::string(&self.ctx.resolve(atom)))),
            Type::StringLiteralUnion {
                literals,
                default_index,
            } => Ok(default_index
                .and_then(|i| literals.get(i).copied())
                .map(|atom| Value::string(&self.ctx.resolve(atom)))),
            Type::Nullable(inner) => {
                // Null carries the inner default as a hint, so amending the
                // null recurses into it.
                let hint = self.try_default(inner, span)?;
                Ok(Some(Value::Null(hint.map(Rc::new))))
            }
            Type::Union {
                members,
                default_index,
            } => match default_index {
                Some(i) => match members.get(i) {
                    Some(member) => self.try_default(*member, span),
                    None => Ok(None),
                },
                None => Ok(None),
            },
            Type::Collection(_) | Type::List(_) => Ok(Some(Value::List(Rc::new(Vec::new())))),
            Type::Set(_) => Ok(Some(Value::Set(Rc::new(indexmap::IndexSet::new())))),
            Type::Map(_, _) => Ok(Some(Value::Map(Rc::new(IndexMap::new())))),
            Type::Module { class, .. }
            | Type::FinalClass(class)
            | Type::NonFinalClass(class) => self.class_default(class),
            Type::Listing(value_ty) => {
                let obj = self.container_default(ObjectKind::Listing, value_ty, span)?;
                Ok(Some(Value::Object(obj)))
            }
            Type::Mapping(_, value_ty) => {
                let obj = self.container_default(ObjectKind::Mapping, value_ty, span)?;
                Ok(Some(Value::Object(obj)))
            }
            Type::Alias {
                alias,
                args,
                instantiated,
            } => {
                if self.ctx.types.alias(alias).kind == AliasKind::Mixin {
                    // Both mixin pathways: a bare `Mixin` captures no type,
                    // `Mixin<T>` captures its argument.
                    let captured = args.first().copied();
                    return Ok(Some(Value::Function(Rc::new(
                        FunctionValue::identity_mixin(captured),
                    ))));
                }
                self.try_default(instantiated, span)
            }
            Type::Constrained { base, .. } => {
                // Constraints are not applied to defaults.
                self.try_default(base, span)
            }
        }
    }

    /// The instantiable default of a class: empty listing/mapping for the
    /// container classes, plain null for `Null`, otherwise the prototype
    /// when the class can be instantiated.
    fn class_default(&mut self, class: crate::classes::ClassId) -> Result<Option<Value>, EvalError> {
        let registry = &self.ctx.registry;
        if registry.is_null_class(class) {
            return Ok(Some(Value::null()));
        }
        if !registry.instantiable(class) {
            return Ok(None);
        }
        let proto = self.prototype_of(class)?;
        Ok(Some(Value::Object(proto)))
    }

    /// An empty listing or mapping typed over `value_ty`. Unless the value
    /// type is `unknown`, the container carries a hidden `default` property
    /// holding a zero-argument function that produces the element default.
    fn container_default(
        &mut self,
        kind: ObjectKind,
        value_ty: TypeId,
        span: Span,
    ) -> Result<ObjectId, EvalError> {
        let mut members = IndexMap::new();
        if !matches!(self.ctx.types.get(value_ty), Type::Unknown) {
            let default_fn = match self.try_default(value_ty, span)? {
                Some(value) => FunctionValue::constant(value),
                // No synthesizable default: defer to access time, failing
                // then if the type still has none.
                None => FunctionValue {
                    params: Vec::new(),
                    captured_this: None,
                    captured_locals: Vec::new(),
                    body: FunctionBody::TypeDefault(value_ty),
                },
            };
            let key = MemberKey::Property(Identifier::regular(self.ctx.intern("default")));
            let desc = MemberDescriptor::new(
                MemberKind::Property,
                key.clone(),
                MemberBody::Constant(Value::Function(Rc::new(default_fn))),
            )
            .with_modifiers(MemberModifiers::HIDDEN)
            .with_span(span, span);
            members.insert(key, Rc::new(desc));
        }
        let parent_class = match kind {
            ObjectKind::Listing => self.ctx.registry.builtins.listing,
            _ => self.ctx.registry.builtins.mapping,
        };
        let parent = self.prototype_of(parent_class)?;
        Ok(self.heap.alloc(kind, Some(parent), members, 0))
    }
}
