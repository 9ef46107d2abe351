//! The amendment engine.
//!
//! Applying an object literal to a parent value produces a child whose
//! variant is derived from the parent: typed objects stay typed and must
//! respect their class's property declarations; dynamics accept anything;
//! listings append elements; mappings accept arbitrary entry keys;
//! functions are wrapped so that calling them amends the call's result;
//! null-with-default recurses into the carried default; amending a class
//! amends its prototype.
//!
//! Spread members and `for`/`when` generators are expanded here, before
//! assembly, so duplicate keys that only materialize at runtime are still
//! reported at the offending member's header.

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::expr::{Expr, LiteralBody, LiteralMember, LiteralMemberKind, ObjectLiteral};
use crate::function::{FunctionBody, FunctionValue};
use crate::member::{MemberBody, MemberDescriptor, MemberKey, MemberKind, MemberModifiers};
use crate::object::{ObjectId, ObjectKind};
use crate::value::{QualifiedName, Value};
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, Span};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// A literal member after generator expansion, with its captured loop
/// bindings.
struct ExpandedMember {
    kind: ExpandedKind,
    locals: Vec<(Identifier, Value)>,
    span: Span,
    header_span: Span,
}

enum ExpandedKind {
    Property {
        name: Identifier,
        modifiers: MemberModifiers,
        ty: Option<crate::types::TypeId>,
        body: ExpandedBody,
    },
    Method {
        name: Identifier,
        params: Vec<Identifier>,
        body: Arc<Expr>,
        modifiers: MemberModifiers,
    },
    Element {
        body: ExpandedBody,
    },
    Entry {
        key: Value,
        body: ExpandedBody,
    },
}

enum ExpandedBody {
    Expr(Arc<Expr>),
    Amend(Arc<ObjectLiteral>),
    Constant(Value),
}

impl From<&LiteralBody> for ExpandedBody {
    fn from(body: &LiteralBody) -> Self {
        match body {
            LiteralBody::Expr(expr) => ExpandedBody::Expr(expr.clone()),
            LiteralBody::Amend(literal) => ExpandedBody::Amend(literal.clone()),
        }
    }
}

impl ExpandedBody {
    fn into_member_body(self) -> MemberBody {
        match self {
            ExpandedBody::Expr(expr) => MemberBody::Expr(expr),
            ExpandedBody::Amend(literal) => MemberBody::Amend(literal),
            ExpandedBody::Constant(value) => MemberBody::Constant(value),
        }
    }
}

impl<'c> Evaluator<'c> {
    /// Apply an object literal to a parent value.
    pub fn amend(
        &mut self,
        parent: &Value,
        literal: &Arc<ObjectLiteral>,
        span: Span,
    ) -> Result<Value, EvalError> {
        match parent {
            Value::Object(id) => {
                let id = *id;
                match self.heap.get(id).kind {
                    ObjectKind::Typed(class) => self.amend_typed(class, id, literal),
                    ObjectKind::Dynamic => self.amend_dynamic(id, literal),
                    ObjectKind::Listing => self.amend_listing(id, literal),
                    ObjectKind::Mapping => self.amend_mapping(id, literal),
                }
            }
            Value::Function(inner) => Ok(Value::Function(Rc::new(FunctionValue {
                params: inner.params.clone(),
                // Calling the wrapper preserves the original `this`.
                captured_this: inner.captured_this.clone(),
                captured_locals: Vec::new(),
                body: FunctionBody::AmendWrapper {
                    inner: Rc::clone(inner),
                    literal: Arc::clone(literal),
                },
            }))),
            Value::Null(Some(default)) => {
                let default = (**default).clone();
                self.amend(&default, literal, span)
            }
            Value::Class(class) => {
                let class = *class;
                if !self.ctx.registry.instantiable(class) {
                    let code = if self.ctx.registry.class(class).external {
                        diagnostic_codes::INTERNAL_STD_LIB_CLASS
                    } else {
                        diagnostic_codes::CANNOT_AMEND_VALUE
                    };
                    return Err(EvalError::new(
                        code,
                        vec![self.ctx.registry.class_name(class)],
                        span,
                    ));
                }
                let proto = self.prototype_of(class)?;
                self.amend(&Value::Object(proto), literal, span)
            }
            other => Err(EvalError::new(
                diagnostic_codes::CANNOT_AMEND_VALUE,
                vec![self.ctx.registry.class_name(self.class_of(other))],
                span,
            )),
        }
    }

    // =========================================================================
    // Per-variant assembly
    // =========================================================================

    fn amend_typed(
        &mut self,
        class: crate::classes::ClassId,
        parent: ObjectId,
        literal: &Arc<ObjectLiteral>,
    ) -> Result<Value, EvalError> {
        let expanded = self.expand_literal(literal)?;
        let class_name_atom = self.ctx.registry.class(class).name;
        let mut members: IndexMap<MemberKey, Rc<MemberDescriptor>> = IndexMap::new();
        for member in expanded {
            match member.kind {
                ExpandedKind::Element { .. } => {
                    return Err(EvalError::new(
                        diagnostic_codes::OBJECT_CANNOT_HAVE_ELEMENTS,
                        vec![self.ctx.registry.class_name(class)],
                        member.span,
                    ));
                }
                ExpandedKind::Entry { .. } => {
                    return Err(EvalError::new(
                        diagnostic_codes::OBJECT_CANNOT_HAVE_ENTRIES,
                        vec![self.ctx.registry.class_name(class)],
                        member.span,
                    ));
                }
                ExpandedKind::Method {
                    name,
                    params,
                    body,
                    modifiers,
                } => {
                    if !modifiers.contains(MemberModifiers::LOCAL) && !name.local {
                        return Err(EvalError::new(
                            diagnostic_codes::PROPERTY_NOT_DEFINED,
                            vec![
                                self.ctx.resolve(name.atom),
                                self.ctx.registry.class_name(class),
                            ],
                            member.header_span,
                        ));
                    }
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers,
                        kind: MemberKind::Method,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: MemberBody::Method { params, body },
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Property {
                    name,
                    modifiers,
                    ty,
                    body,
                } => {
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let is_local = modifiers.contains(MemberModifiers::LOCAL) || name.local;
                    let (declared_type, qualified_name) = if is_local {
                        (ty, None)
                    } else {
                        let Some((_, schema)) = self.ctx.registry.property_of(class, name.atom)
                        else {
                            return Err(EvalError::new(
                                diagnostic_codes::PROPERTY_NOT_DEFINED,
                                vec![
                                    self.ctx.resolve(name.atom),
                                    self.ctx.registry.class_name(class),
                                ],
                                member.header_span,
                            ));
                        };
                        if schema.modifiers.contains(MemberModifiers::CONST) {
                            return Err(EvalError::new(
                                diagnostic_codes::CANNOT_ASSIGN_CONST_PROPERTY,
                                vec![self.ctx.resolve(name.atom)],
                                member.header_span,
                            ));
                        }
                        if schema.modifiers.contains(MemberModifiers::FIXED) {
                            return Err(EvalError::new(
                                diagnostic_codes::CANNOT_ASSIGN_FIXED_PROPERTY,
                                vec![self.ctx.resolve(name.atom)],
                                member.header_span,
                            ));
                        }
                        (
                            Some(schema.ty),
                            Some(QualifiedName {
                                owner: class_name_atom,
                                name: name.atom,
                            }),
                        )
                    };
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers,
                        kind: MemberKind::Property,
                        key: key.clone(),
                        qualified_name,
                        declared_type,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
            }
        }
        debug!(class = %self.ctx.registry.class_name(class), members = members.len(), "amended typed object");
        let id = self.heap.alloc(ObjectKind::Typed(class), Some(parent), members, 0);
        Ok(Value::Object(id))
    }

    fn amend_dynamic(
        &mut self,
        parent: ObjectId,
        literal: &Arc<ObjectLiteral>,
    ) -> Result<Value, EvalError> {
        let expanded = self.expand_literal(literal)?;
        let base_count = self.heap.get(parent).element_count;
        let mut members: IndexMap<MemberKey, Rc<MemberDescriptor>> = IndexMap::new();
        let mut appended = 0u32;
        for member in expanded {
            match member.kind {
                ExpandedKind::Property {
                    name,
                    modifiers,
                    ty,
                    body,
                } => {
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers,
                        kind: MemberKind::Property,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: ty,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Method {
                    name,
                    params,
                    body,
                    modifiers,
                } => {
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers,
                        kind: MemberKind::Method,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: MemberBody::Method { params, body },
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Element { body } => {
                    let key = MemberKey::Element(base_count + appended);
                    appended += 1;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: MemberModifiers::empty(),
                        kind: MemberKind::Element,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Entry { key, body } => {
                    let key = MemberKey::Entry(key);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: MemberModifiers::empty(),
                        kind: MemberKind::Entry,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
            }
        }
        let id = self.heap.alloc(
            ObjectKind::Dynamic,
            Some(parent),
            members,
            base_count + appended,
        );
        Ok(Value::Object(id))
    }

    fn amend_listing(
        &mut self,
        parent: ObjectId,
        literal: &Arc<ObjectLiteral>,
    ) -> Result<Value, EvalError> {
        let expanded = self.expand_literal(literal)?;
        let base_count = self.heap.get(parent).element_count;
        let default_atom = self.ctx.intern("default");
        let mut members: IndexMap<MemberKey, Rc<MemberDescriptor>> = IndexMap::new();
        let mut appended = 0u32;
        for member in expanded {
            match member.kind {
                ExpandedKind::Property {
                    name,
                    modifiers,
                    body,
                    ..
                } => {
                    // The reserved `default` property is the only property a
                    // listing may carry.
                    if name.atom != default_atom {
                        return Err(EvalError::new(
                            diagnostic_codes::PROPERTY_NOT_DEFINED,
                            vec![
                                self.ctx.resolve(name.atom),
                                "Listing".to_string(),
                            ],
                            member.header_span,
                        ));
                    }
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: modifiers | MemberModifiers::HIDDEN,
                        kind: MemberKind::Property,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Method { .. } => {
                    return Err(EvalError::new(
                        diagnostic_codes::PROPERTY_NOT_DEFINED,
                        vec!["<method>".to_string(), "Listing".to_string()],
                        member.header_span,
                    ));
                }
                ExpandedKind::Element { body } => {
                    let key = MemberKey::Element(base_count + appended);
                    appended += 1;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: MemberModifiers::empty(),
                        kind: MemberKind::Element,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Entry { key, body } => {
                    // An integer entry overrides an inherited element.
                    let index = match key {
                        Value::Int(i) if i >= 0 && i < base_count as i64 => i as u32,
                        Value::Int(i) => {
                            return Err(EvalError::new(
                                diagnostic_codes::ELEMENT_INDEX_OUT_OF_RANGE,
                                vec![i.to_string(), base_count.to_string()],
                                member.span,
                            ));
                        }
                        other => return Err(self.operand_error("[]", &other, member.span)),
                    };
                    let key = MemberKey::Element(index);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: MemberModifiers::empty(),
                        kind: MemberKind::Element,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
            }
        }
        let id = self.heap.alloc(
            ObjectKind::Listing,
            Some(parent),
            members,
            base_count + appended,
        );
        Ok(Value::Object(id))
    }

    fn amend_mapping(
        &mut self,
        parent: ObjectId,
        literal: &Arc<ObjectLiteral>,
    ) -> Result<Value, EvalError> {
        let expanded = self.expand_literal(literal)?;
        let default_atom = self.ctx.intern("default");
        let mut members: IndexMap<MemberKey, Rc<MemberDescriptor>> = IndexMap::new();
        for member in expanded {
            match member.kind {
                ExpandedKind::Property {
                    name,
                    modifiers,
                    body,
                    ..
                } => {
                    if name.atom != default_atom {
                        return Err(EvalError::new(
                            diagnostic_codes::PROPERTY_NOT_DEFINED,
                            vec![
                                self.ctx.resolve(name.atom),
                                "Mapping".to_string(),
                            ],
                            member.header_span,
                        ));
                    }
                    let key = MemberKey::Property(name);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: modifiers | MemberModifiers::HIDDEN,
                        kind: MemberKind::Property,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
                ExpandedKind::Method { .. } => {
                    return Err(EvalError::new(
                        diagnostic_codes::PROPERTY_NOT_DEFINED,
                        vec!["<method>".to_string(), "Mapping".to_string()],
                        member.header_span,
                    ));
                }
                ExpandedKind::Element { .. } => {
                    return Err(EvalError::new(
                        diagnostic_codes::OBJECT_CANNOT_HAVE_ELEMENTS,
                        vec!["Mapping".to_string()],
                        member.span,
                    ));
                }
                ExpandedKind::Entry { key, body } => {
                    let key = MemberKey::Entry(key);
                    self.reject_duplicate(&members, &key, member.header_span)?;
                    let desc = MemberDescriptor {
                        span: member.span,
                        header_span: member.header_span,
                        modifiers: MemberModifiers::empty(),
                        kind: MemberKind::Entry,
                        key: key.clone(),
                        qualified_name: None,
                        declared_type: None,
                        captured_locals: member.locals,
                        body: body.into_member_body(),
                    };
                    members.insert(key, Rc::new(desc));
                }
            }
        }
        let id = self.heap.alloc(ObjectKind::Mapping, Some(parent), members, 0);
        Ok(Value::Object(id))
    }

    fn reject_duplicate(
        &self,
        members: &IndexMap<MemberKey, Rc<MemberDescriptor>>,
        key: &MemberKey,
        header_span: Span,
    ) -> Result<(), EvalError> {
        if members.contains_key(key) {
            return Err(EvalError::new(
                diagnostic_codes::DUPLICATE_DEFINITION,
                vec![self.display_key(key)],
                header_span,
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Generator expansion
    // =========================================================================

    fn expand_literal(
        &mut self,
        literal: &Arc<ObjectLiteral>,
    ) -> Result<Vec<ExpandedMember>, EvalError> {
        let mut out = Vec::with_capacity(literal.members.len());
        // Literal bodies close over the bindings visible where the literal
        // is written; generator variables stack on top.
        let mut locals = self.frame().locals.clone();
        self.expand_members(&literal.members, &mut locals, &mut out)?;
        Ok(out)
    }

    fn expand_members(
        &mut self,
        members: &[LiteralMember],
        locals: &mut Vec<(Identifier, Value)>,
        out: &mut Vec<ExpandedMember>,
    ) -> Result<(), EvalError> {
        for member in members {
            match &member.kind {
                LiteralMemberKind::Property {
                    name,
                    modifiers,
                    ty,
                    body,
                } => out.push(ExpandedMember {
                    kind: ExpandedKind::Property {
                        name: *name,
                        modifiers: *modifiers,
                        ty: *ty,
                        body: body.into(),
                    },
                    locals: locals.clone(),
                    span: member.span,
                    header_span: member.header_span,
                }),
                LiteralMemberKind::Method { name, params, body } => out.push(ExpandedMember {
                    kind: ExpandedKind::Method {
                        name: *name,
                        params: params.clone(),
                        body: body.clone(),
                        modifiers: MemberModifiers::LOCAL,
                    },
                    locals: locals.clone(),
                    span: member.span,
                    header_span: member.header_span,
                }),
                LiteralMemberKind::Element { body } => out.push(ExpandedMember {
                    kind: ExpandedKind::Element { body: body.into() },
                    locals: locals.clone(),
                    span: member.span,
                    header_span: member.header_span,
                }),
                LiteralMemberKind::Entry { key, body } => {
                    let key = self.eval_with_locals(key, locals)?;
                    out.push(ExpandedMember {
                        kind: ExpandedKind::Entry {
                            key,
                            body: body.into(),
                        },
                        locals: locals.clone(),
                        span: member.span,
                        header_span: member.header_span,
                    });
                }
                LiteralMemberKind::Spread { expr } => {
                    let value = self.eval_with_locals(expr, locals)?;
                    self.expand_spread(&value, member, locals, out)?;
                }
                LiteralMemberKind::For {
                    key_var,
                    value_var,
                    iterable,
                    body,
                } => {
                    let iterable = self.eval_with_locals(iterable, locals)?;
                    let pairs = self.iterate(&iterable, member.span)?;
                    for (key, value) in pairs {
                        let depth = locals.len();
                        if let (Some(key_var), Some(key)) = (key_var, key) {
                            locals.push((*key_var, key));
                        }
                        locals.push((*value_var, value));
                        let result = self.expand_members(body, locals, out);
                        locals.truncate(depth);
                        result?;
                    }
                }
                LiteralMemberKind::When {
                    condition,
                    then_members,
                    else_members,
                } => {
                    let verdict = self.eval_with_locals(condition, locals)?;
                    match verdict {
                        Value::Bool(true) => self.expand_members(then_members, locals, out)?,
                        Value::Bool(false) => self.expand_members(else_members, locals, out)?,
                        other => {
                            return Err(self.operand_error("when", &other, condition.span));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Evaluate an expression in the enclosing frame with the generator
    /// bindings in scope.
    fn eval_with_locals(
        &mut self,
        expr: &Expr,
        locals: &[(Identifier, Value)],
    ) -> Result<Value, EvalError> {
        let depth = self.frame().locals.len();
        self.frame_mut().locals.extend_from_slice(locals);
        let result = self.evaluate_expr(expr);
        self.frame_mut().locals.truncate(depth);
        result
    }

    /// Key/value pairs a `for` generator iterates over.
    fn iterate(
        &mut self,
        iterable: &Value,
        span: Span,
    ) -> Result<Vec<(Option<Value>, Value)>, EvalError> {
        match iterable {
            Value::List(items) => Ok(items
                .iter()
                .enumerate()
                .map(|(i, v)| (Some(Value::Int(i as i64)), v.clone()))
                .collect()),
            Value::Set(items) => Ok(items.iter().map(|v| (None, v.clone())).collect()),
            Value::Map(entries) => Ok(entries
                .iter()
                .map(|(k, v)| (Some(k.clone()), v.clone()))
                .collect()),
            Value::IntSeq(seq) => Ok(seq.iter().map(|i| (None, Value::Int(i))).collect()),
            Value::Object(obj) => {
                let obj = *obj;
                match self.heap.get(obj).kind {
                    ObjectKind::Listing => {
                        let count = self.heap.get(obj).element_count;
                        let mut pairs = Vec::with_capacity(count as usize);
                        for index in 0..count {
                            let value = self
                                .read_member(obj, &MemberKey::Element(index))?
                                .ok_or_else(|| {
                                    EvalError::new(
                                        diagnostic_codes::ELEMENT_INDEX_OUT_OF_RANGE,
                                        vec![index.to_string(), count.to_string()],
                                        span,
                                    )
                                })?;
                            pairs.push((Some(Value::Int(index as i64)), value));
                        }
                        Ok(pairs)
                    }
                    ObjectKind::Mapping => {
                        let mut pairs = Vec::new();
                        for key in self.heap.visible_keys(obj) {
                            if let MemberKey::Entry(entry_key) = &key {
                                let entry_key = entry_key.clone();
                                let value = self
                                    .read_member(obj, &key)?
                                    .expect("visible key resolves to a member");
                                pairs.push((Some(entry_key), value));
                            }
                        }
                        Ok(pairs)
                    }
                    _ => Err(self.operand_error("for", iterable, span)),
                }
            }
            _ => Err(self.operand_error("for", iterable, span)),
        }
    }

    /// Splice a spread value's members into the expansion, as constants.
    fn expand_spread(
        &mut self,
        value: &Value,
        member: &LiteralMember,
        locals: &mut Vec<(Identifier, Value)>,
        out: &mut Vec<ExpandedMember>,
    ) -> Result<(), EvalError> {
        let constant_element = |value: Value, locals: &Vec<(Identifier, Value)>| ExpandedMember {
            kind: ExpandedKind::Element {
                body: ExpandedBody::Constant(value),
            },
            locals: locals.clone(),
            span: member.span,
            header_span: member.header_span,
        };
        match value {
            Value::List(items) => {
                out.extend(items.iter().map(|v| constant_element(v.clone(), locals)));
                Ok(())
            }
            Value::Set(items) => {
                out.extend(items.iter().map(|v| constant_element(v.clone(), locals)));
                Ok(())
            }
            Value::IntSeq(seq) => {
                out.extend(seq.iter().map(|i| constant_element(Value::Int(i), locals)));
                Ok(())
            }
            Value::Map(entries) => {
                for (k, v) in entries.iter() {
                    out.push(ExpandedMember {
                        kind: ExpandedKind::Entry {
                            key: k.clone(),
                            body: ExpandedBody::Constant(v.clone()),
                        },
                        locals: locals.clone(),
                        span: member.span,
                        header_span: member.header_span,
                    });
                }
                Ok(())
            }
            Value::Object(obj) => {
                let obj = *obj;
                match self.heap.get(obj).kind {
                    ObjectKind::Listing => {
                        for (_, element) in self.iterate(value, member.span)? {
                            out.push(constant_element(element, locals));
                        }
                        Ok(())
                    }
                    ObjectKind::Mapping => {
                        for (key, entry_value) in self.iterate(value, member.span)? {
                            out.push(ExpandedMember {
                                kind: ExpandedKind::Entry {
                                    key: key.expect("mapping iteration yields keys"),
                                    body: ExpandedBody::Constant(entry_value),
                                },
                                locals: locals.clone(),
                                span: member.span,
                                header_span: member.header_span,
                            });
                        }
                        Ok(())
                    }
                    ObjectKind::Dynamic => {
                        for key in self.heap.visible_keys(obj) {
                            let skip = self.heap.find_member(obj, &key).is_some_and(|(_, d)| {
                                d.modifiers.intersects(
                                    MemberModifiers::LOCAL | MemberModifiers::HIDDEN,
                                )
                            });
                            if skip {
                                continue;
                            }
                            let value = self
                                .read_member(obj, &key)?
                                .expect("visible key resolves to a member");
                            let kind = match &key {
                                MemberKey::Property(name) => ExpandedKind::Property {
                                    name: *name,
                                    modifiers: MemberModifiers::empty(),
                                    ty: None,
                                    body: ExpandedBody::Constant(value),
                                },
                                MemberKey::Element(_) => ExpandedKind::Element {
                                    body: ExpandedBody::Constant(value),
                                },
                                MemberKey::Entry(entry_key) => ExpandedKind::Entry {
                                    key: entry_key.clone(),
                                    body: ExpandedBody::Constant(value),
                                },
                            };
                            out.push(ExpandedMember {
                                kind,
                                locals: locals.clone(),
                                span: member.span,
                                header_span: member.header_span,
                            });
                        }
                        Ok(())
                    }
                    ObjectKind::Typed(class) => Err(EvalError::new(
                        diagnostic_codes::CANNOT_SPREAD_VALUE,
                        vec![self.ctx.registry.class_name(class)],
                        member.span,
                    )),
                }
            }
            other => Err(EvalError::new(
                diagnostic_codes::CANNOT_SPREAD_VALUE,
                vec![self.ctx.registry.class_name(self.class_of(other))],
                member.span,
            )),
        }
    }
}
