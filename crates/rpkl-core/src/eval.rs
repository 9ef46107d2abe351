//! The evaluator: member reading, memoization, and cycle detection.
//!
//! One `Evaluator` drives one module evaluation. It owns the object heap and
//! the per-object caches, and borrows the shared context read-only. Member
//! evaluation is single-threaded and runs each body to completion; a member
//! is evaluated at most once per object, in the order the observer first
//! asks for it.

use crate::classes::ClassId;
use crate::context::{CoreContext, EvaluatorOptions};
use crate::error::EvalError;
use crate::expr::LiteralBody;
use crate::function::{FunctionBody, FunctionValue};
use crate::member::{MemberBody, MemberDescriptor, MemberKey, MemberKind, MemberModifiers};
use crate::object::{Heap, ObjectId, ObjectKind};
use crate::value::{QualifiedName, Value};
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, Span};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use tracing::trace;

/// One evaluation stack frame: the bindings a member body or function body
/// runs under.
#[derive(Clone, Debug)]
pub struct Frame {
    /// `this` — the object whose member is being evaluated, or the callee's
    /// captured receiver.
    pub receiver: Value,
    /// The chain object where the executing descriptor was found.
    pub owner: Option<ObjectId>,
    /// The member key being evaluated.
    pub key: Option<MemberKey>,
    pub locals: Vec<(Identifier, Value)>,
    /// Set while a constraint predicate runs; `this` reads from it instead
    /// of the lexical receiver.
    pub custom_this: Option<Value>,
}

impl Frame {
    pub fn root() -> Self {
        Frame {
            receiver: Value::null(),
            owner: None,
            key: None,
            locals: Vec::new(),
            custom_this: None,
        }
    }
}

#[derive(Debug)]
pub struct Evaluator<'c> {
    pub ctx: &'c CoreContext,
    pub heap: Heap,
    pub options: EvaluatorOptions,
    pub(crate) frames: Vec<Frame>,
    pub(crate) subclass_cache: FxHashMap<(ClassId, ClassId), bool>,
    pub(crate) depth: usize,
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c CoreContext, options: EvaluatorOptions) -> Self {
        Evaluator {
            ctx,
            heap: Heap::new(),
            options,
            frames: vec![Frame::root()],
            subclass_cache: FxHashMap::default(),
            depth: 0,
        }
    }

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    pub(crate) fn enter(&mut self, span: Span) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > self.options.max_call_depth {
            self.depth -= 1;
            return Err(EvalError::new(
                diagnostic_codes::RECURSION_LIMIT_EXCEEDED,
                vec![self.options.max_call_depth.to_string()],
                span,
            ));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Subclass test memoized by observed class pair.
    pub fn is_subclass_cached(&mut self, c: ClassId, d: ClassId) -> bool {
        if let Some(&verdict) = self.subclass_cache.get(&(c, d)) {
            return verdict;
        }
        let verdict = self.ctx.registry.is_subclass(c, d);
        self.subclass_cache.insert((c, d), verdict);
        verdict
    }

    pub fn class_of(&self, value: &Value) -> ClassId {
        self.ctx.registry.class_of(value, &self.heap)
    }

    /// Render a member key for diagnostics.
    pub fn display_key(&self, key: &MemberKey) -> String {
        match key {
            MemberKey::Property(id) => self.ctx.resolve(id.atom),
            MemberKey::Element(index) => format!("[{index}]"),
            MemberKey::Entry(value) => format!("[{}]", self.render_value(value)),
        }
    }

    fn display_qualified(&self, name: &QualifiedName) -> String {
        format!(
            "{}.{}",
            self.ctx.resolve(name.owner),
            self.ctx.resolve(name.name)
        )
    }

    // =========================================================================
    // Member reading (the cache protocol)
    // =========================================================================

    /// Read a member of `obj`, evaluating and caching it on first access.
    ///
    /// Returns `Ok(None)` when neither `obj` nor any ancestor defines the
    /// key. Re-entry into a body that is already executing on `obj` raises a
    /// cyclic-evaluation error.
    pub fn read_member(
        &mut self,
        obj: ObjectId,
        key: &MemberKey,
    ) -> Result<Option<Value>, EvalError> {
        if let Some(value) = self.heap.get(obj).cache.get(key) {
            return Ok(Some(value.clone()));
        }
        let Some((owner, desc)) = self.heap.find_member(obj, key) else {
            return Ok(None);
        };
        if !self.heap.get_mut(obj).in_progress.insert(key.clone()) {
            return Err(EvalError::new(
                diagnostic_codes::CYCLIC_PROPERTY_REFERENCE,
                vec![self.display_key(key)],
                desc.header_span,
            ));
        }
        trace!(key = %self.display_key(key), object = obj.0, "evaluating member");
        let result = self.eval_member_body(obj, owner, &desc);
        self.heap.get_mut(obj).in_progress.remove(key);
        let value = result.map_err(|error| match &desc.qualified_name {
            Some(name) => error.with_frame(self.display_qualified(name), desc.header_span),
            None => error,
        })?;
        if let Some(ty) = desc.declared_type {
            if !self.ctx.types.skip_checks(ty) {
                self.check(ty, &value, desc.span)
                    .map_err(|failure| failure.into_error())?;
            }
        }
        self.heap
            .get_mut(obj)
            .cache
            .insert(key.clone(), value.clone());
        Ok(Some(value))
    }

    /// Evaluate a descriptor body with `(receiver, owner, key)` bindings.
    pub(crate) fn eval_member_body(
        &mut self,
        receiver: ObjectId,
        owner: ObjectId,
        desc: &Rc<MemberDescriptor>,
    ) -> Result<Value, EvalError> {
        self.enter(desc.span)?;
        let result = match &desc.body {
            MemberBody::Constant(value) => Ok(value.clone()),
            MemberBody::Expr(expr) => {
                self.frames.push(Frame {
                    receiver: Value::Object(receiver),
                    owner: Some(owner),
                    key: Some(desc.key.clone()),
                    locals: desc.captured_locals.clone(),
                    custom_this: None,
                });
                let value = self.evaluate_expr(expr);
                self.frames.pop();
                value
            }
            MemberBody::TypeDefault(ty) => self.default_value(*ty, desc.span),
            MemberBody::Amend(literal) => {
                let parent = match self.eval_inherited(receiver, owner, &desc.key)? {
                    Some(value) => value,
                    None => self.implicit_amend_parent(receiver, desc)?,
                };
                self.amend(&parent, literal, desc.span)
            }
            MemberBody::Method { params, body } => {
                Ok(Value::Function(Rc::new(FunctionValue {
                    params: params.clone(),
                    captured_this: Some(Value::Object(receiver)),
                    captured_locals: desc.captured_locals.clone(),
                    body: FunctionBody::Expr(body.clone()),
                })))
            }
        };
        self.leave();
        result
    }

    /// Evaluate the value a member has further up the chain, above `below`.
    /// Used by nested amendment bodies; the result is not cached.
    fn eval_inherited(
        &mut self,
        receiver: ObjectId,
        below: ObjectId,
        key: &MemberKey,
    ) -> Result<Option<Value>, EvalError> {
        match self.heap.find_member_above(receiver, below, key) {
            Some((owner, desc)) => self.eval_member_body(receiver, owner, &desc).map(Some),
            None => Ok(None),
        }
    }

    /// Parent value for a nested amendment with nothing inherited: dynamics
    /// conjure an empty dynamic; listings and mappings consult their
    /// `default` member.
    fn implicit_amend_parent(
        &mut self,
        receiver: ObjectId,
        desc: &Rc<MemberDescriptor>,
    ) -> Result<Value, EvalError> {
        match self.heap.get(receiver).kind {
            ObjectKind::Dynamic => {
                let empty = self.heap.alloc(ObjectKind::Dynamic, None, IndexMap::new(), 0);
                Ok(Value::Object(empty))
            }
            ObjectKind::Listing | ObjectKind::Mapping => {
                let default_key =
                    MemberKey::Property(Identifier::regular(self.ctx.intern("default")));
                match self.read_member(receiver, &default_key)? {
                    Some(Value::Function(default_fn)) => {
                        self.call_function(&default_fn, Vec::new(), desc.span)
                    }
                    Some(value) => Ok(value),
                    None => Err(EvalError::new(
                        diagnostic_codes::NO_DEFAULT_VALUE,
                        vec![self.display_key(&desc.key)],
                        desc.span,
                    )),
                }
            }
            ObjectKind::Typed(class) => Err(EvalError::new(
                diagnostic_codes::PROPERTY_NOT_DEFINED,
                vec![
                    self.display_key(&desc.key),
                    self.ctx.registry.class_name(class),
                ],
                desc.span,
            )),
        }
    }

    /// Force every visible non-local member of an object, in member-table
    /// order.
    pub fn force_object(&mut self, obj: ObjectId) -> Result<(), EvalError> {
        for key in self.heap.visible_keys(obj) {
            let local = self
                .heap
                .find_member(obj, &key)
                .is_some_and(|(_, desc)| desc.is_local());
            if !local {
                self.read_member(obj, &key)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Prototypes
    // =========================================================================

    /// The canonical empty instance of a class; built lazily once per
    /// evaluation and used as the root parent of all instances.
    pub fn prototype_of(&mut self, class: ClassId) -> Result<ObjectId, EvalError> {
        if let Some(&id) = self.heap.prototypes.get(&class) {
            return Ok(id);
        }
        let info = self.ctx.registry.class(class);
        let parent = match info.superclass {
            Some(superclass) if !self.ctx.registry.class(superclass).external => {
                Some(self.prototype_of(superclass)?)
            }
            _ => None,
        };
        let info = self.ctx.registry.class(class);
        let mut members = IndexMap::new();
        for (name, schema) in &info.properties {
            let key = MemberKey::Property(Identifier::regular(*name));
            let body = match &schema.body {
                Some(LiteralBody::Expr(expr)) => MemberBody::Expr(expr.clone()),
                Some(LiteralBody::Amend(literal)) => MemberBody::Amend(literal.clone()),
                None => MemberBody::TypeDefault(schema.ty),
            };
            let desc = MemberDescriptor {
                span: schema.span,
                header_span: schema.header_span,
                modifiers: schema.modifiers,
                kind: MemberKind::Property,
                key: key.clone(),
                qualified_name: Some(QualifiedName {
                    owner: info.name,
                    name: *name,
                }),
                declared_type: Some(schema.ty),
                captured_locals: Vec::new(),
                body,
            };
            members.insert(key, Rc::new(desc));
        }
        for (name, schema) in &info.methods {
            let key = MemberKey::Property(Identifier::regular(*name));
            let desc = MemberDescriptor {
                span: schema.span,
                header_span: schema.span,
                modifiers: schema.modifiers,
                kind: MemberKind::Method,
                key: key.clone(),
                qualified_name: Some(QualifiedName {
                    owner: info.name,
                    name: *name,
                }),
                declared_type: None,
                captured_locals: Vec::new(),
                body: MemberBody::Method {
                    params: schema.params.clone(),
                    body: schema.body.clone(),
                },
            };
            members.insert(key, Rc::new(desc));
        }
        let kind = self.ctx.registry.prototype_kind(class);
        let id = self.heap.alloc(kind, parent, members, 0);
        self.heap.prototypes.insert(class, id);
        Ok(id)
    }

    /// Evaluate a module class to its fully materialized module object.
    pub fn instantiate_module(&mut self, module_class: ClassId) -> Result<Value, EvalError> {
        let proto = self.prototype_of(module_class)?;
        self.force_object(proto)?;
        Ok(Value::Object(proto))
    }

    // =========================================================================
    // Structural equality
    // =========================================================================

    /// The language's `==`: structural, recursive, materializing object
    /// members as needed.
    pub fn value_equals(&mut self, a: &Value, b: &Value) -> Result<bool, EvalError> {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => {
                if x == y {
                    return Ok(true);
                }
                self.objects_equal(*x, *y)
            }
            (Value::List(x), Value::List(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (va, vb) in x.iter().zip(y.iter()) {
                    if !self.value_equals(va, vb)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(x), Value::Map(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (k, va) in x.iter() {
                    match y.get(k) {
                        Some(vb) => {
                            if !self.value_equals(va, vb)? {
                                return Ok(false);
                            }
                        }
                        None => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Value::Pair(x), Value::Pair(y)) => Ok(self.value_equals(&x.0, &y.0)?
                && self.value_equals(&x.1, &y.1)?),
            _ => Ok(a == b),
        }
    }

    fn objects_equal(&mut self, a: ObjectId, b: ObjectId) -> Result<bool, EvalError> {
        let (kind_a, kind_b) = (self.heap.get(a).kind, self.heap.get(b).kind);
        match (kind_a, kind_b) {
            (ObjectKind::Typed(ca), ObjectKind::Typed(cb)) => {
                if ca != cb {
                    return Ok(false);
                }
            }
            (ObjectKind::Dynamic, ObjectKind::Dynamic)
            | (ObjectKind::Listing, ObjectKind::Listing)
            | (ObjectKind::Mapping, ObjectKind::Mapping) => {}
            _ => return Ok(false),
        }
        let keys_a = self.comparable_keys(a);
        let keys_b = self.comparable_keys(b);
        if keys_a.len() != keys_b.len() {
            return Ok(false);
        }
        for key in &keys_b {
            if !keys_a.contains(key) {
                return Ok(false);
            }
        }
        for key in keys_a {
            let va = self.read_member(a, &key)?;
            let vb = self.read_member(b, &key)?;
            match (va, vb) {
                (Some(va), Some(vb)) => {
                    if !self.value_equals(&va, &vb)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Keys that participate in structural equality: everything visible
    /// except local and hidden members.
    fn comparable_keys(&self, obj: ObjectId) -> Vec<MemberKey> {
        self.heap
            .visible_keys(obj)
            .into_iter()
            .filter(|key| {
                self.heap.find_member(obj, key).is_none_or(|(_, desc)| {
                    !desc
                        .modifiers
                        .intersects(MemberModifiers::LOCAL | MemberModifiers::HIDDEN)
                })
            })
            .collect()
    }
}
