//! Member keys and member descriptors.
//!
//! An object's member table maps keys to descriptors. A key is either a
//! property identifier, an element index, or an arbitrary entry value. A
//! descriptor says *how* to produce the member's value; the produced value
//! is cached on the owning object, never on the descriptor, because one
//! descriptor is shared by every object that inherits it through the
//! amendment chain.

use crate::expr::{Expr, ObjectLiteral};
use crate::types::TypeId;
use crate::value::{QualifiedName, Value};
use bitflags::bitflags;
use rpkl_common::{Identifier, Span};
use std::sync::Arc;

/// A member key: property name, element index, or entry key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Property(Identifier),
    Element(u32),
    Entry(Value),
}

impl MemberKey {
    pub fn property(&self) -> Option<Identifier> {
        match self {
            MemberKey::Property(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, MemberKey::Property(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self, MemberKey::Element(_))
    }
}

bitflags! {
    /// Modifier set of a member declaration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MemberModifiers: u8 {
        const LOCAL = 1 << 0;
        const HIDDEN = 1 << 1;
        const FIXED = 1 << 2;
        const CONST = 1 << 3;
        const EXTERNAL = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Element,
    Entry,
    Method,
}

/// How a member's value is produced.
#[derive(Clone, Debug)]
pub enum MemberBody {
    /// A value known without evaluation.
    Constant(Value),
    /// An expression evaluated with `(receiver, owner, key)` frame bindings.
    Expr(Arc<Expr>),
    /// Amend the value this member has further up the chain.
    Amend(Arc<ObjectLiteral>),
    /// Produce the default of the declared type; fails if it has none.
    TypeDefault(TypeId),
    /// A method declaration; reading it yields a function value bound to the
    /// receiver.
    Method {
        params: Vec<Identifier>,
        body: Arc<Expr>,
    },
}

/// A member descriptor, shared across the objects that inherit it.
#[derive(Clone, Debug)]
pub struct MemberDescriptor {
    pub span: Span,
    pub header_span: Span,
    pub modifiers: MemberModifiers,
    pub kind: MemberKind,
    pub key: MemberKey,
    pub qualified_name: Option<QualifiedName>,
    /// Declared type, checked when the member value materializes.
    pub declared_type: Option<TypeId>,
    /// Loop bindings captured when the member came from a `for` generator
    /// expansion; in scope while the body runs.
    pub captured_locals: Vec<(Identifier, Value)>,
    pub body: MemberBody,
}

impl MemberDescriptor {
    pub fn new(kind: MemberKind, key: MemberKey, body: MemberBody) -> Self {
        MemberDescriptor {
            span: Span::dummy(),
            header_span: Span::dummy(),
            modifiers: MemberModifiers::empty(),
            kind,
            key,
            qualified_name: None,
            declared_type: None,
            captured_locals: Vec::new(),
            body,
        }
    }

    pub fn with_span(mut self, span: Span, header_span: Span) -> Self {
        self.span = span;
        self.header_span = header_span;
        self
    }

    pub fn with_modifiers(mut self, modifiers: MemberModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_declared_type(mut self, ty: Option<TypeId>) -> Self {
        self.declared_type = ty;
        self
    }

    pub fn is_local(&self) -> bool {
        self.modifiers.contains(MemberModifiers::LOCAL)
    }

    pub fn is_hidden(&self) -> bool {
        self.modifiers.contains(MemberModifiers::HIDDEN)
    }
}
