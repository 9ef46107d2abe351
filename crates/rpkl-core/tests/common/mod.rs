//! Shared helpers for the integration suites: expression builders, literal
//! builders, and a canonical `Person` class.

#![allow(dead_code)]

use rpkl_common::{Identifier, Span};
use rpkl_core::classes::{ClassInfo, Openness, PropertySchema};
use rpkl_core::expr::{
    BinaryOp, Expr, ExprKind, LiteralBody, LiteralMember, LiteralMemberKind, ObjectLiteral,
};
use rpkl_core::member::MemberModifiers;
use rpkl_core::types::{Type, TypeId};
use rpkl_core::{ClassId, CoreContext};
use indexmap::IndexMap;
use std::sync::Arc;

pub fn ident(ctx: &CoreContext, name: &str) -> Identifier {
    Identifier::regular(ctx.intern(name))
}

pub fn int_lit(i: i64) -> Expr {
    Expr::synthetic(ExprKind::Int(i))
}

pub fn str_lit(ctx: &CoreContext, s: &str) -> Expr {
    Expr::synthetic(ExprKind::Str(ctx.intern(s)))
}

pub fn bool_lit(b: bool) -> Expr {
    Expr::synthetic(ExprKind::Bool(b))
}

pub fn this() -> Expr {
    Expr::synthetic(ExprKind::This)
}

pub fn read(ctx: &CoreContext, name: &str) -> Expr {
    Expr::synthetic(ExprKind::Read(ident(ctx, name)))
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::synthetic(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
}

pub fn literal(members: Vec<LiteralMember>) -> Arc<ObjectLiteral> {
    Arc::new(ObjectLiteral::new(Span::dummy(), members))
}

pub fn prop(ctx: &CoreContext, name: &str, body: Expr) -> LiteralMember {
    LiteralMember::new(LiteralMemberKind::Property {
        name: ident(ctx, name),
        modifiers: MemberModifiers::empty(),
        ty: None,
        body: LiteralBody::Expr(Arc::new(body)),
    })
}

pub fn prop_amend(
    ctx: &CoreContext,
    name: &str,
    nested: Arc<ObjectLiteral>,
) -> LiteralMember {
    LiteralMember::new(LiteralMemberKind::Property {
        name: ident(ctx, name),
        modifiers: MemberModifiers::empty(),
        ty: None,
        body: LiteralBody::Amend(nested),
    })
}

pub fn elem(body: Expr) -> LiteralMember {
    LiteralMember::new(LiteralMemberKind::Element {
        body: LiteralBody::Expr(Arc::new(body)),
    })
}

pub fn elem_at(body: Expr, span: Span) -> LiteralMember {
    LiteralMember::new(LiteralMemberKind::Element {
        body: LiteralBody::Expr(Arc::new(body)),
    })
    .with_span(span, span)
}

pub fn entry(key: Expr, body: Expr) -> LiteralMember {
    LiteralMember::new(LiteralMemberKind::Entry {
        key,
        body: LiteralBody::Expr(Arc::new(body)),
    })
}

pub fn string_type(ctx: &mut CoreContext) -> TypeId {
    let string = ctx.registry.builtins.string;
    ctx.types.add(Type::NonFinalClass(string))
}

pub fn int_type(ctx: &mut CoreContext) -> TypeId {
    let int = ctx.registry.builtins.int;
    ctx.types.add(Type::NonFinalClass(int))
}

pub fn boolean_type(ctx: &mut CoreContext) -> TypeId {
    let boolean = ctx.registry.builtins.boolean;
    ctx.types.add(Type::NonFinalClass(boolean))
}

pub fn property_schema(
    ctx: &CoreContext,
    name: &str,
    ty: TypeId,
    body: Option<Expr>,
) -> PropertySchema {
    PropertySchema {
        name: ctx.intern(name),
        ty,
        modifiers: MemberModifiers::empty(),
        body: body.map(|expr| LiteralBody::Expr(Arc::new(expr))),
        span: Span::dummy(),
        header_span: Span::dummy(),
    }
}

pub fn class_decl(
    ctx: &CoreContext,
    name: &str,
    superclass: ClassId,
    properties: Vec<PropertySchema>,
) -> ClassInfo {
    let mut table = IndexMap::new();
    for schema in properties {
        table.insert(schema.name, schema);
    }
    ClassInfo {
        name: ctx.intern(name),
        qualified_name: ctx.intern(&format!("test#{name}")),
        module: ctx.intern("test"),
        type_params: Vec::new(),
        superclass: Some(superclass),
        openness: Openness::Closed,
        external: false,
        properties: table,
        methods: IndexMap::new(),
    }
}

/// `class Person { name: String; age: Int = 0 }`
pub fn person_class(ctx: &mut CoreContext) -> ClassId {
    let string_ty = string_type(ctx);
    let int_ty = int_type(ctx);
    let typed = ctx.registry.builtins.typed;
    let decl = class_decl(
        ctx,
        "Person",
        typed,
        vec![
            property_schema(ctx, "name", string_ty, None),
            property_schema(ctx, "age", int_ty, Some(int_lit(0))),
        ],
    );
    ctx.registry.add_class(decl).expect("Person registers")
}
