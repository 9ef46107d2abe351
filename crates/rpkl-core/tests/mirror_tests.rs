//! Mirror export round-trips: `from_mirror ∘ to_mirror` preserves type
//! structure up to equivalence.

mod common;

use common::*;
use rpkl_common::Span;
use rpkl_core::expr::BinaryOp;
use rpkl_core::mirror::MirrorNode;
use rpkl_core::types::{AliasInfo, AliasKind, IntWidth, Type, TypeId};
use rpkl_core::{CoreContext, Evaluator, EvaluatorOptions, Value};
use smallvec::smallvec;
use std::sync::Arc;

/// Mirror `ty`, decode the mirror, rebuild, and require equivalence.
fn round_trip(ctx: &mut CoreContext, ty: TypeId) {
    let node: MirrorNode = {
        let mut ev = Evaluator::new(ctx, EvaluatorOptions::default());
        let mirror = ev.type_mirror(ty).expect("mirror exports");
        ev.decode_mirror(&mirror).expect("mirror decodes")
    };
    let interner = Arc::clone(&ctx.interner);
    let rebuilt = ctx.types.from_mirror(&node, &interner);
    assert!(
        ctx.types.equivalent(ty, rebuilt),
        "round trip broke equivalence for {:?}",
        ctx.types.get(ty)
    );
}

#[test]
fn scalar_shapes_round_trip() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let final_string = ctx.types.add(Type::FinalClass(ctx.registry.builtins.string));
    let width = ctx.types.add(Type::IntWidth(IntWidth::UInt16));
    let module_ty = ctx.types.add(Type::Module {
        class: ctx.registry.builtins.module,
        is_final: false,
    });
    for ty in [
        TypeId::UNKNOWN,
        TypeId::NOTHING,
        TypeId::ANY,
        int_ty,
        final_string,
        width,
        module_ty,
    ] {
        round_trip(&mut ctx, ty);
    }
}

#[test]
fn container_shapes_round_trip() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let string_ty = string_type(&mut ctx);
    let nullable_int = ctx.types.add(Type::Nullable(int_ty));
    let list_ty = ctx.types.add(Type::List(nullable_int));
    let set_ty = ctx.types.add(Type::Set(string_ty));
    let map_ty = ctx.types.add(Type::Map(string_ty, list_ty));
    let listing_ty = ctx.types.add(Type::Listing(map_ty));
    let mapping_ty = ctx.types.add(Type::Mapping(string_ty, listing_ty));
    let pair_ty = ctx.types.add(Type::Pair(int_ty, string_ty));
    let collection_ty = ctx.types.add(Type::Collection(int_ty));
    let varargs_ty = ctx.types.add(Type::VarArgs(int_ty));
    for ty in [
        nullable_int,
        list_ty,
        set_ty,
        map_ty,
        listing_ty,
        mapping_ty,
        pair_ty,
        collection_ty,
        varargs_ty,
    ] {
        round_trip(&mut ctx, ty);
    }
}

#[test]
fn function_shapes_round_trip() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let fn_ty = ctx.types.add(Type::Function {
        params: vec![int_ty, int_ty],
        return_type: int_ty,
    });
    let fn_n = ctx.types.add(Type::FunctionN { arity: 3 });
    let fn_class = ctx.types.add(Type::FunctionClass);
    for ty in [fn_ty, fn_n, fn_class] {
        round_trip(&mut ctx, ty);
    }
}

#[test]
fn unions_round_trip_with_default_indices() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let string_ty = string_type(&mut ctx);
    let plain = ctx.types.add(Type::Union {
        members: smallvec![int_ty, string_ty],
        default_index: None,
    });
    let designated = ctx.types.add(Type::Union {
        members: smallvec![int_ty, string_ty],
        default_index: Some(1),
    });
    round_trip(&mut ctx, plain);
    round_trip(&mut ctx, designated);
}

#[test]
fn literal_union_exports_as_union_of_literal_mirrors() {
    let mut ctx = CoreContext::new();
    let ty = ctx.types.add(Type::StringLiteralUnion {
        literals: vec![ctx.intern("a"), ctx.intern("b"), ctx.intern("c")],
        default_index: Some(1),
    });

    let node: MirrorNode = {
        let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
        let mirror = ev.type_mirror(ty).unwrap();
        // Check the export structure directly: a union whose members are
        // string-literal mirrors.
        let id = rpkl_common::Identifier::regular(ctx.intern("kind"));
        assert_eq!(
            ev.read_property_value(&mirror, id, Span::dummy()).unwrap(),
            Value::string("Union")
        );
        ev.decode_mirror(&mirror).unwrap()
    };
    match &node {
        MirrorNode::Union {
            members,
            default_index,
        } => {
            assert_eq!(*default_index, Some(1));
            assert!(members
                .iter()
                .all(|m| matches!(m, MirrorNode::StringLiteral(_))));
        }
        other => panic!("expected a union node, got {other:?}"),
    }

    // Rebuilding yields a union of string-literal types, which is
    // semantically equivalent to the original literal-set type.
    let interner = Arc::clone(&ctx.interner);
    let rebuilt = ctx.types.from_mirror(&node, &interner);
    assert!(ctx.types.equivalent(ty, rebuilt));
    assert!(ctx.types.equivalent(rebuilt, ty));
}

#[test]
fn constrained_and_alias_shapes_round_trip() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let predicate = Arc::new(binary(BinaryOp::Gt, this(), int_lit(0)));
    let constrained = ctx.types.add(Type::Constrained {
        base: int_ty,
        predicates: vec![predicate],
    });
    round_trip(&mut ctx, constrained);

    let var = ctx.types.add(Type::TypeVariable {
        name: ctx.intern("T"),
        index: 0,
    });
    round_trip(&mut ctx, var);

    let body = ctx.types.add(Type::Listing(var));
    let alias = ctx.types.add_alias(AliasInfo {
        name: ctx.intern("Bag"),
        module: ctx.intern("test"),
        type_params: vec![ctx.intern("T")],
        body,
        kind: AliasKind::Regular,
    });
    let applied = ctx.types.alias_type(alias, vec![int_ty]);
    round_trip(&mut ctx, applied);
}

#[test]
fn value_mirrors_describe_declarations() {
    let mut ctx = CoreContext::new();
    let person = person_class(&mut ctx);
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());

    let mirror = ev.mirror_of(&Value::Class(person)).unwrap();
    let kind = rpkl_common::Identifier::regular(ctx.intern("kind"));
    let name = rpkl_common::Identifier::regular(ctx.intern("name"));
    assert_eq!(
        ev.read_property_value(&mirror, kind, Span::dummy()).unwrap(),
        Value::string("ClassDeclaration")
    );
    assert_eq!(
        ev.read_property_value(&mirror, name, Span::dummy()).unwrap(),
        Value::string("Person")
    );

    // A plain value mirrors its class.
    let mirror = ev.mirror_of(&Value::Int(3)).unwrap();
    let class_field = rpkl_common::Identifier::regular(ctx.intern("class"));
    assert_eq!(
        ev.read_property_value(&mirror, class_field, Span::dummy())
            .unwrap(),
        Value::Class(ctx.registry.builtins.int)
    );
}
