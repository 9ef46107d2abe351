//! Member cache semantics: one-shot memoization, access-order evaluation,
//! cycle detection, and structural equality through materialization.

mod common;

use common::*;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, Span};
use rpkl_core::expr::BinaryOp;
use rpkl_core::member::MemberKey;
use rpkl_core::types::{Type, TypeId};
use rpkl_core::{CoreContext, Evaluator, EvaluatorOptions, Value};
use std::rc::Rc;

fn key(ctx: &CoreContext, name: &str) -> MemberKey {
    MemberKey::Property(Identifier::regular(ctx.intern(name)))
}

#[test]
fn repeated_reads_return_the_cached_value() {
    let mut ctx = CoreContext::new();
    let dynamic = ctx.registry.builtins.dynamic;
    let dynamic_ty = ctx.types.add(Type::NonFinalClass(dynamic));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let base = ev.default_value(dynamic_ty, Span::dummy()).unwrap();
    // `greeting = "hi" + "!"` builds a fresh string on evaluation; a second
    // read must return the same allocation, proving the body ran once.
    let value = ev
        .amend(
            &base,
            &literal(vec![prop(
                &ctx,
                "greeting",
                binary(BinaryOp::Add, str_lit(&ctx, "hi"), str_lit(&ctx, "!")),
            )]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(obj) = value else {
        panic!("expected object")
    };
    let first = ev.read_member(obj, &key(&ctx, "greeting")).unwrap().unwrap();
    let second = ev.read_member(obj, &key(&ctx, "greeting")).unwrap().unwrap();
    assert_eq!(first, Value::string("hi!"));
    match (&first, &second) {
        (Value::Str(a), Value::Str(b)) => assert!(Rc::ptr_eq(a, b)),
        _ => panic!("expected strings"),
    }
}

#[test]
fn members_evaluate_lazily_in_access_order() {
    let mut ctx = CoreContext::new();
    let dynamic = ctx.registry.builtins.dynamic;
    let dynamic_ty = ctx.types.add(Type::NonFinalClass(dynamic));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let base = ev.default_value(dynamic_ty, Span::dummy()).unwrap();
    // `bad` raises when forced; `good` must still be readable.
    let value = ev
        .amend(
            &base,
            &literal(vec![
                prop(&ctx, "bad", common::read(&ctx, "missing")),
                prop(&ctx, "good", int_lit(7)),
            ]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(obj) = value else {
        panic!("expected object")
    };
    assert_eq!(
        ev.read_member(obj, &key(&ctx, "good")).unwrap(),
        Some(Value::Int(7))
    );
    let error = ev.read_member(obj, &key(&ctx, "bad")).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::UNDEFINED_NAME);
}

#[test]
fn cyclic_properties_are_detected() {
    let mut ctx = CoreContext::new();
    let dynamic = ctx.registry.builtins.dynamic;
    let dynamic_ty = ctx.types.add(Type::NonFinalClass(dynamic));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let base = ev.default_value(dynamic_ty, Span::dummy()).unwrap();
    // `x = y; y = x`
    let value = ev
        .amend(
            &base,
            &literal(vec![
                prop(&ctx, "x", common::read(&ctx, "y")),
                prop(&ctx, "y", common::read(&ctx, "x")),
            ]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(obj) = value else {
        panic!("expected object")
    };
    let error = ev.read_member(obj, &key(&ctx, "x")).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::CYCLIC_PROPERTY_REFERENCE);

    // The in-progress marker is cleared; unrelated members still evaluate.
    let value = ev
        .amend(
            &Value::Object(obj),
            &literal(vec![prop(&ctx, "z", int_lit(1))]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(child) = value else {
        panic!("expected object")
    };
    assert_eq!(
        ev.read_member(child, &key(&ctx, "z")).unwrap(),
        Some(Value::Int(1))
    );
}

#[test]
fn self_referential_member_is_cyclic_even_through_this() {
    let mut ctx = CoreContext::new();
    let dynamic = ctx.registry.builtins.dynamic;
    let dynamic_ty = ctx.types.add(Type::NonFinalClass(dynamic));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let base = ev.default_value(dynamic_ty, Span::dummy()).unwrap();
    let value = ev
        .amend(
            &base,
            &literal(vec![prop(
                &ctx,
                "x",
                binary(BinaryOp::Add, common::read(&ctx, "x"), int_lit(1)),
            )]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(obj) = value else {
        panic!("expected object")
    };
    let error = ev.read_member(obj, &key(&ctx, "x")).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::CYCLIC_PROPERTY_REFERENCE);
}

#[test]
fn member_bodies_see_the_amending_receiver() {
    // Late binding: the parent's `derived` body reads `base` from the child.
    let mut ctx = CoreContext::new();
    let dynamic = ctx.registry.builtins.dynamic;
    let dynamic_ty = ctx.types.add(Type::NonFinalClass(dynamic));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let root = ev.default_value(dynamic_ty, Span::dummy()).unwrap();
    let parent = ev
        .amend(
            &root,
            &literal(vec![
                prop(&ctx, "base", int_lit(1)),
                prop(
                    &ctx,
                    "derived",
                    binary(BinaryOp::Mul, common::read(&ctx, "base"), int_lit(10)),
                ),
            ]),
            Span::dummy(),
        )
        .unwrap();
    let child = ev
        .amend(
            &parent,
            &literal(vec![prop(&ctx, "base", int_lit(5))]),
            Span::dummy(),
        )
        .unwrap();
    let Value::Object(parent_obj) = parent else {
        panic!("expected object")
    };
    let Value::Object(child_obj) = child else {
        panic!("expected object")
    };
    assert_eq!(
        ev.read_member(parent_obj, &key(&ctx, "derived")).unwrap(),
        Some(Value::Int(10))
    );
    assert_eq!(
        ev.read_member(child_obj, &key(&ctx, "derived")).unwrap(),
        Some(Value::Int(50))
    );
}

#[test]
fn structural_equality_materializes_members() {
    let mut ctx = CoreContext::new();
    let person = person_class(&mut ctx);
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let a = ev
        .amend(
            &Value::Class(person),
            &literal(vec![prop(&ctx, "name", str_lit(&ctx, "Ada"))]),
            Span::dummy(),
        )
        .unwrap();
    let b = ev
        .amend(
            &Value::Class(person),
            &literal(vec![
                prop(&ctx, "name", str_lit(&ctx, "Ada")),
                prop(&ctx, "age", int_lit(0)),
            ]),
            Span::dummy(),
        )
        .unwrap();
    let c = ev
        .amend(
            &Value::Class(person),
            &literal(vec![prop(&ctx, "name", str_lit(&ctx, "Grace"))]),
            Span::dummy(),
        )
        .unwrap();
    assert!(ev.value_equals(&a, &b).unwrap());
    assert!(!ev.value_equals(&a, &c).unwrap());
}

#[test]
fn listing_equality_is_elementwise_in_order() {
    let mut ctx = CoreContext::new();
    let listing_unknown = ctx.types.add(Type::Listing(TypeId::UNKNOWN));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let empty = ev.default_value(listing_unknown, Span::dummy()).unwrap();
    let a = ev
        .amend(
            &empty,
            &literal(vec![elem(int_lit(1)), elem(int_lit(2))]),
            Span::dummy(),
        )
        .unwrap();
    let b = ev
        .amend(
            &empty,
            &literal(vec![elem(int_lit(1)), elem(int_lit(2))]),
            Span::dummy(),
        )
        .unwrap();
    let c = ev
        .amend(
            &empty,
            &literal(vec![elem(int_lit(2)), elem(int_lit(1))]),
            Span::dummy(),
        )
        .unwrap();
    assert!(ev.value_equals(&a, &b).unwrap());
    assert!(!ev.value_equals(&a, &c).unwrap());
}
