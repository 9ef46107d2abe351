//! Default-value synthesis across the type algebra.

mod common;

use common::*;
use rpkl_common::Span;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_core::member::MemberKey;
use rpkl_core::types::{AliasInfo, AliasKind, Type, TypeId};
use rpkl_core::{CoreContext, Evaluator, EvaluatorOptions, FunctionBody, ObjectKind, Value};
use rpkl_common::Identifier;
use smallvec::smallvec;
use std::sync::Arc;

#[test]
fn string_literal_default_is_the_literal() {
    let mut ctx = CoreContext::new();
    let ty = ctx.types.add(Type::StringLiteral(ctx.intern("on")));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert_eq!(
        ev.default_value(ty, Span::dummy()).unwrap(),
        Value::string("on")
    );
}

#[test]
fn literal_union_default_round_trips_through_check() {
    // `"a"|"b"|*"c"|"d"` — the default is "c" and it checks successfully.
    let mut ctx = CoreContext::new();
    let ty = ctx.types.add(Type::StringLiteralUnion {
        literals: vec![
            ctx.intern("a"),
            ctx.intern("b"),
            ctx.intern("c"),
            ctx.intern("d"),
        ],
        default_index: Some(2),
    });
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let default = ev.default_value(ty, Span::dummy()).unwrap();
    assert_eq!(default, Value::string("c"));
    assert!(ev.check(ty, &default, Span::dummy()).is_ok());

    let undesignated = ctx.types.add(Type::StringLiteralUnion {
        literals: vec![ctx.intern("a")],
        default_index: None,
    });
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let error = ev.default_value(undesignated, Span::dummy()).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::NO_DEFAULT_VALUE);
}

#[test]
fn union_default_follows_the_designated_branch() {
    let mut ctx = CoreContext::new();
    let on = ctx.types.add(Type::StringLiteral(ctx.intern("on")));
    let int_ty = int_type(&mut ctx);
    let with_default = ctx.types.add(Type::Union {
        members: smallvec![int_ty, on],
        default_index: Some(1),
    });
    let without_default = ctx.types.add(Type::Union {
        members: smallvec![int_ty, on],
        default_index: None,
    });
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert_eq!(
        ev.default_value(with_default, Span::dummy()).unwrap(),
        Value::string("on")
    );
    assert!(ev.try_default(without_default, Span::dummy()).unwrap().is_none());
}

#[test]
fn containers_default_to_empty() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let string_ty = string_type(&mut ctx);
    let list_ty = ctx.types.add(Type::List(int_ty));
    let set_ty = ctx.types.add(Type::Set(int_ty));
    let map_ty = ctx.types.add(Type::Map(string_ty, int_ty));
    let collection_ty = ctx.types.add(Type::Collection(int_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert!(matches!(
        ev.default_value(list_ty, Span::dummy()).unwrap(),
        Value::List(items) if items.is_empty()
    ));
    assert!(matches!(
        ev.default_value(collection_ty, Span::dummy()).unwrap(),
        Value::List(items) if items.is_empty()
    ));
    assert!(matches!(
        ev.default_value(set_ty, Span::dummy()).unwrap(),
        Value::Set(items) if items.is_empty()
    ));
    assert!(matches!(
        ev.default_value(map_ty, Span::dummy()).unwrap(),
        Value::Map(entries) if entries.is_empty()
    ));
}

#[test]
fn nullable_default_carries_the_inner_default_as_hint() {
    let mut ctx = CoreContext::new();
    let on = ctx.types.add(Type::StringLiteral(ctx.intern("on")));
    let nullable = ctx.types.add(Type::Nullable(on));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let default = ev.default_value(nullable, Span::dummy()).unwrap();
    match &default {
        Value::Null(Some(hint)) => assert_eq!(**hint, Value::string("on")),
        other => panic!("expected null-with-default, got {other:?}"),
    }

    // Without an inner default the null carries no hint.
    let int_ty = int_type(&mut ctx);
    let nullable_int = ctx.types.add(Type::Nullable(int_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert!(matches!(
        ev.default_value(nullable_int, Span::dummy()).unwrap(),
        Value::Null(None)
    ));
}

#[test]
fn class_defaults_follow_instantiability() {
    let mut ctx = CoreContext::new();
    let person = person_class(&mut ctx);
    let person_ty = ctx.types.add(Type::NonFinalClass(person));
    let null_ty = ctx.types.add(Type::FinalClass(ctx.registry.builtins.null));
    let abstract_ty = ctx.types.add(Type::NonFinalClass(ctx.registry.builtins.typed));
    let int_class_ty = int_type(&mut ctx);
    let listing_class_ty = ctx.types.add(Type::NonFinalClass(ctx.registry.builtins.listing));
    let mapping_class_ty = ctx.types.add(Type::NonFinalClass(ctx.registry.builtins.mapping));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());

    // Instantiable class: the prototype.
    let proto = ev.default_value(person_ty, Span::dummy()).unwrap();
    let Value::Object(proto_obj) = proto else {
        panic!("expected prototype object")
    };
    assert_eq!(ev.heap.get(proto_obj).kind, ObjectKind::Typed(person));

    // Null class: null without a default.
    assert!(matches!(
        ev.default_value(null_ty, Span::dummy()).unwrap(),
        Value::Null(None)
    ));

    // Listing/mapping classes: empty containers.
    let listing = ev.default_value(listing_class_ty, Span::dummy()).unwrap();
    let Value::Object(listing_obj) = listing else {
        panic!("expected listing object")
    };
    assert_eq!(ev.heap.get(listing_obj).kind, ObjectKind::Listing);
    let mapping = ev.default_value(mapping_class_ty, Span::dummy()).unwrap();
    let Value::Object(mapping_obj) = mapping else {
        panic!("expected mapping object")
    };
    assert_eq!(ev.heap.get(mapping_obj).kind, ObjectKind::Mapping);

    // Abstract and external classes: no default.
    assert!(ev.try_default(abstract_ty, Span::dummy()).unwrap().is_none());
    assert!(ev.try_default(int_class_ty, Span::dummy()).unwrap().is_none());
}

#[test]
fn listing_default_carries_a_default_member_for_known_value_types() {
    let mut ctx = CoreContext::new();
    let person = person_class(&mut ctx);
    let person_ty = ctx.types.add(Type::NonFinalClass(person));
    let listing_person = ctx.types.add(Type::Listing(person_ty));
    let listing_unknown = ctx.types.add(Type::Listing(TypeId::UNKNOWN));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());

    let default_key = MemberKey::Property(Identifier::regular(ctx.intern("default")));

    // Known value type: hidden `default` is a zero-argument function
    // producing the element default.
    let listing = ev.default_value(listing_person, Span::dummy()).unwrap();
    let Value::Object(obj) = listing else {
        panic!("expected object")
    };
    let default_member = ev.read_member(obj, &default_key).unwrap().unwrap();
    let Value::Function(f) = &default_member else {
        panic!("expected the default member to be a function")
    };
    let produced = ev
        .call_function(f, Vec::new(), Span::dummy())
        .unwrap();
    let Value::Object(produced_obj) = produced else {
        panic!("expected element default object")
    };
    assert_eq!(ev.heap.get(produced_obj).kind, ObjectKind::Typed(person));

    // Unknown value type: no `default` member at all.
    let bare = ev.default_value(listing_unknown, Span::dummy()).unwrap();
    let Value::Object(bare_obj) = bare else {
        panic!("expected object")
    };
    assert_eq!(ev.read_member(bare_obj, &default_key).unwrap(), None);
}

#[test]
fn listing_default_defers_failure_for_defaultless_value_types() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let listing_int = ctx.types.add(Type::Listing(int_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let listing = ev.default_value(listing_int, Span::dummy()).unwrap();
    let Value::Object(obj) = listing else {
        panic!("expected object")
    };
    let default_key = MemberKey::Property(Identifier::regular(ctx.intern("default")));
    let default_member = ev.read_member(obj, &default_key).unwrap().unwrap();
    let Value::Function(f) = &default_member else {
        panic!("expected the default member to be a function")
    };
    // Int has no default; the deferred request fails at call time.
    let error = ev.call_function(f, Vec::new(), Span::dummy()).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::NO_DEFAULT_VALUE);
}

#[test]
fn mapping_default_feeds_nested_entry_amendment() {
    let mut ctx = CoreContext::new();
    let person = person_class(&mut ctx);
    let person_ty = ctx.types.add(Type::NonFinalClass(person));
    let string_ty = string_type(&mut ctx);
    let mapping_person = ctx.types.add(Type::Mapping(string_ty, person_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let empty = ev.default_value(mapping_person, Span::dummy()).unwrap();

    // `["ada"] { name = "Ada" }` — the entry amends the mapping's default.
    let nested = literal(vec![prop(&ctx, "name", str_lit(&ctx, "Ada"))]);
    let entry_member = rpkl_core::LiteralMember::new(rpkl_core::LiteralMemberKind::Entry {
        key: str_lit(&ctx, "ada"),
        body: rpkl_core::LiteralBody::Amend(nested),
    });
    let filled = ev
        .amend(&empty, &literal(vec![entry_member]), Span::dummy())
        .unwrap();
    let Value::Object(obj) = filled else {
        panic!("expected object")
    };
    let ada = ev
        .read_member(obj, &MemberKey::Entry(Value::string("ada")))
        .unwrap()
        .unwrap();
    let id = Identifier::regular(ctx.intern("name"));
    assert_eq!(
        ev.read_property_value(&ada, id, Span::dummy()).unwrap(),
        Value::string("Ada")
    );
}

#[test]
fn varargs_default_raises_internal_std_lib_class() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let varargs = ctx.types.add(Type::VarArgs(int_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    let error = ev.try_default(varargs, Span::dummy()).unwrap_err();
    assert_eq!(error.code, diagnostic_codes::INTERNAL_STD_LIB_CLASS);
}

#[test]
fn constrained_defaults_skip_the_constraints() {
    // A constraint the default itself would fail: defaults are not checked.
    let mut ctx = CoreContext::new();
    let on = ctx.types.add(Type::StringLiteral(ctx.intern("on")));
    let never = Arc::new(bool_lit(false));
    let constrained = ctx.types.add(Type::Constrained {
        base: on,
        predicates: vec![never],
    });
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert_eq!(
        ev.default_value(constrained, Span::dummy()).unwrap(),
        Value::string("on")
    );
}

#[test]
fn functions_and_widths_have_no_default() {
    let mut ctx = CoreContext::new();
    let int_ty = int_type(&mut ctx);
    let fn_ty = ctx.types.add(Type::Function {
        params: vec![int_ty],
        return_type: int_ty,
    });
    let width = ctx.types.add(Type::IntWidth(rpkl_core::IntWidth::UInt8));
    let pair = ctx.types.add(Type::Pair(int_ty, int_ty));
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    for ty in [TypeId::UNKNOWN, TypeId::NOTHING, TypeId::ANY, fn_ty, width, pair] {
        assert!(ev.try_default(ty, Span::dummy()).unwrap().is_none());
    }
}

#[test]
fn mixin_alias_defaults_to_the_identity_function() {
    let mut ctx = CoreContext::new();
    let var = ctx.types.add(Type::TypeVariable {
        name: ctx.intern("T"),
        index: 0,
    });
    let body = ctx.types.add(Type::Function {
        params: vec![var],
        return_type: var,
    });
    let mixin = ctx.types.add_alias(AliasInfo {
        name: ctx.intern("Mixin"),
        module: ctx.intern("base"),
        type_params: vec![ctx.intern("T")],
        body,
        kind: AliasKind::Mixin,
    });
    let int_ty = int_type(&mut ctx);
    let bare = ctx.types.alias_type(mixin, vec![]);
    let captured = ctx.types.alias_type(mixin, vec![int_ty]);

    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    for (ty, expected_capture) in [(bare, None), (captured, Some(int_ty))] {
        let default = ev.default_value(ty, Span::dummy()).unwrap();
        let Value::Function(f) = &default else {
            panic!("expected the identity mixin function")
        };
        match &f.body {
            FunctionBody::IdentityMixin(capture) => assert_eq!(*capture, expected_capture),
            other => panic!("expected identity mixin body, got {other:?}"),
        }
        // Both pathways behave identically when applied.
        let result = ev
            .call_function(f, vec![Value::Int(42)], Span::dummy())
            .unwrap();
        assert_eq!(result, Value::Int(42));
        // And the mixin checks against its aliased function type.
        assert!(ev.check(ty, &default, Span::dummy()).is_ok());
    }
}

#[test]
fn regular_alias_delegates_default_to_its_body() {
    let mut ctx = CoreContext::new();
    let on = ctx.types.add(Type::StringLiteral(ctx.intern("on")));
    let alias = ctx.types.add_alias(AliasInfo {
        name: ctx.intern("Switch"),
        module: ctx.intern("test"),
        type_params: vec![],
        body: on,
        kind: AliasKind::Regular,
    });
    let applied = ctx.types.alias_type(alias, vec![]);
    let mut ev = Evaluator::new(&ctx, EvaluatorOptions::default());
    assert_eq!(
        ev.default_value(applied, Span::dummy()).unwrap(),
        Value::string("on")
    );
}
