//! Engine facade: module evaluation through the loader, security checks,
//! idempotent resolution, and the exposed read/mirror surface.

mod common;

use common::*;
use indexmap::IndexMap;
use rpkl_common::Span;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_core::engine::{ModuleDecl, ModuleLoader, SecurityManager};
use rpkl_core::expr::{Expr, ExprKind};
use rpkl_core::types::Type;
use rpkl_core::{AllowAll, Engine, EvalError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A loader over a shared table of pre-lowered module declarations, with a
/// resolution counter.
#[derive(Clone, Default)]
struct TableLoader {
    modules: Rc<RefCell<IndexMap<String, ModuleDecl>>>,
    resolutions: Rc<Cell<usize>>,
}

impl ModuleLoader for TableLoader {
    fn resolve(&self, uri: &str) -> Result<ModuleDecl, EvalError> {
        self.resolutions.set(self.resolutions.get() + 1);
        self.modules.borrow().get(uri).cloned().ok_or_else(|| {
            EvalError::new(
                diagnostic_codes::MODULE_NOT_FOUND,
                vec![uri.to_string()],
                Span::dummy(),
            )
        })
    }
}

struct DenyAll;

impl SecurityManager for DenyAll {
    fn allow(&self, uri: &str) -> Result<(), EvalError> {
        Err(EvalError::new(
            diagnostic_codes::MODULE_NOT_ALLOWED,
            vec![uri.to_string()],
            Span::dummy(),
        ))
    }
}

/// Build `module app { person: Person = new Person { name = "Ada" } }`.
fn app_module(engine: &mut Engine) -> ModuleDecl {
    let ctx = engine.ctx_mut();
    let person = person_class(ctx);
    let person_ty = ctx.types.add(Type::NonFinalClass(person));
    let body = Expr::synthetic(ExprKind::Amend(
        Box::new(Expr::synthetic(ExprKind::TypeDefault(person_ty))),
        literal(vec![prop(ctx, "name", str_lit(ctx, "Ada"))]),
    ));
    let mut properties = IndexMap::new();
    let schema = property_schema(ctx, "person", person_ty, Some(body));
    properties.insert(schema.name, schema);
    ModuleDecl {
        uri: "test:app".to_string(),
        name: ctx.intern("app"),
        classes: Vec::new(),
        aliases: Vec::new(),
        properties,
        methods: IndexMap::new(),
    }
}

#[test]
fn evaluate_materializes_the_module_object() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader.clone()), Box::new(AllowAll));
    let decl = app_module(&mut engine);
    loader
        .modules
        .borrow_mut()
        .insert(decl.uri.clone(), decl);

    let mut evaluation = engine.evaluate("test:app").expect("module evaluates");
    let person = evaluation.read_property("person").expect("person reads");
    assert!(matches!(person, Value::Object(_)));

    let id = rpkl_common::Identifier::regular(evaluation.evaluator.ctx.intern("name"));
    let name = evaluation
        .evaluator
        .read_property_value(&person, id, Span::dummy())
        .unwrap();
    assert_eq!(name, Value::string("Ada"));
}

#[test]
fn type_errors_surface_at_the_module_boundary() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader.clone()), Box::new(AllowAll));
    let decl = {
        let ctx = engine.ctx_mut();
        let int_ty = int_type(ctx);
        let mut properties = IndexMap::new();
        // `port: Int = "not a number"` fails on materialization.
        let schema = property_schema(ctx, "port", int_ty, Some(str_lit(ctx, "not a number")));
        properties.insert(schema.name, schema);
        ModuleDecl {
            uri: "test:broken".to_string(),
            name: ctx.intern("broken"),
            classes: Vec::new(),
            aliases: Vec::new(),
            properties,
            methods: IndexMap::new(),
        }
    };
    loader.modules.borrow_mut().insert(decl.uri.clone(), decl);

    let error = engine.evaluate("test:broken").unwrap_err();
    assert_eq!(error.code, diagnostic_codes::TYPE_MISMATCH);
}

#[test]
fn resolution_is_idempotent_per_uri() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader.clone()), Box::new(AllowAll));
    let decl = app_module(&mut engine);
    loader
        .modules
        .borrow_mut()
        .insert(decl.uri.clone(), decl);

    engine.evaluate("test:app").expect("first evaluation");
    engine.evaluate("test:app").expect("second evaluation");
    assert_eq!(loader.resolutions.get(), 1);
}

#[test]
fn security_manager_gates_module_access() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader.clone()), Box::new(DenyAll));
    let error = engine.evaluate("test:app").unwrap_err();
    assert_eq!(error.code, diagnostic_codes::MODULE_NOT_ALLOWED);
    assert_eq!(loader.resolutions.get(), 0);
}

#[test]
fn missing_modules_report_not_found() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader), Box::new(AllowAll));
    let error = engine.evaluate("test:absent").unwrap_err();
    assert_eq!(error.code, diagnostic_codes::MODULE_NOT_FOUND);
}

#[test]
fn mirror_surface_is_reachable_from_an_evaluation() {
    let loader = TableLoader::default();
    let mut engine = Engine::new(Box::new(loader.clone()), Box::new(AllowAll));
    let decl = app_module(&mut engine);
    loader
        .modules
        .borrow_mut()
        .insert(decl.uri.clone(), decl);

    let mut evaluation = engine.evaluate("test:app").expect("module evaluates");
    let value = evaluation.value.clone();
    let mirror = evaluation.mirror_of(&value).expect("mirror exports");
    assert!(matches!(mirror, Value::Object(_)));
}
