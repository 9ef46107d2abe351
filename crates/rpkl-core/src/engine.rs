//! The evaluator facade and the interfaces to external collaborators.
//!
//! The engine owns the shared context and drives the two-phase lifecycle:
//! module declarations (produced by the external parser, fetched through the
//! `ModuleLoader`) are registered into the context, then an `Evaluator`
//! borrows the context read-only and materializes the module object.

use crate::classes::{ClassId, ClassInfo, MethodSchema, Openness, PropertySchema};
use crate::context::{CoreContext, EvaluatorOptions};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::render::Renderer;
use crate::types::AliasInfo;
use crate::value::Value;
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Atom, Span};
use rustc_hash::FxHashMap;
use tracing::debug;

/// A module's declarations, as lowered by the external parser.
#[derive(Clone, Debug)]
pub struct ModuleDecl {
    pub uri: String,
    pub name: Atom,
    pub classes: Vec<ClassInfo>,
    pub aliases: Vec<AliasInfo>,
    /// Top-level properties; they become the module class's property table.
    pub properties: IndexMap<Atom, PropertySchema>,
    pub methods: IndexMap<Atom, MethodSchema>,
}

/// Loaded resource bytes.
#[derive(Clone, Debug)]
pub enum Resource {
    Text(String),
    Bytes(Vec<u8>),
}

/// Resolves module URIs to declarations and resource URIs to contents.
/// Must be idempotent for a given URI within an evaluation.
pub trait ModuleLoader {
    fn resolve(&self, uri: &str) -> Result<ModuleDecl, EvalError>;

    fn resource(&self, uri: &str) -> Result<Resource, EvalError> {
        Err(EvalError::new(
            diagnostic_codes::MODULE_NOT_FOUND,
            vec![uri.to_string()],
            Span::dummy(),
        ))
    }
}

/// Capability check consulted before any URI is resolved.
pub trait SecurityManager {
    fn allow(&self, uri: &str) -> Result<(), EvalError>;
}

/// The permissive default.
pub struct AllowAll;

impl SecurityManager for AllowAll {
    fn allow(&self, _uri: &str) -> Result<(), EvalError> {
        Ok(())
    }
}

pub struct Engine {
    ctx: CoreContext,
    loader: Box<dyn ModuleLoader>,
    security: Box<dyn SecurityManager>,
    options: EvaluatorOptions,
    /// Module class per URI; resolution is idempotent per engine.
    registered: FxHashMap<String, ClassId>,
}

impl Engine {
    pub fn new(loader: Box<dyn ModuleLoader>, security: Box<dyn SecurityManager>) -> Self {
        Engine {
            ctx: CoreContext::new(),
            loader,
            security,
            options: EvaluatorOptions::default(),
            registered: FxHashMap::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn ctx(&self) -> &CoreContext {
        &self.ctx
    }

    /// Mutable context access for the registration phase. Embedders use
    /// this to pre-register shared library modules.
    pub fn ctx_mut(&mut self) -> &mut CoreContext {
        &mut self.ctx
    }

    /// Evaluate a module to its fully materialized top-level object.
    pub fn evaluate(&mut self, uri: &str) -> Result<Evaluation<'_>, EvalError> {
        self.security.allow(uri)?;
        let module_class = match self.registered.get(uri) {
            Some(&class) => class,
            None => {
                let decl = self.loader.resolve(uri)?;
                let class = self.register_module(decl)?;
                self.registered.insert(uri.to_string(), class);
                class
            }
        };
        let mut evaluator = Evaluator::new(&self.ctx, self.options);
        let value = evaluator.instantiate_module(module_class)?;
        debug!(uri, "module evaluated");
        Ok(Evaluation { evaluator, value })
    }

    /// Register a module's declarations: its aliases, its classes, and a
    /// module class holding the top-level properties.
    pub fn register_module(&mut self, decl: ModuleDecl) -> Result<ClassId, EvalError> {
        for alias in decl.aliases {
            self.ctx.types.add_alias(alias);
        }
        for class in decl.classes {
            self.ctx.registry.add_class(class)?;
        }
        let qualified_name = self
            .ctx
            .intern(&format!("{}#{}", decl.uri, self.ctx.resolve(decl.name)));
        let module_class = ClassInfo {
            name: decl.name,
            qualified_name,
            module: decl.name,
            type_params: Vec::new(),
            superclass: Some(self.ctx.registry.builtins.module),
            openness: Openness::Open,
            external: false,
            properties: decl.properties,
            methods: decl.methods,
        };
        self.ctx.registry.add_class(module_class)
    }
}

/// A finished (or in-flight) module evaluation: the evaluator with its heap,
/// plus the module value.
#[derive(Debug)]
pub struct Evaluation<'c> {
    pub evaluator: Evaluator<'c>,
    pub value: Value,
}

impl<'c> Evaluation<'c> {
    /// Materialize a property of the module object on demand.
    pub fn read_property(&mut self, name: &str) -> Result<Value, EvalError> {
        let id = rpkl_common::Identifier::regular(self.evaluator.ctx.intern(name));
        let value = self.value.clone();
        self.evaluator
            .read_property_value(&value, id, Span::dummy())
    }

    /// Serialize a value through a plug-in renderer.
    pub fn render(&mut self, renderer: &dyn Renderer, value: &Value) -> Result<Vec<u8>, EvalError> {
        renderer.render(&mut self.evaluator, value)
    }

    /// The reflective descriptor of a value.
    pub fn mirror_of(&mut self, value: &Value) -> Result<Value, EvalError> {
        self.evaluator.mirror_of(value)
    }
}
