//! Shared evaluation context.
//!
//! The context holds everything built during the initialization phase and
//! immutable afterwards: the interner, the class registry, and the type
//! store. Evaluations borrow it read-only, so any number of them can run in
//! parallel threads over one context.

use crate::classes::ClassRegistry;
use crate::types::{TypeId, TypeStore};
use rpkl_common::{Atom, ShardedInterner};
use std::sync::Arc;

#[derive(Debug)]
pub struct CoreContext {
    pub interner: Arc<ShardedInterner>,
    pub registry: ClassRegistry,
    pub types: TypeStore,
}

impl CoreContext {
    pub fn new() -> Self {
        let interner = Arc::new(ShardedInterner::new());
        let registry = ClassRegistry::bootstrap(Arc::clone(&interner));
        CoreContext {
            interner,
            registry,
            types: TypeStore::new(),
        }
    }

    pub fn intern(&self, text: &str) -> Atom {
        self.interner.intern(text)
    }

    pub fn resolve(&self, atom: Atom) -> String {
        self.interner.resolve(atom)
    }

    /// Render a type the way it reads in source.
    pub fn display_type(&self, ty: TypeId) -> String {
        let interner = Arc::clone(&self.interner);
        self.types
            .display(ty, &self.registry, &move |atom| interner.resolve(atom))
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        CoreContext::new()
    }
}

/// Per-evaluation tunables.
#[derive(Clone, Copy, Debug)]
pub struct EvaluatorOptions {
    /// Column budget for values embedded in diagnostic messages.
    pub max_message_width: usize,
    /// Recursion limit across member bodies and function calls.
    pub max_call_depth: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            max_message_width: 80,
            max_call_depth: 512,
        }
    }
}
