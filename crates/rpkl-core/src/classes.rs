//! Class descriptors and the class registry.
//!
//! Classes live in an append-only registry indexed by `ClassId`, built once
//! per module load and immutable during evaluation. Values refer to their
//! class by id; prototypes are per-evaluation heap objects, instantiated
//! lazily by the evaluator on first use (see `default.rs`).

use crate::expr::LiteralBody;
use crate::member::MemberModifiers;
use crate::object::{Heap, ObjectKind};
use crate::types::TypeId;
use crate::value::Value;
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Atom, Identifier, ShardedInterner, Span};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::EvalError;

/// Index of a class in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ClassId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Openness {
    Closed,
    Open,
    Abstract,
}

/// A property declaration in a class body.
#[derive(Clone, Debug)]
pub struct PropertySchema {
    pub name: Atom,
    pub ty: TypeId,
    pub modifiers: MemberModifiers,
    /// `None` requests the declared type's default on first read.
    pub body: Option<LiteralBody>,
    pub span: Span,
    pub header_span: Span,
}

/// A method declaration in a class body.
#[derive(Clone, Debug)]
pub struct MethodSchema {
    pub name: Atom,
    pub params: Vec<Identifier>,
    pub body: std::sync::Arc<crate::expr::Expr>,
    pub modifiers: MemberModifiers,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: Atom,
    pub qualified_name: Atom,
    pub module: Atom,
    pub type_params: Vec<Atom>,
    pub superclass: Option<ClassId>,
    pub openness: Openness,
    /// Built-in classes backed by scalar or opaque representations; they
    /// have no instantiable prototype.
    pub external: bool,
    pub properties: IndexMap<Atom, PropertySchema>,
    pub methods: IndexMap<Atom, MethodSchema>,
}

/// Ids of the classes every evaluation depends on. Seeded by
/// `ClassRegistry::bootstrap` before any module is registered.
#[derive(Clone, Copy, Debug)]
pub struct Builtins {
    pub any: ClassId,
    pub object: ClassId,
    pub typed: ClassId,
    pub module: ClassId,
    pub dynamic: ClassId,
    pub listing: ClassId,
    pub mapping: ClassId,
    pub null: ClassId,
    pub string: ClassId,
    pub boolean: ClassId,
    pub number: ClassId,
    pub int: ClassId,
    pub float: ClassId,
    pub duration: ClassId,
    pub data_size: ClassId,
    pub collection: ClassId,
    pub list: ClassId,
    pub set: ClassId,
    pub map: ClassId,
    pub pair: ClassId,
    pub regex: ClassId,
    pub int_seq: ClassId,
    pub class: ClassId,
    pub type_alias: ClassId,
    pub function: ClassId,
}

#[derive(Debug)]
pub struct ClassRegistry {
    interner: Arc<ShardedInterner>,
    classes: Vec<ClassInfo>,
    by_qualified_name: FxHashMap<Atom, ClassId>,
    pub builtins: Builtins,
}

impl ClassRegistry {
    /// Build a registry seeded with the base class hierarchy.
    pub fn bootstrap(interner: Arc<ShardedInterner>) -> Self {
        let mut classes = Vec::new();
        let mut by_qualified_name = FxHashMap::default();
        let base_module = interner.intern("base");

        let add = |classes: &mut Vec<ClassInfo>,
                   by_name: &mut FxHashMap<Atom, ClassId>,
                   name: &str,
                   superclass: Option<ClassId>,
                   openness: Openness,
                   external: bool| {
            let id = ClassId(classes.len() as u32);
            let atom = interner.intern(name);
            let qualified = interner.intern(&format!("base#{name}"));
            classes.push(ClassInfo {
                name: atom,
                qualified_name: qualified,
                module: base_module,
                type_params: Vec::new(),
                superclass,
                openness,
                external,
                properties: IndexMap::new(),
                methods: IndexMap::new(),
            });
            by_name.insert(qualified, id);
            id
        };

        let any = add(&mut classes, &mut by_qualified_name, "Any", None, Openness::Abstract, true);
        let object = add(&mut classes, &mut by_qualified_name, "Object", Some(any), Openness::Abstract, true);
        let typed = add(&mut classes, &mut by_qualified_name, "Typed", Some(object), Openness::Abstract, false);
        let module = add(&mut classes, &mut by_qualified_name, "Module", Some(typed), Openness::Open, false);
        let dynamic = add(&mut classes, &mut by_qualified_name, "Dynamic", Some(object), Openness::Closed, false);
        let listing = add(&mut classes, &mut by_qualified_name, "Listing", Some(object), Openness::Closed, false);
        let mapping = add(&mut classes, &mut by_qualified_name, "Mapping", Some(object), Openness::Closed, false);
        let null = add(&mut classes, &mut by_qualified_name, "Null", Some(any), Openness::Closed, true);
        let string = add(&mut classes, &mut by_qualified_name, "String", Some(any), Openness::Closed, true);
        let boolean = add(&mut classes, &mut by_qualified_name, "Boolean", Some(any), Openness::Closed, true);
        let number = add(&mut classes, &mut by_qualified_name, "Number", Some(any), Openness::Abstract, true);
        let int = add(&mut classes, &mut by_qualified_name, "Int", Some(number), Openness::Closed, true);
        let float = add(&mut classes, &mut by_qualified_name, "Float", Some(number), Openness::Closed, true);
        let duration = add(&mut classes, &mut by_qualified_name, "Duration", Some(any), Openness::Closed, true);
        let data_size = add(&mut classes, &mut by_qualified_name, "DataSize", Some(any), Openness::Closed, true);
        let collection = add(&mut classes, &mut by_qualified_name, "Collection", Some(any), Openness::Abstract, true);
        let list = add(&mut classes, &mut by_qualified_name, "List", Some(collection), Openness::Closed, true);
        let set = add(&mut classes, &mut by_qualified_name, "Set", Some(collection), Openness::Closed, true);
        let map = add(&mut classes, &mut by_qualified_name, "Map", Some(any), Openness::Closed, true);
        let pair = add(&mut classes, &mut by_qualified_name, "Pair", Some(any), Openness::Closed, true);
        let regex = add(&mut classes, &mut by_qualified_name, "Regex", Some(any), Openness::Closed, true);
        let int_seq = add(&mut classes, &mut by_qualified_name, "IntSeq", Some(any), Openness::Closed, true);
        let class = add(&mut classes, &mut by_qualified_name, "Class", Some(any), Openness::Closed, true);
        let type_alias = add(&mut classes, &mut by_qualified_name, "TypeAlias", Some(any), Openness::Closed, true);
        let function = add(&mut classes, &mut by_qualified_name, "Function", Some(any), Openness::Closed, true);

        ClassRegistry {
            interner,
            classes,
            by_qualified_name,
            builtins: Builtins {
                any,
                object,
                typed,
                module,
                dynamic,
                listing,
                mapping,
                null,
                string,
                boolean,
                number,
                int,
                float,
                duration,
                data_size,
                collection,
                list,
                set,
                map,
                pair,
                regex,
                int_seq,
                class,
                type_alias,
                function,
            },
        }
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    pub fn resolve(&self, atom: Atom) -> String {
        self.interner.resolve(atom)
    }

    pub fn class_name(&self, id: ClassId) -> String {
        self.resolve(self.class(id).name)
    }

    pub fn lookup(&self, qualified_name: Atom) -> Option<ClassId> {
        self.by_qualified_name.get(&qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Register a user class. Fails when a declared property overrides a
    /// `const` property of an ancestor.
    pub fn add_class(&mut self, info: ClassInfo) -> Result<ClassId, EvalError> {
        if let Some(superclass) = info.superclass {
            for (name, schema) in &info.properties {
                if let Some((_, inherited)) = self.property_of(superclass, *name) {
                    if inherited.modifiers.contains(MemberModifiers::CONST) {
                        return Err(EvalError::new(
                            diagnostic_codes::CANNOT_ASSIGN_CONST_PROPERTY,
                            vec![self.resolve(*name)],
                            schema.header_span,
                        ));
                    }
                }
            }
        }
        let id = ClassId(self.classes.len() as u32);
        self.by_qualified_name.insert(info.qualified_name, id);
        self.classes.push(info);
        Ok(id)
    }

    /// Reflexive, transitive subclass test.
    pub fn is_subclass(&self, c: ClassId, d: ClassId) -> bool {
        let mut cur = Some(c);
        while let Some(id) = cur {
            if id == d {
                return true;
            }
            cur = self.class(id).superclass;
        }
        false
    }

    /// Find a property declaration on `c` or an ancestor, together with the
    /// declaring class.
    pub fn property_of(&self, c: ClassId, name: Atom) -> Option<(ClassId, &PropertySchema)> {
        let mut cur = Some(c);
        while let Some(id) = cur {
            if let Some(schema) = self.class(id).properties.get(&name) {
                return Some((id, schema));
            }
            cur = self.class(id).superclass;
        }
        None
    }

    pub fn method_of(&self, c: ClassId, name: Atom) -> Option<(ClassId, &MethodSchema)> {
        let mut cur = Some(c);
        while let Some(id) = cur {
            if let Some(schema) = self.class(id).methods.get(&name) {
                return Some((id, schema));
            }
            cur = self.class(id).superclass;
        }
        None
    }

    // -------------------------------------------------------------------------
    // Membership predicates used by the amendment engine
    // -------------------------------------------------------------------------

    pub fn is_listing_class(&self, c: ClassId) -> bool {
        self.is_subclass(c, self.builtins.listing)
    }

    pub fn is_mapping_class(&self, c: ClassId) -> bool {
        self.is_subclass(c, self.builtins.mapping)
    }

    pub fn is_dynamic_class(&self, c: ClassId) -> bool {
        self.is_subclass(c, self.builtins.dynamic)
    }

    pub fn is_collection_class(&self, c: ClassId) -> bool {
        self.is_subclass(c, self.builtins.collection)
    }

    pub fn is_null_class(&self, c: ClassId) -> bool {
        c == self.builtins.null
    }

    pub fn is_function_class(&self, c: ClassId) -> bool {
        self.is_subclass(c, self.builtins.function)
    }

    /// Whether the class has a prototype that can serve as a default value.
    pub fn instantiable(&self, c: ClassId) -> bool {
        let info = self.class(c);
        info.openness != Openness::Abstract && !info.external
    }

    /// The prototype's object kind for an instantiable class.
    pub fn prototype_kind(&self, c: ClassId) -> ObjectKind {
        if self.is_listing_class(c) {
            ObjectKind::Listing
        } else if self.is_mapping_class(c) {
            ObjectKind::Mapping
        } else if self.is_dynamic_class(c) {
            ObjectKind::Dynamic
        } else {
            ObjectKind::Typed(c)
        }
    }

    /// The class of a runtime value.
    pub fn class_of(&self, value: &Value, heap: &Heap) -> ClassId {
        let b = &self.builtins;
        match value {
            Value::Bool(_) => b.boolean,
            Value::Int(_) => b.int,
            Value::Float(_) => b.float,
            Value::Str(_) => b.string,
            Value::Null(_) => b.null,
            Value::Duration(_) => b.duration,
            Value::DataSize(_) => b.data_size,
            Value::Pair(_) => b.pair,
            Value::Regex(_) => b.regex,
            Value::IntSeq(_) => b.int_seq,
            Value::List(_) => b.list,
            Value::Set(_) => b.set,
            Value::Map(_) => b.map,
            Value::Object(id) => match heap.get(*id).kind {
                ObjectKind::Typed(c) => c,
                ObjectKind::Dynamic => b.dynamic,
                ObjectKind::Listing => b.listing,
                ObjectKind::Mapping => b.mapping,
            },
            Value::Function(_) => b.function,
            Value::Class(_) => b.class,
            Value::TypeAlias(_) => b.type_alias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subclassing_is_reflexive_and_transitive() {
        let interner = Arc::new(ShardedInterner::new());
        let registry = ClassRegistry::bootstrap(interner);
        let b = registry.builtins;
        assert!(registry.is_subclass(b.int, b.int));
        assert!(registry.is_subclass(b.int, b.number));
        assert!(registry.is_subclass(b.int, b.any));
        assert!(!registry.is_subclass(b.number, b.int));
        assert!(registry.is_subclass(b.module, b.object));
    }

    #[test]
    fn builtin_membership_predicates() {
        let interner = Arc::new(ShardedInterner::new());
        let registry = ClassRegistry::bootstrap(interner);
        let b = registry.builtins;
        assert!(registry.is_listing_class(b.listing));
        assert!(!registry.is_listing_class(b.mapping));
        assert!(registry.is_collection_class(b.list));
        assert!(registry.is_null_class(b.null));
        assert!(!registry.instantiable(b.typed));
        assert!(registry.instantiable(b.dynamic));
    }
}
