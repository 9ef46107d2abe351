//! Type descriptors.
//!
//! Types form a closed sum stored in an append-only `TypeStore` indexed by
//! `TypeId`. The store is populated while module declarations are
//! registered and is read-only during evaluation, so it can be shared by
//! concurrent evaluations.
//!
//! Every shape answers three questions: is the check provably a no-op
//! (`skip_checks`), what is the default value (see `default.rs`), and what
//! does the reflective mirror look like (see `mirror.rs`).

use crate::classes::{ClassId, ClassRegistry};
use crate::expr::Expr;
use rpkl_common::Atom;
use smallvec::SmallVec;
use std::sync::Arc;

/// Unique identifier for a type descriptor in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const UNKNOWN: TypeId = TypeId(0);
    pub const NOTHING: TypeId = TypeId(1);
    pub const ANY: TypeId = TypeId(2);
}

/// Unique identifier for a registered type alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct AliasId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasKind {
    Regular,
    /// The designated `Mixin<T>` alias; its default is the identity-mixin
    /// function rather than the default of the aliased function type.
    Mixin,
}

#[derive(Clone, Debug)]
pub struct AliasInfo {
    pub name: Atom,
    pub module: Atom,
    pub type_params: Vec<Atom>,
    /// The alias body, with `TypeVariable` placeholders for the parameters.
    pub body: TypeId,
    pub kind: AliasKind,
}

/// Fixed-width integer refinements of `Int`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    UInt,
}

impl IntWidth {
    pub fn name(&self) -> &'static str {
        match self {
            IntWidth::Int8 => "Int8",
            IntWidth::Int16 => "Int16",
            IntWidth::Int32 => "Int32",
            IntWidth::UInt8 => "UInt8",
            IntWidth::UInt16 => "UInt16",
            IntWidth::UInt32 => "UInt32",
            IntWidth::UInt => "UInt",
        }
    }

    /// Narrowing equality: the value survives a round-trip through the
    /// width's bit mask.
    pub fn accepts(&self, value: i64) -> bool {
        match self {
            IntWidth::Int8 => value == (value as i8) as i64,
            IntWidth::Int16 => value == (value as i16) as i64,
            IntWidth::Int32 => value == (value as i32) as i64,
            IntWidth::UInt8 => value == (value as u8) as i64,
            IntWidth::UInt16 => value == (value as u16) as i64,
            IntWidth::UInt32 => value == (value as u32) as i64,
            IntWidth::UInt => value >= 0,
        }
    }
}

/// The closed sum of type shapes.
#[derive(Clone, Debug)]
pub enum Type {
    /// Accepts any value; the declared-but-unconstrained type.
    Unknown,
    /// Accepts no value.
    Nothing,
    /// Accepts any value.
    Any,
    /// Accepts instances of the module's class (exactly, or any descendant
    /// when the module is open for amending).
    Module { class: ClassId, is_final: bool },
    /// Accepts exactly the string `s`.
    StringLiteral(Atom),
    /// Accepts any of the literals; one may be designated the default.
    StringLiteralUnion {
        literals: Vec<Atom>,
        default_index: Option<usize>,
    },
    /// Accepts values whose class is exactly `C`.
    FinalClass(ClassId),
    /// Accepts values whose class is `C` or descends from `C`.
    NonFinalClass(ClassId),
    /// Accepts `null` or values matching the inner type.
    Nullable(TypeId),
    /// Accepts values matching any member, tried in declaration order.
    Union {
        members: SmallVec<[TypeId; 4]>,
        default_index: Option<usize>,
    },
    Collection(TypeId),
    List(TypeId),
    Set(TypeId),
    Map(TypeId, TypeId),
    Listing(TypeId),
    Mapping(TypeId, TypeId),
    /// Full function type; arguments are erased at runtime, only arity is
    /// checked.
    Function {
        params: Vec<TypeId>,
        return_type: TypeId,
    },
    /// `FunctionN` class reference: arity alone.
    FunctionN { arity: u8 },
    /// The bare `Function` class: any function.
    FunctionClass,
    Pair(TypeId, TypeId),
    /// Internal to method signatures; never instantiable.
    VarArgs(TypeId),
    /// A class or alias type parameter; a no-op at runtime.
    TypeVariable { name: Atom, index: u32 },
    /// Fixed-width integer refinement.
    IntWidth(IntWidth),
    /// An alias applied to arguments, delegating to the instantiated body.
    Alias {
        alias: AliasId,
        args: Vec<TypeId>,
        instantiated: TypeId,
    },
    /// Accepts when the base accepts and every predicate holds.
    Constrained {
        base: TypeId,
        predicates: Vec<Arc<Expr>>,
    },
}

// =============================================================================
// Type store
// =============================================================================

#[derive(Debug)]
pub struct TypeStore {
    types: Vec<Type>,
    skip: Vec<bool>,
    aliases: Vec<AliasInfo>,
    mixin_alias: Option<AliasId>,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = TypeStore {
            types: Vec::new(),
            skip: Vec::new(),
            aliases: Vec::new(),
            mixin_alias: None,
        };
        let unknown = store.add(Type::Unknown);
        let nothing = store.add(Type::Nothing);
        let any = store.add(Type::Any);
        debug_assert_eq!(unknown, TypeId::UNKNOWN);
        debug_assert_eq!(nothing, TypeId::NOTHING);
        debug_assert_eq!(any, TypeId::ANY);
        store
    }

    pub fn add(&mut self, ty: Type) -> TypeId {
        let skip = self.compute_skip(&ty);
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.skip.push(skip);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// True iff checking this type is provably a no-op.
    pub fn skip_checks(&self, id: TypeId) -> bool {
        self.skip[id.0 as usize]
    }

    fn compute_skip(&self, ty: &Type) -> bool {
        match ty {
            Type::Unknown | Type::Any | Type::TypeVariable { .. } => true,
            Type::Union { members, .. } => members.iter().all(|m| self.skip_checks(*m)),
            Type::Alias { instantiated, .. } => self.skip_checks(*instantiated),
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Aliases
    // -------------------------------------------------------------------------

    pub fn add_alias(&mut self, info: AliasInfo) -> AliasId {
        let id = AliasId(self.aliases.len() as u32);
        if info.kind == AliasKind::Mixin {
            self.mixin_alias = Some(id);
        }
        self.aliases.push(info);
        id
    }

    pub fn alias(&self, id: AliasId) -> &AliasInfo {
        &self.aliases[id.0 as usize]
    }

    pub fn mixin_alias(&self) -> Option<AliasId> {
        self.mixin_alias
    }

    /// Apply an alias to type arguments, instantiating its body.
    pub fn alias_type(&mut self, alias: AliasId, args: Vec<TypeId>) -> TypeId {
        let body = self.aliases[alias.0 as usize].body;
        let instantiated = self.substitute(body, &args);
        self.add(Type::Alias {
            alias,
            args,
            instantiated,
        })
    }

    /// Replace `TypeVariable` placeholders by position. Shapes without type
    /// ids inside are returned unchanged without allocating a new id.
    fn substitute(&mut self, id: TypeId, args: &[TypeId]) -> TypeId {
        match self.get(id).clone() {
            Type::TypeVariable { index, .. } => args
                .get(index as usize)
                .copied()
                .unwrap_or(TypeId::UNKNOWN),
            Type::Nullable(inner) => {
                let new = self.substitute(inner, args);
                if new == inner { id } else { self.add(Type::Nullable(new)) }
            }
            Type::Union {
                members,
                default_index,
            } => {
                let new: SmallVec<[TypeId; 4]> =
                    members.iter().map(|m| self.substitute(*m, args)).collect();
                if new == members {
                    id
                } else {
                    self.add(Type::Union {
                        members: new,
                        default_index,
                    })
                }
            }
            Type::Collection(e) => {
                let new = self.substitute(e, args);
                if new == e { id } else { self.add(Type::Collection(new)) }
            }
            Type::List(e) => {
                let new = self.substitute(e, args);
                if new == e { id } else { self.add(Type::List(new)) }
            }
            Type::Set(e) => {
                let new = self.substitute(e, args);
                if new == e { id } else { self.add(Type::Set(new)) }
            }
            Type::Map(k, v) => {
                let (nk, nv) = (self.substitute(k, args), self.substitute(v, args));
                if (nk, nv) == (k, v) {
                    id
                } else {
                    self.add(Type::Map(nk, nv))
                }
            }
            Type::Listing(v) => {
                let new = self.substitute(v, args);
                if new == v { id } else { self.add(Type::Listing(new)) }
            }
            Type::Mapping(k, v) => {
                let (nk, nv) = (self.substitute(k, args), self.substitute(v, args));
                if (nk, nv) == (k, v) {
                    id
                } else {
                    self.add(Type::Mapping(nk, nv))
                }
            }
            Type::Function {
                params,
                return_type,
            } => {
                let new_params: Vec<TypeId> =
                    params.iter().map(|p| self.substitute(*p, args)).collect();
                let new_ret = self.substitute(return_type, args);
                if new_params == params && new_ret == return_type {
                    id
                } else {
                    self.add(Type::Function {
                        params: new_params,
                        return_type: new_ret,
                    })
                }
            }
            Type::Pair(a, b) => {
                let (na, nb) = (self.substitute(a, args), self.substitute(b, args));
                if (na, nb) == (a, b) {
                    id
                } else {
                    self.add(Type::Pair(na, nb))
                }
            }
            Type::VarArgs(e) => {
                let new = self.substitute(e, args);
                if new == e { id } else { self.add(Type::VarArgs(new)) }
            }
            Type::Alias {
                alias,
                args: alias_args,
                ..
            } => {
                let new_args: Vec<TypeId> = alias_args
                    .iter()
                    .map(|a| self.substitute(*a, args))
                    .collect();
                if new_args == alias_args {
                    id
                } else {
                    self.alias_type(alias, new_args)
                }
            }
            Type::Constrained { base, predicates } => {
                let new_base = self.substitute(base, args);
                if new_base == base {
                    id
                } else {
                    self.add(Type::Constrained {
                        base: new_base,
                        predicates,
                    })
                }
            }
            // Shapes without embedded type ids.
            _ => id,
        }
    }

    // -------------------------------------------------------------------------
    // Display
    // -------------------------------------------------------------------------

    /// Render a type the way it reads in source, e.g. `Listing<Int>` or
    /// `"a"|"b"|"c"`.
    pub fn display(
        &self,
        id: TypeId,
        registry: &ClassRegistry,
        resolve: &dyn Fn(Atom) -> String,
    ) -> String {
        match self.get(id) {
            Type::Unknown => "unknown".to_string(),
            Type::Nothing => "nothing".to_string(),
            Type::Any => "Any".to_string(),
            Type::Module { class, .. } => resolve(registry.class(*class).name),
            Type::StringLiteral(atom) => format!("{:?}", resolve(*atom)),
            Type::StringLiteralUnion { literals, .. } => literals
                .iter()
                .map(|l| format!("{:?}", resolve(*l)))
                .collect::<Vec<_>>()
                .join("|"),
            Type::FinalClass(class) | Type::NonFinalClass(class) => {
                resolve(registry.class(*class).name)
            }
            Type::Nullable(inner) => {
                format!("{}?", self.display(*inner, registry, resolve))
            }
            Type::Union { members, .. } => members
                .iter()
                .map(|m| self.display(*m, registry, resolve))
                .collect::<Vec<_>>()
                .join("|"),
            Type::Collection(e) => {
                format!("Collection<{}>", self.display(*e, registry, resolve))
            }
            Type::List(e) => format!("List<{}>", self.display(*e, registry, resolve)),
            Type::Set(e) => format!("Set<{}>", self.display(*e, registry, resolve)),
            Type::Map(k, v) => format!(
                "Map<{}, {}>",
                self.display(*k, registry, resolve),
                self.display(*v, registry, resolve)
            ),
            Type::Listing(v) => format!("Listing<{}>", self.display(*v, registry, resolve)),
            Type::Mapping(k, v) => format!(
                "Mapping<{}, {}>",
                self.display(*k, registry, resolve),
                self.display(*v, registry, resolve)
            ),
            Type::Function {
                params,
                return_type,
            } => {
                let rendered: Vec<String> = params
                    .iter()
                    .map(|p| self.display(*p, registry, resolve))
                    .collect();
                format!(
                    "({}) -> {}",
                    rendered.join(", "),
                    self.display(*return_type, registry, resolve)
                )
            }
            Type::FunctionN { arity } => format!("Function{arity}"),
            Type::FunctionClass => "Function".to_string(),
            Type::Pair(a, b) => format!(
                "Pair<{}, {}>",
                self.display(*a, registry, resolve),
                self.display(*b, registry, resolve)
            ),
            Type::VarArgs(e) => format!("VarArgs<{}>", self.display(*e, registry, resolve)),
            Type::TypeVariable { name, .. } => resolve(*name),
            Type::IntWidth(width) => width.name().to_string(),
            Type::Alias { alias, args, .. } => {
                let info = self.alias(*alias);
                if args.is_empty() {
                    resolve(info.name)
                } else {
                    let rendered: Vec<String> = args
                        .iter()
                        .map(|a| self.display(*a, registry, resolve))
                        .collect();
                    format!("{}<{}>", resolve(info.name), rendered.join(", "))
                }
            }
            Type::Constrained { base, predicates } => {
                let rendered: Vec<String> = predicates
                    .iter()
                    .map(|p| crate::expr::render_expr(p, resolve))
                    .collect();
                format!(
                    "{}({})",
                    self.display(*base, registry, resolve),
                    rendered.join(", ")
                )
            }
        }
    }

    // -------------------------------------------------------------------------
    // Structural equivalence
    // -------------------------------------------------------------------------

    /// Structural equality of two type descriptors, ignoring identities and
    /// source positions. A union of string-literal types is equivalent to
    /// the corresponding `StringLiteralUnion`.
    pub fn equivalent(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Type::Unknown, Type::Unknown)
            | (Type::Nothing, Type::Nothing)
            | (Type::Any, Type::Any)
            | (Type::FunctionClass, Type::FunctionClass) => true,
            (
                Type::Module {
                    class: ca,
                    is_final: fa,
                },
                Type::Module {
                    class: cb,
                    is_final: fb,
                },
            ) => ca == cb && fa == fb,
            (Type::StringLiteral(x), Type::StringLiteral(y)) => x == y,
            (
                Type::StringLiteralUnion {
                    literals: la,
                    default_index: da,
                },
                Type::StringLiteralUnion {
                    literals: lb,
                    default_index: db,
                },
            ) => la == lb && da == db,
            (Type::FinalClass(x), Type::FinalClass(y))
            | (Type::NonFinalClass(x), Type::NonFinalClass(y)) => x == y,
            (Type::Nullable(x), Type::Nullable(y)) => self.equivalent(*x, *y),
            (
                Type::Union {
                    members: ma,
                    default_index: da,
                },
                Type::Union {
                    members: mb,
                    default_index: db,
                },
            ) => {
                da == db
                    && ma.len() == mb.len()
                    && ma.iter().zip(mb.iter()).all(|(x, y)| self.equivalent(*x, *y))
            }
            (Type::StringLiteralUnion { .. }, Type::Union { .. }) => self.equivalent(b, a),
            (
                Type::Union {
                    members,
                    default_index,
                },
                Type::StringLiteralUnion {
                    literals,
                    default_index: other_default,
                },
            ) => {
                default_index == other_default
                    && members.len() == literals.len()
                    && members.iter().zip(literals.iter()).all(|(m, lit)| {
                        matches!(self.get(*m), Type::StringLiteral(atom) if atom == lit)
                    })
            }
            (Type::Collection(x), Type::Collection(y))
            | (Type::List(x), Type::List(y))
            | (Type::Set(x), Type::Set(y))
            | (Type::Listing(x), Type::Listing(y))
            | (Type::VarArgs(x), Type::VarArgs(y)) => self.equivalent(*x, *y),
            (Type::Map(ka, va), Type::Map(kb, vb))
            | (Type::Mapping(ka, va), Type::Mapping(kb, vb))
            | (Type::Pair(ka, va), Type::Pair(kb, vb)) => {
                self.equivalent(*ka, *kb) && self.equivalent(*va, *vb)
            }
            (
                Type::Function {
                    params: pa,
                    return_type: ra,
                },
                Type::Function {
                    params: pb,
                    return_type: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(x, y)| self.equivalent(*x, *y))
                    && self.equivalent(*ra, *rb)
            }
            (Type::FunctionN { arity: x }, Type::FunctionN { arity: y }) => x == y,
            (
                Type::TypeVariable { index: ia, .. },
                Type::TypeVariable { index: ib, .. },
            ) => ia == ib,
            (Type::IntWidth(x), Type::IntWidth(y)) => x == y,
            (
                Type::Alias {
                    alias: aa,
                    args: ga,
                    ..
                },
                Type::Alias {
                    alias: ab,
                    args: gb,
                    ..
                },
            ) => {
                aa == ab
                    && ga.len() == gb.len()
                    && ga.iter().zip(gb.iter()).all(|(x, y)| self.equivalent(*x, *y))
            }
            (
                Type::Constrained {
                    base: ba,
                    predicates: pa,
                },
                Type::Constrained {
                    base: bb,
                    predicates: pb,
                },
            ) => {
                // Predicates compare by closure identity; mirrors preserve
                // the original predicate handles.
                self.equivalent(*ba, *bb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        TypeStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ids_are_stable() {
        let store = TypeStore::new();
        assert!(matches!(store.get(TypeId::UNKNOWN), Type::Unknown));
        assert!(matches!(store.get(TypeId::NOTHING), Type::Nothing));
        assert!(matches!(store.get(TypeId::ANY), Type::Any));
    }

    #[test]
    fn skip_checks_propagates_through_unions() {
        let mut store = TypeStore::new();
        let all_noop = store.add(Type::Union {
            members: smallvec::smallvec![TypeId::UNKNOWN, TypeId::ANY],
            default_index: None,
        });
        assert!(store.skip_checks(all_noop));

        let lit = store.add(Type::StringLiteral(Atom(0)));
        let mixed = store.add(Type::Union {
            members: smallvec::smallvec![TypeId::ANY, lit],
            default_index: None,
        });
        assert!(!store.skip_checks(mixed));
    }

    #[test]
    fn substitution_instantiates_alias_bodies() {
        let mut store = TypeStore::new();
        let var = store.add(Type::TypeVariable {
            name: Atom(0),
            index: 0,
        });
        let body = store.add(Type::Listing(var));
        let alias = store.add_alias(AliasInfo {
            name: Atom(1),
            module: Atom(2),
            type_params: vec![Atom(0)],
            body,
            kind: AliasKind::Regular,
        });
        let int_ish = store.add(Type::IntWidth(IntWidth::Int32));
        let applied = store.alias_type(alias, vec![int_ish]);
        let Type::Alias { instantiated, .. } = store.get(applied) else {
            panic!("expected alias type");
        };
        assert!(matches!(store.get(*instantiated), Type::Listing(e) if *e == int_ish));
    }
}
