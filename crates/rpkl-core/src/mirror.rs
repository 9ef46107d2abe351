//! Mirror export: types and declarations as first-class values.
//!
//! A type mirror is a dynamic object with a `kind` discriminator and
//! shape-specific fields, built without forcing anything. Mirrors decode
//! back into `MirrorNode` trees, and a `MirrorNode` rebuilds into a type
//! descriptor that is structurally equivalent to the original — a union of
//! string literals exports as a union of literal-type mirrors and rebuilds
//! as such.

use crate::classes::ClassId;
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::expr::Expr;
use crate::function::{FunctionBody, FunctionValue};
use crate::member::{MemberBody, MemberDescriptor, MemberKey, MemberKind};
use crate::object::{ObjectId, ObjectKind};
use crate::types::{AliasId, IntWidth, Type, TypeId, TypeStore};
use crate::value::Value;
use indexmap::IndexMap;
use rpkl_common::diagnostics::diagnostic_codes;
use rpkl_common::{Identifier, ShardedInterner, Span};
use smallvec::SmallVec;
use std::rc::Rc;
use std::sync::Arc;

/// A decoded mirror: the pure-data image of a type descriptor.
#[derive(Clone, Debug)]
pub enum MirrorNode {
    Unknown,
    Nothing,
    Any,
    FunctionClass,
    Module {
        class: ClassId,
        is_final: bool,
    },
    StringLiteral(String),
    Class {
        class: ClassId,
        is_final: bool,
    },
    Nullable(Box<MirrorNode>),
    Union {
        members: Vec<MirrorNode>,
        default_index: Option<usize>,
    },
    Collection(Box<MirrorNode>),
    List(Box<MirrorNode>),
    Set(Box<MirrorNode>),
    Map(Box<MirrorNode>, Box<MirrorNode>),
    Listing(Box<MirrorNode>),
    Mapping(Box<MirrorNode>, Box<MirrorNode>),
    Function {
        params: Vec<MirrorNode>,
        return_type: Box<MirrorNode>,
    },
    FunctionN {
        arity: u8,
    },
    Pair(Box<MirrorNode>, Box<MirrorNode>),
    VarArgs(Box<MirrorNode>),
    TypeVariable {
        name: String,
        index: u32,
    },
    IntWidth(IntWidth),
    Alias {
        alias: AliasId,
        args: Vec<MirrorNode>,
    },
    Constrained {
        base: Box<MirrorNode>,
        predicates: Vec<Arc<Expr>>,
    },
}

impl<'c> Evaluator<'c> {
    /// Export a type descriptor as a first-class mirror value.
    pub fn type_mirror(&mut self, ty: TypeId) -> Result<Value, EvalError> {
        match self.ctx.types.get(ty).clone() {
            Type::Unknown => Ok(self.mirror_object("Unknown", vec![])),
            Type::Nothing => Ok(self.mirror_object("Nothing", vec![])),
            Type::Any => Ok(self.mirror_object("Any", vec![])),
            Type::FunctionClass => Ok(self.mirror_object("Function", vec![])),
            Type::Module { class, is_final } => Ok(self.mirror_object(
                "Module",
                vec![
                    ("moduleClass", Value::Class(class)),
                    ("isFinal", Value::Bool(is_final)),
                ],
            )),
            Type::StringLiteral(atom) => {
                let text = Value::string(&self.ctx.resolve(atom));
                Ok(self.mirror_object("StringLiteral", vec![("value", text)]))
            }
            Type::StringLiteralUnion {
                literals,
                default_index,
            } => {
                // Exports as a union of literal-type mirrors.
                let mut members = Vec::with_capacity(literals.len());
                for atom in literals {
                    let text = Value::string(&self.ctx.resolve(atom));
                    members.push(self.mirror_object("StringLiteral", vec![("value", text)]));
                }
                Ok(self.mirror_object(
                    "Union",
                    vec![
                        ("members", Value::List(Rc::new(members))),
                        ("defaultIndex", index_value(default_index)),
                    ],
                ))
            }
            Type::FinalClass(class) => Ok(self.mirror_object(
                "Class",
                vec![("class", Value::Class(class)), ("isFinal", Value::Bool(true))],
            )),
            Type::NonFinalClass(class) => Ok(self.mirror_object(
                "Class",
                vec![
                    ("class", Value::Class(class)),
                    ("isFinal", Value::Bool(false)),
                ],
            )),
            Type::Nullable(inner) => {
                let inner = self.type_mirror(inner)?;
                Ok(self.mirror_object("Nullable", vec![("memberType", inner)]))
            }
            Type::Union {
                members,
                default_index,
            } => {
                let mut mirrors = Vec::with_capacity(members.len());
                for member in members {
                    mirrors.push(self.type_mirror(member)?);
                }
                Ok(self.mirror_object(
                    "Union",
                    vec![
                        ("members", Value::List(Rc::new(mirrors))),
                        ("defaultIndex", index_value(default_index)),
                    ],
                ))
            }
            Type::Collection(e) => self.element_mirror("Collection", e),
            Type::List(e) => self.element_mirror("List", e),
            Type::Set(e) => self.element_mirror("Set", e),
            Type::Listing(e) => self.element_mirror("Listing", e),
            Type::VarArgs(e) => self.element_mirror("VarArgs", e),
            Type::Map(k, v) => self.entry_mirror("Map", k, v),
            Type::Mapping(k, v) => self.entry_mirror("Mapping", k, v),
            Type::Function {
                params,
                return_type,
            } => {
                let mut mirrors = Vec::with_capacity(params.len());
                for param in params {
                    mirrors.push(self.type_mirror(param)?);
                }
                let return_mirror = self.type_mirror(return_type)?;
                Ok(self.mirror_object(
                    "FunctionType",
                    vec![
                        ("parameterTypes", Value::List(Rc::new(mirrors))),
                        ("returnType", return_mirror),
                    ],
                ))
            }
            Type::FunctionN { arity } => {
                Ok(self.mirror_object("FunctionN", vec![("arity", Value::Int(arity as i64))]))
            }
            Type::Pair(a, b) => {
                let first = self.type_mirror(a)?;
                let second = self.type_mirror(b)?;
                Ok(self.mirror_object(
                    "Pair",
                    vec![("firstType", first), ("secondType", second)],
                ))
            }
            Type::TypeVariable { name, index } => {
                let name = Value::string(&self.ctx.resolve(name));
                Ok(self.mirror_object(
                    "TypeVariable",
                    vec![("name", name), ("index", Value::Int(index as i64))],
                ))
            }
            Type::IntWidth(width) => Ok(self.mirror_object(
                "IntWidth",
                vec![("name", Value::string(width.name()))],
            )),
            Type::Alias { alias, args, .. } => {
                let mut mirrors = Vec::with_capacity(args.len());
                for arg in args {
                    mirrors.push(self.type_mirror(arg)?);
                }
                Ok(self.mirror_object(
                    "Alias",
                    vec![
                        ("alias", Value::TypeAlias(alias)),
                        ("argumentTypes", Value::List(Rc::new(mirrors))),
                    ],
                ))
            }
            Type::Constrained { base, predicates } => {
                let base = self.type_mirror(base)?;
                let carriers: Vec<Value> = predicates
                    .iter()
                    .map(|predicate| {
                        Value::Function(Rc::new(FunctionValue {
                            params: Vec::new(),
                            captured_this: None,
                            captured_locals: Vec::new(),
                            body: FunctionBody::Expr(Arc::clone(predicate)),
                        }))
                    })
                    .collect();
                Ok(self.mirror_object(
                    "Constrained",
                    vec![
                        ("baseType", base),
                        ("predicates", Value::List(Rc::new(carriers))),
                    ],
                ))
            }
        }
    }

    /// The reflective descriptor of an arbitrary value: classes and type
    /// aliases mirror their declarations, anything else mirrors its class.
    pub fn mirror_of(&mut self, value: &Value) -> Result<Value, EvalError> {
        match value {
            Value::Class(class) => {
                let class = *class;
                let info = self.ctx.registry.class(class);
                let name = Value::string(&self.ctx.resolve(info.name));
                let superclass = match info.superclass {
                    Some(superclass) => Value::Class(superclass),
                    None => Value::null(),
                };
                let is_abstract = info.openness == crate::classes::Openness::Abstract;
                let is_open = info.openness == crate::classes::Openness::Open;
                Ok(self.mirror_object(
                    "ClassDeclaration",
                    vec![
                        ("name", name),
                        ("superclass", superclass),
                        ("isAbstract", Value::Bool(is_abstract)),
                        ("isOpen", Value::Bool(is_open)),
                    ],
                ))
            }
            Value::TypeAlias(alias) => {
                let name = self.ctx.types.alias(*alias).name;
                let name = Value::string(&self.ctx.resolve(name));
                Ok(self.mirror_object("TypeAliasDeclaration", vec![("name", name)]))
            }
            other => {
                let class = self.class_of(other);
                Ok(self.mirror_object(
                    "Class",
                    vec![("class", Value::Class(class)), ("isFinal", Value::Bool(false))],
                ))
            }
        }
    }

    fn element_mirror(&mut self, kind: &str, element: TypeId) -> Result<Value, EvalError> {
        let element = self.type_mirror(element)?;
        Ok(self.mirror_object(kind, vec![("elementType", element)]))
    }

    fn entry_mirror(&mut self, kind: &str, key: TypeId, value: TypeId) -> Result<Value, EvalError> {
        let key = self.type_mirror(key)?;
        let value = self.type_mirror(value)?;
        Ok(self.mirror_object(kind, vec![("keyType", key), ("valueType", value)]))
    }

    fn mirror_object(&mut self, kind: &str, fields: Vec<(&str, Value)>) -> Value {
        let mut members = IndexMap::new();
        let kind_key = MemberKey::Property(Identifier::regular(self.ctx.intern("kind")));
        members.insert(
            kind_key.clone(),
            Rc::new(MemberDescriptor::new(
                MemberKind::Property,
                kind_key,
                MemberBody::Constant(Value::string(kind)),
            )),
        );
        for (name, value) in fields {
            let key = MemberKey::Property(Identifier::regular(self.ctx.intern(name)));
            members.insert(
                key.clone(),
                Rc::new(MemberDescriptor::new(
                    MemberKind::Property,
                    key,
                    MemberBody::Constant(value),
                )),
            );
        }
        Value::Object(self.heap.alloc(ObjectKind::Dynamic, None, members, 0))
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode a mirror value back into its pure-data image.
    pub fn decode_mirror(&mut self, value: &Value) -> Result<MirrorNode, EvalError> {
        let obj = match value {
            Value::Object(obj) => *obj,
            _ => return Err(self.bad_mirror(value)),
        };
        let kind = match self.field(obj, "kind")? {
            Some(Value::Str(kind)) => kind.to_string(),
            _ => return Err(self.bad_mirror(value)),
        };
        match kind.as_str() {
            "Unknown" => Ok(MirrorNode::Unknown),
            "Nothing" => Ok(MirrorNode::Nothing),
            "Any" => Ok(MirrorNode::Any),
            "Function" => Ok(MirrorNode::FunctionClass),
            "Module" => {
                let class = self.class_field(obj, "moduleClass", value)?;
                let is_final = self.bool_field(obj, "isFinal", value)?;
                Ok(MirrorNode::Module { class, is_final })
            }
            "StringLiteral" => match self.field(obj, "value")? {
                Some(Value::Str(text)) => Ok(MirrorNode::StringLiteral(text.to_string())),
                _ => Err(self.bad_mirror(value)),
            },
            "Class" => {
                let class = self.class_field(obj, "class", value)?;
                let is_final = self.bool_field(obj, "isFinal", value)?;
                Ok(MirrorNode::Class { class, is_final })
            }
            "Nullable" => {
                let inner = self.node_field(obj, "memberType", value)?;
                Ok(MirrorNode::Nullable(Box::new(inner)))
            }
            "Union" => {
                let members = self.node_list_field(obj, "members", value)?;
                let default_index = match self.field(obj, "defaultIndex")? {
                    Some(Value::Int(i)) if i >= 0 => Some(i as usize),
                    Some(Value::Null(_)) | None => None,
                    _ => return Err(self.bad_mirror(value)),
                };
                Ok(MirrorNode::Union {
                    members,
                    default_index,
                })
            }
            "Collection" => Ok(MirrorNode::Collection(Box::new(
                self.node_field(obj, "elementType", value)?,
            ))),
            "List" => Ok(MirrorNode::List(Box::new(
                self.node_field(obj, "elementType", value)?,
            ))),
            "Set" => Ok(MirrorNode::Set(Box::new(
                self.node_field(obj, "elementType", value)?,
            ))),
            "Listing" => Ok(MirrorNode::Listing(Box::new(
                self.node_field(obj, "elementType", value)?,
            ))),
            "VarArgs" => Ok(MirrorNode::VarArgs(Box::new(
                self.node_field(obj, "elementType", value)?,
            ))),
            "Map" => Ok(MirrorNode::Map(
                Box::new(self.node_field(obj, "keyType", value)?),
                Box::new(self.node_field(obj, "valueType", value)?),
            )),
            "Mapping" => Ok(MirrorNode::Mapping(
                Box::new(self.node_field(obj, "keyType", value)?),
                Box::new(self.node_field(obj, "valueType", value)?),
            )),
            "FunctionType" => {
                let params = self.node_list_field(obj, "parameterTypes", value)?;
                let return_type = self.node_field(obj, "returnType", value)?;
                Ok(MirrorNode::Function {
                    params,
                    return_type: Box::new(return_type),
                })
            }
            "FunctionN" => match self.field(obj, "arity")? {
                Some(Value::Int(arity)) if (0..=255).contains(&arity) => {
                    Ok(MirrorNode::FunctionN {
                        arity: arity as u8,
                    })
                }
                _ => Err(self.bad_mirror(value)),
            },
            "Pair" => Ok(MirrorNode::Pair(
                Box::new(self.node_field(obj, "firstType", value)?),
                Box::new(self.node_field(obj, "secondType", value)?),
            )),
            "TypeVariable" => {
                let name = match self.field(obj, "name")? {
                    Some(Value::Str(name)) => name.to_string(),
                    _ => return Err(self.bad_mirror(value)),
                };
                let index = match self.field(obj, "index")? {
                    Some(Value::Int(index)) if index >= 0 => index as u32,
                    _ => return Err(self.bad_mirror(value)),
                };
                Ok(MirrorNode::TypeVariable { name, index })
            }
            "IntWidth" => {
                let name = match self.field(obj, "name")? {
                    Some(Value::Str(name)) => name.to_string(),
                    _ => return Err(self.bad_mirror(value)),
                };
                let width = match name.as_str() {
                    "Int8" => IntWidth::Int8,
                    "Int16" => IntWidth::Int16,
                    "Int32" => IntWidth::Int32,
                    "UInt8" => IntWidth::UInt8,
                    "UInt16" => IntWidth::UInt16,
                    "UInt32" => IntWidth::UInt32,
                    "UInt" => IntWidth::UInt,
                    _ => return Err(self.bad_mirror(value)),
                };
                Ok(MirrorNode::IntWidth(width))
            }
            "Alias" => {
                let alias = match self.field(obj, "alias")? {
                    Some(Value::TypeAlias(alias)) => alias,
                    _ => return Err(self.bad_mirror(value)),
                };
                let args = self.node_list_field(obj, "argumentTypes", value)?;
                Ok(MirrorNode::Alias { alias, args })
            }
            "Constrained" => {
                let base = self.node_field(obj, "baseType", value)?;
                let predicates = match self.field(obj, "predicates")? {
                    Some(Value::List(carriers)) => {
                        let mut predicates = Vec::with_capacity(carriers.len());
                        for carrier in carriers.iter() {
                            match carrier {
                                Value::Function(f) => match &f.body {
                                    FunctionBody::Expr(expr) => {
                                        predicates.push(Arc::clone(expr));
                                    }
                                    _ => return Err(self.bad_mirror(value)),
                                },
                                _ => return Err(self.bad_mirror(value)),
                            }
                        }
                        predicates
                    }
                    _ => return Err(self.bad_mirror(value)),
                };
                Ok(MirrorNode::Constrained {
                    base: Box::new(base),
                    predicates,
                })
            }
            _ => Err(self.bad_mirror(value)),
        }
    }

    fn field(&mut self, obj: ObjectId, name: &str) -> Result<Option<Value>, EvalError> {
        let key = MemberKey::Property(Identifier::regular(self.ctx.intern(name)));
        self.read_member(obj, &key)
    }

    fn node_field(
        &mut self,
        obj: ObjectId,
        name: &str,
        whole: &Value,
    ) -> Result<MirrorNode, EvalError> {
        match self.field(obj, name)? {
            Some(child) => self.decode_mirror(&child),
            None => Err(self.bad_mirror(whole)),
        }
    }

    fn node_list_field(
        &mut self,
        obj: ObjectId,
        name: &str,
        whole: &Value,
    ) -> Result<Vec<MirrorNode>, EvalError> {
        match self.field(obj, name)? {
            Some(Value::List(items)) => {
                let items = items.as_ref().clone();
                let mut nodes = Vec::with_capacity(items.len());
                for item in &items {
                    nodes.push(self.decode_mirror(item)?);
                }
                Ok(nodes)
            }
            _ => Err(self.bad_mirror(whole)),
        }
    }

    fn class_field(
        &mut self,
        obj: ObjectId,
        name: &str,
        whole: &Value,
    ) -> Result<ClassId, EvalError> {
        match self.field(obj, name)? {
            Some(Value::Class(class)) => Ok(class),
            _ => Err(self.bad_mirror(whole)),
        }
    }

    fn bool_field(&mut self, obj: ObjectId, name: &str, whole: &Value) -> Result<bool, EvalError> {
        match self.field(obj, name)? {
            Some(Value::Bool(b)) => Ok(b),
            _ => Err(self.bad_mirror(whole)),
        }
    }

    fn bad_mirror(&self, value: &Value) -> EvalError {
        EvalError::new(
            diagnostic_codes::MALFORMED_MIRROR,
            vec![value.tag().to_string()],
            Span::dummy(),
        )
    }
}

fn index_value(index: Option<usize>) -> Value {
    match index {
        Some(i) => Value::Int(i as i64),
        None => Value::null(),
    }
}

impl TypeStore {
    /// Rebuild a type descriptor from a decoded mirror. The result is
    /// structurally equivalent to the mirrored type; a mirrored
    /// string-literal union rebuilds as a union of string-literal types.
    pub fn from_mirror(&mut self, node: &MirrorNode, interner: &ShardedInterner) -> TypeId {
        match node {
            MirrorNode::Unknown => TypeId::UNKNOWN,
            MirrorNode::Nothing => TypeId::NOTHING,
            MirrorNode::Any => TypeId::ANY,
            MirrorNode::FunctionClass => self.add(Type::FunctionClass),
            MirrorNode::Module { class, is_final } => self.add(Type::Module {
                class: *class,
                is_final: *is_final,
            }),
            MirrorNode::StringLiteral(text) => {
                let atom = interner.intern(text);
                self.add(Type::StringLiteral(atom))
            }
            MirrorNode::Class { class, is_final } => {
                if *is_final {
                    self.add(Type::FinalClass(*class))
                } else {
                    self.add(Type::NonFinalClass(*class))
                }
            }
            MirrorNode::Nullable(inner) => {
                let inner = self.from_mirror(inner, interner);
                self.add(Type::Nullable(inner))
            }
            MirrorNode::Union {
                members,
                default_index,
            } => {
                let members: SmallVec<[TypeId; 4]> = members
                    .iter()
                    .map(|m| self.from_mirror(m, interner))
                    .collect();
                self.add(Type::Union {
                    members,
                    default_index: *default_index,
                })
            }
            MirrorNode::Collection(e) => {
                let e = self.from_mirror(e, interner);
                self.add(Type::Collection(e))
            }
            MirrorNode::List(e) => {
                let e = self.from_mirror(e, interner);
                self.add(Type::List(e))
            }
            MirrorNode::Set(e) => {
                let e = self.from_mirror(e, interner);
                self.add(Type::Set(e))
            }
            MirrorNode::Listing(e) => {
                let e = self.from_mirror(e, interner);
                self.add(Type::Listing(e))
            }
            MirrorNode::VarArgs(e) => {
                let e = self.from_mirror(e, interner);
                self.add(Type::VarArgs(e))
            }
            MirrorNode::Map(k, v) => {
                let k = self.from_mirror(k, interner);
                let v = self.from_mirror(v, interner);
                self.add(Type::Map(k, v))
            }
            MirrorNode::Mapping(k, v) => {
                let k = self.from_mirror(k, interner);
                let v = self.from_mirror(v, interner);
                self.add(Type::Mapping(k, v))
            }
            MirrorNode::Function {
                params,
                return_type,
            } => {
                let params: Vec<TypeId> = params
                    .iter()
                    .map(|p| self.from_mirror(p, interner))
                    .collect();
                let return_type = self.from_mirror(return_type, interner);
                self.add(Type::Function {
                    params,
                    return_type,
                })
            }
            MirrorNode::FunctionN { arity } => self.add(Type::FunctionN { arity: *arity }),
            MirrorNode::Pair(a, b) => {
                let a = self.from_mirror(a, interner);
                let b = self.from_mirror(b, interner);
                self.add(Type::Pair(a, b))
            }
            MirrorNode::TypeVariable { name, index } => {
                let name = interner.intern(name);
                self.add(Type::TypeVariable {
                    name,
                    index: *index,
                })
            }
            MirrorNode::IntWidth(width) => self.add(Type::IntWidth(*width)),
            MirrorNode::Alias { alias, args } => {
                let args: Vec<TypeId> = args
                    .iter()
                    .map(|a| self.from_mirror(a, interner))
                    .collect();
                self.alias_type(*alias, args)
            }
            MirrorNode::Constrained { base, predicates } => {
                let base = self.from_mirror(base, interner);
                self.add(Type::Constrained {
                    base,
                    predicates: predicates.clone(),
                })
            }
        }
    }
}
