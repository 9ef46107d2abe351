//! Typed-object core of the rpkl configuration-language evaluator.
//!
//! This crate implements the semantic heart of the language:
//! - the tagged value universe (`value`), including the four object kinds
//! - the class registry with inheritance and lazy prototypes (`classes`)
//! - the closed algebra of type shapes with default-value synthesis,
//!   skip-check propagation, and mirror export (`types`, `default`,
//!   `mirror`)
//! - value-against-type checking with union short-circuit and constraint
//!   predicates (`check`)
//! - per-object member tables with one-shot memoization and cycle
//!   detection (`object`, `eval`)
//! - the amendment protocol applying object literals to parent values
//!   (`amend`)
//! - structured diagnostics (`error`)
//!
//! Parsing, rendering backends, and I/O are external collaborators,
//! reached through the narrow interfaces in `engine`.

pub mod amend;
pub mod check;
pub mod classes;
pub mod context;
pub mod default;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod expr_eval;
pub mod function;
pub mod member;
pub mod mirror;
pub mod object;
pub mod render;
pub mod types;
pub mod value;

pub use classes::{ClassId, ClassInfo, ClassRegistry, Openness, PropertySchema};
pub use context::{CoreContext, EvaluatorOptions};
pub use engine::{AllowAll, Engine, Evaluation, ModuleDecl, ModuleLoader, SecurityManager};
pub use error::{CheckError, EvalError, StackFrame, TypeMismatch};
pub use eval::Evaluator;
pub use expr::{Expr, ExprKind, LiteralBody, LiteralMember, LiteralMemberKind, ObjectLiteral};
pub use function::{FunctionBody, FunctionValue};
pub use member::{MemberBody, MemberDescriptor, MemberKey, MemberKind, MemberModifiers};
pub use mirror::MirrorNode;
pub use object::{Heap, ObjectId, ObjectKind};
pub use render::Renderer;
pub use types::{AliasId, AliasInfo, AliasKind, IntWidth, Type, TypeId, TypeStore};
pub use value::{DataSize, DataSizeUnit, Duration, DurationUnit, IntSeq, RegexValue, Value};
