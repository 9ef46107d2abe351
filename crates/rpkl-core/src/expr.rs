//! Expression and object-literal IR.
//!
//! This is the shape the external parser hands to the core: expressions with
//! source spans, and object literals made of property/element/entry/method
//! members plus spread and `for`/`when` generators. The IR contains only
//! atoms and type ids, never runtime values, so declaration tables can be
//! shared by concurrent evaluations.

use crate::member::MemberModifiers;
use crate::types::TypeId;
use crate::value::{DataSizeUnit, DurationUnit};
use rpkl_common::{Atom, Identifier, Span, Spanned};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Expr { span, kind }
    }

    /// A span-less expression, for programmatically built declarations.
    pub fn synthetic(kind: ExprKind) -> Self {
        Expr {
            span: Span::dummy(),
            kind,
        }
    }
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Atom),
    Null,
    Duration(f64, DurationUnit),
    DataSize(f64, DataSizeUnit),
    /// The receiver — or, inside a constraint predicate, the value under
    /// test (the "custom this" slot).
    This,
    /// A name resolved against frame locals, then the receiver's members.
    Read(Identifier),
    /// `expr.name`
    Member(Box<Expr>, Identifier),
    /// `expr[key]`
    Subscript(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Let {
        name: Identifier,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// Apply an object literal to the parent expression's value.
    Amend(Box<Expr>, Arc<ObjectLiteral>),
    /// The default value of a type. `new T { ... }` is
    /// `Amend(TypeDefault(T), ...)`.
    TypeDefault(TypeId),
    Call(Box<Expr>, Vec<Expr>),
    Lambda {
        params: Vec<Identifier>,
        body: Arc<Expr>,
    },
    ListLit(Vec<Expr>),
    MapLit(Vec<(Expr, Expr)>),
    PairLit(Box<Expr>, Box<Expr>),
}

// =============================================================================
// Object literals
// =============================================================================

/// The member set of an object-literal expression, before amendment.
#[derive(Clone, Debug)]
pub struct ObjectLiteral {
    pub span: Span,
    pub members: Vec<LiteralMember>,
}

impl ObjectLiteral {
    pub fn new(span: Span, members: Vec<LiteralMember>) -> Self {
        ObjectLiteral { span, members }
    }
}

#[derive(Clone, Debug)]
pub struct LiteralMember {
    pub span: Span,
    pub header_span: Span,
    pub kind: LiteralMemberKind,
}

impl LiteralMember {
    pub fn new(kind: LiteralMemberKind) -> Self {
        LiteralMember {
            span: Span::dummy(),
            header_span: Span::dummy(),
            kind,
        }
    }

    pub fn with_span(mut self, span: Span, header_span: Span) -> Self {
        self.span = span;
        self.header_span = header_span;
        self
    }
}

/// A member body: `= expr`, or a nested `{ ... }` amending the inherited
/// value.
#[derive(Clone, Debug)]
pub enum LiteralBody {
    Expr(Arc<Expr>),
    Amend(Arc<ObjectLiteral>),
}

#[derive(Clone, Debug)]
pub enum LiteralMemberKind {
    Property {
        name: Identifier,
        modifiers: MemberModifiers,
        ty: Option<TypeId>,
        body: LiteralBody,
    },
    Method {
        name: Identifier,
        params: Vec<Identifier>,
        body: Arc<Expr>,
    },
    Element {
        body: LiteralBody,
    },
    Entry {
        key: Expr,
        body: LiteralBody,
    },
    /// `...expr` — splice another collection's members.
    Spread {
        expr: Expr,
    },
    /// `for (k, v in iterable) { members }`
    For {
        key_var: Option<Identifier>,
        value_var: Identifier,
        iterable: Expr,
        body: Vec<LiteralMember>,
    },
    /// `when (cond) { members } else { members }`
    When {
        condition: Expr,
        then_members: Vec<LiteralMember>,
        else_members: Vec<LiteralMember>,
    },
}

// =============================================================================
// Source rendering
// =============================================================================

/// Render an expression back to surface syntax. Used to quote failing
/// constraint predicates in diagnostics.
pub fn render_expr(expr: &Expr, resolve: &dyn Fn(Atom) -> String) -> String {
    match &expr.kind {
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Int(i) => i.to_string(),
        ExprKind::Float(f) => f.to_string(),
        ExprKind::Str(atom) => format!("{:?}", resolve(*atom)),
        ExprKind::Null => "null".to_string(),
        ExprKind::Duration(v, unit) => format!("{v}.{}", unit.symbol()),
        ExprKind::DataSize(v, unit) => format!("{v}.{}", unit.symbol()),
        ExprKind::This => "this".to_string(),
        ExprKind::Read(id) => resolve(id.atom),
        ExprKind::Member(base, id) => {
            format!("{}.{}", render_expr(base, resolve), resolve(id.atom))
        }
        ExprKind::Subscript(base, key) => {
            format!(
                "{}[{}]",
                render_expr(base, resolve),
                render_expr(key, resolve)
            )
        }
        ExprKind::Unary(op, operand) => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            };
            format!("{symbol}{}", render_expr(operand, resolve))
        }
        ExprKind::Binary(op, lhs, rhs) => {
            format!(
                "{} {} {}",
                render_expr(lhs, resolve),
                op.symbol(),
                render_expr(rhs, resolve)
            )
        }
        ExprKind::If(cond, then, otherwise) => format!(
            "if ({}) {} else {}",
            render_expr(cond, resolve),
            render_expr(then, resolve),
            render_expr(otherwise, resolve)
        ),
        ExprKind::Let { name, value, body } => format!(
            "let ({} = {}) {}",
            resolve(name.atom),
            render_expr(value, resolve),
            render_expr(body, resolve)
        ),
        ExprKind::Amend(parent, _) => format!("{} {{ ... }}", render_expr(parent, resolve)),
        ExprKind::TypeDefault(_) => "new".to_string(),
        ExprKind::Call(callee, args) => {
            let rendered: Vec<String> = args.iter().map(|a| render_expr(a, resolve)).collect();
            format!("{}({})", render_expr(callee, resolve), rendered.join(", "))
        }
        ExprKind::Lambda { params, body } => {
            let names: Vec<String> = params.iter().map(|p| resolve(p.atom)).collect();
            format!("({}) -> {}", names.join(", "), render_expr(body, resolve))
        }
        ExprKind::ListLit(items) => {
            let rendered: Vec<String> = items.iter().map(|i| render_expr(i, resolve)).collect();
            format!("List({})", rendered.join(", "))
        }
        ExprKind::MapLit(entries) => {
            let rendered: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}, {}", render_expr(k, resolve), render_expr(v, resolve)))
                .collect();
            format!("Map({})", rendered.join(", "))
        }
        ExprKind::PairLit(first, second) => format!(
            "Pair({}, {})",
            render_expr(first, resolve),
            render_expr(second, resolve)
        ),
    }
}
