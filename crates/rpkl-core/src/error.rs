//! Evaluation errors and structured type mismatches.
//!
//! Errors surface to the nearest evaluation boundary (a property access, a
//! type check, a module load) and are never recovered internally. The one
//! sanctioned error-as-control-flow path is union checking, where each
//! branch's failure is captured as a `TypeMismatch` record and a successful
//! branch discards the others.

use rpkl_common::Span;
use rpkl_common::diagnostics::{diagnostic_codes, render_message};
use serde::Serialize;

/// A member-header frame spliced into the displayed stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub qualified_name: String,
    pub header_span: Span,
}

/// An evaluation error: a numbered message template key, its rendered
/// arguments, a source span, and the inserted member-header frames.
#[derive(Clone, Debug, Serialize)]
pub struct EvalError {
    pub code: u32,
    pub args: Vec<String>,
    pub span: Span,
    pub inserted_frames: Vec<StackFrame>,
    /// Structured detail when the error is a type mismatch.
    pub mismatch: Option<Box<TypeMismatch>>,
}

impl EvalError {
    pub fn new(code: u32, args: Vec<String>, span: Span) -> Self {
        EvalError {
            code,
            args,
            span,
            inserted_frames: Vec::new(),
            mismatch: None,
        }
    }

    pub fn with_frame(mut self, qualified_name: String, header_span: Span) -> Self {
        self.inserted_frames.push(StackFrame {
            qualified_name,
            header_span,
        });
        self
    }

    /// The user-visible message, including per-branch union hints.
    pub fn message(&self) -> String {
        let mut message = render_message(self.code, &self.args);
        if let Some(mismatch) = &self.mismatch {
            for hint in mismatch.hints() {
                message.push('\n');
                message.push_str(&hint);
            }
        }
        message
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EvalError {}

// =============================================================================
// Type mismatches
// =============================================================================

/// The four mismatch shapes a type check can produce.
///
/// All embedded values are pre-rendered through the truncating value
/// renderer; the structured record keeps spans and branch nesting for
/// tooling.
#[derive(Clone, Debug, Serialize)]
pub enum TypeMismatch {
    /// Actual value vs expected class, alias, or module type.
    Simple {
        expected: String,
        actual_type: String,
        actual_value: String,
        span: Span,
    },
    /// Actual value vs a single string-literal type.
    Literal {
        expected: String,
        actual_value: String,
        span: Span,
    },
    /// Actual value vs a union of string literals.
    LiteralSet {
        expected: Vec<String>,
        actual_value: String,
        span: Span,
    },
    /// A constraint predicate returned false.
    Constraint {
        predicate: String,
        actual_value: String,
        span: Span,
        /// Power-assertion operand traces: rendered source -> rendered value.
        operands: Vec<(String, String)>,
    },
    /// No branch of a union accepted the value.
    Union {
        expected: String,
        actual_value: String,
        span: Span,
        branches: Vec<TypeMismatch>,
    },
    /// Assignment to a `nothing`-typed slot.
    Nothing { span: Span },
}

impl TypeMismatch {
    pub fn span(&self) -> Span {
        match self {
            TypeMismatch::Simple { span, .. }
            | TypeMismatch::Literal { span, .. }
            | TypeMismatch::LiteralSet { span, .. }
            | TypeMismatch::Constraint { span, .. }
            | TypeMismatch::Union { span, .. }
            | TypeMismatch::Nothing { span } => *span,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            TypeMismatch::Simple { .. } => diagnostic_codes::TYPE_MISMATCH,
            TypeMismatch::Literal { .. } => diagnostic_codes::TYPE_MISMATCH_LITERAL,
            TypeMismatch::LiteralSet { .. } => diagnostic_codes::TYPE_MISMATCH_LITERAL_SET,
            TypeMismatch::Constraint { .. } => diagnostic_codes::TYPE_CONSTRAINT_VIOLATED,
            TypeMismatch::Union { .. } => diagnostic_codes::TYPE_MISMATCH_UNION,
            TypeMismatch::Nothing { .. } => diagnostic_codes::CANNOT_ASSIGN_TO_NOTHING,
        }
    }

    fn template_args(&self) -> Vec<String> {
        match self {
            TypeMismatch::Simple {
                expected,
                actual_type,
                ..
            } => vec![expected.clone(), actual_type.clone()],
            TypeMismatch::Literal {
                expected,
                actual_value,
                ..
            } => vec![expected.clone(), actual_value.clone()],
            TypeMismatch::LiteralSet {
                expected,
                actual_value,
                ..
            } => {
                let rendered: Vec<String> =
                    expected.iter().map(|s| format!("`{s}`")).collect();
                vec![rendered.join(", "), actual_value.clone()]
            }
            TypeMismatch::Constraint {
                predicate,
                actual_value,
                ..
            } => vec![predicate.clone(), actual_value.clone()],
            TypeMismatch::Union {
                expected,
                actual_value,
                ..
            } => vec![expected.clone(), actual_value.clone()],
            TypeMismatch::Nothing { .. } => Vec::new(),
        }
    }

    /// First line of this mismatch's message, without hints.
    pub fn headline(&self) -> String {
        render_message(self.code(), &self.template_args())
    }

    /// Indented follow-up lines: union branch reasons and power-assertion
    /// operand traces.
    fn hints(&self) -> Vec<String> {
        match self {
            TypeMismatch::Union { branches, .. } => branches
                .iter()
                .filter(|branch| branch.is_nontrivial())
                .map(|branch| format!("  – because: {}", branch.headline()))
                .collect(),
            TypeMismatch::Constraint { operands, .. } => operands
                .iter()
                .map(|(source, value)| format!("  {source} -> {value}"))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A branch is trivial when it is a plain class mismatch; its failure
    /// adds nothing beyond the union headline.
    fn is_nontrivial(&self) -> bool {
        !matches!(self, TypeMismatch::Simple { .. })
    }

    pub fn into_error(self) -> EvalError {
        let mut error = EvalError::new(self.code(), self.template_args(), self.span());
        error.mismatch = Some(Box::new(self));
        error
    }
}

/// Outcome of a type check. Mismatches are control flow for union branches;
/// evaluation errors raised while forcing members or running predicates
/// propagate unchanged.
#[derive(Clone, Debug)]
pub enum CheckError {
    Mismatch(TypeMismatch),
    Eval(Box<EvalError>),
}

impl From<TypeMismatch> for CheckError {
    fn from(mismatch: TypeMismatch) -> Self {
        CheckError::Mismatch(mismatch)
    }
}

impl From<EvalError> for CheckError {
    fn from(error: EvalError) -> Self {
        CheckError::Eval(Box::new(error))
    }
}

impl CheckError {
    pub fn into_error(self) -> EvalError {
        match self {
            CheckError::Mismatch(mismatch) => mismatch.into_error(),
            CheckError::Eval(error) => *error,
        }
    }
}
