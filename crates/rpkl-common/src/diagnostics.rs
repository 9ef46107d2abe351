//! Diagnostic message catalog.
//!
//! User-visible messages are built from numbered template keys. The catalog
//! is a static table of `{ code, category, template }` records; templates use
//! `{0}`-style positional placeholders.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Message,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub template: &'static str,
}

/// Numbered template keys for every message the core can raise.
pub mod diagnostic_codes {
    pub const TYPE_MISMATCH: u32 = 1001;
    pub const TYPE_MISMATCH_LITERAL: u32 = 1002;
    pub const TYPE_MISMATCH_LITERAL_SET: u32 = 1003;
    pub const TYPE_MISMATCH_UNION: u32 = 1004;
    pub const TYPE_CONSTRAINT_VIOLATED: u32 = 1005;
    pub const CANNOT_ASSIGN_TO_NOTHING: u32 = 1006;
    pub const CANNOT_ASSIGN_CONST_PROPERTY: u32 = 1010;
    pub const CANNOT_ASSIGN_FIXED_PROPERTY: u32 = 1011;
    pub const DUPLICATE_DEFINITION: u32 = 1020;
    pub const CYCLIC_PROPERTY_REFERENCE: u32 = 1021;
    pub const PROPERTY_NOT_DEFINED: u32 = 1022;
    pub const OBJECT_CANNOT_HAVE_ELEMENTS: u32 = 1023;
    pub const OBJECT_CANNOT_HAVE_ENTRIES: u32 = 1024;
    pub const CANNOT_AMEND_VALUE: u32 = 1025;
    pub const NO_DEFAULT_VALUE: u32 = 1026;
    pub const WRONG_ARITY: u32 = 1027;
    pub const NOT_A_FUNCTION: u32 = 1028;
    pub const UNDEFINED_NAME: u32 = 1029;
    pub const INTERNAL_STD_LIB_CLASS: u32 = 1030;
    pub const MODULE_NOT_ALLOWED: u32 = 1040;
    pub const MODULE_NOT_FOUND: u32 = 1041;
    pub const WRONG_OPERAND_TYPE: u32 = 1050;
    pub const RECURSION_LIMIT_EXCEEDED: u32 = 1051;
    pub const ELEMENT_INDEX_OUT_OF_RANGE: u32 = 1052;
    pub const CANNOT_SPREAD_VALUE: u32 = 1053;
    pub const KEY_NOT_FOUND: u32 = 1054;
    pub const INTEGER_OVERFLOW: u32 = 1055;
    pub const MALFORMED_MIRROR: u32 = 1056;
}

static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = {
    use DiagnosticCategory::Error;
    use diagnostic_codes::*;
    &[
        DiagnosticMessage {
            code: TYPE_MISMATCH,
            category: Error,
            template: "Expected a value of type `{0}`, but got type `{1}`.",
        },
        DiagnosticMessage {
            code: TYPE_MISMATCH_LITERAL,
            category: Error,
            template: "Expected the value `{0}`, but got `{1}`.",
        },
        DiagnosticMessage {
            code: TYPE_MISMATCH_LITERAL_SET,
            category: Error,
            template: "Expected one of {0}, but got `{1}`.",
        },
        DiagnosticMessage {
            code: TYPE_MISMATCH_UNION,
            category: Error,
            template: "Expected a value of type `{0}`, but got `{1}`.",
        },
        DiagnosticMessage {
            code: TYPE_CONSTRAINT_VIOLATED,
            category: Error,
            template: "Type constraint `{0}` violated by value `{1}`.",
        },
        DiagnosticMessage {
            code: CANNOT_ASSIGN_TO_NOTHING,
            category: Error,
            template: "Cannot assign a value to a member of type `nothing`.",
        },
        DiagnosticMessage {
            code: CANNOT_ASSIGN_CONST_PROPERTY,
            category: Error,
            template: "Cannot assign to const property `{0}`.",
        },
        DiagnosticMessage {
            code: CANNOT_ASSIGN_FIXED_PROPERTY,
            category: Error,
            template: "Cannot assign to fixed property `{0}`.",
        },
        DiagnosticMessage {
            code: DUPLICATE_DEFINITION,
            category: Error,
            template: "Duplicate definition of member `{0}`.",
        },
        DiagnosticMessage {
            code: CYCLIC_PROPERTY_REFERENCE,
            category: Error,
            template: "Cyclic reference while evaluating member `{0}`.",
        },
        DiagnosticMessage {
            code: PROPERTY_NOT_DEFINED,
            category: Error,
            template: "Property `{0}` is not defined on class `{1}`.",
        },
        DiagnosticMessage {
            code: OBJECT_CANNOT_HAVE_ELEMENTS,
            category: Error,
            template: "Object of type `{0}` cannot have elements.",
        },
        DiagnosticMessage {
            code: OBJECT_CANNOT_HAVE_ENTRIES,
            category: Error,
            template: "Object of type `{0}` cannot have entries.",
        },
        DiagnosticMessage {
            code: CANNOT_AMEND_VALUE,
            category: Error,
            template: "Cannot amend a value of type `{0}`.",
        },
        DiagnosticMessage {
            code: NO_DEFAULT_VALUE,
            category: Error,
            template: "Type `{0}` has no default value.",
        },
        DiagnosticMessage {
            code: WRONG_ARITY,
            category: Error,
            template: "Expected {0} argument(s), but got {1}.",
        },
        DiagnosticMessage {
            code: NOT_A_FUNCTION,
            category: Error,
            template: "Cannot apply a value of type `{0}`.",
        },
        DiagnosticMessage {
            code: UNDEFINED_NAME,
            category: Error,
            template: "Cannot resolve name `{0}`.",
        },
        DiagnosticMessage {
            code: INTERNAL_STD_LIB_CLASS,
            category: Error,
            template: "Standard-library type `{0}` cannot be instantiated.",
        },
        DiagnosticMessage {
            code: MODULE_NOT_ALLOWED,
            category: Error,
            template: "Access to module `{0}` is not allowed.",
        },
        DiagnosticMessage {
            code: MODULE_NOT_FOUND,
            category: Error,
            template: "Cannot resolve module `{0}`.",
        },
        DiagnosticMessage {
            code: WRONG_OPERAND_TYPE,
            category: Error,
            template: "Operator `{0}` cannot be applied to a value of type `{1}`.",
        },
        DiagnosticMessage {
            code: RECURSION_LIMIT_EXCEEDED,
            category: Error,
            template: "Evaluation recursion limit of {0} exceeded.",
        },
        DiagnosticMessage {
            code: ELEMENT_INDEX_OUT_OF_RANGE,
            category: Error,
            template: "Element index {0} is out of range for a listing of length {1}.",
        },
        DiagnosticMessage {
            code: CANNOT_SPREAD_VALUE,
            category: Error,
            template: "Cannot spread a value of type `{0}`.",
        },
        DiagnosticMessage {
            code: KEY_NOT_FOUND,
            category: Error,
            template: "Cannot find key `{0}`.",
        },
        DiagnosticMessage {
            code: INTEGER_OVERFLOW,
            category: Error,
            template: "Integer overflow in arithmetic expression.",
        },
        DiagnosticMessage {
            code: MALFORMED_MIRROR,
            category: Error,
            template: "Malformed type mirror: {0}.",
        },
    ]
};

static MESSAGES_BY_CODE: Lazy<FxHashMap<u32, &'static DiagnosticMessage>> = Lazy::new(|| {
    DIAGNOSTIC_MESSAGES
        .iter()
        .map(|m| (m.code, m))
        .collect::<FxHashMap<_, _>>()
});

pub fn get_message_template(code: u32) -> Option<&'static str> {
    MESSAGES_BY_CODE.get(&code).map(|m| m.template)
}

/// Substitute `{0}`-style placeholders in a template.
pub fn format_message(template: &str, args: &[String]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// Format the catalog message for `code`, falling back to the raw arguments
/// when the code is unknown.
pub fn render_message(code: u32, args: &[String]) -> String {
    match get_message_template(code) {
        Some(template) => format_message(template, args),
        None => format!("error {code}: {}", args.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_lookup_and_formatting() {
        let template = get_message_template(diagnostic_codes::TYPE_MISMATCH).unwrap();
        let msg = format_message(template, &["Int".to_string(), "String".to_string()]);
        assert_eq!(msg, "Expected a value of type `Int`, but got type `String`.");
    }

    #[test]
    fn unknown_code_falls_back() {
        let msg = render_message(9999, &["x".to_string()]);
        assert!(msg.contains("9999"));
    }
}
