//! Rendering values into diagnostic messages.
//!
//! Messages embed values through a truncating renderer bounded to the
//! configured column budget (80 by default) minus the indent already
//! consumed. Rendering never forces object members.

use crate::eval::Evaluator;
use crate::object::ObjectKind;
use crate::value::Value;

/// A pluggable output renderer (JSON, YAML, plist, ...). Renderers live
/// outside the core; `Evaluation::render` dispatches to them.
pub trait Renderer {
    fn render(
        &self,
        evaluator: &mut Evaluator<'_>,
        value: &Value,
    ) -> Result<Vec<u8>, crate::error::EvalError>;
}

impl<'c> Evaluator<'c> {
    /// Render a value for embedding in a message, truncated to the column
    /// budget.
    pub fn render_value(&self, value: &Value) -> String {
        self.render_value_indented(value, 0)
    }

    /// Same, with `indent` columns already consumed by the surrounding
    /// message.
    pub fn render_value_indented(&self, value: &Value, indent: usize) -> String {
        let budget = self
            .options
            .max_message_width
            .saturating_sub(indent)
            .max(16);
        truncate(self.render_untruncated(value), budget)
    }

    fn render_untruncated(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => render_float(*f),
            Value::Str(s) => format!("{s:?}"),
            Value::Null(_) => "null".to_string(),
            Value::Duration(d) => format!("{}.{}", render_float(d.value), d.unit.symbol()),
            Value::DataSize(d) => format!("{}.{}", render_float(d.value), d.unit.symbol()),
            Value::Pair(p) => format!(
                "Pair({}, {})",
                self.render_untruncated(&p.0),
                self.render_untruncated(&p.1)
            ),
            Value::Regex(r) => format!("Regex({:?})", r.pattern.as_ref()),
            Value::IntSeq(s) => {
                if s.step == 1 {
                    format!("IntSeq({}, {})", s.start, s.end)
                } else {
                    format!("IntSeq({}, {}).step({})", s.start, s.end, s.step)
                }
            }
            Value::List(items) => {
                let rendered: Vec<String> =
                    items.iter().map(|v| self.render_untruncated(v)).collect();
                format!("List({})", rendered.join(", "))
            }
            Value::Set(items) => {
                let rendered: Vec<String> =
                    items.iter().map(|v| self.render_untruncated(v)).collect();
                format!("Set({})", rendered.join(", "))
            }
            Value::Map(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .flat_map(|(k, v)| {
                        [self.render_untruncated(k), self.render_untruncated(v)]
                    })
                    .collect();
                format!("Map({})", rendered.join(", "))
            }
            Value::Object(obj) => match self.heap.get(*obj).kind {
                ObjectKind::Typed(class) => {
                    format!("new {} {{ ... }}", self.ctx.registry.class_name(class))
                }
                ObjectKind::Dynamic => "new Dynamic { ... }".to_string(),
                ObjectKind::Listing => "new Listing { ... }".to_string(),
                ObjectKind::Mapping => "new Mapping { ... }".to_string(),
            },
            Value::Function(f) => format!("Function{}", f.arity()),
            Value::Class(class) => {
                format!("Class({})", self.ctx.registry.class_name(*class))
            }
            Value::TypeAlias(alias) => {
                let name = self.ctx.types.alias(*alias).name;
                format!("TypeAlias({})", self.ctx.resolve(name))
            }
        }
    }
}

fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn truncate(rendered: String, budget: usize) -> String {
    if rendered.chars().count() <= budget {
        return rendered;
    }
    let mut out: String = rendered.chars().take(budget.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_keep_a_fraction_digit() {
        assert_eq!(render_float(1.0), "1.0");
        assert_eq!(render_float(1.5), "1.5");
    }

    #[test]
    fn truncation_appends_ellipsis() {
        let long = "x".repeat(100);
        let cut = truncate(long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }
}
