//! The tagged value universe.
//!
//! A `Value` is the runtime representation of every expression result:
//! scalars, the opaque domain values (`Duration`, `DataSize`, `Pair`,
//! `Regex`, `IntSeq`), the three collection kinds, heap objects, functions,
//! and the first-class reflective values (classes, type aliases).
//!
//! Containers are reference-counted so that caching a member value is a
//! cheap clone. Evaluation is single-threaded per module, so `Rc` suffices.
//!
//! Equality and hashing here are *shallow at the object boundary*: heap
//! objects compare by id and functions by closure identity. The structural,
//! materializing comparison required by the language's `==` operator lives
//! on the evaluator (`Evaluator::value_equals`), which can force members.

use crate::classes::ClassId;
use crate::function::FunctionValue;
use crate::object::ObjectId;
use crate::types::AliasId;
use indexmap::{IndexMap, IndexSet};
use rpkl_common::Atom;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// Null, optionally carrying the default value of the slot's declared
    /// type. Amending such a null recurses into the carried default.
    Null(Option<Rc<Value>>),
    Duration(Duration),
    DataSize(DataSize),
    Pair(Rc<(Value, Value)>),
    Regex(Rc<RegexValue>),
    IntSeq(IntSeq),
    List(Rc<Vec<Value>>),
    Set(Rc<IndexSet<Value>>),
    Map(Rc<IndexMap<Value, Value>>),
    /// A member-bearing composite living in the per-evaluation heap.
    Object(ObjectId),
    Function(Rc<FunctionValue>),
    Class(ClassId),
    TypeAlias(AliasId),
}

impl Value {
    pub fn null() -> Value {
        Value::Null(None)
    }

    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Short tag used in log output and internal errors.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Null(_) => "Null",
            Value::Duration(_) => "Duration",
            Value::DataSize(_) => "DataSize",
            Value::Pair(_) => "Pair",
            Value::Regex(_) => "Regex",
            Value::IntSeq(_) => "IntSeq",
            Value::List(_) => "List",
            Value::Set(_) => "Set",
            Value::Map(_) => "Map",
            Value::Object(_) => "Object",
            Value::Function(_) => "Function",
            Value::Class(_) => "Class",
            Value::TypeAlias(_) => "TypeAlias",
        }
    }
}

// Numbers compare by value across Int/Float, so 1 == 1.0 and both hash
// alike. Floats with no integral representation hash by normalized bits
// (0.0 == -0.0, all NaNs coincide).

fn float_as_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn canonical_float_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                canonical_float_bits(*a) == canonical_float_bits(*b)
            }
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                float_as_int(*b) == Some(*a)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::DataSize(a), Value::DataSize(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.pattern == b.pattern,
            (Value::IntSeq(a), Value::IntSeq(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::TypeAlias(a), Value::TypeAlias(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Bool(b) => {
                state.write_u8(0);
                b.hash(state);
            }
            Value::Int(i) => {
                state.write_u8(1);
                i.hash(state);
            }
            Value::Float(f) => {
                // Integral floats hash like the equal Int.
                if let Some(i) = float_as_int(*f) {
                    state.write_u8(1);
                    i.hash(state);
                } else {
                    state.write_u8(2);
                    canonical_float_bits(*f).hash(state);
                }
            }
            Value::Str(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Null(_) => state.write_u8(4),
            Value::Duration(d) => {
                state.write_u8(5);
                d.hash(state);
            }
            Value::DataSize(d) => {
                state.write_u8(6);
                d.hash(state);
            }
            Value::Pair(p) => {
                state.write_u8(7);
                p.hash(state);
            }
            Value::Regex(r) => {
                state.write_u8(8);
                r.pattern.hash(state);
            }
            Value::IntSeq(s) => {
                state.write_u8(9);
                s.hash(state);
            }
            Value::List(l) => {
                state.write_u8(10);
                for v in l.iter() {
                    v.hash(state);
                }
            }
            Value::Set(s) => {
                state.write_u8(11);
                // Order-independent combination; sets are unordered.
                let mut acc: u64 = 0;
                for v in s.iter() {
                    let mut h = rustc_hash::FxHasher::default();
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                acc.hash(state);
            }
            Value::Map(m) => {
                state.write_u8(12);
                // Equality ignores entry order, so the hash must too.
                let mut acc: u64 = 0;
                for (k, v) in m.iter() {
                    let mut h = rustc_hash::FxHasher::default();
                    k.hash(&mut h);
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                acc.hash(state);
            }
            Value::Object(id) => {
                state.write_u8(13);
                id.hash(state);
            }
            Value::Function(f) => {
                state.write_u8(14);
                (Rc::as_ptr(f) as usize).hash(state);
            }
            Value::Class(c) => {
                state.write_u8(15);
                c.hash(state);
            }
            Value::TypeAlias(a) => {
                state.write_u8(16);
                a.hash(state);
            }
        }
    }
}

// =============================================================================
// Domain values
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            DurationUnit::Nanos => "ns",
            DurationUnit::Micros => "us",
            DurationUnit::Millis => "ms",
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "min",
            DurationUnit::Hours => "h",
            DurationUnit::Days => "d",
        }
    }

    fn seconds_factor(&self) -> f64 {
        match self {
            DurationUnit::Nanos => 1e-9,
            DurationUnit::Micros => 1e-6,
            DurationUnit::Millis => 1e-3,
            DurationUnit::Seconds => 1.0,
            DurationUnit::Minutes => 60.0,
            DurationUnit::Hours => 3600.0,
            DurationUnit::Days => 86400.0,
        }
    }
}

/// A duration with its declared unit. `1000.ms` and `1.s` are equal.
#[derive(Clone, Copy, Debug)]
pub struct Duration {
    pub value: f64,
    pub unit: DurationUnit,
}

impl Duration {
    pub fn new(value: f64, unit: DurationUnit) -> Self {
        Duration { value, unit }
    }

    pub fn total_seconds(&self) -> f64 {
        self.value * self.unit.seconds_factor()
    }

    /// Seconds per one unit of this duration's declared unit.
    pub fn unit_seconds_factor(&self) -> f64 {
        self.unit.seconds_factor()
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        canonical_float_bits(self.total_seconds()) == canonical_float_bits(other.total_seconds())
    }
}

impl Eq for Duration {}

impl Hash for Duration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_float_bits(self.total_seconds()).hash(state);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataSizeUnit {
    Bytes,
    Kilobytes,
    Kibibytes,
    Megabytes,
    Mebibytes,
    Gigabytes,
    Gibibytes,
    Terabytes,
    Tebibytes,
    Petabytes,
    Pebibytes,
}

impl DataSizeUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            DataSizeUnit::Bytes => "b",
            DataSizeUnit::Kilobytes => "kb",
            DataSizeUnit::Kibibytes => "kib",
            DataSizeUnit::Megabytes => "mb",
            DataSizeUnit::Mebibytes => "mib",
            DataSizeUnit::Gigabytes => "gb",
            DataSizeUnit::Gibibytes => "gib",
            DataSizeUnit::Terabytes => "tb",
            DataSizeUnit::Tebibytes => "tib",
            DataSizeUnit::Petabytes => "pb",
            DataSizeUnit::Pebibytes => "pib",
        }
    }

    fn bytes_factor(&self) -> f64 {
        match self {
            DataSizeUnit::Bytes => 1.0,
            DataSizeUnit::Kilobytes => 1e3,
            DataSizeUnit::Kibibytes => 1024.0,
            DataSizeUnit::Megabytes => 1e6,
            DataSizeUnit::Mebibytes => 1024.0 * 1024.0,
            DataSizeUnit::Gigabytes => 1e9,
            DataSizeUnit::Gibibytes => 1024.0 * 1024.0 * 1024.0,
            DataSizeUnit::Terabytes => 1e12,
            DataSizeUnit::Tebibytes => 1024.0 * 1024.0 * 1024.0 * 1024.0,
            DataSizeUnit::Petabytes => 1e15,
            DataSizeUnit::Pebibytes => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        }
    }
}

/// A data size with its declared unit. `1024.b` and `1.kib` are equal.
#[derive(Clone, Copy, Debug)]
pub struct DataSize {
    pub value: f64,
    pub unit: DataSizeUnit,
}

impl DataSize {
    pub fn new(value: f64, unit: DataSizeUnit) -> Self {
        DataSize { value, unit }
    }

    pub fn total_bytes(&self) -> f64 {
        self.value * self.unit.bytes_factor()
    }

    /// Bytes per one unit of this data size's declared unit.
    pub fn unit_bytes_factor(&self) -> f64 {
        self.unit.bytes_factor()
    }
}

impl PartialEq for DataSize {
    fn eq(&self, other: &Self) -> bool {
        canonical_float_bits(self.total_bytes()) == canonical_float_bits(other.total_bytes())
    }
}

impl Eq for DataSize {}

impl Hash for DataSize {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_float_bits(self.total_bytes()).hash(state);
    }
}

/// An opaque regular-expression value. The core stores the pattern verbatim;
/// matching is an embedder concern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegexValue {
    pub pattern: Rc<str>,
}

/// An inclusive integer sequence with a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntSeq {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl IntSeq {
    pub fn new(start: i64, end: i64) -> Self {
        IntSeq {
            start,
            end,
            step: 1,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let (start, end, step) = (self.start, self.end, self.step);
        std::iter::successors(Some(start), move |&i| Some(i + step))
            .take_while(move |&i| if step >= 0 { i <= end } else { i >= end })
    }
}

/// A qualified member name, rendered as `Owner.name` in stack traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub owner: Atom,
    pub name: Atom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn durations_normalize_units() {
        let a = Duration::new(1000.0, DurationUnit::Millis);
        let b = Duration::new(1.0, DurationUnit::Seconds);
        assert_eq!(a, b);
    }

    #[test]
    fn data_sizes_normalize_units() {
        let a = DataSize::new(1024.0, DataSizeUnit::Bytes);
        let b = DataSize::new(1.0, DataSizeUnit::Kibibytes);
        assert_eq!(a, b);
        assert_ne!(a, DataSize::new(1.0, DataSizeUnit::Kilobytes));
    }

    #[test]
    fn int_seq_iterates_inclusive() {
        let seq = IntSeq::new(1, 4);
        assert_eq!(seq.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }
}
