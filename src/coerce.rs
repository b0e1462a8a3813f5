//! Lenient type coercion from document values into declared property types.
//!
//! The compatibility table, by document kind:
//!
//! | document kind | accepted by |
//! |---------------|-------------|
//! | string        | string, any |
//! | boolean       | boolean, any |
//! | number        | byte, short, int, long, float, double, number, any |
//! | null          | nullable (`Option<T>`) properties |
//! | sequence      | list whose element type accepts every element, any |
//! | container     | map whose value type accepts every value, any |
//!
//! Incompatibility is not an error: [`coerce`] returns `None` and the caller keeps
//! the property's current value.
//!
//! Narrowing: integers into byte/short/int are range-checked and an out-of-range
//! value is incompatible (so `414` never silently wraps into a byte). Doubles into
//! float are narrowed to `f32`; a finite double too large for `f32` is
//! incompatible. Integers widen into float/double. Floating point values never
//! narrow into integer types.

use std::fmt;

use indexmap::IndexMap;

use crate::types::{FieldType, Value, widen_f32};

/// The kind of a document node, as seen by the coercer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Boolean,
    Number,
    Null,
    Sequence,
    Container,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Null => "null",
            ValueKind::Sequence => "sequence",
            ValueKind::Container => "container",
        };
        write!(f, "{name}")
    }
}

pub fn classify(value: &Value) -> ValueKind {
    match value {
        Value::Null => ValueKind::Null,
        Value::String(_) => ValueKind::String,
        Value::Boolean(_) => ValueKind::Boolean,
        Value::Integer(_) | Value::Float(_) => ValueKind::Number,
        Value::List(_) => ValueKind::Sequence,
        Value::Map(_) => ValueKind::Container,
    }
}

/// Whether `value` can be assigned to a property of type `ty` at all.
pub fn is_compatible(value: &Value, ty: &FieldType, nullable: bool) -> bool {
    coerce(value, ty, nullable).is_some()
}

/// Convert a document value into the slot value for a property of type `ty`.
///
/// Returns `None` when the value is incompatible.
pub fn coerce(value: &Value, ty: &FieldType, nullable: bool) -> Option<Value> {
    match value {
        Value::Null => nullable.then_some(Value::Null),
        Value::String(s) => match ty {
            FieldType::String | FieldType::Any => Some(Value::String(s.clone())),
            _ => None,
        },
        Value::Boolean(b) => match ty {
            FieldType::Boolean | FieldType::Any => Some(Value::Boolean(*b)),
            _ => None,
        },
        Value::Integer(i) => coerce_integer(*i, ty),
        Value::Float(x) => coerce_float(*x, ty),
        Value::List(items) => match ty {
            FieldType::List(elem) => items
                .iter()
                .map(|item| coerce(item, elem, false))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            FieldType::Any => Some(value.clone()),
            _ => None,
        },
        Value::Map(map) => match ty {
            FieldType::Map(elem) => map
                .iter()
                .map(|(k, v)| coerce(v, elem, false).map(|v| (k.clone(), v)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Value::Map),
            FieldType::Any => Some(value.clone()),
            _ => None,
        },
    }
}

fn coerce_integer(i: i64, ty: &FieldType) -> Option<Value> {
    match ty {
        FieldType::Byte => i8::try_from(i).ok().map(|_| Value::Integer(i)),
        FieldType::Short => i16::try_from(i).ok().map(|_| Value::Integer(i)),
        FieldType::Int => i32::try_from(i).ok().map(|_| Value::Integer(i)),
        FieldType::Long | FieldType::Number | FieldType::Any => Some(Value::Integer(i)),
        FieldType::Float => Some(Value::Float(widen_f32(i as f32))),
        FieldType::Double => Some(Value::Float(i as f64)),
        _ => None,
    }
}

fn coerce_float(x: f64, ty: &FieldType) -> Option<Value> {
    match ty {
        FieldType::Float => {
            let narrowed = x as f32;
            if x.is_finite() && narrowed.is_infinite() {
                return None;
            }
            Some(Value::Float(widen_f32(narrowed)))
        }
        FieldType::Double | FieldType::Number | FieldType::Any => Some(Value::Float(x)),
        _ => None,
    }
}
