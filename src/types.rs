//! Value model and public option types.
//!
//! [`Value`] is the format-neutral shape of a document node and of every runtime
//! slot. [`FieldType`] is the declared semantic type of a property, and
//! [`ConfigField`] ties a Rust type to the [`FieldType`] it declares.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;

/// A dynamically typed document value.
///
/// Documents natively carry only the wide numeric forms (`i64` and `f64`);
/// narrower declared widths are enforced by the coercer, not by the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<not set>"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {key} = ")?;
                    write_nested(f, item)?;
                }
                if !map.is_empty() {
                    write!(f, " ")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Strings nested in lists and maps are quoted so that `["a, b"]` stays readable.
fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "{s:?}"),
        other => write!(f, "{other}"),
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            // NaN and infinities have no JSON form and map to null.
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Into::into).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A general numeric value, for properties that accept any number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

/// The declared semantic type of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Any number, integer or floating point, stored as read.
    Number,
    /// An ordered sequence whose elements all have the given type.
    List(Box<FieldType>),
    /// A string-keyed map whose values all have the given type.
    Map(Box<FieldType>),
    /// Opaque: accepts any non-null document value unchanged.
    Any,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Byte => write!(f, "byte"),
            FieldType::Short => write!(f, "short"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Float => write!(f, "float"),
            FieldType::Double => write!(f, "double"),
            FieldType::Number => write!(f, "number"),
            FieldType::List(elem) => write!(f, "list of {elem}"),
            FieldType::Map(elem) => write!(f, "map of {elem}"),
            FieldType::Any => write!(f, "any"),
        }
    }
}

/// A Rust type that can back a configuration property.
///
/// The implementation decides the declared [`FieldType`] and how the type moves in
/// and out of a [`Value`] slot. `from_value` only has to understand values that
/// the coercer produced for `field_type()`.
pub trait ConfigField: Sized {
    fn field_type() -> FieldType;

    /// Whether a null document value may be assigned.
    fn nullable() -> bool {
        false
    }

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

impl ConfigField for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ConfigField for bool {
    fn field_type() -> FieldType {
        FieldType::Boolean
    }

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! integer_field {
    ($ty:ty, $field_type:expr) => {
        impl ConfigField for $ty {
            fn field_type() -> FieldType {
                $field_type
            }

            fn into_value(self) -> Value {
                Value::Integer(i64::from(self))
            }

            fn from_value(value: &Value) -> Option<Self> {
                value.as_integer().and_then(|i| <$ty>::try_from(i).ok())
            }
        }
    };
}

integer_field!(i8, FieldType::Byte);
integer_field!(i16, FieldType::Short);
integer_field!(i32, FieldType::Int);
integer_field!(i64, FieldType::Long);

impl ConfigField for f32 {
    fn field_type() -> FieldType {
        FieldType::Float
    }

    fn into_value(self) -> Value {
        Value::Float(widen_f32(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x as f32),
            Value::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }
}

impl ConfigField for f64 {
    fn field_type() -> FieldType {
        FieldType::Double
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl ConfigField for Number {
    fn field_type() -> FieldType {
        FieldType::Number
    }

    fn into_value(self) -> Value {
        match self {
            Number::Integer(i) => Value::Integer(i),
            Number::Float(x) => Value::Float(x),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }
}

impl<T: ConfigField> ConfigField for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(ConfigField::into_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}

impl<T: ConfigField> ConfigField for IndexMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_map()?
            .iter()
            .map(|(k, v)| T::from_value(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl<T: ConfigField> ConfigField for BTreeMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_map()?
            .iter()
            .map(|(k, v)| T::from_value(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl ConfigField for Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: ConfigField> ConfigField for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn nullable() -> bool {
        true
    }

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Store an `f32` as the `f64` with the same shortest decimal form, so `0.1f32`
/// renders as `0.1` instead of `0.10000000149011612`.
pub(crate) fn widen_f32(x: f32) -> f64 {
    if !x.is_finite() {
        return x as f64;
    }
    x.to_string().parse::<f64>().unwrap_or(x as f64)
}

/// Where the configuration file lives, when no explicit path is given.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit directory.
    Path(PathBuf),
}

/// Initial content copied verbatim into a configuration file when it is created.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultSource {
    /// In-memory bytes, typically from `include_bytes!`.
    Bytes(Cow<'static, [u8]>),
    /// A file to copy from.
    Path(PathBuf),
}

impl DefaultSource {
    pub fn bytes(bytes: &'static [u8]) -> Self {
        DefaultSource::Bytes(Cow::Borrowed(bytes))
    }
}

/// How a document is rendered to text. Owned by each configuration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit comment lines. When `false`, comments are kept in memory but not rendered.
    pub comments: bool,
    /// Separate section headers from the preceding content with a blank line.
    pub section_spacing: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            comments: true,
            section_spacing: true,
        }
    }
}
