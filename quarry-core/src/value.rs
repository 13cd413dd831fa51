use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display},
};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

/// Column name to value map, the shape of every raw row coming from a dispatch channel.
pub type ValueMap = BTreeMap<String, Value>;

/// Dynamically typed column value.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Decimal(Decimal),
    Varchar(String),
    Blob(Box<[u8]>),
    Date(Date),
    Timestamp(PrimitiveDateTime),
    Uuid(Uuid),
    /// Structured values: must be deflated before leaving the process.
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value can be stored as a single column.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(..) | Value::Map(..))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            Value::Float64(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(v) => Some(v),
            _ => None,
        }
    }

    /// Total order within the same family of values, numbers compare across widths.
    ///
    /// Returns `None` for nulls and for values of unrelated types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
            (Value::Int64(l), Value::Int64(r)) => Some(l.cmp(r)),
            (Value::Decimal(l), Value::Decimal(r)) => Some(l.cmp(r)),
            (Value::Varchar(l), Value::Varchar(r)) => Some(l.cmp(r)),
            (Value::Blob(l), Value::Blob(r)) => Some(l.cmp(r)),
            (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
            (Value::Timestamp(l), Value::Timestamp(r)) => Some(l.cmp(r)),
            (Value::Uuid(l), Value::Uuid(r)) => Some(l.cmp(r)),
            (l, r) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        }
    }

    /// Equality used by lookups: numbers of different widths are equal when their value is.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self == other || self.compare(other) == Some(Ordering::Equal)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Varchar(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "'{v}'"),
            Value::Uuid(v) => write!(f, "'{v}'"),
            Value::List(v) => {
                f.write_str("[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(v) => {
                f.write_str("{")?;
                for (i, (key, item)) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Build a [`ValueMap`] from `key => value` pairs, values go through [`crate::AsValue`].
#[macro_export]
macro_rules! values {
    () => { $crate::ValueMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $(map.insert(::std::string::String::from($key), $crate::Value::from($value));)+
        map
    }};
}
