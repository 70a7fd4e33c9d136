//! Owned snapshots of element values.

use crate::scalar::Scalar;

/// The current value of an element, detached from memory.
///
/// Produced by [`Element::get`](crate::element::Element::get) and accepted by
/// [`Element::set`](crate::element::Element::set); writing back a value just
/// read leaves memory unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    /// The stored address of a pointer.
    Address(u64),
    Text(String),
    /// String contents that are not valid UTF-8, kept byte for byte.
    Bytes(Vec<u8>),
    /// Array items, in order.
    List(Vec<Value>),
    /// Struct fields, in layout order.
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Integer view of integer scalars and addresses.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Scalar(s) => s.as_i128(),
            Value::Address(a) => Some(*a as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(|s| s.as_f64())
    }

    /// An address, from a pointer value or a non-negative integer.
    pub fn as_address(&self) -> Option<u64> {
        match self {
            Value::Address(a) => Some(*a),
            Value::Scalar(s) => s.as_i128().and_then(|v| u64::try_from(v).ok()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Raw string contents, from either representation.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(t) => Some(t.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a field of a record by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Short description used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Address(_) => "address",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

macro_rules! value_from_primitive {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

value_from_primitive!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64, bool);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
