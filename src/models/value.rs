//! Driver-neutral cell values.
//!
//! [`Value`] is what parameters are bound from and what every backend
//! marshals its native results into. The variants follow the storage classes
//! every supported driver can represent without loss.

use serde::{Serialize, Serializer};
use std::fmt;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// A signed 64-bit integer.
    Integer(i64),
    /// A double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

/// The storage class of a [`Value`], used as a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// No non-null value seen.
    #[default]
    Null,
    /// Integer column.
    Integer,
    /// Floating point column.
    Real,
    /// Text column.
    Text,
    /// Binary column.
    Blob,
}

impl ValueKind {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Returns the storage class of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Integer(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::Text(_) => ValueKind::Text,
            Self::Blob(_) => ValueKind::Blob,
        }
    }

    /// Returns `true` for SQL `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Parses a command-line style literal.
    ///
    /// `null` (any case) becomes [`Value::Null`], integers and reals are
    /// recognized, anything else is text. Quote a literal with `'...'` to
    /// force text.
    #[must_use]
    pub fn parse_literal(literal: &str) -> Self {
        if literal.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if let Some(quoted) = literal
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return Self::Text(quoted.to_string());
        }
        if let Ok(v) = literal.parse::<i64>() {
            return Self::Integer(v);
        }
        if let Ok(v) = literal.parse::<f64>() {
            if v.is_finite() {
                return Self::Real(v);
            }
        }
        Self::Text(literal.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(v) => write!(f, "0x{}", hex::encode(v)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Blob(v) => serializer.serialize_str(&hex::encode(v)),
        }
    }
}

macro_rules! value_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Integer(i64::from(v))
                }
            }
        )*
    };
}

value_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Builds a positional parameter array from heterogeneous values.
///
/// ```rust
/// use sqlwrap::{Value, params};
///
/// let p = params!["DefaultDomain", 42, None::<i64>];
/// assert_eq!(p[0], Value::Text("DefaultDomain".to_string()));
/// assert_eq!(p[1], Value::Integer(42));
/// assert!(p[2].is_null());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        [] as [$crate::Value; 0]
    };
    ($($param:expr),+ $(,)?) => {
        [$($crate::Value::from($param)),+]
    };
}
