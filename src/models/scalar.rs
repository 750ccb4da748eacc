//! Typed scalar results.
//!
//! A scalar statement yields one raw [`Value`]. Converting it to the type the
//! caller asked for has four possible outcomes, captured by [`Scalar`]:
//!
//! | Outcome | Raised When |
//! |---------|-------------|
//! | `Value` | The raw value converts to `T` (a nullable `T` accepts `NULL`) |
//! | `NullDefault` | `NULL` into a non-nullable `T` with default-on-null enabled |
//! | `Null` | `NULL` into a non-nullable `T` with default-on-null disabled |
//! | `Mismatch` | The raw value cannot be represented as `T` |

use super::{Value, ValueKind};
use thiserror::Error as ThisError;

/// Conversion from a raw [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Human-readable target type name used in diagnostics.
    fn type_name() -> &'static str;

    /// Converts a non-null value, returning `None` when it does not fit.
    fn from_value(value: Value) -> Option<Self>;

    /// The value produced for SQL `NULL`, or `None` when the type is not
    /// nullable.
    fn from_null() -> Option<Self> {
        None
    }
}

/// Failure to resolve a [`Scalar`] into a value.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum ConversionError {
    /// The statement produced `NULL` for a non-nullable type.
    #[error("scalar result is NULL and {expected} is not nullable")]
    NullValue {
        /// Requested type.
        expected: &'static str,
    },

    /// The value cannot be represented in the requested type.
    #[error("cannot convert {found} value '{value}' to {expected}")]
    Mismatch {
        /// Requested type.
        expected: &'static str,
        /// Storage class of the raw value.
        found: ValueKind,
        /// Rendered raw value.
        value: String,
    },
}

/// Classified outcome of a typed scalar conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<T> {
    /// The raw value converted successfully.
    Value(T),
    /// The raw value was `NULL` and the type default was substituted.
    NullDefault(T),
    /// The raw value was `NULL` and no default was allowed.
    Null {
        /// Requested type.
        expected: &'static str,
    },
    /// The raw value has an incompatible type.
    Mismatch {
        /// Requested type.
        expected: &'static str,
        /// The raw value as returned by the driver.
        found: Value,
    },
}

impl<T: FromValue + Default> Scalar<T> {
    /// Classifies a raw driver value.
    #[must_use]
    pub fn classify(raw: Value, default_on_null: bool) -> Self {
        if raw.is_null() {
            return match T::from_null() {
                Some(v) => Self::Value(v),
                None if default_on_null => Self::NullDefault(T::default()),
                None => Self::Null {
                    expected: T::type_name(),
                },
            };
        }

        let found = raw.clone();
        T::from_value(raw).map_or(
            Self::Mismatch {
                expected: T::type_name(),
                found,
            },
            Self::Value,
        )
    }
}

impl<T> Scalar<T> {
    /// Resolves the outcome into the converted value or a conversion error.
    pub fn into_result(self) -> Result<T, ConversionError> {
        match self {
            Self::Value(v) | Self::NullDefault(v) => Ok(v),
            Self::Null { expected } => Err(ConversionError::NullValue { expected }),
            Self::Mismatch { expected, found } => Err(ConversionError::Mismatch {
                expected,
                found: found.kind(),
                value: found.to_string(),
            }),
        }
    }

    /// Returns `true` when a value (converted or defaulted) is available.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Value(_) | Self::NullDefault(_))
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
        Value::Real(v) if v.fract() == 0.0 && v.abs() < 9.0e18 => Some(*v as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FromValue for i64 {
    fn type_name() -> &'static str {
        "i64"
    }

    fn from_value(value: Value) -> Option<Self> {
        parse_integer(&value)
    }
}

macro_rules! from_value_narrow_integer {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn type_name() -> &'static str {
                    stringify!($t)
                }

                fn from_value(value: Value) -> Option<Self> {
                    parse_integer(&value).and_then(|v| Self::try_from(v).ok())
                }
            }
        )*
    };
}

from_value_narrow_integer!(i32, i16, u32, u64, usize);

impl FromValue for f64 {
    fn type_name() -> &'static str {
        "f64"
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(v as Self),
            Value::Real(v) => Some(v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn type_name() -> &'static str {
        "f32"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Option<Self> {
        f64::from_value(value).map(|v| v as Self)
    }
}

impl FromValue for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(v != 0),
            Value::Real(v) => Some(v != 0.0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromValue for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            Value::Blob(b) => Self::from_utf8(b).ok(),
            other => Some(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn type_name() -> &'static str {
        "Vec<u8>"
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.into_bytes()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn type_name() -> &'static str {
        "Value"
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn type_name() -> &'static str {
        T::type_name()
    }

    fn from_value(value: Value) -> Option<Self> {
        T::from_value(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_integer_value() {
        let s: Scalar<i64> = Scalar::classify(Value::Integer(10), false);
        assert_eq!(s, Scalar::Value(10));
        assert_eq!(s.into_result(), Ok(10));
    }

    #[test]
    fn test_null_with_default() {
        let s: Scalar<i64> = Scalar::classify(Value::Null, true);
        assert_eq!(s, Scalar::NullDefault(0));
        assert_eq!(s.into_result(), Ok(0));
    }

    #[test]
    fn test_null_without_default() {
        let s: Scalar<i32> = Scalar::classify(Value::Null, false);
        assert!(!s.is_resolved());
        assert_eq!(
            s.into_result(),
            Err(ConversionError::NullValue { expected: "i32" })
        );
    }

    #[test]
    fn test_nullable_target_ignores_flag() {
        let s: Scalar<Option<i64>> = Scalar::classify(Value::Null, false);
        assert_eq!(s, Scalar::Value(None));
        let s: Scalar<Option<i64>> = Scalar::classify(Value::Integer(4), false);
        assert_eq!(s, Scalar::Value(Some(4)));
    }

    #[test]
    fn test_mismatch() {
        let s: Scalar<i64> = Scalar::classify(Value::Text("endevx".to_string()), true);
        assert!(matches!(s, Scalar::Mismatch { expected: "i64", .. }));
        let err = s.into_result().unwrap_err();
        assert!(err.to_string().contains("endevx"));
    }

    #[test_case(Value::Integer(10), Some(10))]
    #[test_case(Value::Text(" 10 ".to_string()), Some(10))]
    #[test_case(Value::Real(10.0), Some(10))]
    #[test_case(Value::Real(10.5), None)]
    #[test_case(Value::Blob(vec![1]), None)]
    fn test_i64_conversions(raw: Value, expected: Option<i64>) {
        assert_eq!(i64::from_value(raw), expected);
    }

    #[test]
    fn test_narrowing_out_of_range() {
        assert_eq!(i16::from_value(Value::Integer(70_000)), None);
        assert_eq!(u32::from_value(Value::Integer(-1)), None);
        assert_eq!(usize::from_value(Value::Integer(3)), Some(3));
    }

    #[test_case(Value::Integer(1), Some(true))]
    #[test_case(Value::Integer(0), Some(false))]
    #[test_case(Value::Text("TRUE".to_string()), Some(true))]
    #[test_case(Value::Text("maybe".to_string()), None)]
    fn test_bool_conversions(raw: Value, expected: Option<bool>) {
        assert_eq!(bool::from_value(raw), expected);
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(
            String::from_value(Value::Text("endevx".to_string())),
            Some("endevx".to_string())
        );
        assert_eq!(String::from_value(Value::Integer(10)), Some("10".to_string()));
        assert_eq!(String::from_value(Value::Blob(vec![0xff, 0xfe])), None);
    }

    #[test]
    fn test_raw_value_accepts_null() {
        let s: Scalar<Value> = Scalar::classify(Value::Null, false);
        assert_eq!(s, Scalar::Value(Value::Null));
    }
}
