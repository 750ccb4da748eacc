//! Property-based tests for connection strings and scalar conversion.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Rendering a connection string and parsing it back is lossless
//! - Key lookup is case-insensitive
//! - Integer scalars survive every conversion path that can represent them
//! - `NULL` handling depends only on nullability and default-on-null

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use sqlwrap::config::ConnectionString;
use sqlwrap::{Scalar, Value};

fn option_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[A-Za-z][A-Za-z0-9]{0,12}", "[ -~]{0,24}"), 0..8)
}

// ============================================================================
// Connection strings
// ============================================================================

proptest! {
    /// Property: Display output parses back to the same options.
    #[test]
    fn prop_connection_string_roundtrips(pairs in option_pairs()) {
        let cs: ConnectionString = pairs.into_iter().collect();
        let rendered = cs.to_string();
        let parsed = ConnectionString::parse(&rendered).unwrap();
        prop_assert_eq!(parsed, cs);
    }

    /// Property: ODBC rendering parses back to the same values.
    #[test]
    fn prop_odbc_string_roundtrips(pairs in option_pairs()) {
        let cs: ConnectionString = pairs.into_iter().collect();
        let parsed = ConnectionString::parse(&cs.to_odbc_string()).unwrap();
        prop_assert_eq!(parsed, cs);
    }

    /// Property: lookup ignores key case.
    #[test]
    fn prop_lookup_is_case_insensitive(key in "[A-Za-z]{1,12}", value in "[a-z0-9]{1,12}") {
        let cs = ConnectionString::parse(&format!("{key}={value}")).unwrap();
        prop_assert_eq!(cs.get(&key.to_uppercase()), Some(value.as_str()));
        prop_assert_eq!(cs.get(&key.to_lowercase()), Some(value.as_str()));
    }
}

// ============================================================================
// Scalar conversion
// ============================================================================

proptest! {
    /// Property: integers convert to i64, from text and to text.
    #[test]
    fn prop_integer_scalar_paths(n in any::<i64>()) {
        prop_assert_eq!(Scalar::<i64>::classify(Value::Integer(n), false), Scalar::Value(n));
        prop_assert_eq!(Scalar::<i64>::classify(Value::Text(n.to_string()), false), Scalar::Value(n));
        prop_assert_eq!(
            Scalar::<String>::classify(Value::Integer(n), false),
            Scalar::Value(n.to_string())
        );
    }

    /// Property: narrowing succeeds exactly when the value fits.
    #[test]
    fn prop_narrowing_respects_range(n in any::<i64>()) {
        let outcome = Scalar::<i32>::classify(Value::Integer(n), false);
        match i32::try_from(n) {
            Ok(v) => prop_assert_eq!(outcome, Scalar::Value(v)),
            Err(_) => {
                let is_mismatch = matches!(outcome, Scalar::Mismatch { expected: "i32", .. });
                prop_assert!(is_mismatch);
            },
        }
    }

    /// Property: NULL resolves by nullability and the default-on-null flag.
    #[test]
    fn prop_null_resolution(default_on_null in any::<bool>()) {
        let outcome = Scalar::<i64>::classify(Value::Null, default_on_null);
        prop_assert_eq!(outcome.is_resolved(), default_on_null);
        prop_assert_eq!(
            Scalar::<Option<i64>>::classify(Value::Null, default_on_null),
            Scalar::Value(None)
        );
    }
}
