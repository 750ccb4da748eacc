//! ODBC integration tests.
//!
//! These tests require an ODBC driver manager and a reachable data source.
//! Set `SQLWRAP_TEST_ODBC_CONNECTION` to enable them:
//!
//! ```bash
//! export SQLWRAP_TEST_ODBC_CONNECTION="Driver={SQLite3};Database=/tmp/sqlwrap.db"
//! cargo test --features odbc odbc_integration
//! ```

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr
)]
#![cfg(feature = "odbc")]

use sqlwrap::storage::OdbcBackend;
use sqlwrap::{DataAccess, ErrorCode};
use std::env;

/// Environment variable for the ODBC test connection string.
const ODBC_CONNECTION_ENV: &str = "SQLWRAP_TEST_ODBC_CONNECTION";

#[test]
fn test_ping_and_scalar() {
    let Ok(connection) = env::var(ODBC_CONNECTION_ENV) else {
        eprintln!("Skipping test: {ODBC_CONNECTION_ENV} not set.");
        return;
    };
    let mut db = DataAccess::new(OdbcBackend::new(connection));
    db.open().unwrap();
    let one: i64 = db.execute_scalar("SELECT 1", &[]).unwrap();
    assert_eq!(one, 1);
    db.close().unwrap();
    assert_eq!(db.last_error_code(), ErrorCode::Success);
}
