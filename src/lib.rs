//! # sqlwrap
//!
//! A uniform data-access facade over heterogeneous relational database
//! drivers.
//!
//! One [`DataAccess`] value owns one connection to one backend and exposes the
//! same operation surface for every driver: connection lifecycle,
//! transactions, non-query/scalar/query execution with positional parameters,
//! and fully materialized tables.
//!
//! ## Features
//!
//! - `SQLite` through `rusqlite` (always available)
//! - MySQL through `mysql` (`--features mysql`)
//! - ODBC through `odbc-api` (`--features odbc`)
//! - PostgreSQL through `tokio-postgres` (`--features postgres`)
//! - Uniform error classification with a stable [`ErrorCode`] on every failure
//!
//! ## Example
//!
//! ```rust
//! use sqlwrap::storage::SqliteBackend;
//! use sqlwrap::{DataAccess, ErrorCode, params};
//!
//! let mut db = DataAccess::new(SqliteBackend::in_memory());
//! db.open()?;
//! db.execute_non_query("CREATE TABLE info (key TEXT, value TEXT)", &[])?;
//! db.execute_non_query(
//!     "INSERT INTO info VALUES (?, ?)",
//!     &params!["DefaultDomain", "endevx"],
//! )?;
//! let value: String =
//!     db.execute_scalar("SELECT value FROM info WHERE key = ?", &params!["DefaultDomain"])?;
//! assert_eq!(value, "endevx");
//! assert_eq!(db.last_error_code(), ErrorCode::Success);
//! # Ok::<(), sqlwrap::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod access;
pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use access::{DataAccess, DataAdapter, QueryReader};
pub use config::{BackendConfig, BackendKind, SqlWrapConfig};
pub use models::{
    ConversionError, DataColumn, DataRow, DataTable, ErrorCode, FromValue, Scalar, Value,
    ValueKind,
};
pub use storage::{Backend, DriverError, RowCursor};

/// First line of every formatted diagnostic.
pub const DIAGNOSTIC_HEADER: &str = "sqlwrap error: a data-access operation failed";

/// Error type for sqlwrap operations.
///
/// Every failing public operation returns this single type. The
/// classification is available through [`code`](Self::code); the driver
/// failure that triggered it, if any, through [`std::error::Error::source`].
///
/// # Error Code Triggers
///
/// | Code | Raised When |
/// |------|-------------|
/// | `ConnectionOpenFailed` / `ConnectionCloseFailed` | The driver cannot open or close the connection |
/// | `TransactionBeginFailed` | The driver cannot begin, or a transaction is already active |
/// | `TransactionCommitFailed` / `TransactionRollbackFailed` | The driver call fails, or no transaction is active |
/// | `NotAllowedDuringTransaction` | An auto-connect operation is called inside a transaction |
/// | `OperationNonQueryFailed` / `OperationScalarFailed` / `OperationQueryFailed` | Statement execution or scalar conversion fails |
/// | `OperationDataAdapterFailed` / `OperationTableFailed` | Tabular retrieval fails |
/// | `None` | Configuration cannot be loaded or a backend cannot be constructed |
#[derive(Debug, ThisError)]
#[error("{diagnostic}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    diagnostic: String,
    #[source]
    source: Option<DriverError>,
}

impl Error {
    /// Creates an error without an underlying cause.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            diagnostic: format_diagnostic(code, &message, None),
            message,
            source: None,
        }
    }

    /// Creates an error wrapping an underlying driver failure.
    #[must_use]
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl Into<DriverError>,
    ) -> Self {
        let message = message.into();
        let source = source.into();
        Self {
            code,
            diagnostic: format_diagnostic(code, &message, Some(source.as_ref())),
            message,
            source: Some(source),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::None, format!("{operation}: {cause}"))
    }

    /// Returns the classification of this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the unformatted message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Renders the multi-line diagnostic carried by every [`Error`].
///
/// # Examples
///
/// ```rust
/// use sqlwrap::{ErrorCode, format_diagnostic};
///
/// let text = format_diagnostic(ErrorCode::OperationScalarFailed, "", None);
/// assert!(text.contains("-- no information given --"));
/// assert!(text.contains("2200"));
/// ```
#[must_use]
pub fn format_diagnostic(
    code: ErrorCode,
    message: &str,
    cause: Option<&(dyn std::error::Error + Send + Sync + 'static)>,
) -> String {
    let mut text = format!("{DIAGNOSTIC_HEADER} [{code}]\n");
    if message.is_empty() {
        text.push_str("-- no information given --");
    } else {
        text.push_str(message);
    }
    if let Some(cause) = cause {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
    }
    text
}

/// Result type alias for sqlwrap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorCode::OperationQueryFailed, "query failed");
        let text = err.to_string();
        assert!(text.starts_with(DIAGNOSTIC_HEADER));
        assert!(text.contains("2300 operation-query-failed"));
        assert!(text.contains("query failed"));
        assert!(!text.contains("caused by"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_error_with_source() {
        let cause = std::io::Error::other("disk on fire");
        let err = Error::with_source(ErrorCode::ConnectionOpenFailed, "open failed", cause);
        assert_eq!(err.code(), ErrorCode::ConnectionOpenFailed);
        assert_eq!(err.message(), "open failed");
        assert!(err.to_string().ends_with("caused by: disk on fire"));
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_empty_message() {
        let err = Error::new(ErrorCode::OperationTableFailed, "");
        assert!(err.to_string().contains("-- no information given --"));
    }

    #[test]
    fn test_config_error_has_no_classification() {
        let err = Error::config("read_config_file", "not found");
        assert_eq!(err.code(), ErrorCode::None);
        assert_eq!(err.message(), "read_config_file: not found");
    }
}
