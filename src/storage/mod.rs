//! Storage layer: one [`Backend`] implementation per database driver.
//!
//! - **`SQLite`**: `rusqlite`, always available
//! - **MySQL**: `mysql`, behind the `mysql` feature
//! - **ODBC**: `odbc-api`, behind the `odbc` feature
//! - **PostgreSQL**: `tokio-postgres`, behind the `postgres` feature

// Allow significant_drop_tightening - statements borrow the connection for the whole call.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit type mapping tables.
#![allow(clippy::match_same_arms)]

pub mod sqlite;
pub mod traits;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "odbc")]
pub mod odbc;
#[cfg(feature = "postgres")]
pub mod postgresql;

pub use sqlite::SqliteBackend;
pub use traits::{Backend, BackendFault, BufferedCursor, DriverError, DriverResult, RowCursor};

#[cfg(feature = "mysql")]
pub use self::mysql::MySqlBackend;
#[cfg(feature = "odbc")]
pub use odbc::OdbcBackend;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresBackend;
