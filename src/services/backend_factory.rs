//! Backend factory.
//!
//! Centralizes backend construction so that callers can pick a driver at
//! runtime from configuration:
//!
//! ```text
//! BackendFactory
//!   ├── create(&BackendConfig) → Box<dyn Backend>
//!   └── connect(&SqlWrapConfig) → DataAccess<Box<dyn Backend>>
//! ```
//!
//! Backends whose Cargo feature is disabled are reported as configuration
//! errors rather than compiled out of the configuration format.

use crate::access::DataAccess;
use crate::config::{BackendConfig, BackendKind, SqlWrapConfig};
use crate::storage::{Backend, SqliteBackend};
use crate::{Error, Result};

/// A backend chosen at runtime.
pub type DynBackend = Box<dyn Backend>;

/// Factory for creating storage backends from configuration.
///
/// # Example
///
/// ```rust
/// use sqlwrap::BackendConfig;
/// use sqlwrap::services::BackendFactory;
///
/// let backend = BackendFactory::create(&BackendConfig::default())?;
/// assert_eq!(backend.name(), "sqlite");
/// # Ok::<(), sqlwrap::Error>(())
/// ```
pub struct BackendFactory;

impl BackendFactory {
    /// Creates the backend described by `config`. The connection is not
    /// opened.
    ///
    /// A raw connection string takes precedence over structured fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the backend's
    /// feature is not compiled in.
    pub fn create(config: &BackendConfig) -> Result<DynBackend> {
        let kind = config.kind();
        if !kind.is_enabled() {
            return Err(Error::config(
                "create_backend",
                format!("backend '{kind}' requires the '{}' feature", Self::feature(kind)),
            ));
        }

        let backend: DynBackend = match config {
            BackendConfig::Sqlite {
                connection_string: Some(raw),
                ..
            } => Box::new(SqliteBackend::from_connection_string(raw)?),
            BackendConfig::Sqlite { data, .. } => Box::new(SqliteBackend::from_data(data.clone())?),
            #[cfg(feature = "mysql")]
            BackendConfig::MySql {
                connection_string: Some(raw),
                ..
            } => Box::new(crate::storage::MySqlBackend::new(raw)?),
            #[cfg(feature = "mysql")]
            BackendConfig::MySql { data, .. } => {
                Box::new(crate::storage::MySqlBackend::from_data(data))
            },
            #[cfg(feature = "odbc")]
            BackendConfig::Odbc {
                connection_string: Some(raw),
                ..
            } => Box::new(crate::storage::OdbcBackend::new(raw.as_str())),
            #[cfg(feature = "odbc")]
            BackendConfig::Odbc { data, .. } => Box::new(crate::storage::OdbcBackend::from_data(data)),
            #[cfg(feature = "postgres")]
            BackendConfig::Postgres {
                connection_string: Some(raw),
                ..
            } => Box::new(crate::storage::PostgresBackend::new(raw)?),
            #[cfg(feature = "postgres")]
            BackendConfig::Postgres { data, .. } => {
                Box::new(crate::storage::PostgresBackend::from_data(data)?)
            },
            #[allow(unreachable_patterns)]
            _ => {
                return Err(Error::config(
                    "create_backend",
                    format!("backend '{kind}' is not available"),
                ));
            },
        };

        tracing::debug!(backend = backend.name(), "Created backend");
        Ok(backend)
    }

    /// Creates the configured backend and wraps it in a [`DataAccess`]
    /// honouring the configured default-on-null flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created.
    pub fn connect(config: &SqlWrapConfig) -> Result<DataAccess<DynBackend>> {
        let backend = Self::create(&config.backend)?;
        Ok(DataAccess::new(backend).with_default_on_null(config.default_on_null))
    }

    const fn feature(kind: BackendKind) -> &'static str {
        match kind {
            BackendKind::Sqlite => "sqlite",
            BackendKind::MySql => "mysql",
            BackendKind::Odbc => "odbc",
            BackendKind::Postgres => "postgres",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_create_sqlite_from_data() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("factory.db");

        let backend = BackendFactory::create(&BackendConfig::sqlite(&path)).unwrap();
        assert_eq!(backend.name(), "sqlite");
        assert!(!backend.is_open());
        assert!(path.parent().is_some_and(std::path::Path::exists));
    }

    #[test]
    fn test_create_sqlite_from_connection_string() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cs = format!("Data Source={}", temp_dir.path().join("raw.db").display());
        let config = BackendConfig::from_connection_string(BackendKind::Sqlite, cs);

        let mut db = DataAccess::new(BackendFactory::create(&config).unwrap());
        let one: i64 = db.execute_scalar_acon("SELECT 1", &[]).unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn test_connect_applies_default_on_null() {
        let config = SqlWrapConfig::new().with_default_on_null(true);
        let mut db = BackendFactory::connect(&config).unwrap();
        assert!(db.default_on_null());
        db.open().unwrap();
        let value: i64 = db.execute_scalar("SELECT NULL", &[]).unwrap();
        assert_eq!(value, 0);
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_disabled_backend_is_config_error() {
        let config = BackendConfig::for_kind(BackendKind::MySql);
        let err = BackendFactory::create(&config).err().unwrap();
        assert_eq!(err.code(), ErrorCode::None);
        assert!(err.message().contains("'mysql' feature"));
    }
}
