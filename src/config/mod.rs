//! Configuration management.
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! default_on_null = true
//!
//! [backend]
//! kind = "mysql"
//! server = "localhost"
//! database = "app"
//! user = "app"
//! password = "secret"
//! ```
//!
//! A backend section may instead carry a raw `connection_string`, which
//! takes precedence over the structured fields.

mod connection;
mod connection_string;

pub use connection::{
    DEFAULT_MYSQL_PORT, DEFAULT_MYSQL_SSL_MODE, DEFAULT_POSTGRES_PORT, MySqlConnectionData,
    OdbcConnectionData, PostgresConnectionData, SQLITE_MEMORY_PATH, SqliteConnectionData,
};
pub use connection_string::ConnectionString;

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable selecting the backend kind.
pub const ENV_BACKEND: &str = "SQLWRAP_BACKEND";

/// Environment variable holding a raw connection string.
pub const ENV_CONNECTION_STRING: &str = "SQLWRAP_CONNECTION_STRING";

/// Environment variable enabling default-on-null scalars.
pub const ENV_DEFAULT_ON_NULL: &str = "SQLWRAP_DEFAULT_ON_NULL";

/// Supported backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `SQLite` (always available).
    #[default]
    Sqlite,
    /// MySQL (`mysql` feature).
    #[serde(rename = "mysql")]
    MySql,
    /// ODBC (`odbc` feature).
    Odbc,
    /// PostgreSQL (`postgres` feature).
    Postgres,
}

impl BackendKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [Self::Sqlite, Self::MySql, Self::Odbc, Self::Postgres];

    /// Parses a backend name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "mysql" | "mariadb" => Some(Self::MySql),
            "odbc" => Some(Self::Odbc),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Odbc => "odbc",
            Self::Postgres => "postgres",
        }
    }

    /// Returns `true` when support for this backend was compiled in.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        match self {
            Self::Sqlite => true,
            Self::MySql => cfg!(feature = "mysql"),
            Self::Odbc => cfg!(feature = "odbc"),
            Self::Postgres => cfg!(feature = "postgres"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection plus its connection data.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// `SQLite` database.
    Sqlite {
        /// Raw connection string, used instead of `data` when set.
        connection_string: Option<String>,
        /// Structured connection data.
        #[serde(flatten)]
        data: SqliteConnectionData,
    },
    /// MySQL server.
    #[serde(rename = "mysql")]
    MySql {
        /// Raw connection string, used instead of `data` when set.
        connection_string: Option<String>,
        /// Structured connection data.
        #[serde(flatten)]
        data: MySqlConnectionData,
    },
    /// ODBC data source.
    Odbc {
        /// Raw connection string, used instead of `data` when set.
        connection_string: Option<String>,
        /// Structured connection data.
        #[serde(flatten)]
        data: OdbcConnectionData,
    },
    /// PostgreSQL server.
    Postgres {
        /// Raw connection string, used instead of `data` when set.
        connection_string: Option<String>,
        /// Structured connection data.
        #[serde(flatten)]
        data: PostgresConnectionData,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::for_kind(BackendKind::Sqlite)
    }
}

impl BackendConfig {
    /// Creates a configuration with default connection data.
    #[must_use]
    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Sqlite => Self::Sqlite {
                connection_string: None,
                data: SqliteConnectionData::default(),
            },
            BackendKind::MySql => Self::MySql {
                connection_string: None,
                data: MySqlConnectionData::default(),
            },
            BackendKind::Odbc => Self::Odbc {
                connection_string: None,
                data: OdbcConnectionData::default(),
            },
            BackendKind::Postgres => Self::Postgres {
                connection_string: None,
                data: PostgresConnectionData::default(),
            },
        }
    }

    /// Creates a configuration from a raw connection string.
    #[must_use]
    pub fn from_connection_string(kind: BackendKind, connection_string: impl Into<String>) -> Self {
        let mut config = Self::for_kind(kind);
        config.set_connection_string(connection_string);
        config
    }

    /// Creates a `SQLite` configuration for the file at `path`.
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::Sqlite {
            connection_string: None,
            data: SqliteConnectionData::new(path),
        }
    }

    /// Returns the backend kind.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Sqlite { .. } => BackendKind::Sqlite,
            Self::MySql { .. } => BackendKind::MySql,
            Self::Odbc { .. } => BackendKind::Odbc,
            Self::Postgres { .. } => BackendKind::Postgres,
        }
    }

    /// Returns the raw connection string override, if set.
    #[must_use]
    pub fn raw_connection_string(&self) -> Option<&str> {
        match self {
            Self::Sqlite {
                connection_string, ..
            }
            | Self::MySql {
                connection_string, ..
            }
            | Self::Odbc {
                connection_string, ..
            }
            | Self::Postgres {
                connection_string, ..
            } => connection_string.as_deref(),
        }
    }

    /// Sets the raw connection string override.
    pub fn set_connection_string(&mut self, value: impl Into<String>) {
        let value = Some(value.into());
        match self {
            Self::Sqlite {
                connection_string, ..
            }
            | Self::MySql {
                connection_string, ..
            }
            | Self::Odbc {
                connection_string, ..
            }
            | Self::Postgres {
                connection_string, ..
            } => *connection_string = value,
        }
    }

    /// Returns the effective connection string.
    #[must_use]
    pub fn connection_string(&self) -> String {
        if let Some(raw) = self.raw_connection_string() {
            return raw.to_string();
        }
        match self {
            Self::Sqlite { data, .. } => data.to_connection_string(),
            Self::MySql { data, .. } => data.to_connection_string(),
            Self::Odbc { data, .. } => data.to_connection_string(),
            Self::Postgres { data, .. } => data.to_connection_string(),
        }
    }
}

/// Main configuration for sqlwrap.
#[derive(Debug, Clone, Default)]
pub struct SqlWrapConfig {
    /// Substitute the type default for `NULL` scalars.
    pub default_on_null: bool,
    /// Backend selection.
    pub backend: BackendConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Default-on-null flag.
    pub default_on_null: Option<bool>,
    /// Backend section.
    pub backend: Option<BackendConfig>,
}

impl SqlWrapConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config("read_config_file", format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::config("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Returns the default configuration file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("sqlwrap").join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns default configuration if no config file is found or it
    /// cannot be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e.message(), "Ignoring invalid config file");
                Self::default()
            },
        }
    }

    /// Converts a `ConfigFile` to `SqlWrapConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(v) = file.default_on_null {
            config.default_on_null = v;
        }
        if let Some(backend) = file.backend {
            config.backend = backend;
        }
        config
    }

    /// Applies `SQLWRAP_*` environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// A backend kind different from the configured one replaces the backend
    /// section with that kind's defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(name) = lookup(ENV_BACKEND) {
            let kind = BackendKind::parse(&name).ok_or_else(|| {
                Error::config("parse_env", format!("{ENV_BACKEND}: unknown backend '{name}'"))
            })?;
            self = self.with_backend_kind(kind);
        }
        if let Some(cs) = lookup(ENV_CONNECTION_STRING) {
            self.backend.set_connection_string(cs);
        }
        if let Some(flag) = lookup(ENV_DEFAULT_ON_NULL) {
            self.default_on_null = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::config(
                        "parse_env",
                        format!("{ENV_DEFAULT_ON_NULL}: '{other}' is not a boolean"),
                    ));
                },
            };
        }
        Ok(self)
    }

    /// Switches the backend kind, keeping the section when it already matches.
    #[must_use]
    pub fn with_backend_kind(mut self, kind: BackendKind) -> Self {
        if self.backend.kind() != kind {
            self.backend = BackendConfig::for_kind(kind);
        }
        self
    }

    /// Sets the default-on-null flag.
    #[must_use]
    pub const fn with_default_on_null(mut self, enabled: bool) -> Self {
        self.default_on_null = enabled;
        self
    }
}
