//! Structured connection data for each backend.
//!
//! Every type renders deterministically to the connection string its driver
//! understands. Options that still hold their default value are left out.

use super::ConnectionString;
use crate::storage::BackendFault;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;

/// Default MySQL server port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Default MySQL SSL mode.
pub const DEFAULT_MYSQL_SSL_MODE: &str = "none";

/// Default PostgreSQL server port.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Path that selects an in-memory `SQLite` database.
pub const SQLITE_MEMORY_PATH: &str = ":memory:";

const SERVER_KEYS: &[&str] = &["Server", "Host", "Data Source", "Address"];
const DATABASE_KEYS: &[&str] = &["Database", "Initial Catalog"];
const USER_KEYS: &[&str] = &["Uid", "User ID", "User", "Username"];
const PASSWORD_KEYS: &[&str] = &["Pwd", "Password"];

/// Connection data for a MySQL server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MySqlConnectionData {
    /// Hostname or IP address.
    pub server: String,
    /// Database name.
    pub database: String,
    /// Login name.
    pub user: String,
    /// Login password.
    #[serde(deserialize_with = "secret_string_serde::deserialize")]
    pub password: SecretString,
    /// Server port.
    pub port: u16,
    /// SSL mode (`none`, `preferred`, `required`, ...).
    pub ssl_mode: String,
    /// Whether the driver pools connections.
    pub pooling: bool,
    /// Connect timeout in seconds; `0` keeps the driver default.
    pub connection_timeout: u32,
    /// Statement timeout in seconds; `0` keeps the driver default.
    pub command_timeout: u32,
    /// Character set; empty keeps the server default.
    pub charset: String,
    /// Whether prepare requests are ignored by the driver.
    pub ignore_prepare: bool,
}

impl Default for MySqlConnectionData {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            user: String::new(),
            password: SecretString::from(String::new()),
            port: DEFAULT_MYSQL_PORT,
            ssl_mode: DEFAULT_MYSQL_SSL_MODE.to_string(),
            pooling: true,
            connection_timeout: 0,
            command_timeout: 0,
            charset: String::new(),
            ignore_prepare: true,
        }
    }
}

impl MySqlConnectionData {
    /// Creates connection data for `server` and `database`.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            user: user.into(),
            password: SecretString::from(password.into()),
            ..Self::default()
        }
    }

    /// Builds connection data from parsed connection string options.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is missing or a numeric or boolean
    /// option cannot be parsed.
    pub fn from_options(cs: &ConnectionString) -> Result<Self> {
        let mut data = Self {
            server: cs
                .get_any(SERVER_KEYS)
                .ok_or_else(|| Error::config("mysql_connection", BackendFault::MissingKey("Server")))?
                .to_string(),
            ..Self::default()
        };
        if let Some(v) = cs.get_any(DATABASE_KEYS) {
            data.database = v.to_string();
        }
        if let Some(v) = cs.get_any(USER_KEYS) {
            data.user = v.to_string();
        }
        if let Some(v) = cs.get_any(PASSWORD_KEYS) {
            data.password = SecretString::from(v.to_string());
        }
        if let Some(v) = cs.get("Port") {
            data.port = parse_option("Port", v)?;
        }
        if let Some(v) = cs.get_any(&["SslMode", "Ssl Mode"]) {
            data.ssl_mode = v.to_string();
        }
        if let Some(v) = cs.get("Pooling") {
            data.pooling = parse_bool("Pooling", v)?;
        }
        if let Some(v) = cs.get_any(&["Connection Timeout", "Connect Timeout"]) {
            data.connection_timeout = parse_option("Connection Timeout", v)?;
        }
        if let Some(v) = cs.get("default command timeout") {
            data.command_timeout = parse_option("default command timeout", v)?;
        }
        if let Some(v) = cs.get_any(&["CharSet", "Character Set"]) {
            data.charset = v.to_string();
        }
        if let Some(v) = cs.get("IgnorePrepare") {
            data.ignore_prepare = parse_bool("IgnorePrepare", v)?;
        }
        Ok(data)
    }

    /// Returns the connection string options.
    #[must_use]
    pub fn to_options(&self) -> ConnectionString {
        let mut cs = ConnectionString::new();
        cs.set("Server", self.server.as_str());
        if self.port != DEFAULT_MYSQL_PORT {
            cs.set("Port", self.port.to_string());
        }
        cs.set("Database", self.database.as_str());
        cs.set("Uid", self.user.as_str());
        cs.set("Pwd", self.password.expose_secret());
        if !self.ssl_mode.eq_ignore_ascii_case(DEFAULT_MYSQL_SSL_MODE) {
            cs.set("SslMode", self.ssl_mode.as_str());
        }
        if !self.pooling {
            cs.set("Pooling", "false");
        }
        if self.connection_timeout != 0 {
            cs.set("Connection Timeout", self.connection_timeout.to_string());
        }
        if self.command_timeout != 0 {
            cs.set("default command timeout", self.command_timeout.to_string());
        }
        if !self.charset.is_empty() {
            cs.set("CharSet", self.charset.as_str());
        }
        if !self.ignore_prepare {
            cs.set("IgnorePrepare", "false");
        }
        cs
    }

    /// Renders the ADO-style connection string.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        self.to_options().to_string()
    }
}

/// Connection data for a `SQLite` database file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConnectionData {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Opens the database read-only.
    pub read_only: bool,
}

impl Default for SqliteConnectionData {
    fn default() -> Self {
        Self {
            path: PathBuf::from(SQLITE_MEMORY_PATH),
            read_only: false,
        }
    }
}

impl SqliteConnectionData {
    /// Creates connection data for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
        }
    }

    /// Builds connection data from `Data Source=...` or `URI=file:...`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither key is present.
    pub fn from_options(cs: &ConnectionString) -> Result<Self> {
        let source = cs
            .get_any(&["Data Source", "DataSource", "Filename"])
            .or_else(|| {
                cs.get("URI")
                    .map(|uri| uri.strip_prefix("file:").unwrap_or(uri))
            })
            .ok_or_else(|| {
                Error::config("sqlite_connection", BackendFault::MissingKey("Data Source"))
            })?;

        let read_only = match cs.get_any(&["Read Only", "ReadOnly"]) {
            Some(v) => parse_bool("Read Only", v)?,
            None => false,
        };

        Ok(Self {
            path: PathBuf::from(source),
            read_only,
        })
    }

    /// Returns `true` when the data selects an in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == SQLITE_MEMORY_PATH
    }

    /// Renders the connection string.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        let mut cs = ConnectionString::new();
        cs.set("Data Source", self.path.to_string_lossy());
        if self.read_only {
            cs.set("Read Only", "true");
        }
        cs.to_string()
    }
}

/// Connection data for an ODBC data source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OdbcConnectionData {
    /// Data source name configured in the driver manager.
    pub dsn: String,
    /// Driver name, used when no DSN is given.
    pub driver: String,
    /// Server or host name.
    pub server: String,
    /// Database name.
    pub database: String,
    /// Login name.
    pub user: String,
    /// Login password.
    #[serde(deserialize_with = "secret_string_serde::deserialize")]
    pub password: SecretString,
}

impl Default for OdbcConnectionData {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            driver: String::new(),
            server: String::new(),
            database: String::new(),
            user: String::new(),
            password: SecretString::from(String::new()),
        }
    }
}

impl OdbcConnectionData {
    /// Creates connection data for a configured DSN.
    #[must_use]
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Creates connection data for a driver.
    #[must_use]
    pub fn with_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    /// Renders the ODBC connection string.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        let password = self.password.expose_secret();
        let cs: ConnectionString = [
            ("DSN", self.dsn.as_str()),
            ("Driver", self.driver.as_str()),
            ("Server", self.server.as_str()),
            ("Database", self.database.as_str()),
            ("UID", self.user.as_str()),
            ("PWD", password),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect();
        cs.to_odbc_string()
    }
}

/// Connection data for a PostgreSQL server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConnectionData {
    /// Hostname, IP address or socket directory.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Login name.
    pub user: String,
    /// Login password.
    #[serde(deserialize_with = "secret_string_serde::deserialize")]
    pub password: SecretString,
    /// Connect timeout in seconds; `0` waits indefinitely.
    pub connect_timeout: u32,
    /// Application name reported to the server.
    pub application_name: String,
}

impl Default for PostgresConnectionData {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_POSTGRES_PORT,
            dbname: String::new(),
            user: String::new(),
            password: SecretString::from(String::new()),
            connect_timeout: 0,
            application_name: String::new(),
        }
    }
}

impl PostgresConnectionData {
    /// Creates connection data for `host` and `dbname`.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            dbname: dbname.into(),
            user: user.into(),
            password: SecretString::from(password.into()),
            ..Self::default()
        }
    }

    /// Renders a libpq `key=value` connection string.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        let port = self.port.to_string();
        let timeout = self.connect_timeout.to_string();
        let mut parts = vec![format!("host={}", libpq_quote(&self.host))];
        if self.port != DEFAULT_POSTGRES_PORT {
            parts.push(format!("port={port}"));
        }
        for (key, value) in [
            ("dbname", self.dbname.as_str()),
            ("user", self.user.as_str()),
            ("password", self.password.expose_secret()),
            ("application_name", self.application_name.as_str()),
        ] {
            if !value.is_empty() {
                parts.push(format!("{key}={}", libpq_quote(value)));
            }
        }
        if self.connect_timeout != 0 {
            parts.push(format!("connect_timeout={timeout}"));
        }
        parts.join(" ")
    }
}

fn libpq_quote(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config("parse_connection_option", format!("{key}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::config(
            "parse_connection_option",
            format!("{key}: '{other}' is not a boolean"),
        )),
    }
}

mod secret_string_serde {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_defaults_are_omitted() {
        let data = MySqlConnectionData::new("localhost", "test", "root", "secret");
        assert_eq!(
            data.to_connection_string(),
            "Server=localhost;Database=test;Uid=root;Pwd=secret"
        );
    }

    #[test]
    fn test_mysql_non_defaults_are_emitted() {
        let data = MySqlConnectionData {
            port: 3307,
            ssl_mode: "Required".to_string(),
            pooling: false,
            connection_timeout: 5,
            command_timeout: 30,
            charset: "utf8mb4".to_string(),
            ignore_prepare: false,
            ..MySqlConnectionData::new("db", "app", "u", "p;w")
        };
        assert_eq!(
            data.to_connection_string(),
            "Server=db;Port=3307;Database=app;Uid=u;Pwd=\"p;w\";SslMode=Required;Pooling=false;\
             Connection Timeout=5;default command timeout=30;CharSet=utf8mb4;IgnorePrepare=false"
        );
    }

    #[test]
    fn test_mysql_from_options() {
        let cs = ConnectionString::parse(
            "SERVER=db;Port=3310;DATABASE=app;USER ID=u;PASSWORD=p;Pooling=no;CharSet=latin1",
        )
        .unwrap();
        let data = MySqlConnectionData::from_options(&cs).unwrap();
        assert_eq!(data.server, "db");
        assert_eq!(data.port, 3310);
        assert_eq!(data.user, "u");
        assert_eq!(data.password.expose_secret(), "p");
        assert!(!data.pooling);
        assert_eq!(data.charset, "latin1");
        assert!(data.ignore_prepare);
    }

    #[test]
    fn test_mysql_from_options_errors() {
        let cs = ConnectionString::parse("Database=app").unwrap();
        assert!(MySqlConnectionData::from_options(&cs).is_err());
        let cs = ConnectionString::parse("Server=db;Port=http").unwrap();
        assert!(MySqlConnectionData::from_options(&cs).is_err());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let data = MySqlConnectionData::new("db", "app", "u", "hunter2");
        assert!(!format!("{data:?}").contains("hunter2"));
    }

    #[test]
    fn test_sqlite_connection_string() {
        let data = SqliteConnectionData::new("/tmp/app.db");
        assert_eq!(data.to_connection_string(), "Data Source=/tmp/app.db");
        assert!(!data.is_memory());
        assert!(SqliteConnectionData::default().is_memory());
    }

    #[test]
    fn test_sqlite_from_uri() {
        let cs = ConnectionString::parse("URI=file:/var/db/a.sqlite;Read Only=True").unwrap();
        let data = SqliteConnectionData::from_options(&cs).unwrap();
        assert_eq!(data.path, PathBuf::from("/var/db/a.sqlite"));
        assert!(data.read_only);
    }

    #[test]
    fn test_odbc_connection_string() {
        let mut data = OdbcConnectionData::with_driver("SQLite3 ODBC Driver");
        data.database = "/tmp/a.db".to_string();
        assert_eq!(
            data.to_connection_string(),
            "Driver=SQLite3 ODBC Driver;Database=/tmp/a.db"
        );
        assert_eq!(OdbcConnectionData::with_dsn("prod").to_connection_string(), "DSN=prod");
    }

    #[test]
    fn test_postgres_connection_string() {
        let data = PostgresConnectionData::new("localhost", "app", "postgres", "it's");
        assert_eq!(
            data.to_connection_string(),
            "host=localhost dbname=app user=postgres password='it\\'s'"
        );
        let data = PostgresConnectionData {
            port: 5433,
            connect_timeout: 10,
            ..PostgresConnectionData::default()
        };
        assert_eq!(
            data.to_connection_string(),
            "host=localhost port=5433 connect_timeout=10"
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let data: MySqlConnectionData =
            toml::from_str("server = \"db\"\npassword = \"pw\"\nport = 3310").unwrap();
        assert_eq!(data.server, "db");
        assert_eq!(data.port, 3310);
        assert_eq!(data.password.expose_secret(), "pw");
        assert_eq!(data.ssl_mode, DEFAULT_MYSQL_SSL_MODE);
    }
}
