//! `SQLite` backend.

use super::connection::{ensure_parent_dir, open_connection};
use super::cursor::SqliteCursor;
use crate::config::{ConnectionString, SqliteConnectionData};
use crate::models::Value;
use crate::storage::{Backend, BackendFault, DriverResult, RowCursor};
use crate::{Error, Result};
use rusqlite::{Connection, params_from_iter};
use std::path::{Path, PathBuf};

/// `SQLite` implementation of [`Backend`].
///
/// Query cursors step the underlying statement one row per fetch.
pub struct SqliteBackend {
    data: SqliteConnectionData,
    conn: Option<Connection>,
}

impl SqliteBackend {
    /// Creates a backend for the database file at `path`.
    ///
    /// Missing parent directories are created. `:memory:` selects an
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory cannot be created.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_data(SqliteConnectionData::new(path.as_ref()))
    }

    /// Creates a backend from a `Data Source=...` or `URI=file:...` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or names no database.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let cs = ConnectionString::parse(connection_string)?;
        Self::from_data(SqliteConnectionData::from_options(&cs)?)
    }

    /// Creates a backend from structured connection data.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory cannot be created.
    pub fn from_data(data: SqliteConnectionData) -> Result<Self> {
        if !data.is_memory() && !data.read_only {
            ensure_parent_dir(&data.path)
                .map_err(|e| Error::config("create_database_dir", format!("{}: {e}", data.path.display())))?;
        }
        Ok(Self { data, conn: None })
    }

    /// Creates a backend for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            data: SqliteConnectionData::default(),
            conn: None,
        }
    }

    /// Returns the database file, or `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        (!self.data.is_memory()).then_some(&self.data.path)
    }

    fn connection(&self) -> DriverResult<&Connection> {
        Ok(self.conn.as_ref().ok_or(BackendFault::NotOpen)?)
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.data.path)
            .field("read_only", &self.data.read_only)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn open(&mut self) -> DriverResult<()> {
        if self.conn.is_none() {
            self.conn = Some(open_connection(&self.data)?);
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let mut stmt = self.connection()?.prepare_cached(sql)?;
        let changed = stmt.execute(params_from_iter(params))?;
        Ok(changed as u64)
    }

    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value> {
        let mut stmt = self.connection()?.prepare_cached(sql)?;
        if stmt.column_count() == 0 {
            stmt.execute(params_from_iter(params))?;
            return Ok(Value::Null);
        }
        let mut rows = stmt.query(params_from_iter(params))?;
        let value = match rows.next()? {
            Some(row) => Value::from(row.get_ref(0)?),
            None => Value::Null,
        };
        Ok(value)
    }

    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>> {
        let stmt = self.connection()?.prepare_cached(sql)?;
        Ok(Box::new(SqliteCursor::start(stmt, params)?))
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        self.connection()?.prepare_cached(sql)?;
        Ok(())
    }
}
