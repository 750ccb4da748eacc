//! PostgreSQL backend built on `tokio-postgres`.
//!
//! The async client is driven from a private current-thread runtime, so the
//! backend must not be used from inside another Tokio runtime. Statements use
//! `$1`, `$2`, ... placeholders. Parameters are converted to the type the
//! server inferred for each placeholder; the `types` submodule holds the mapping.

mod types;

use crate::models::Value;
use crate::storage::{Backend, BackendFault, BufferedCursor, DriverResult, RowCursor};
use std::collections::HashMap;
use tokio::runtime::Runtime;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls, Row, Statement};
use types::{bind_value, row_values};

/// Number of prepared statements kept per connection.
const STATEMENT_CACHE_CAPACITY: usize = 64;

/// PostgreSQL implementation of [`Backend`].
pub struct PostgresBackend {
    config: Config,
    session: Option<Session>,
}

struct Session {
    runtime: Runtime,
    client: Client,
    statements: HashMap<String, Statement>,
}

impl PostgresBackend {
    /// Creates a backend from a libpq `key=value` string or a
    /// `postgresql://` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid.
    pub fn new(connection_string: &str) -> crate::Result<Self> {
        let config = connection_string
            .parse::<Config>()
            .map_err(|e| crate::Error::config("postgres_connection", e))?;
        Ok(Self {
            config,
            session: None,
        })
    }

    /// Creates a backend from structured connection data.
    ///
    /// # Errors
    ///
    /// Returns an error if the rendered connection string is invalid.
    pub fn from_data(data: &crate::config::PostgresConnectionData) -> crate::Result<Self> {
        Self::new(&data.to_connection_string())
    }

    fn session(&mut self) -> DriverResult<&mut Session> {
        Ok(self.session.as_mut().ok_or(BackendFault::NotOpen)?)
    }
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("hosts", &self.config.get_hosts().len())
            .field("dbname", &self.config.get_dbname())
            .field("open", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    fn connect(config: &Config) -> DriverResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (client, connection) = runtime.block_on(config.connect(NoTls))?;
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection terminated");
            }
        });
        Ok(Self {
            runtime,
            client,
            statements: HashMap::new(),
        })
    }

    fn statement(&mut self, sql: &str) -> DriverResult<Statement> {
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self.runtime.block_on(self.client.prepare(sql))?;
        if self.statements.len() >= STATEMENT_CACHE_CAPACITY {
            self.statements.clear();
        }
        self.statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }

    fn batch(&self, sql: &str) -> DriverResult<()> {
        self.runtime.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let stmt = self.statement(sql)?;
        let bound = bind_params(&stmt, params)?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(AsRef::as_ref).collect();
        Ok(self.runtime.block_on(self.client.execute(&stmt, &refs))?)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DriverResult<(Statement, Vec<Row>)> {
        let stmt = self.statement(sql)?;
        let bound = bind_params(&stmt, params)?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(AsRef::as_ref).collect();
        let rows = self.runtime.block_on(self.client.query(&stmt, &refs))?;
        Ok((stmt, rows))
    }
}

fn bind_params(stmt: &Statement, params: &[Value]) -> DriverResult<Vec<Box<dyn ToSql + Sync>>> {
    if stmt.params().len() != params.len() {
        return Err(BackendFault::Unsupported(format!(
            "statement expects {} parameters, got {}",
            stmt.params().len(),
            params.len()
        ))
        .into());
    }
    stmt.params()
        .iter()
        .zip(params)
        .map(|(ty, value)| bind_value(ty, value))
        .collect()
}

impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn open(&mut self) -> DriverResult<()> {
        if self.session.is_none() {
            self.session = Some(Session::connect(&self.config)?);
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        // Dropping the client ends the connection task; the runtime goes last.
        if let Some(Session {
            runtime,
            client,
            statements,
        }) = self.session.take()
        {
            drop(statements);
            drop(client);
            runtime.shutdown_background();
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.session()?.batch("BEGIN")
    }

    fn commit_transaction(&mut self) -> DriverResult<()> {
        self.session()?.batch("COMMIT")
    }

    fn rollback_transaction(&mut self) -> DriverResult<()> {
        self.session()?.batch("ROLLBACK")
    }

    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        self.session()?.execute(sql, params)
    }

    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value> {
        let (_, rows) = self.session()?.query(sql, params)?;
        match rows.first() {
            Some(row) if !row.is_empty() => Ok(row_values(row)?.swap_remove(0)),
            _ => Ok(Value::Null),
        }
    }

    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>> {
        let (stmt, rows) = self.session()?.query(sql, params)?;
        let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = rows.iter().map(row_values).collect::<DriverResult<Vec<_>>>()?;
        Ok(Box::new(BufferedCursor::new(columns, rows)))
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        self.session()?.statement(sql).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_strings() {
        assert!(PostgresBackend::new("host=localhost user=postgres dbname=app").is_ok());
        assert!(PostgresBackend::new("postgresql://postgres@localhost:5433/app").is_ok());
        assert!(PostgresBackend::new("host=localhost port=notaport").is_err());
    }

    #[test]
    fn test_closed_backend_reports_not_open() {
        let mut backend = PostgresBackend::new("host=localhost").unwrap();
        assert!(!backend.is_open());
        let err = backend.execute_non_query("SELECT 1", &[]).unwrap_err();
        assert!(err.downcast_ref::<BackendFault>().is_some());
        assert!(backend.close().is_ok());
    }
}
