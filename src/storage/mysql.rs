//! MySQL backend built on the `mysql` driver.
//!
//! Statements use `?` placeholders and run through the binary protocol, so
//! the driver's statement cache covers repeated executions. Query rows are
//! streamed from the server as the cursor advances.

use crate::config::{ConnectionString, DEFAULT_MYSQL_SSL_MODE, MySqlConnectionData};
use crate::models::Value;
use crate::storage::{Backend, BackendFault, DriverResult, RowCursor};
use mysql::consts::ColumnFlags;
use mysql::prelude::Queryable;
use mysql::{Binary, Column, Conn, Opts, OptsBuilder, Params, QueryResult, Row, SslOpts};
use std::time::Duration;

/// Character set number MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// MySQL implementation of [`Backend`].
pub struct MySqlBackend {
    opts: Opts,
    conn: Option<Conn>,
}

impl MySqlBackend {
    /// Creates a backend from an ADO-style `Server=...;Uid=...` string or a
    /// `mysql://` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid.
    pub fn new(connection_string: &str) -> crate::Result<Self> {
        if connection_string.trim_start().starts_with("mysql://") {
            let opts = Opts::from_url(connection_string.trim())
                .map_err(|e| crate::Error::config("mysql_connection", e))?;
            return Ok(Self { opts, conn: None });
        }
        let cs = ConnectionString::parse(connection_string)?;
        Ok(Self::from_data(&MySqlConnectionData::from_options(&cs)?))
    }

    /// Creates a backend from structured connection data.
    #[must_use]
    pub fn from_data(data: &MySqlConnectionData) -> Self {
        Self {
            opts: build_opts(data),
            conn: None,
        }
    }

    fn connection(&mut self) -> DriverResult<&mut Conn> {
        Ok(self.conn.as_mut().ok_or(BackendFault::NotOpen)?)
    }
}

impl std::fmt::Debug for MySqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlBackend")
            .field("host", &self.opts.get_ip_or_hostname())
            .field("port", &self.opts.get_tcp_port())
            .field("database", &self.opts.get_db_name())
            .field("open", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

fn build_opts(data: &MySqlConnectionData) -> Opts {
    use secrecy::ExposeSecret;

    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let mut builder = OptsBuilder::new()
        .ip_or_hostname(Some(data.server.clone()))
        .tcp_port(data.port)
        .db_name(non_empty(&data.database))
        .user(non_empty(&data.user))
        .pass(non_empty(data.password.expose_secret()));

    if !data.ssl_mode.eq_ignore_ascii_case(DEFAULT_MYSQL_SSL_MODE)
        && !data.ssl_mode.eq_ignore_ascii_case("disabled")
    {
        builder = builder.ssl_opts(Some(SslOpts::default()));
    }
    if data.connection_timeout > 0 {
        builder = builder.tcp_connect_timeout(Some(Duration::from_secs(u64::from(
            data.connection_timeout,
        ))));
    }
    if data.command_timeout > 0 {
        let timeout = Some(Duration::from_secs(u64::from(data.command_timeout)));
        builder = builder.read_timeout(timeout).write_timeout(timeout);
    }
    if !data.charset.is_empty() {
        builder = builder.init(vec![format!("SET NAMES {}", data.charset)]);
    }
    Opts::from(builder)
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(
        params
            .iter()
            .map(|value| match value {
                Value::Null => mysql::Value::NULL,
                Value::Integer(v) => mysql::Value::Int(*v),
                Value::Real(v) => mysql::Value::Double(*v),
                Value::Text(v) => mysql::Value::Bytes(v.as_bytes().to_vec()),
                Value::Blob(v) => mysql::Value::Bytes(v.clone()),
            })
            .collect(),
    )
}

fn is_binary(column: &Column) -> bool {
    column.character_set() == BINARY_CHARSET
        && (column.flags().contains(ColumnFlags::BINARY_FLAG)
            || column.flags().contains(ColumnFlags::BLOB_FLAG))
}

fn from_mysql(value: &mysql::Value, binary: bool) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(v) => Value::Integer(*v),
        mysql::Value::UInt(v) => {
            i64::try_from(*v).map_or_else(|_| Value::Text(v.to_string()), Value::Integer)
        },
        mysql::Value::Float(v) => Value::Real(f64::from(*v)),
        mysql::Value::Double(v) => Value::Real(*v),
        mysql::Value::Bytes(b) if binary => Value::Blob(b.clone()),
        mysql::Value::Bytes(b) => String::from_utf8(b.clone())
            .map_or_else(|e| Value::Blob(e.into_bytes()), Value::Text),
        mysql::Value::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}");
            if *us > 0 {
                text.push_str(&format!(".{us:06}"));
            }
            Value::Text(text)
        },
        mysql::Value::Time(negative, days, h, mi, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let sign = if *negative { "-" } else { "" };
            let mut text = format!("{sign}{hours:02}:{mi:02}:{s:02}");
            if *us > 0 {
                text.push_str(&format!(".{us:06}"));
            }
            Value::Text(text)
        },
    }
}

fn row_values(row: &Row) -> Vec<Value> {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            row.as_ref(i)
                .map_or(Value::Null, |v| from_mysql(v, is_binary(column)))
        })
        .collect()
}

/// Streams rows of the first result set.
struct MySqlCursor<'a> {
    columns: Vec<String>,
    result: QueryResult<'a, 'a, 'a, Binary>,
}

impl RowCursor for MySqlCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
        match self.result.next() {
            Some(row) => Ok(Some(row_values(&row?))),
            None => Ok(None),
        }
    }
}

impl Backend for MySqlBackend {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn open(&mut self) -> DriverResult<()> {
        if self.conn.is_none() {
            self.conn = Some(Conn::new(self.opts.clone())?);
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        // Conn sends COM_QUIT on drop.
        self.conn = None;
        Ok(())
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.query_drop("START TRANSACTION")?;
        Ok(())
    }

    fn commit_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.query_drop("ROLLBACK")?;
        Ok(())
    }

    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let conn = self.connection()?;
        conn.exec_drop(sql, to_params(params))?;
        Ok(conn.affected_rows())
    }

    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value> {
        let row: Option<Row> = self.connection()?.exec_first(sql, to_params(params))?;
        Ok(row
            .and_then(|row| {
                let binary = row.columns_ref().first().is_some_and(is_binary);
                row.as_ref(0).map(|v| from_mysql(v, binary))
            })
            .unwrap_or_default())
    }

    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>> {
        let result = self.connection()?.exec_iter(sql, to_params(params))?;
        let columns = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        Ok(Box::new(MySqlCursor { columns, result }))
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        self.connection()?.prep(sql)?;
        Ok(())
    }
}
