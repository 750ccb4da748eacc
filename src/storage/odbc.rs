//! ODBC backend built on `odbc-api`.
//!
//! All connections share one process-wide ODBC environment. Cells are read
//! as text and converted according to the column's reported SQL type.
//! Transactions switch the connection out of autocommit mode until they end.

use crate::models::Value;
use crate::storage::{Backend, BackendFault, DriverResult, RowCursor};
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{Connection, ConnectionOptions, Cursor, CursorRow, DataType, Environment, ResultSetMetadata};
use once_cell::sync::OnceCell;

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

fn environment() -> DriverResult<&'static Environment> {
    Ok(ENVIRONMENT.get_or_try_init(Environment::new)?)
}

/// ODBC implementation of [`Backend`].
pub struct OdbcBackend {
    connection_string: String,
    conn: Option<Connection<'static>>,
}

impl OdbcBackend {
    /// Creates a backend for an ODBC connection string
    /// (`DSN=...` or `Driver={...};...`).
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            conn: None,
        }
    }

    /// Creates a backend from structured connection data.
    #[must_use]
    pub fn from_data(data: &crate::config::OdbcConnectionData) -> Self {
        Self::new(data.to_connection_string())
    }

    fn connection(&self) -> DriverResult<&Connection<'static>> {
        Ok(self.conn.as_ref().ok_or(BackendFault::NotOpen)?)
    }
}

impl std::fmt::Debug for OdbcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdbcBackend")
            .field("open", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

/// How a column's text representation is turned into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Integer,
    Real,
    Text,
    Binary,
}

impl From<DataType> for CellKind {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::TinyInt
            | DataType::SmallInt
            | DataType::Integer
            | DataType::BigInt
            | DataType::Bit => Self::Integer,
            DataType::Real | DataType::Float { .. } | DataType::Double => Self::Real,
            DataType::Binary { .. }
            | DataType::Varbinary { .. }
            | DataType::LongVarbinary { .. } => Self::Binary,
            _ => Self::Text,
        }
    }
}

fn to_parameters(params: &[Value]) -> Vec<Box<dyn InputParameter>> {
    params
        .iter()
        .map(|value| -> Box<dyn InputParameter> {
            match value {
                Value::Null => Box::new(VarCharBox::null()),
                Value::Integer(v) => Box::new(*v),
                Value::Real(v) => Box::new(*v),
                Value::Text(v) => Box::new(VarCharBox::from_string(v.clone())),
                Value::Blob(v) => Box::new(VarBinaryBox::from_vec(v.clone())),
            }
        })
        .collect()
}

fn parse_cell(kind: CellKind, bytes: Vec<u8>) -> Value {
    match kind {
        CellKind::Binary => Value::Blob(bytes),
        _ => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            match kind {
                CellKind::Integer => text
                    .trim()
                    .parse()
                    .map_or(Value::Text(text), Value::Integer),
                CellKind::Real => text.trim().parse().map_or(Value::Text(text), Value::Real),
                _ => Value::Text(text),
            }
        },
    }
}

fn read_cell(row: &mut CursorRow<'_>, column: u16, kind: CellKind) -> DriverResult<Value> {
    let mut buf = Vec::new();
    let present = if kind == CellKind::Binary {
        row.get_binary(column, &mut buf)?
    } else {
        row.get_text(column, &mut buf)?
    };
    Ok(if present {
        parse_cell(kind, buf)
    } else {
        Value::Null
    })
}

/// Streams rows from a driver cursor.
struct OdbcCursor<C: Cursor> {
    cursor: C,
    columns: Vec<String>,
    kinds: Vec<CellKind>,
}

impl<C: Cursor> OdbcCursor<C> {
    fn new(mut cursor: C) -> DriverResult<Self> {
        let count = u16::try_from(cursor.num_result_cols()?).unwrap_or(0);
        let mut columns = Vec::with_capacity(usize::from(count));
        let mut kinds = Vec::with_capacity(usize::from(count));
        for i in 1..=count {
            columns.push(cursor.col_name(i)?);
            kinds.push(CellKind::from(cursor.col_data_type(i)?));
        }
        Ok(Self {
            cursor,
            columns,
            kinds,
        })
    }
}

impl<C: Cursor> RowCursor for OdbcCursor<C> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
        let Some(mut row) = self.cursor.next_row()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.kinds.len());
        for (column, &kind) in (1..).zip(&self.kinds) {
            values.push(read_cell(&mut row, column, kind)?);
        }
        Ok(Some(values))
    }
}

impl Backend for OdbcBackend {
    fn name(&self) -> &'static str {
        "odbc"
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn open(&mut self) -> DriverResult<()> {
        if self.conn.is_none() {
            let conn = environment()?
                .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.conn = None;
        Ok(())
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        self.connection()?.set_autocommit(false)?;
        Ok(())
    }

    fn commit_transaction(&mut self) -> DriverResult<()> {
        let conn = self.connection()?;
        let committed = conn.commit();
        conn.set_autocommit(true)?;
        Ok(committed?)
    }

    fn rollback_transaction(&mut self) -> DriverResult<()> {
        let conn = self.connection()?;
        let rolled_back = conn.rollback();
        conn.set_autocommit(true)?;
        Ok(rolled_back?)
    }

    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let params = to_parameters(params);
        let mut stmt = self.connection()?.preallocate()?;
        stmt.execute(sql, params.as_slice())?;
        Ok(stmt.row_count()?.unwrap_or(0) as u64)
    }

    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value> {
        let params = to_parameters(params);
        let Some(mut cursor) = self.connection()?.execute(sql, params.as_slice(), None)? else {
            return Ok(Value::Null);
        };
        if cursor.num_result_cols()? < 1 {
            return Ok(Value::Null);
        }
        let kind = CellKind::from(cursor.col_data_type(1)?);
        let value = match cursor.next_row()? {
            Some(mut row) => read_cell(&mut row, 1, kind)?,
            None => Value::Null,
        };
        Ok(value)
    }

    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>> {
        let params = to_parameters(params);
        match self.connection()?.execute(sql, params.as_slice(), None)? {
            Some(cursor) => Ok(Box::new(OdbcCursor::new(cursor)?)),
            None => Ok(Box::new(crate::storage::BufferedCursor::new(Vec::new(), Vec::new()))),
        }
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        self.connection()?.prepare(sql)?;
        Ok(())
    }
}
