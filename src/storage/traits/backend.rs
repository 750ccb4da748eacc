//! Backend capability trait.

use crate::models::{DataTable, Value};
use thiserror::Error as ThisError;

/// A failure reported by a backend, unclassified.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for backend primitives.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failures raised by the backend layer itself rather than by a driver.
#[derive(Debug, ThisError)]
pub enum BackendFault {
    /// The operation needs an open connection.
    #[error("connection is not open")]
    NotOpen,

    /// A value cannot be bound or read by this driver.
    #[error("unsupported value: {0}")]
    Unsupported(String),

    /// The connection string is missing a required key.
    #[error("connection string is missing '{0}'")]
    MissingKey(&'static str),
}

/// Forward-only cursor over a result set.
pub trait RowCursor {
    /// Column names in result order.
    fn columns(&self) -> &[String];

    /// Fetches the next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>>;
}

/// A cursor over rows that were already fetched from the driver.
#[derive(Debug)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl BufferedCursor {
    /// Creates a cursor over `rows`.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }
}

/// Capability set every database driver adapter provides.
///
/// Implementations bind parameters positionally, run statements on the
/// connection's active transaction when there is one, and return driver
/// failures untouched. Classification and lifecycle rules live in
/// [`DataAccess`](crate::access::DataAccess); backends must not catch or
/// translate errors.
pub trait Backend {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns `true` while the connection is open.
    fn is_open(&self) -> bool;

    /// Opens the connection.
    fn open(&mut self) -> DriverResult<()>;

    /// Closes the connection.
    fn close(&mut self) -> DriverResult<()>;

    /// Starts a transaction on the open connection.
    fn begin_transaction(&mut self) -> DriverResult<()>;

    /// Commits the active transaction.
    fn commit_transaction(&mut self) -> DriverResult<()>;

    /// Rolls back the active transaction.
    fn rollback_transaction(&mut self) -> DriverResult<()>;

    /// Executes a statement and returns the number of affected rows.
    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64>;

    /// Executes a statement and returns the first column of the first row,
    /// or `NULL` when there is no row.
    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value>;

    /// Executes a statement and returns a cursor over its rows.
    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>>;

    /// Prepares `sql` so that later executions can reuse it.
    fn prepare(&mut self, sql: &str) -> DriverResult<()>;

    /// Executes a statement and appends every row to `table`.
    ///
    /// Returns the number of rows added.
    fn fill_table(
        &mut self,
        sql: &str,
        params: &[Value],
        table: &mut DataTable,
    ) -> DriverResult<usize> {
        let mut cursor = self.execute_query(sql, params)?;
        let mapping = table.bind_columns(cursor.columns());
        let mut added = 0;
        while let Some(values) = cursor.next_row()? {
            table.push_mapped(&mapping, values);
            added += 1;
        }
        Ok(added)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn open(&mut self) -> DriverResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> DriverResult<()> {
        (**self).close()
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        (**self).begin_transaction()
    }

    fn commit_transaction(&mut self) -> DriverResult<()> {
        (**self).commit_transaction()
    }

    fn rollback_transaction(&mut self) -> DriverResult<()> {
        (**self).rollback_transaction()
    }

    fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        (**self).execute_non_query(sql, params)
    }

    fn execute_scalar(&mut self, sql: &str, params: &[Value]) -> DriverResult<Value> {
        (**self).execute_scalar(sql, params)
    }

    fn execute_query<'a>(
        &'a mut self,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Box<dyn RowCursor + 'a>> {
        (**self).execute_query(sql, params)
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<()> {
        (**self).prepare(sql)
    }

    fn fill_table(
        &mut self,
        sql: &str,
        params: &[Value],
        table: &mut DataTable,
    ) -> DriverResult<usize> {
        (**self).fill_table(sql, params, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_cursor_is_forward_only() {
        let mut cursor = BufferedCursor::new(
            vec!["n".to_string()],
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        );
        assert_eq!(cursor.columns(), ["n".to_string()]);
        assert_eq!(cursor.next_row().unwrap(), Some(vec![Value::Integer(1)]));
        assert_eq!(cursor.next_row().unwrap(), Some(vec![Value::Integer(2)]));
        assert_eq!(cursor.next_row().unwrap(), None);
        assert_eq!(cursor.next_row().unwrap(), None);
    }

    #[test]
    fn test_fault_display() {
        assert_eq!(BackendFault::NotOpen.to_string(), "connection is not open");
        assert_eq!(
            BackendFault::MissingKey("Data Source").to_string(),
            "connection string is missing 'Data Source'"
        );
    }
}
