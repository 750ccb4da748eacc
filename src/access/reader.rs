//! Forward-only query reader.

use crate::models::{DataRow, ErrorCode};
use crate::storage::RowCursor;
use crate::{Error, Result};
use tracing::warn;

/// Forward-only, read-once reader over the rows of a query.
///
/// Returned by [`DataAccess::execute_query`](super::DataAccess::execute_query).
/// The reader borrows the `DataAccess` it came from, so the connection cannot
/// be closed or reused until the reader is dropped. A failure while fetching
/// a row is classified as [`ErrorCode::OperationQueryFailed`] and ends the
/// iteration.
pub struct QueryReader<'a> {
    cursor: Box<dyn RowCursor + 'a>,
    last_error: &'a mut ErrorCode,
    backend: &'static str,
    done: bool,
}

impl<'a> QueryReader<'a> {
    pub(super) fn new(
        cursor: Box<dyn RowCursor + 'a>,
        last_error: &'a mut ErrorCode,
        backend: &'static str,
    ) -> Self {
        Self {
            cursor,
            last_error,
            backend,
            done: false,
        }
    }

    /// Column names in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    /// Returns the position of the column named `name` (case-insensitive).
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns()
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Reads the next row, or `None` once the result set is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationQueryFailed`] if the driver fails to
    /// fetch the row.
    pub fn read(&mut self) -> Result<Option<DataRow>> {
        if self.done {
            return Ok(None);
        }
        match self.cursor.next_row() {
            Ok(Some(values)) => Ok(Some(DataRow::new(values))),
            Ok(None) => {
                self.done = true;
                Ok(None)
            },
            Err(e) => {
                self.done = true;
                *self.last_error = ErrorCode::OperationQueryFailed;
                warn!(
                    backend = self.backend,
                    code = %ErrorCode::OperationQueryFailed,
                    error = %e,
                    "row fetch failed"
                );
                Err(Error::with_source(
                    ErrorCode::OperationQueryFailed,
                    "execute_query: row fetch failed",
                    e,
                ))
            },
        }
    }
}

impl Iterator for QueryReader<'_> {
    type Item = Result<DataRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

impl std::fmt::Debug for QueryReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryReader")
            .field("backend", &self.backend)
            .field("columns", &self.columns())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{ErrorCode, Value};
    use crate::storage::{DriverResult, RowCursor};
    use crate::{DataAccess, params, storage::SqliteBackend};

    use super::QueryReader;

    struct FailingCursor {
        columns: Vec<String>,
        served: bool,
    }

    impl RowCursor for FailingCursor {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
            if self.served {
                return Err("connection reset".into());
            }
            self.served = true;
            Ok(Some(vec![Value::Integer(1)]))
        }
    }

    #[test]
    fn test_reads_rows_in_order() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        db.open().unwrap();
        db.execute_non_query("CREATE TABLE t (n INTEGER, label TEXT)", &[])
            .unwrap();
        for n in 1..=3 {
            db.execute_non_query("INSERT INTO t VALUES (?, ?)", &params![n, format!("row{n}")])
                .unwrap();
        }

        let reader = db.execute_query("SELECT n, label FROM t ORDER BY n", &[]).unwrap();
        assert_eq!(reader.columns(), ["n".to_string(), "label".to_string()]);
        assert_eq!(reader.column_index("LABEL"), Some(1));
        let rows: Vec<_> = reader.map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get(0), Some(&Value::Integer(3)));
        assert_eq!(rows[0].get(1), Some(&Value::Text("row1".to_string())));
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[test]
    fn test_invalid_query_is_classified() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        db.open().unwrap();
        let err = db.execute_query("SELECT * FROM missing", &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationQueryFailed);
        assert_eq!(db.last_error_code(), ErrorCode::OperationQueryFailed);
    }

    #[test]
    fn test_fetch_failure_ends_iteration() {
        let mut last_error = ErrorCode::Success;
        let cursor = FailingCursor {
            columns: vec!["n".to_string()],
            served: false,
        };
        let mut reader = QueryReader::new(Box::new(cursor), &mut last_error, "test");
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationQueryFailed);
        assert!(reader.next().is_none());
        drop(reader);
        assert_eq!(last_error, ErrorCode::OperationQueryFailed);
    }
}
