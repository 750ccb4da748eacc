//! Reusable table-filling statements.

use super::DataAccess;
use crate::Result;
use crate::models::{DataTable, ErrorCode, Value};
use crate::storage::Backend;

/// A validated statement that fills [`DataTable`]s on demand.
///
/// Obtained from [`DataAccess::get_data_adapter`]. The adapter owns its
/// statement text and parameters and can be filled any number of times;
/// each fill re-executes the statement.
///
/// # Example
///
/// ```rust
/// use sqlwrap::storage::SqliteBackend;
/// use sqlwrap::{DataAccess, DataTable};
///
/// let mut db = DataAccess::new(SqliteBackend::in_memory());
/// db.open()?;
/// db.execute_non_query("CREATE TABLE t (n INTEGER)", &[])?;
/// db.execute_non_query("INSERT INTO t VALUES (1), (2)", &[])?;
///
/// let adapter = db.get_data_adapter("SELECT n FROM t", &[])?;
/// let mut table = DataTable::new();
/// assert_eq!(adapter.fill(&mut db, &mut table)?, 2);
/// assert_eq!(table.row_count(), 2);
/// # Ok::<(), sqlwrap::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataAdapter {
    sql: String,
    params: Vec<Value>,
}

impl DataAdapter {
    pub(super) fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Returns the statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Replaces the bound parameters for subsequent fills.
    pub fn set_params(&mut self, params: impl Into<Vec<Value>>) {
        self.params = params.into();
    }

    /// Executes the statement on `access` and appends the rows to `table`.
    ///
    /// A closed connection is opened for the call and closed again.
    /// Returns the number of rows added.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationDataAdapterFailed`] if the statement
    /// fails.
    pub fn fill<B: Backend>(&self, access: &mut DataAccess<B>, table: &mut DataTable) -> Result<usize> {
        access.fill(
            "data_adapter_fill",
            ErrorCode::OperationDataAdapterFailed,
            &self.sql,
            &self.params,
            table,
        )
    }

    /// Executes the statement on `access` into a fresh table.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationDataAdapterFailed`] if the statement
    /// fails.
    pub fn fill_new<B: Backend>(&self, access: &mut DataAccess<B>) -> Result<DataTable> {
        let mut table = DataTable::new();
        self.fill(access, &mut table)?;
        Ok(table)
    }
}
