//! Streaming cursor over a cached `rusqlite` statement.

// ouroboros implements the self-referential accessors with unsafe code.
#![allow(unsafe_code)]

use super::value::row_values;
use crate::models::Value;
use crate::storage::{DriverResult, RowCursor};
use ouroboros::self_referencing;
use rusqlite::{CachedStatement, Rows, params_from_iter};

/// Owns a statement and its running query; each fetch steps the statement
/// once.
#[self_referencing]
pub(super) struct SqliteCursor<'conn> {
    columns: Vec<String>,
    stmt: CachedStatement<'conn>,
    #[borrows(mut stmt)]
    #[not_covariant]
    rows: Rows<'this>,
}

impl<'conn> SqliteCursor<'conn> {
    /// Binds `params` and starts the query. No row is fetched yet.
    pub(super) fn start(stmt: CachedStatement<'conn>, params: &[Value]) -> rusqlite::Result<Self> {
        let columns = stmt.column_names().into_iter().map(String::from).collect();
        Self::try_new(columns, stmt, |stmt| stmt.query(params_from_iter(params)))
    }
}

impl RowCursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        self.borrow_columns()
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
        let width = self.borrow_columns().len();
        self.with_rows_mut(|rows| -> DriverResult<Option<Vec<Value>>> {
            match rows.next()? {
                Some(row) => Ok(Some(row_values(row, width)?)),
                None => Ok(None),
            }
        })
    }
}
