//! The data-access core.
//!
//! [`DataAccess`] owns one [`Backend`] and exposes the uniform operation
//! surface on top of it. Every public operation:
//!
//! 1. checks lifecycle invariants (transaction state, auto-connect rules)
//! 2. delegates to the backend primitive
//! 3. classifies a driver failure into exactly one [`ErrorCode`]
//! 4. records the outcome in [`last_error_code`](DataAccess::last_error_code)
//!    and in the operation metrics
//!
//! Operations suffixed `_acon` open the connection before the statement and
//! close it afterwards on every exit path. They are rejected while a
//! transaction is active because closing would discard it.

mod adapter;
mod reader;
mod scope;

pub use adapter::DataAdapter;
pub use reader::QueryReader;

use crate::models::{DataTable, ErrorCode, FromValue, Scalar, Value};
use crate::observability::record_operation_metrics;
use crate::storage::{Backend, DriverResult};
use crate::{Error, Result};
use scope::ConnectionScope;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Uniform data-access facade over one backend connection.
///
/// `DataAccess` is single-threaded by construction: every operation takes
/// `&mut self`. Dropping it rolls back an active transaction and closes the
/// connection.
pub struct DataAccess<B: Backend> {
    backend: B,
    last_error: ErrorCode,
    transaction_active: bool,
    default_on_null: bool,
}

impl<B: Backend> DataAccess<B> {
    /// Wraps a backend. The connection is not opened.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            last_error: ErrorCode::None,
            transaction_active: false,
            default_on_null: false,
        }
    }

    /// Sets whether `NULL` scalars resolve to the type default.
    #[must_use]
    pub fn with_default_on_null(mut self, default_on_null: bool) -> Self {
        self.default_on_null = default_on_null;
        self
    }

    /// Returns the classification of the most recent operation.
    #[must_use]
    pub const fn last_error_code(&self) -> ErrorCode {
        self.last_error
    }

    /// Returns whether `NULL` scalars resolve to the type default.
    #[must_use]
    pub const fn default_on_null(&self) -> bool {
        self.default_on_null
    }

    /// Sets whether `NULL` scalars resolve to the type default.
    pub const fn set_default_on_null(&mut self, default_on_null: bool) {
        self.default_on_null = default_on_null;
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    /// Returns `true` while a transaction is active.
    #[must_use]
    pub const fn transaction_active(&self) -> bool {
        self.transaction_active
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably.
    ///
    /// Statements run directly on the backend bypass classification and
    /// lifecycle tracking.
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Opens the connection. Does nothing when it is already open.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConnectionOpenFailed`] if the driver cannot
    /// connect.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn open(&mut self) -> Result<()> {
        let start = Instant::now();
        let result = if self.backend.is_open() {
            Ok(())
        } else {
            self.backend.open()
        };
        self.record("open", ErrorCode::ConnectionOpenFailed, start, result)?;
        debug!("connection open");
        Ok(())
    }

    /// Closes the connection. Does nothing when it is already closed.
    ///
    /// An active transaction is rolled back first.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConnectionCloseFailed`] if the driver cannot
    /// close the connection.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn close(&mut self) -> Result<()> {
        let start = Instant::now();
        if self.transaction_active {
            warn!("closing connection with an active transaction, rolling back");
            self.transaction_active = false;
            if let Err(e) = self.backend.rollback_transaction() {
                warn!(error = %e, "rollback before close failed");
            }
        }
        let result = if self.backend.is_open() {
            self.backend.close()
        } else {
            Ok(())
        };
        self.record("close", ErrorCode::ConnectionCloseFailed, start, result)?;
        debug!("connection closed");
        Ok(())
    }

    /// Begins a transaction on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TransactionBeginFailed`] if a transaction is
    /// already active or the driver cannot begin one.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction_active {
            return Err(self.fail(
                "begin_transaction",
                ErrorCode::TransactionBeginFailed,
                "a transaction is already active",
            ));
        }
        let start = Instant::now();
        let result = self.backend.begin_transaction();
        self.record(
            "begin_transaction",
            ErrorCode::TransactionBeginFailed,
            start,
            result,
        )?;
        self.transaction_active = true;
        debug!("transaction started");
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// The transaction is finished even when the commit fails.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TransactionCommitFailed`] if no transaction is
    /// active or the driver cannot commit.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn commit_transaction(&mut self) -> Result<()> {
        if !self.transaction_active {
            return Err(self.fail(
                "commit_transaction",
                ErrorCode::TransactionCommitFailed,
                "no transaction is active",
            ));
        }
        let start = Instant::now();
        self.transaction_active = false;
        let result = self.backend.commit_transaction();
        self.record(
            "commit_transaction",
            ErrorCode::TransactionCommitFailed,
            start,
            result,
        )?;
        debug!("transaction committed");
        Ok(())
    }

    /// Rolls back the active transaction.
    ///
    /// The transaction is finished even when the rollback fails.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TransactionRollbackFailed`] if no transaction is
    /// active or the driver cannot roll back.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if !self.transaction_active {
            return Err(self.fail(
                "rollback_transaction",
                ErrorCode::TransactionRollbackFailed,
                "no transaction is active",
            ));
        }
        let start = Instant::now();
        self.transaction_active = false;
        let result = self.backend.rollback_transaction();
        self.record(
            "rollback_transaction",
            ErrorCode::TransactionRollbackFailed,
            start,
            result,
        )?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Executes a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationNonQueryFailed`] if the statement fails.
    #[instrument(skip(self, params), fields(backend = self.backend.name()))]
    pub fn execute_non_query(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let start = Instant::now();
        let result = self.backend.execute_non_query(sql, params);
        self.record(
            "execute_non_query",
            ErrorCode::OperationNonQueryFailed,
            start,
            result,
        )
    }

    /// Opens the connection, executes a statement and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotAllowedDuringTransaction`] inside a
    /// transaction, otherwise the open, statement or close failure.
    pub fn execute_non_query_acon(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_no_transaction("execute_non_query_acon")?;
        let mut scope = ConnectionScope::auto_connect(self)?;
        let result = scope.execute_non_query(sql, params);
        scope.finish(result)
    }

    /// Executes a statement and converts the first column of the first row
    /// to `T`.
    ///
    /// A `NULL` result resolves to `T::default()` when
    /// [`default_on_null`](Self::default_on_null) is set, and to `None` for
    /// `Option<T>`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationScalarFailed`] if the statement fails or
    /// the value cannot be converted.
    pub fn execute_scalar<T: FromValue + Default>(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<T> {
        let outcome = self.execute_scalar_outcome::<T>(sql, params)?;
        match outcome.into_result() {
            Ok(value) => Ok(value),
            Err(e) => {
                self.last_error = ErrorCode::OperationScalarFailed;
                warn!(
                    backend = self.backend.name(),
                    code = %ErrorCode::OperationScalarFailed,
                    error = %e,
                    "scalar conversion failed"
                );
                Err(Error::with_source(
                    ErrorCode::OperationScalarFailed,
                    "execute_scalar: result conversion failed",
                    e,
                ))
            },
        }
    }

    /// Auto-connect variant of [`execute_scalar`](Self::execute_scalar).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotAllowedDuringTransaction`] inside a
    /// transaction, otherwise the open, statement, conversion or close
    /// failure.
    pub fn execute_scalar_acon<T: FromValue + Default>(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<T> {
        self.ensure_no_transaction("execute_scalar_acon")?;
        let mut scope = ConnectionScope::auto_connect(self)?;
        let result = scope.execute_scalar(sql, params);
        scope.finish(result)
    }

    /// Executes a statement and returns the raw first value, `NULL` when the
    /// statement yields no row.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationScalarFailed`] if the statement fails.
    #[instrument(skip(self, params), fields(backend = self.backend.name()))]
    pub fn execute_scalar_raw(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        let start = Instant::now();
        let result = self.backend.execute_scalar(sql, params);
        self.record(
            "execute_scalar",
            ErrorCode::OperationScalarFailed,
            start,
            result,
        )
    }

    /// Auto-connect variant of [`execute_scalar_raw`](Self::execute_scalar_raw).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotAllowedDuringTransaction`] inside a
    /// transaction, otherwise the open, statement or close failure.
    pub fn execute_scalar_raw_acon(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        self.ensure_no_transaction("execute_scalar_raw_acon")?;
        let mut scope = ConnectionScope::auto_connect(self)?;
        let result = scope.execute_scalar_raw(sql, params);
        scope.finish(result)
    }

    /// Executes a scalar statement and returns the unresolved conversion
    /// outcome.
    ///
    /// A conversion problem is not an error here; inspect the returned
    /// [`Scalar`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationScalarFailed`] if the statement fails.
    pub fn execute_scalar_outcome<T: FromValue + Default>(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Scalar<T>> {
        let raw = self.execute_scalar_raw(sql, params)?;
        Ok(Scalar::classify(raw, self.default_on_null))
    }

    /// Executes a statement and returns a forward-only reader over its rows.
    ///
    /// The reader borrows this instance, so no other operation can run until
    /// it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationQueryFailed`] if the statement fails.
    /// Failures while reading rows are reported by the reader with the same
    /// code.
    #[instrument(skip(self, params), fields(backend = self.backend.name()))]
    pub fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<QueryReader<'_>> {
        let start = Instant::now();
        let backend_name = self.backend.name();
        let Self {
            backend,
            last_error,
            ..
        } = self;
        let result = backend.execute_query(sql, params);
        let cursor = record(
            last_error,
            backend_name,
            "execute_query",
            ErrorCode::OperationQueryFailed,
            start,
            result,
        )?;
        Ok(QueryReader::new(cursor, last_error, backend_name))
    }

    /// Executes a statement and materializes every row into a new table.
    ///
    /// A closed connection is opened for the call and closed again.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationTableFailed`] if the statement fails.
    #[instrument(skip(self, params), fields(backend = self.backend.name()))]
    pub fn create_data_table(&mut self, sql: &str, params: &[Value]) -> Result<DataTable> {
        let mut table = DataTable::new();
        self.fill(
            "create_data_table",
            ErrorCode::OperationTableFailed,
            sql,
            params,
            &mut table,
        )?;
        Ok(table)
    }

    /// Validates a statement and returns an adapter that fills tables from
    /// it.
    ///
    /// A closed connection is opened for the validation and closed again.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::OperationDataAdapterFailed`] if the statement
    /// cannot be prepared.
    #[instrument(skip(self, params), fields(backend = self.backend.name()))]
    pub fn get_data_adapter(&mut self, sql: &str, params: &[Value]) -> Result<DataAdapter> {
        const OPERATION: &str = "get_data_adapter";
        const FAILURE: ErrorCode = ErrorCode::OperationDataAdapterFailed;

        let mut scope = ConnectionScope::borrow_or_open(self, OPERATION, FAILURE)?;
        let start = Instant::now();
        let result = scope.backend.prepare(sql);
        let result = scope.record(OPERATION, FAILURE, start, result);
        scope.finish_as(result, OPERATION, FAILURE)?;
        Ok(DataAdapter::new(sql, params.to_vec()))
    }

    /// Runs `sql` and appends its rows to `table`, opening a closed
    /// connection for the duration of the call.
    pub(crate) fn fill(
        &mut self,
        operation: &'static str,
        failure: ErrorCode,
        sql: &str,
        params: &[Value],
        table: &mut DataTable,
    ) -> Result<usize> {
        let mut scope = ConnectionScope::borrow_or_open(self, operation, failure)?;
        let start = Instant::now();
        let result = scope.backend.fill_table(sql, params, table);
        let result = scope.record(operation, failure, start, result);
        scope.finish_as(result, operation, failure)
    }

    fn ensure_no_transaction(&mut self, operation: &'static str) -> Result<()> {
        if self.transaction_active {
            return Err(self.fail(
                operation,
                ErrorCode::NotAllowedDuringTransaction,
                "auto-connect operations are not allowed during a transaction",
            ));
        }
        Ok(())
    }

    fn record<T>(
        &mut self,
        operation: &'static str,
        failure: ErrorCode,
        start: Instant,
        result: DriverResult<T>,
    ) -> Result<T> {
        let backend_name = self.backend.name();
        record(
            &mut self.last_error,
            backend_name,
            operation,
            failure,
            start,
            result,
        )
    }

    /// Records a failure detected before any driver call.
    fn fail(&mut self, operation: &'static str, code: ErrorCode, message: &str) -> Error {
        self.last_error = code;
        warn!(backend = self.backend.name(), code = %code, operation, "{message}");
        record_operation_metrics(self.backend.name(), operation, Instant::now(), code);
        Error::new(code, format!("{operation}: {message}"))
    }
}

impl<B: Backend> Drop for DataAccess<B> {
    fn drop(&mut self) {
        if self.transaction_active {
            self.transaction_active = false;
            if let Err(e) = self.backend.rollback_transaction() {
                warn!(backend = self.backend.name(), error = %e, "rollback on drop failed");
            }
        }
        if self.backend.is_open() {
            if let Err(e) = self.backend.close() {
                warn!(backend = self.backend.name(), error = %e, "close on drop failed");
            }
        }
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for DataAccess<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAccess")
            .field("backend", &self.backend)
            .field("last_error", &self.last_error)
            .field("transaction_active", &self.transaction_active)
            .field("default_on_null", &self.default_on_null)
            .finish()
    }
}

/// Classifies the outcome of a backend primitive.
///
/// Takes the error slot instead of the whole instance so that callers can
/// keep other fields borrowed.
fn record<T>(
    last_error: &mut ErrorCode,
    backend: &'static str,
    operation: &'static str,
    failure: ErrorCode,
    start: Instant,
    result: DriverResult<T>,
) -> Result<T> {
    match result {
        Ok(value) => {
            *last_error = ErrorCode::Success;
            record_operation_metrics(backend, operation, start, ErrorCode::Success);
            Ok(value)
        },
        Err(e) => {
            *last_error = failure;
            warn!(backend, operation, code = %failure, error = %e, "operation failed");
            record_operation_metrics(backend, operation, start, failure);
            Err(Error::with_source(
                failure,
                format!("{operation} failed"),
                e,
            ))
        },
    }
}
