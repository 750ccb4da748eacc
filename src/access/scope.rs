//! Connection scope guard.

use super::{DataAccess, record};
use crate::Result;
use crate::models::ErrorCode;
use crate::storage::Backend;
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::{debug, warn};

/// Keeps a connection open for the duration of one operation.
///
/// A scope that opened the connection closes it again: explicitly through
/// [`finish`](Self::finish) / [`finish_as`](Self::finish_as), which classify
/// a close failure, or on drop, which only logs it so that the operation's
/// own failure is the one reported.
pub(super) struct ConnectionScope<'a, B: Backend> {
    access: &'a mut DataAccess<B>,
    owned: bool,
}

impl<'a, B: Backend> ConnectionScope<'a, B> {
    /// Opens the connection for an auto-connect operation. The connection is
    /// closed afterwards even if it was already open.
    pub(super) fn auto_connect(access: &'a mut DataAccess<B>) -> Result<Self> {
        access.open()?;
        Ok(Self {
            access,
            owned: true,
        })
    }

    /// Uses the open connection, or opens a closed one and classifies an
    /// open failure as `failure`.
    pub(super) fn borrow_or_open(
        access: &'a mut DataAccess<B>,
        operation: &'static str,
        failure: ErrorCode,
    ) -> Result<Self> {
        if access.backend.is_open() {
            return Ok(Self {
                access,
                owned: false,
            });
        }
        let start = Instant::now();
        let result = access.backend.open();
        access.record(operation, failure, start, result)?;
        debug!(operation, "opened connection for the call");
        Ok(Self {
            access,
            owned: true,
        })
    }

    /// Ends an auto-connect operation: closes the connection and returns the
    /// operation's result.
    pub(super) fn finish<T>(self, result: Result<T>) -> Result<T> {
        self.finish_as(result, "close", ErrorCode::ConnectionCloseFailed)
    }

    /// Ends the scope, classifying a close failure as `failure`.
    pub(super) fn finish_as<T>(
        mut self,
        result: Result<T>,
        operation: &'static str,
        failure: ErrorCode,
    ) -> Result<T> {
        let value = result?;
        if self.owned {
            self.owned = false;
            if self.access.backend.is_open() {
                let start = Instant::now();
                let name = self.access.backend.name();
                let closed = self.access.backend.close();
                record(&mut self.access.last_error, name, operation, failure, start, closed)?;
            }
        }
        Ok(value)
    }
}

impl<B: Backend> Deref for ConnectionScope<'_, B> {
    type Target = DataAccess<B>;

    fn deref(&self) -> &Self::Target {
        self.access
    }
}

impl<B: Backend> DerefMut for ConnectionScope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.access
    }
}

impl<B: Backend> Drop for ConnectionScope<'_, B> {
    fn drop(&mut self) {
        if self.owned && self.access.backend.is_open() {
            if let Err(e) = self.access.backend.close() {
                warn!(
                    backend = self.access.backend.name(),
                    error = %e,
                    "closing connection after failed operation failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;

    #[test]
    fn test_borrowed_scope_leaves_connection_open() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        db.open().unwrap();
        let scope = ConnectionScope::borrow_or_open(&mut db, "test", ErrorCode::OperationTableFailed)
            .unwrap();
        scope.finish_as(Ok(()), "test", ErrorCode::OperationTableFailed).unwrap();
        assert!(db.is_open());
    }

    #[test]
    fn test_owned_scope_closes_on_drop() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        {
            let scope =
                ConnectionScope::borrow_or_open(&mut db, "test", ErrorCode::OperationTableFailed)
                    .unwrap();
            assert!(scope.is_open());
        }
        assert!(!db.is_open());
    }

    #[test]
    fn test_failed_result_keeps_operation_error() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        let scope = ConnectionScope::auto_connect(&mut db).unwrap();
        let failed: Result<()> = Err(crate::Error::new(ErrorCode::OperationQueryFailed, "boom"));
        let err = scope.finish(failed).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationQueryFailed);
        assert!(!db.is_open());
    }
}
