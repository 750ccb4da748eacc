//! Classified failure codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome classification of the most recent data-access operation.
///
/// The numeric values are stable and intended for programmatic branching.
/// They are grouped by subsystem: `11xx` connection, `12xx` transaction,
/// `13xx` lifecycle guards, `2xxx` statement execution and `3xxx` tabular
/// retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u16)]
pub enum ErrorCode {
    /// No operation has run yet.
    #[default]
    None = 0,
    /// The last operation completed successfully.
    Success = 200,

    /// The connection could not be opened.
    ConnectionOpenFailed = 1100,
    /// The connection could not be closed.
    ConnectionCloseFailed = 1101,

    /// The transaction could not be started.
    TransactionBeginFailed = 1201,
    /// The transaction could not be committed.
    TransactionCommitFailed = 1202,
    /// The transaction could not be rolled back.
    TransactionRollbackFailed = 1203,

    /// An auto-connect operation was attempted while a transaction is active.
    NotAllowedDuringTransaction = 1300,

    /// A non-query statement failed.
    OperationNonQueryFailed = 2100,
    /// A scalar statement failed or its value could not be converted.
    OperationScalarFailed = 2200,
    /// A row-returning statement failed.
    OperationQueryFailed = 2300,

    /// A data adapter could not be created or could not fill a table.
    OperationDataAdapterFailed = 3100,
    /// A table could not be materialized.
    OperationTableFailed = 3200,
}

impl ErrorCode {
    /// Returns every code, sentinels first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::None,
            Self::Success,
            Self::ConnectionOpenFailed,
            Self::ConnectionCloseFailed,
            Self::TransactionBeginFailed,
            Self::TransactionCommitFailed,
            Self::TransactionRollbackFailed,
            Self::NotAllowedDuringTransaction,
            Self::OperationNonQueryFailed,
            Self::OperationScalarFailed,
            Self::OperationQueryFailed,
            Self::OperationDataAdapterFailed,
            Self::OperationTableFailed,
        ]
    }

    /// Returns the stable numeric identifier.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Looks a code up by its numeric identifier.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::all().iter().copied().find(|code| code.as_u16() == value)
    }

    /// Returns the kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Success => "success",
            Self::ConnectionOpenFailed => "connection-open-failed",
            Self::ConnectionCloseFailed => "connection-close-failed",
            Self::TransactionBeginFailed => "transaction-begin-failed",
            Self::TransactionCommitFailed => "transaction-commit-failed",
            Self::TransactionRollbackFailed => "transaction-rollback-failed",
            Self::NotAllowedDuringTransaction => "not-allowed-during-transaction",
            Self::OperationNonQueryFailed => "operation-non-query-failed",
            Self::OperationScalarFailed => "operation-scalar-failed",
            Self::OperationQueryFailed => "operation-query-failed",
            Self::OperationDataAdapterFailed => "operation-data-adapter-failed",
            Self::OperationTableFailed => "operation-table-failed",
        }
    }

    /// Returns `true` for every code except the two sentinels.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::None | Self::Success)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.as_str())
    }
}
