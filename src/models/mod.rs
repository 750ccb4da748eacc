//! Data models for sqlwrap.
//!
//! This module contains the driver-neutral types exchanged between callers,
//! the data-access core and the backends.

mod error_code;
mod scalar;
mod table;
mod value;

pub use error_code::ErrorCode;
pub use scalar::{ConversionError, FromValue, Scalar};
pub use table::{DataColumn, DataRow, DataTable};
pub use value::{Value, ValueKind};
