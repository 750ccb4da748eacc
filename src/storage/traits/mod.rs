//! Storage backend traits.

mod backend;

pub use backend::{Backend, BackendFault, BufferedCursor, DriverError, DriverResult, RowCursor};
