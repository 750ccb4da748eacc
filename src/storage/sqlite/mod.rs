//! `SQLite` backend built on `rusqlite`.
//!
//! ## Module Structure
//!
//! - [`connection`]: opening and configuring connections (WAL, busy timeout)
//! - `value`: [`Value`](crate::Value) binding and row decoding
//! - `cursor`: streaming query cursor
//! - `backend`: the [`Backend`](crate::storage::Backend) implementation

mod backend;
pub mod connection;
mod cursor;
mod value;

pub use backend::SqliteBackend;
pub use connection::{configure_connection, open_connection};
