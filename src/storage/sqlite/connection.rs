//! Connection handling for the `SQLite` backend.

use crate::config::SqliteConnectionData;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Busy timeout applied to file databases, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Number of prepared statements kept per connection.
pub const STATEMENT_CACHE_CAPACITY: usize = 64;

/// Configures a `SQLite` file connection for concurrent access.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits for locks instead of failing with `SQLITE_BUSY`
///
/// Read-only connections keep their journal mode.
///
/// # Errors
///
/// Returns an error if a pragma cannot be applied.
pub fn configure_connection(conn: &Connection, read_only: bool) -> rusqlite::Result<()> {
    if !read_only {
        // journal_mode returns the resulting mode as a row
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;
    Ok(())
}

/// Opens a connection for `data`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or configured.
pub fn open_connection(data: &SqliteConnectionData) -> rusqlite::Result<Connection> {
    let conn = if data.is_memory() {
        Connection::open_in_memory()?
    } else {
        let conn = Connection::open_with_flags(&data.path, open_flags(data.read_only))?;
        configure_connection(&conn, data.read_only)?;
        conn
    };
    conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    Ok(conn)
}

fn open_flags(read_only: bool) -> OpenFlags {
    let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if read_only {
        base | OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    }
}

/// Creates the missing parent directories of a database file.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        },
        _ => Ok(()),
    }
}
