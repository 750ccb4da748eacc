//! CLI command implementations.
//!
//! The `sqlwrap` binary parses arguments and delegates here. Commands are
//! generic over the backend and the output writer so that they can be
//! exercised against an in-memory database.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `exec` | Run a statement and print the affected-row count |
//! | `scalar` | Run a statement and print its first value |
//! | `query` | Run a statement and print every row |
//! | `ping` | Open and close the connection |
//!
//! # Example Usage
//!
//! ```bash
//! # Count rows in a SQLite file
//! sqlwrap --connection "Data Source=app.db" scalar "SELECT COUNT(*) FROM info"
//!
//! # Query with positional parameters as JSON
//! sqlwrap --format json query "SELECT * FROM info WHERE key = ?" --param DefaultDomain
//!
//! # Check a MySQL server
//! sqlwrap --backend mysql --connection "Server=db;Database=app;Uid=app;Pwd=secret" ping
//! ```

mod output;

pub use output::{OutputFormat, write_csv, write_data_table, write_json, write_table, write_value};

use crate::access::DataAccess;
use crate::models::Value;
use crate::storage::Backend;
use std::io::Write;

/// Converts command-line parameter literals into values.
///
/// See [`Value::parse_literal`] for the accepted forms.
#[must_use]
pub fn parse_params(literals: &[String]) -> Vec<Value> {
    literals.iter().map(|l| Value::parse_literal(l)).collect()
}

/// Executes a non-query statement and prints the affected-row count.
///
/// # Errors
///
/// Returns an error if the statement or output fails.
pub fn cmd_exec<B: Backend, W: Write>(
    db: &mut DataAccess<B>,
    writer: &mut W,
    sql: &str,
    params: &[Value],
) -> Result<(), Box<dyn std::error::Error>> {
    let affected = db.execute_non_query_acon(sql, params)?;
    writeln!(writer, "{affected} row(s) affected")?;
    Ok(())
}

/// Executes a scalar statement and prints the value.
///
/// # Errors
///
/// Returns an error if the statement or output fails.
pub fn cmd_scalar<B: Backend, W: Write>(
    db: &mut DataAccess<B>,
    writer: &mut W,
    sql: &str,
    params: &[Value],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = db.execute_scalar_raw_acon(sql, params)?;
    write_value(writer, &value, format)
}

/// Executes a query and prints every row.
///
/// # Errors
///
/// Returns an error if the statement or output fails.
pub fn cmd_query<B: Backend, W: Write>(
    db: &mut DataAccess<B>,
    writer: &mut W,
    sql: &str,
    params: &[Value],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = db.create_data_table(sql, params)?;
    write_data_table(writer, &table, format)
}

/// Opens and closes the connection.
///
/// # Errors
///
/// Returns an error if the connection cannot be opened or closed.
pub fn cmd_ping<B: Backend, W: Write>(
    db: &mut DataAccess<B>,
    writer: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    db.open()?;
    db.close()?;
    writeln!(writer, "{}: ok", db.backend().name())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;
    use tempfile::TempDir;

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["1".to_string(), "null".to_string(), "x".to_string()]);
        assert_eq!(
            params,
            vec![Value::Integer(1), Value::Null, Value::Text("x".to_string())]
        );
    }

    #[test]
    fn test_commands_against_sqlite_file() {
        let dir = TempDir::new().unwrap();
        let mut db = DataAccess::new(SqliteBackend::from_path(dir.path().join("cli.db")).unwrap());

        let mut buf = Vec::new();
        cmd_exec(&mut db, &mut buf, "CREATE TABLE info (key TEXT, value TEXT)", &[]).unwrap();
        cmd_exec(
            &mut db,
            &mut buf,
            "INSERT INTO info VALUES (?, ?)",
            &parse_params(&["DefaultDomain".to_string(), "endevx".to_string()]),
        )
        .unwrap();
        assert!(output(buf).ends_with("1 row(s) affected\n"));

        let mut buf = Vec::new();
        cmd_scalar(
            &mut db,
            &mut buf,
            "SELECT value FROM info WHERE key = ?",
            &[Value::from("DefaultDomain")],
            OutputFormat::Table,
        )
        .unwrap();
        assert_eq!(output(buf), "endevx\n");

        let mut buf = Vec::new();
        cmd_query(&mut db, &mut buf, "SELECT * FROM info", &[], OutputFormat::Csv).unwrap();
        assert_eq!(output(buf), "key,value\nDefaultDomain,endevx\n");
        assert!(!db.is_open());
    }

    #[test]
    fn test_ping() {
        let mut db = DataAccess::new(SqliteBackend::in_memory());
        let mut buf = Vec::new();
        cmd_ping(&mut db, &mut buf).unwrap();
        assert_eq!(output(buf), "sqlite: ok\n");
        assert!(!db.is_open());
    }
}
