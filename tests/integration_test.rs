//! Integration tests for sqlwrap against file-backed `SQLite` databases.
//!
//! Covers the lifecycle, transaction, scalar and tabular guarantees of the
//! data-access facade end to end, through the public API only.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use sqlwrap::config::{BackendConfig, SqlWrapConfig};
use sqlwrap::services::{BackendFactory, DynBackend};
use sqlwrap::storage::SqliteBackend;
use sqlwrap::{DataAccess, DataTable, ErrorCode, Value, params};
use tempfile::TempDir;

/// Creates a file database with an `info` key/value table and a ten-row
/// `items` table.
fn seeded_db(dir: &TempDir) -> DataAccess<SqliteBackend> {
    let backend = SqliteBackend::from_path(dir.path().join("data").join("test.db"))
        .expect("Failed to create SQLite backend");
    let mut db = DataAccess::new(backend);
    db.open().unwrap();
    db.execute_non_query("CREATE TABLE info (key TEXT PRIMARY KEY, value TEXT)", &[])
        .unwrap();
    db.execute_non_query(
        "INSERT INTO info (key, value) VALUES (?, ?), (?, ?)",
        &params!["DefaultDomain", "endevx", "NullValue", None::<String>],
    )
    .unwrap();
    db.execute_non_query(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL)",
        &[],
    )
    .unwrap();
    for i in 1..=10_i64 {
        #[allow(clippy::cast_precision_loss)]
        let price = i as f64 * 1.5;
        db.execute_non_query(
            "INSERT INTO items (id, name, price) VALUES (?, ?, ?)",
            &params![i, format!("item-{i}"), price],
        )
        .unwrap();
    }
    db
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_open_then_close_leaves_connection_closed() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        assert!(db.is_open());
        db.close().unwrap();
        assert!(!db.is_open());
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        db.open().unwrap();
        assert!(db.is_open());
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[test]
    fn test_drop_rolls_back_active_transaction() {
        let dir = TempDir::new().unwrap();
        {
            let mut db = seeded_db(&dir);
            db.begin_transaction().unwrap();
            db.execute_non_query("DELETE FROM items", &[]).unwrap();
        }
        let mut db = DataAccess::new(
            SqliteBackend::from_path(dir.path().join("data").join("test.db")).unwrap(),
        );
        let count: i64 = db.execute_scalar_acon("SELECT COUNT(*) FROM items", &[]).unwrap();
        assert_eq!(count, 10);
    }

    #[test]
    fn test_unopenable_database_is_classified() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.db");
        let cs = format!("Data Source={};Read Only=true", missing.display());
        let mut db = DataAccess::new(SqliteBackend::from_connection_string(&cs).unwrap());

        let err = db.open().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectionOpenFailed);
        assert_eq!(db.last_error_code(), ErrorCode::ConnectionOpenFailed);
        assert!(!db.is_open());
    }
}

mod transactions {
    use super::*;

    #[test]
    fn test_commit_persists() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        db.begin_transaction().unwrap();
        db.execute_non_query("INSERT INTO items (id, name) VALUES (11, 'extra')", &[])
            .unwrap();
        db.commit_transaction().unwrap();
        assert!(!db.transaction_active());

        db.close().unwrap();
        let count: i64 = db.execute_scalar_acon("SELECT COUNT(*) FROM items", &[]).unwrap();
        assert_eq!(count, 11);
    }

    #[test]
    fn test_rollback_reverts() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        db.begin_transaction().unwrap();
        let affected = db
            .execute_non_query("UPDATE items SET price = 0 WHERE id <= ?", &params![5])
            .unwrap();
        assert_eq!(affected, 5);
        db.rollback_transaction().unwrap();

        let zero_priced: i64 = db
            .execute_scalar("SELECT COUNT(*) FROM items WHERE price = 0", &[])
            .unwrap();
        assert_eq!(zero_priced, 0);
    }

    #[test]
    fn test_acon_during_transaction_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        db.begin_transaction().unwrap();

        let err = db
            .execute_scalar_acon::<i64>("SELECT COUNT(*) FROM items", &[])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAllowedDuringTransaction);
        assert_eq!(db.last_error_code(), ErrorCode::NotAllowedDuringTransaction);
        assert!(db.is_open());
        assert!(db.transaction_active());

        let err = db.execute_non_query_acon("DELETE FROM items", &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAllowedDuringTransaction);
        db.rollback_transaction().unwrap();
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let err = db.commit_transaction().unwrap_err();
        assert_eq!(err.code(), ErrorCode::TransactionCommitFailed);
        assert_eq!(db.last_error_code(), ErrorCode::TransactionCommitFailed);
    }
}

mod scalars {
    use super::*;

    #[test]
    fn test_count_over_ten_rows() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let count: i64 = db.execute_scalar("SELECT COUNT(*) FROM items", &[]).unwrap();
        assert_eq!(count, 10);
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[test]
    fn test_string_lookup() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let value: String = db
            .execute_scalar("SELECT value FROM info WHERE key = ?", &params!["DefaultDomain"])
            .unwrap();
        assert_eq!(value, "endevx");
    }

    #[test]
    fn test_null_into_integer() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let sql = "SELECT value FROM info WHERE key = ?";

        let err = db
            .execute_scalar::<i64>(sql, &params!["NullValue"])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationScalarFailed);
        assert_eq!(db.last_error_code(), ErrorCode::OperationScalarFailed);

        db.set_default_on_null(true);
        let value: i64 = db.execute_scalar(sql, &params!["NullValue"]).unwrap();
        assert_eq!(value, 0);
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }

    #[test]
    fn test_raw_scalar_without_rows_is_null() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let value = db
            .execute_scalar_raw("SELECT name FROM items WHERE id = ?", &params![99])
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_last_error_tracks_latest_operation() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        assert!(db.execute_scalar_raw("SELECT * FROM nope", &[]).is_err());
        assert_eq!(db.last_error_code(), ErrorCode::OperationScalarFailed);
        db.execute_scalar_raw("SELECT 1", &[]).unwrap();
        assert_eq!(db.last_error_code(), ErrorCode::Success);
    }
}

mod tables {
    use super::*;

    #[test]
    fn test_data_table_matches_result_set() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let table = db
            .create_data_table("SELECT id, name, price FROM items WHERE id > ?", &params![7])
            .unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names(), vec!["id", "name", "price"]);
        assert_eq!(table.value(0, "NAME"), Some(&Value::Text("item-8".to_string())));
    }

    #[test]
    fn test_adapter_fill_matches_data_table() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let sql = "SELECT id, name, price FROM items ORDER BY id";
        let expected = db.create_data_table(sql, &[]).unwrap();

        let adapter = db.get_data_adapter(sql, &[]).unwrap();
        let mut filled = DataTable::new();
        adapter.fill(&mut db, &mut filled).unwrap();
        assert_eq!(filled, expected);
        assert_eq!(adapter.fill_new(&mut db).unwrap(), expected);
    }

    #[test]
    fn test_joined_columns_with_shared_names_are_kept() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        db.execute_non_query("CREATE TABLE a (id INTEGER, ref INTEGER)", &[])
            .unwrap();
        db.execute_non_query("CREATE TABLE b (ID INTEGER)", &[]).unwrap();
        db.execute_non_query("INSERT INTO a VALUES (1, 7)", &[]).unwrap();
        db.execute_non_query("INSERT INTO b VALUES (7)", &[]).unwrap();

        let sql = "SELECT a.id, b.ID, a.ref FROM a JOIN b ON a.ref = b.ID";
        let table = db.create_data_table(sql, &[]).unwrap();
        assert_eq!(table.column_names(), vec!["id", "ID1", "ref"]);
        assert_eq!(
            table.rows()[0].values(),
            &[Value::Integer(1), Value::Integer(7), Value::Integer(7)]
        );

        let adapter = db.get_data_adapter(sql, &[]).unwrap();
        let mut refilled = adapter.fill_new(&mut db).unwrap();
        adapter.fill(&mut db, &mut refilled).unwrap();
        assert_eq!(refilled.column_count(), 3);
        assert_eq!(refilled.row_count(), 2);
        assert_eq!(refilled.value(1, "id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_query_reader_yields_rows_before_a_failing_row() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        // Only the third row evaluates abs(i64::MIN), which overflows.
        let sql = "SELECT CASE WHEN id < 3 THEN id \
                   ELSE abs(id - 9223372036854775807 - 4) END FROM items WHERE id <= 3";
        let mut reader = db.execute_query(sql, &[]).unwrap();
        assert_eq!(reader.read().unwrap().unwrap().get(0), Some(&Value::Integer(1)));
        assert_eq!(reader.read().unwrap().unwrap().get(0), Some(&Value::Integer(2)));
        let err = reader.read().unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationQueryFailed);
        drop(reader);
        assert_eq!(db.last_error_code(), ErrorCode::OperationQueryFailed);
    }

    #[test]
    fn test_query_reader_streams_rows() {
        let dir = TempDir::new().unwrap();
        let mut db = seeded_db(&dir);
        let mut names = Vec::new();
        for row in db
            .execute_query("SELECT name FROM items WHERE id <= ? ORDER BY id", &params![3])
            .unwrap()
        {
            let row = row.unwrap();
            names.push(row.get(0).cloned().unwrap());
        }
        assert_eq!(
            names,
            vec![
                Value::from("item-1"),
                Value::from("item-2"),
                Value::from("item-3")
            ]
        );
    }
}

mod configuration {
    use super::*;

    #[test]
    fn test_factory_backend_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.db");
        let toml = format!(
            "default_on_null = true\n\n[backend]\nkind = \"sqlite\"\npath = \"{}\"\n",
            path.display().to_string().replace('\\', "\\\\")
        );
        let config = SqlWrapConfig::from_toml(&toml).unwrap();
        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));

        let mut db: DataAccess<DynBackend> = BackendFactory::connect(&config).unwrap();
        db.execute_non_query_acon("CREATE TABLE t (n INTEGER)", &[]).unwrap();
        let missing: i64 = db.execute_scalar_acon("SELECT MAX(n) FROM t", &[]).unwrap();
        assert_eq!(missing, 0);
        assert!(path.exists());
    }
}
