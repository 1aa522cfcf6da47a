//! Local SQLite store for the shift ledger.
//!
//! Uses rusqlite with WAL mode. Holds the three document collections the
//! ledger works over (sales, daily_expenses, shifts) plus the `app_config`
//! key/value table that carries the `lastShiftReportTime` watermark —
//! the single cutoff separating the open window from closed history.
//!
//! Nested document parts (sale items, shift snapshots, summary,
//! reconciliation) are stored as JSON TEXT columns; scalar fields get real
//! columns so queries can order and filter on them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::{LedgerError, Result};

/// Shared handle to the store. One register of authority: every operation
/// goes through this single connection.
#[derive(Debug)]
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Config key holding the end timestamp of the most recently closed shift.
pub const LAST_SHIFT_REPORT_TIME: &str = "lastShiftReportTime";

/// Initialize the database at `{data_dir}/ledger.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. An unreadable or corrupt file is an
/// error, never grounds to recreate the store — the ledger is the record
/// of money movements, so recovery stays a manual decision.
pub fn init(data_dir: &Path) -> Result<DbState> {
    fs::create_dir_all(data_dir)
        .map_err(|e| LedgerError::Transaction(format!("Failed to create data dir: {e}")))?;

    let db_path = data_dir.join("ledger.db");
    info!("Opening database at {}", db_path.display());

    let conn = open_and_configure(&db_path)?;
    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).map_err(|e| LedgerError::Transaction(format!("sqlite open: {e}")))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| LedgerError::Transaction(format!("pragma setup: {e}")))?;

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<()> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| LedgerError::Transaction(format!("create schema_version: {e}")))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: config watermark, sales, and daily expenses.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- app_config (key/value store; holds lastShiftReportTime)
        CREATE TABLE IF NOT EXISTS app_config (
            config_key TEXT PRIMARY KEY,
            config_value TEXT,
            updated_at TEXT DEFAULT (datetime('now'))
        );

        -- sales (items kept as a JSON document; returns mutate it in place)
        CREATE TABLE IF NOT EXISTS sales (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            cashier TEXT NOT NULL,
            payment_method TEXT NOT NULL DEFAULT 'cash',
            subtotal REAL NOT NULL DEFAULT 0,
            discount_amount REAL NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL DEFAULT 0,
            profit REAL NOT NULL DEFAULT 0,
            items TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_sales_created_at ON sales(created_at);

        -- daily_expenses
        CREATE TABLE IF NOT EXISTS daily_expenses (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            cashier TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_daily_expenses_date ON daily_expenses(date);
        ",
    )
    .map_err(|e| LedgerError::Transaction(format!("migration v1: {e}")))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
        .map_err(|e| LedgerError::Transaction(format!("record v1: {e}")))?;
    info!("Migration v1 applied");
    Ok(())
}

/// Migration v2: closed shifts and deficit tagging on expenses.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- closed shifts (immutable once written; snapshots are JSON documents)
        CREATE TABLE IF NOT EXISTS shifts (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL,
            ended_by TEXT NOT NULL,
            sales TEXT NOT NULL DEFAULT '[]',
            returns TEXT NOT NULL DEFAULT '[]',
            expenses TEXT NOT NULL DEFAULT '[]',
            summary TEXT NOT NULL,
            reconciliation TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_shifts_ended_at ON shifts(ended_at);

        -- deficit flag: marks expenses synthesized by shift closing
        ALTER TABLE daily_expenses ADD COLUMN is_deficit INTEGER NOT NULL DEFAULT 0;
        ",
    )
    .map_err(|e| LedgerError::Transaction(format!("migration v2: {e}")))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])
        .map_err(|e| LedgerError::Transaction(format!("record v2: {e}")))?;
    info!("Migration v2 applied");
    Ok(())
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

pub fn get_config(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT config_value FROM app_config WHERE config_key = ?1",
        params![key],
        |row| row.get::<_, Option<String>>(0),
    )
    .ok()
    .flatten()
}

pub fn set_config(conn: &Connection, key: &str, value: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO app_config (config_key, config_value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(config_key) DO UPDATE SET
            config_value = excluded.config_value,
            updated_at = excluded.updated_at",
        params![key, value],
    )
    .map_err(|e| LedgerError::Transaction(format!("set_config: {e}")))?;
    Ok(())
}

/// Read the cutoff watermark. `None` means no shift has ever been closed:
/// everything in the store belongs to the open window.
pub fn last_shift_report_time(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    match get_config(conn, LAST_SHIFT_REPORT_TIME) {
        Some(raw) => Ok(Some(parse_ts(&raw)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Timestamp helpers
// ---------------------------------------------------------------------------

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Transaction(format!("bad timestamp '{raw}': {e}")))
}

/// Parse an optional RFC 3339 timestamp column.
pub(crate) fn parse_ts_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        Some(s) => Ok(Some(parse_ts(&s)?)),
        None => Ok(None),
    }
}

/// Run all migrations on the given connection (test helper, not public API).
#[cfg(test)]
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("run_migrations should succeed in test");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    /// Open an in-memory database and apply pragmas (mirrors open_and_configure).
    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        conn
    }

    /// Helper: list table names in the database.
    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_v1_to_latest() {
        let conn = test_db();
        run_migrations(&conn).expect("run_migrations should succeed");

        let tables = table_names(&conn);
        assert!(
            tables.contains(&"app_config".to_string()),
            "missing app_config"
        );
        assert!(tables.contains(&"sales".to_string()), "missing sales");
        assert!(
            tables.contains(&"daily_expenses".to_string()),
            "missing daily_expenses"
        );
        assert!(tables.contains(&"shifts".to_string()), "missing shifts");

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).expect("first run");
        run_migrations(&conn).expect("second run should be a no-op");
    }

    #[test]
    fn test_config_roundtrip_and_clear() {
        let conn = test_db();
        run_migrations(&conn).unwrap();

        assert!(get_config(&conn, LAST_SHIFT_REPORT_TIME).is_none());

        set_config(
            &conn,
            LAST_SHIFT_REPORT_TIME,
            Some("2026-03-01T18:00:00+00:00"),
        )
        .unwrap();
        assert_eq!(
            get_config(&conn, LAST_SHIFT_REPORT_TIME).as_deref(),
            Some("2026-03-01T18:00:00+00:00")
        );
        assert!(last_shift_report_time(&conn).unwrap().is_some());

        // NULL value reads back as absent (cutoff cleared by a full reopen)
        set_config(&conn, LAST_SHIFT_REPORT_TIME, None).unwrap();
        assert!(get_config(&conn, LAST_SHIFT_REPORT_TIME).is_none());
        assert!(last_shift_report_time(&conn).unwrap().is_none());
    }

    #[test]
    fn test_init_leaves_unreadable_file_in_place() {
        let dir = std::env::temp_dir().join(format!("ledger-db-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ledger.db"), b"not a database").unwrap();

        let err = init(&dir).unwrap_err();
        assert!(matches!(err, LedgerError::Transaction(_)));
        // No recreate-from-scratch: the bad file survives for inspection
        assert_eq!(
            std::fs::read(dir.join("ledger.db")).unwrap(),
            b"not a database"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(parse_ts("2026-03-01T18:00:00Z").is_ok());
        assert!(parse_ts("not-a-timestamp").is_err());
    }
}
