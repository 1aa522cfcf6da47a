//! Daily-expense management.
//!
//! Operator-entered cash outflows (cleaning, bags, utilities) plus the
//! synthetic deficit rows the closing step creates. The CRUD surface here
//! only ever touches operator expenses — deficit rows are created by
//! `close_shift` and removed by `reopen_shift`, never edited directly.

use rusqlite::{params, Connection};
use tracing::info;

use crate::db::{self, DbState};
use crate::error::{LedgerError, Result};
use crate::models::DailyExpense;

// ---------------------------------------------------------------------------
// Record / update / delete
// ---------------------------------------------------------------------------

/// Record an operator expense.
pub fn record_daily_expense(db: &DbState, expense: &DailyExpense) -> Result<()> {
    if !expense.amount.is_finite() || expense.amount <= 0.0 {
        return Err(LedgerError::Validation(
            "Please enter a valid expense amount".to_string(),
        ));
    }
    if expense.is_deficit {
        return Err(LedgerError::Validation(
            "Deficit expenses are created by shift closing".to_string(),
        ));
    }

    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    insert_expense_row(&conn, expense)?;

    info!(expense_id = %expense.id, amount = %expense.amount, "Daily expense recorded");
    Ok(())
}

/// Change an expense's amount and notes. Deficit rows are off limits.
pub fn update_daily_expense(db: &DbState, id: &str, amount: f64, notes: &str) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::Validation(
            "Please enter a valid expense amount".to_string(),
        ));
    }

    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    guard_not_deficit(&conn, id)?;

    conn.execute(
        "UPDATE daily_expenses SET amount = ?1, notes = ?2 WHERE id = ?3",
        params![amount, notes, id],
    )
    .map_err(|e| LedgerError::Transaction(format!("update expense: {e}")))?;

    info!(expense_id = %id, amount = %amount, "Daily expense updated");
    Ok(())
}

/// Delete an operator expense. Deficit rows are off limits.
pub fn delete_daily_expense(db: &DbState, id: &str) -> Result<()> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    guard_not_deficit(&conn, id)?;

    conn.execute("DELETE FROM daily_expenses WHERE id = ?1", params![id])
        .map_err(|e| LedgerError::Transaction(format!("delete expense: {e}")))?;

    info!(expense_id = %id, "Daily expense deleted");
    Ok(())
}

fn guard_not_deficit(conn: &Connection, id: &str) -> Result<()> {
    let is_deficit: bool = conn
        .query_row(
            "SELECT is_deficit FROM daily_expenses WHERE id = ?1",
            params![id],
            |row| row.get::<_, i64>(0).map(|v| v != 0),
        )
        .map_err(|_| LedgerError::NotFound(format!("No expense found with id {id}")))?;

    if is_deficit {
        return Err(LedgerError::Validation(
            "Deficit expenses are managed by shift closing".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// All daily expenses in date order.
pub fn list_daily_expenses(db: &DbState) -> Result<Vec<DailyExpense>> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    list_daily_expenses_conn(&conn)
}

pub(crate) fn list_daily_expenses_conn(conn: &Connection) -> Result<Vec<DailyExpense>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, amount, notes, date, cashier, is_deficit
             FROM daily_expenses ORDER BY date ASC",
        )
        .map_err(|e| LedgerError::Transaction(format!("prepare expenses: {e}")))?;

    let raw: Vec<(String, f64, String, String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })
        .map_err(|e| LedgerError::Transaction(format!("query expenses: {e}")))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| LedgerError::Transaction(format!("read expense row: {e}")))?;

    raw.into_iter()
        .map(|(id, amount, notes, date, cashier, is_deficit)| {
            Ok(DailyExpense {
                id,
                amount,
                notes,
                date: db::parse_ts(&date)?,
                cashier,
                is_deficit: is_deficit != 0,
            })
        })
        .collect()
}

/// Raw insert, shared with shift closing (synthetic deficits) and reopen
/// undo (restores). No validation — callers own the invariants.
pub(crate) fn insert_expense_row(conn: &Connection, expense: &DailyExpense) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_expenses (id, amount, notes, date, cashier, is_deficit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            expense.id,
            expense.amount,
            expense.notes,
            expense.date.to_rfc3339(),
            expense.cashier,
            expense.is_deficit as i64,
        ],
    )
    .map_err(|e| LedgerError::Transaction(format!("insert expense: {e}")))?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rusqlite::Connection;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    fn expense(id: &str, amount: f64) -> DailyExpense {
        DailyExpense {
            id: id.to_string(),
            amount,
            notes: "bags".to_string(),
            date: Utc::now(),
            cashier: "mona".to_string(),
            is_deficit: false,
        }
    }

    #[test]
    fn test_record_and_list() {
        let db = test_db();
        record_daily_expense(&db, &expense("e-1", 20.0)).unwrap();
        record_daily_expense(&db, &expense("e-2", 12.5)).unwrap();

        let all = list_daily_expenses(&db).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].amount, 20.0);
        assert!(!all[0].is_deficit);
    }

    #[test]
    fn test_record_rejects_non_positive_amount() {
        let db = test_db();
        assert!(matches!(
            record_daily_expense(&db, &expense("e-1", 0.0)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            record_daily_expense(&db, &expense("e-2", -5.0)),
            Err(LedgerError::Validation(_))
        ));
        assert!(list_daily_expenses(&db).unwrap().is_empty());
    }

    #[test]
    fn test_record_rejects_deficit_flag() {
        let db = test_db();
        let mut e = expense("e-1", 5.0);
        e.is_deficit = true;
        assert!(matches!(
            record_daily_expense(&db, &e),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let db = test_db();
        record_daily_expense(&db, &expense("e-1", 20.0)).unwrap();

        update_daily_expense(&db, "e-1", 25.0, "bags + tape").unwrap();
        let all = list_daily_expenses(&db).unwrap();
        assert_eq!(all[0].amount, 25.0);
        assert_eq!(all[0].notes, "bags + tape");

        delete_daily_expense(&db, "e-1").unwrap();
        assert!(list_daily_expenses(&db).unwrap().is_empty());
    }

    #[test]
    fn test_missing_expense_is_not_found() {
        let db = test_db();
        assert!(matches!(
            update_daily_expense(&db, "nope", 5.0, ""),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            delete_daily_expense(&db, "nope"),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_deficit_rows_cannot_be_edited_or_deleted() {
        let db = test_db();
        let mut deficit = expense("d-1", 5.0);
        deficit.is_deficit = true;
        {
            let conn = db.conn.lock().unwrap();
            insert_expense_row(&conn, &deficit).unwrap();
        }

        assert!(matches!(
            update_daily_expense(&db, "d-1", 10.0, ""),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            delete_daily_expense(&db, "d-1"),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(list_daily_expenses(&db).unwrap().len(), 1);
    }
}
