//! Shift reconciliation, closing, and reopening.
//!
//! A shift only materializes when the operator closes it: the open window is
//! recomputed from the `lastShiftReportTime` watermark on every preview.
//! Closing reconciles the counted drawer cash against the calculated
//! expectation, synthesizes a deficit expense when the drawer is short, and
//! commits the shift document plus the advanced watermark in one
//! transaction. Reopening cascades: the target shift and everything after
//! it are removed (their windows depended on the target's cutoff), with a
//! ten-second undo.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, DbState};
use crate::error::{LedgerError, Result};
use crate::models::{DailyExpense, Reconciliation, Shift, VarianceType};
use crate::undo::{ReopenSnapshot, UndoSlot, REOPEN_UNDO_WINDOW_SECS};
use crate::{expenses, sales, summary, window};

/// Result of a successful close.
#[derive(Debug)]
pub struct CloseOutcome {
    pub closed_shift: Shift,
    /// Equals the closed shift's `endedAt`; all later events start a new window.
    pub new_cutoff: DateTime<Utc>,
    /// The deficit expense, when the drawer came up short.
    pub synthetic_expense: Option<DailyExpense>,
}

/// Result of a successful reopen.
#[derive(Debug)]
pub struct ReopenOutcome {
    /// The target shift and every shift closed after it, in ended-at order.
    pub removed_shifts: Vec<Shift>,
    /// Ids of the synthetic deficit expenses deleted with them.
    pub removed_deficit_expense_ids: Vec<String>,
    /// `endedAt` of the new last remaining shift, or `None` if none remain.
    pub new_cutoff: Option<DateTime<Utc>>,
    /// Single-use token restoring everything, valid for ten seconds.
    pub undo: UndoSlot,
}

// ---------------------------------------------------------------------------
// Open-window preview
// ---------------------------------------------------------------------------

/// Calculate the currently open shift: read the watermark, select the
/// window, aggregate it. Read-only — the draft is discarded unless closed.
pub fn open_shift_preview(db: &DbState) -> Result<Shift> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    let cutoff = db::last_shift_report_time(&conn)?;
    let all_sales = sales::list_sales_conn(&conn)?;
    let all_expenses = expenses::list_daily_expenses_conn(&conn)?;

    let selected = window::select_window(cutoff, &all_sales, &all_expenses);
    Ok(summary::calculate_current_shift(cutoff, selected))
}

// ---------------------------------------------------------------------------
// Close shift
// ---------------------------------------------------------------------------

/// Reconcile and close the open shift.
///
/// `actual_amount` is the operator's physical drawer count; it must be a
/// finite, non-negative number. A shortfall synthesizes a deficit expense
/// that lands both in the store and in the shift's own expense snapshot
/// (appended after the fact — `totalDailyExpenses` is not recomputed).
/// The expense insert, the shift insert, and the watermark advance commit
/// or roll back together.
pub fn close_shift(
    db: &DbState,
    mut draft: Shift,
    actual_amount: f64,
    closed_by: &str,
) -> Result<CloseOutcome> {
    if !actual_amount.is_finite() || actual_amount < 0.0 {
        return Err(LedgerError::Validation(
            "Enter a valid actual cash amount".to_string(),
        ));
    }

    let ended_at = Utc::now();
    let expected = draft.summary.expected_in_drawer;
    let difference = actual_amount - expected;

    draft.ended_at = Some(ended_at);
    draft.ended_by = Some(closed_by.to_string());
    draft.reconciliation = Some(Reconciliation {
        actual: actual_amount,
        expected,
        difference,
        variance_type: if difference >= 0.0 {
            VarianceType::Surplus
        } else {
            VarianceType::Deficit
        },
    });

    let synthetic_expense = if difference < 0.0 {
        let deficit = DailyExpense {
            id: Uuid::new_v4().to_string(),
            amount: difference.abs(),
            notes: format!("Deficit from shift {}", draft.id),
            date: ended_at,
            cashier: closed_by.to_string(),
            is_deficit: true,
        };
        draft.expenses.push(deficit.clone());
        Some(deficit)
    } else {
        None
    };

    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    // Wrap all writes in a transaction for atomicity
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| LedgerError::Transaction(format!("begin transaction: {e}")))?;

    let result = (|| -> Result<()> {
        if let Some(deficit) = &synthetic_expense {
            expenses::insert_expense_row(&conn, deficit)?;
        }
        insert_shift_row(&conn, &draft)?;
        db::set_config(
            &conn,
            db::LAST_SHIFT_REPORT_TIME,
            Some(&ended_at.to_rfc3339()),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| LedgerError::Transaction(format!("commit: {e}")))?;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    info!(
        shift_id = %draft.id,
        expected = %expected,
        actual = %actual_amount,
        difference = %difference,
        "Shift closed"
    );

    Ok(CloseOutcome {
        closed_shift: draft,
        new_cutoff: ended_at,
        synthetic_expense,
    })
}

// ---------------------------------------------------------------------------
// Reopen / undo
// ---------------------------------------------------------------------------

/// Reopen a closed shift, cascading over everything closed after it.
///
/// Each shift's window depended on the previous watermark, so reopening is
/// never a point edit: the target and all later shifts are deleted, their
/// synthetic deficit expenses removed, and the watermark rewound to the
/// preceding shift's `endedAt` (or cleared). The returned [`UndoSlot`]
/// restores the exact removed records within ten seconds.
pub fn reopen_shift(db: &DbState, shift_id: &str) -> Result<ReopenOutcome> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    let all_shifts = list_shifts_conn(&conn)?;
    let index = all_shifts
        .iter()
        .position(|s| s.id == shift_id)
        .ok_or_else(|| LedgerError::NotFound(format!("No shift found with id {shift_id}")))?;

    let prior_cutoff = db::last_shift_report_time(&conn)?;
    let removed: Vec<Shift> = all_shifts[index..].to_vec();

    let deficit_expenses: Vec<DailyExpense> = removed
        .iter()
        .flat_map(|s| s.expenses.iter())
        .filter(|e| e.is_deficit)
        .cloned()
        .collect();
    let deficit_ids: Vec<String> = deficit_expenses.iter().map(|e| e.id.clone()).collect();

    let new_cutoff = if index > 0 {
        all_shifts[index - 1].ended_at
    } else {
        None
    };

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| LedgerError::Transaction(format!("begin transaction: {e}")))?;

    let result = (|| -> Result<()> {
        for shift in &removed {
            conn.execute("DELETE FROM shifts WHERE id = ?1", params![shift.id])
                .map_err(|e| LedgerError::Transaction(format!("delete shift: {e}")))?;
        }
        for expense_id in &deficit_ids {
            conn.execute(
                "DELETE FROM daily_expenses WHERE id = ?1 AND is_deficit = 1",
                params![expense_id],
            )
            .map_err(|e| LedgerError::Transaction(format!("delete deficit expense: {e}")))?;
        }
        db::set_config(
            &conn,
            db::LAST_SHIFT_REPORT_TIME,
            new_cutoff.map(|t| t.to_rfc3339()).as_deref(),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| LedgerError::Transaction(format!("commit: {e}")))?;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    info!(
        shift_id = %shift_id,
        cascade = removed.len(),
        deficit_expenses = deficit_ids.len(),
        "Shift re-opened"
    );

    let undo = UndoSlot::arm(
        ReopenSnapshot {
            shifts: removed.clone(),
            deficit_expenses,
            prior_cutoff,
        },
        Duration::seconds(REOPEN_UNDO_WINDOW_SECS),
    );

    Ok(ReopenOutcome {
        removed_shifts: removed,
        removed_deficit_expense_ids: deficit_ids,
        new_cutoff,
        undo,
    })
}

/// Take back a reopen: re-insert the removed shifts in time order, restore
/// their deficit expenses, and put the watermark back. Consumes the slot;
/// fails if the undo window has elapsed. Returns the restored cutoff.
pub fn undo_reopen(db: &DbState, slot: UndoSlot) -> Result<Option<DateTime<Utc>>> {
    let mut snapshot = slot.take()?;
    snapshot
        .shifts
        .sort_by_key(|s| s.ended_at);

    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| LedgerError::Transaction(format!("begin transaction: {e}")))?;

    let result = (|| -> Result<()> {
        for shift in &snapshot.shifts {
            insert_shift_row(&conn, shift)?;
        }
        for expense in &snapshot.deficit_expenses {
            expenses::insert_expense_row(&conn, expense)?;
        }
        db::set_config(
            &conn,
            db::LAST_SHIFT_REPORT_TIME,
            snapshot.prior_cutoff.map(|t| t.to_rfc3339()).as_deref(),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| LedgerError::Transaction(format!("commit: {e}")))?;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            warn!("Undo of re-opening failed, store left at reopened state: {e}");
            return Err(e);
        }
    }

    info!(
        restored = snapshot.shifts.len(),
        "Re-opening undone"
    );

    Ok(snapshot.prior_cutoff)
}

// ---------------------------------------------------------------------------
// Shift queries
// ---------------------------------------------------------------------------

/// All closed shifts in ended-at order.
pub fn list_shifts(db: &DbState) -> Result<Vec<Shift>> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    list_shifts_conn(&conn)
}

pub(crate) fn list_shifts_conn(conn: &Connection) -> Result<Vec<Shift>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, started_at, ended_at, ended_by, sales, returns, expenses,
                    summary, reconciliation
             FROM shifts ORDER BY ended_at ASC",
        )
        .map_err(|e| LedgerError::Transaction(format!("prepare shifts: {e}")))?;

    let raw: Vec<ShiftRow> = stmt
        .query_map([], |row| {
            Ok(ShiftRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                ended_at: row.get(2)?,
                ended_by: row.get(3)?,
                sales: row.get(4)?,
                returns: row.get(5)?,
                expenses: row.get(6)?,
                summary: row.get(7)?,
                reconciliation: row.get(8)?,
            })
        })
        .map_err(|e| LedgerError::Transaction(format!("query shifts: {e}")))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| LedgerError::Transaction(format!("read shift row: {e}")))?;

    raw.into_iter().map(ShiftRow::into_shift).collect()
}

/// Raw TEXT columns of a shifts row, parsed outside the rusqlite closure.
struct ShiftRow {
    id: String,
    started_at: String,
    ended_at: String,
    ended_by: String,
    sales: String,
    returns: String,
    expenses: String,
    summary: String,
    reconciliation: String,
}

impl ShiftRow {
    fn into_shift(self) -> Result<Shift> {
        Ok(Shift {
            id: self.id,
            started_at: db::parse_ts(&self.started_at)?,
            ended_at: Some(db::parse_ts(&self.ended_at)?),
            ended_by: Some(self.ended_by),
            sales: serde_json::from_str(&self.sales)?,
            returns: serde_json::from_str(&self.returns)?,
            expenses: serde_json::from_str(&self.expenses)?,
            summary: serde_json::from_str(&self.summary)?,
            reconciliation: Some(serde_json::from_str(&self.reconciliation)?),
        })
    }
}

/// Insert a closed shift document. Only ever called with `endedAt`,
/// `endedBy`, and `reconciliation` set.
fn insert_shift_row(conn: &Connection, shift: &Shift) -> Result<()> {
    let (ended_at, ended_by, reconciliation) = match (
        &shift.ended_at,
        &shift.ended_by,
        &shift.reconciliation,
    ) {
        (Some(at), Some(by), Some(rec)) => (at, by, rec),
        _ => {
            return Err(LedgerError::Validation(format!(
                "refusing to persist unclosed shift {}",
                shift.id
            )))
        }
    };

    conn.execute(
        "INSERT INTO shifts (
            id, started_at, ended_at, ended_by, sales, returns, expenses,
            summary, reconciliation
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            shift.id,
            shift.started_at.to_rfc3339(),
            ended_at.to_rfc3339(),
            ended_by,
            serde_json::to_string(&shift.sales)?,
            serde_json::to_string(&shift.returns)?,
            serde_json::to_string(&shift.expenses)?,
            serde_json::to_string(&shift.summary)?,
            serde_json::to_string(reconciliation)?,
        ],
    )
    .map_err(|e| LedgerError::Transaction(format!("insert shift: {e}")))?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
