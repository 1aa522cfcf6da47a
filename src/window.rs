//! Event window selection.
//!
//! Partitions persisted sales and daily expenses into the open shift window
//! using the `lastShiftReportTime` cutoff: strictly-greater-than wins, and a
//! missing cutoff means nothing has ever been closed, so everything is in.
//! Pure filter — stable order, no side effects.

use chrono::{DateTime, Utc};

use crate::models::{DailyExpense, Sale, ShiftWindow};

/// Select the events belonging to the currently open shift.
///
/// A sale is in the window when its `createdAt` is after the cutoff; an
/// expense when its `date` is. Events exactly at the cutoff belong to the
/// shift that was closed at that instant, not to the open one.
pub fn select_window(
    cutoff: Option<DateTime<Utc>>,
    sales: &[Sale],
    expenses: &[DailyExpense],
) -> ShiftWindow {
    match cutoff {
        Some(cut) => ShiftWindow {
            sales: sales.iter().filter(|s| s.created_at > cut).cloned().collect(),
            expenses: expenses.iter().filter(|e| e.date > cut).cloned().collect(),
        },
        None => ShiftWindow {
            sales: sales.to_vec(),
            expenses: expenses.to_vec(),
        },
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethod;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    fn sale(id: &str, created_at: DateTime<Utc>) -> Sale {
        Sale {
            id: id.to_string(),
            created_at,
            updated_at: None,
            cashier: "mona".to_string(),
            payment_method: PaymentMethod::Cash,
            subtotal: 100.0,
            discount_amount: 0.0,
            total_amount: 100.0,
            profit: 40.0,
            items: vec![],
        }
    }

    fn expense(id: &str, date: DateTime<Utc>) -> DailyExpense {
        DailyExpense {
            id: id.to_string(),
            amount: 20.0,
            notes: "bags".to_string(),
            date,
            cashier: "mona".to_string(),
            is_deficit: false,
        }
    }

    #[test]
    fn test_null_cutoff_selects_everything() {
        let sales = vec![sale("s1", ts(9)), sale("s2", ts(12))];
        let expenses = vec![expense("e1", ts(10))];

        let window = select_window(None, &sales, &expenses);
        assert_eq!(window.sales.len(), 2);
        assert_eq!(window.expenses.len(), 1);
    }

    #[test]
    fn test_cutoff_is_strictly_exclusive() {
        let sales = vec![sale("s1", ts(9)), sale("s2", ts(10)), sale("s3", ts(11))];
        let expenses = vec![expense("e1", ts(10)), expense("e2", ts(14))];

        let window = select_window(Some(ts(10)), &sales, &expenses);

        // Events exactly at the cutoff belong to the already-closed shift
        let ids: Vec<&str> = window.sales.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s3"]);
        let eids: Vec<&str> = window.expenses.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(eids, vec!["e2"]);
    }

    #[test]
    fn test_selection_preserves_order_and_is_repeatable() {
        let sales = vec![sale("b", ts(12)), sale("a", ts(11)), sale("c", ts(13))];
        let expenses = vec![];

        let first = select_window(Some(ts(10)), &sales, &expenses);
        let second = select_window(Some(ts(10)), &sales, &expenses);

        let order: Vec<&str> = first.sales.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"], "input order must be preserved");
        assert_eq!(
            order,
            second.sales.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "same inputs must select the same window"
        );
    }
}
