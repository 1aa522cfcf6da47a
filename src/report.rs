//! Plain-text shift report.
//!
//! Renders a closed shift for the operator: header, summary table, and the
//! sales/returns/expenses detail sections. Downstream consumers (PDF
//! export, printing) take this shape and style it; byte formats live there,
//! not here.

use std::fmt::Write;

use crate::models::Shift;

const WIDTH: usize = 46;

/// Render a closed shift as a plain-text report. Drafts render too, with
/// the reconciliation section omitted.
pub fn render_shift_report(shift: &Shift) -> String {
    let mut out = String::new();

    center(&mut out, "Shift Report");
    rule(&mut out);
    line(&mut out, "Shift ID", &shift.id);
    line(
        &mut out,
        "Started",
        &shift.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    if let Some(ended_at) = shift.ended_at {
        line(
            &mut out,
            "Ended",
            &ended_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }
    if let Some(ended_by) = &shift.ended_by {
        line(&mut out, "Ended By", ended_by);
    }
    rule(&mut out);

    let s = &shift.summary;
    money(&mut out, "Total Sales", s.total_sales);
    money(&mut out, "  Cash", s.total_cash_sales);
    money(&mut out, "  InstaPay", s.total_insta_pay_sales);
    money(&mut out, "  vCash", s.total_v_cash_sales);
    money(&mut out, "Total Returns", s.total_returns_value);
    money(&mut out, "Daily Expenses", s.total_daily_expenses);
    money(&mut out, "Expected in Drawer", s.expected_in_drawer);

    if let Some(rec) = &shift.reconciliation {
        money(&mut out, "Actual in Drawer", rec.actual);
        let verdict = match rec.variance_type {
            crate::models::VarianceType::Surplus => "surplus",
            crate::models::VarianceType::Deficit => "deficit",
        };
        line(
            &mut out,
            "Difference",
            &format!("{:.2} ({verdict})", rec.difference),
        );
    }

    if !shift.sales.is_empty() {
        rule(&mut out);
        center(&mut out, "Sales");
        for sale in &shift.sales {
            line(
                &mut out,
                &format!("{} {}", sale.created_at.format("%H:%M"), sale.cashier),
                &format!("{} {:.2}", String::from(sale.payment_method.clone()), sale.total_amount),
            );
        }
    }

    if !shift.returns.is_empty() {
        rule(&mut out);
        center(&mut out, "Returns");
        for ret in &shift.returns {
            line(
                &mut out,
                &format!("{} {}", ret.returned_at.format("%H:%M"), ret.product_name),
                &format!("{:.2}", ret.return_value),
            );
        }
    }

    if !shift.expenses.is_empty() {
        rule(&mut out);
        center(&mut out, "Expenses");
        for exp in &shift.expenses {
            let label = if exp.is_deficit {
                format!("{} (deficit)", exp.date.format("%H:%M"))
            } else {
                format!("{} {}", exp.date.format("%H:%M"), exp.notes)
            };
            line(&mut out, &label, &format!("{:.2}", exp.amount));
        }
    }

    rule(&mut out);
    out
}

fn center(out: &mut String, text: &str) {
    let pad = WIDTH.saturating_sub(text.len()) / 2;
    let _ = writeln!(out, "{:pad$}{text}", "");
}

fn rule(out: &mut String) {
    let _ = writeln!(out, "{}", "-".repeat(WIDTH));
}

fn line(out: &mut String, label: &str, value: &str) {
    let pad = WIDTH.saturating_sub(label.len() + value.len()).max(1);
    let _ = writeln!(out, "{label}{:pad$}{value}", "");
}

fn money(out: &mut String, label: &str, amount: f64) {
    line(out, label, &format!("{amount:.2} EGP"));
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DailyExpense, PaymentMethod, Reconciliation, Sale, ShiftSummary, VarianceType,
    };
    use chrono::{TimeZone, Utc};

    fn closed_shift() -> Shift {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let ended = Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap();
        Shift {
            id: "SHIFT-2026-03-01T18:00:00.000Z".to_string(),
            started_at: started,
            ended_at: Some(ended),
            ended_by: Some("mona".to_string()),
            sales: vec![Sale {
                id: "s-1".to_string(),
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 11, 30, 0).unwrap(),
                updated_at: None,
                cashier: "mona".to_string(),
                payment_method: PaymentMethod::Cash,
                subtotal: 100.0,
                discount_amount: 0.0,
                total_amount: 100.0,
                profit: 40.0,
                items: vec![],
            }],
            returns: vec![],
            expenses: vec![DailyExpense {
                id: "d-1".to_string(),
                amount: 5.0,
                notes: "Deficit from shift SHIFT-2026-03-01T18:00:00.000Z".to_string(),
                date: ended,
                cashier: "mona".to_string(),
                is_deficit: true,
            }],
            summary: ShiftSummary {
                total_sales: 100.0,
                total_cash_sales: 100.0,
                total_insta_pay_sales: 0.0,
                total_v_cash_sales: 0.0,
                total_returns_value: 0.0,
                total_daily_expenses: 20.0,
                expected_in_drawer: 80.0,
            },
            reconciliation: Some(Reconciliation {
                actual: 75.0,
                expected: 80.0,
                difference: -5.0,
                variance_type: VarianceType::Deficit,
            }),
        }
    }

    #[test]
    fn test_report_contains_summary_and_verdict() {
        let report = render_shift_report(&closed_shift());

        assert!(report.contains("Shift Report"));
        assert!(report.contains("Expected in Drawer"));
        assert!(report.contains("80.00 EGP"));
        assert!(report.contains("75.00 EGP"));
        assert!(report.contains("-5.00 (deficit)"));
        assert!(report.contains("Sales"));
        assert!(report.contains("(deficit)"), "deficit expense labeled");
    }

    #[test]
    fn test_draft_omits_reconciliation() {
        let mut shift = closed_shift();
        shift.ended_at = None;
        shift.ended_by = None;
        shift.reconciliation = None;

        let report = render_shift_report(&shift);
        assert!(!report.contains("Actual in Drawer"));
        assert!(!report.contains("Ended By"));
    }
}
