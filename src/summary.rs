//! Shift summary calculation.
//!
//! Aggregates a selected window into the cash-flow summary the operator
//! reconciles against: total sales, per-method buckets, returns value,
//! daily expenses, and the expected drawer cash. Pure computation —
//! deterministic for identical inputs; only the draft shift id and
//! `startedAt` fallback consult the clock.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{PaymentMethod, ReturnDetail, Shift, ShiftSummary, ShiftWindow};

/// Aggregate a window into a summary plus the reconstructed return details.
///
/// Returns are derived from item-level `returnedQty` on the *windowed*
/// sales: a return taken today against a sale from a prior shift is not
/// visible here, because the owning sale sits outside the window. The store
/// keeps no per-return timestamp, so `returnedAt` falls back from
/// `updatedAt` to `createdAt`. Known precision limitation, kept as-is.
pub fn calculate_summary(window: &ShiftWindow) -> (ShiftSummary, Vec<ReturnDetail>) {
    let mut summary = ShiftSummary::default();
    let mut returns = Vec::new();

    for sale in &window.sales {
        summary.total_sales += sale.total_amount;
        match sale.payment_method {
            PaymentMethod::Cash => summary.total_cash_sales += sale.total_amount,
            PaymentMethod::InstaPay => summary.total_insta_pay_sales += sale.total_amount,
            PaymentMethod::VCash => summary.total_v_cash_sales += sale.total_amount,
            // Unrecognized methods count toward totalSales only
            PaymentMethod::Other(_) => {}
        }

        let discount_ratio = sale.discount_ratio();
        for item in &sale.items {
            if item.returned_qty == 0 {
                continue;
            }
            let item_subtotal = item.unit_price * f64::from(item.returned_qty);
            let returned_value = item_subtotal - item_subtotal * discount_ratio;
            summary.total_returns_value += returned_value;
            returns.push(ReturnDetail {
                original_sale_id: sale.id.clone(),
                returned_at: sale.updated_at.unwrap_or(sale.created_at),
                cashier: sale.cashier.clone(),
                return_value: returned_value,
                product_name: format!(
                    "{} ({}/{})",
                    item.product_name, item.color, item.size
                ),
            });
        }
    }

    summary.total_daily_expenses = window.expenses.iter().map(|e| e.amount).sum();

    // Only cash settles into the drawer; instaPay/vCash settle out-of-band.
    summary.expected_in_drawer =
        summary.total_cash_sales - summary.total_returns_value - summary.total_daily_expenses;

    (summary, returns)
}

/// Build the draft for the currently open shift: the window snapshot, its
/// summary, and a fresh preview id. The draft is discarded unless it is
/// handed to `close_shift`.
pub fn calculate_current_shift(
    cutoff: Option<DateTime<Utc>>,
    window: ShiftWindow,
) -> Shift {
    let (summary, returns) = calculate_summary(&window);
    let started_at = cutoff.unwrap_or(DateTime::UNIX_EPOCH);

    Shift {
        // Full timestamp in the id keeps previews unique across invocations
        id: format!(
            "SHIFT-{}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        started_at,
        ended_at: None,
        ended_by: None,
        sales: window.sales,
        returns,
        expenses: window.expenses,
        summary,
        reconciliation: None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
