//! Domain records for the shift ledger.
//!
//! Field names serialize in camelCase to match the document shapes the
//! store has always held (sales, daily_expenses, shifts, app_config).
//! A `Shift` is a draft until closed and an immutable document afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payment methods
// ---------------------------------------------------------------------------

/// How a sale was settled. Anything outside the three known methods is
/// preserved verbatim as `Other` and contributes to `totalSales` only —
/// it never lands in a per-method bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    Cash,
    InstaPay,
    VCash,
    Other(String),
}

impl From<String> for PaymentMethod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cash" => PaymentMethod::Cash,
            "instaPay" => PaymentMethod::InstaPay,
            "vCash" => PaymentMethod::VCash,
            _ => PaymentMethod::Other(s),
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(m: PaymentMethod) -> Self {
        match m {
            PaymentMethod::Cash => "cash".to_string(),
            PaymentMethod::InstaPay => "instaPay".to_string(),
            PaymentMethod::VCash => "vCash".to_string(),
            PaymentMethod::Other(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

/// One line of a sale. `returned_qty` only ever grows and never exceeds
/// `quantity`; returns mutate the owning sale in place rather than creating
/// a separate return document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub purchase_price: f64,
    #[serde(default)]
    pub returned_qty: u32,
}

impl SaleItem {
    /// Quantity still eligible for return.
    pub fn unreturned_qty(&self) -> u32 {
        self.quantity.saturating_sub(self.returned_qty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Stamped by return processing; absent until the sale is first touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub cashier: String,
    pub payment_method: PaymentMethod,
    pub subtotal: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub total_amount: f64,
    #[serde(default)]
    pub profit: f64,
    pub items: Vec<SaleItem>,
}

impl Sale {
    /// Discount as a fraction of the pre-discount subtotal. Zero-subtotal
    /// sales get ratio 0 rather than a division failure.
    pub fn discount_ratio(&self) -> f64 {
        if self.subtotal > 0.0 {
            self.discount_amount / self.subtotal
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

/// A cash outflow during the day. `is_deficit` marks the synthetic rows the
/// closing step creates for drawer shortfalls; reopen removes exactly those.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyExpense {
    pub id: String,
    pub amount: f64,
    pub notes: String,
    pub date: DateTime<Utc>,
    pub cashier: String,
    #[serde(default)]
    pub is_deficit: bool,
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

/// A return reconstructed from item-level `returnedQty` on a windowed sale.
/// `returned_at` is `updatedAt` when the sale has one, else `createdAt` —
/// the store keeps no per-return timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetail {
    pub original_sale_id: String,
    pub returned_at: DateTime<Utc>,
    pub cashier: String,
    pub return_value: f64,
    pub product_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub total_sales: f64,
    pub total_cash_sales: f64,
    pub total_insta_pay_sales: f64,
    pub total_v_cash_sales: f64,
    pub total_returns_value: f64,
    pub total_daily_expenses: f64,
    /// Cash-method sales minus returns value minus daily expenses. Non-cash
    /// methods settle out-of-band and never touch the drawer.
    pub expected_in_drawer: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceType {
    Surplus,
    Deficit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub actual: f64,
    pub expected: f64,
    pub difference: f64,
    #[serde(rename = "type")]
    pub variance_type: VarianceType,
}

/// An accounting period. Materialized only at close time — the open window
/// is always recomputed from the cutoff, never persisted as a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_by: Option<String>,
    pub sales: Vec<Sale>,
    pub returns: Vec<ReturnDetail>,
    pub expenses: Vec<DailyExpense>,
    pub summary: ShiftSummary,
    pub reconciliation: Option<Reconciliation>,
}

/// The open-window slice of the store: everything after the cutoff.
#[derive(Debug, Clone, Default)]
pub struct ShiftWindow {
    pub sales: Vec<Sale>,
    pub expenses: Vec<DailyExpense>,
}
