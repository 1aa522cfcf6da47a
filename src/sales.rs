//! Sale persistence and return processing.
//!
//! Returns do not create documents of their own: they mutate the owning
//! sale in place — bumping the item's `returnedQty` and decrementing the
//! sale's `totalAmount` and `profit` by the discount-adjusted returned
//! value. The shift calculator later reconstructs return details from
//! those deltas. This is the store's historical shape; window selection
//! over it is a known precision limitation (see `summary`).

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use crate::db::{self, DbState};
use crate::error::{LedgerError, Result};
use crate::models::{PaymentMethod, Sale};

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Persist a settled sale.
pub fn save_sale(db: &DbState, sale: &Sale) -> Result<()> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    conn.execute(
        "INSERT INTO sales (
            id, created_at, updated_at, cashier, payment_method,
            subtotal, discount_amount, total_amount, profit, items
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            sale.id,
            sale.created_at.to_rfc3339(),
            sale.updated_at.map(|t| t.to_rfc3339()),
            sale.cashier,
            String::from(sale.payment_method.clone()),
            sale.subtotal,
            sale.discount_amount,
            sale.total_amount,
            sale.profit,
            serde_json::to_string(&sale.items)?,
        ],
    )
    .map_err(|e| LedgerError::Transaction(format!("insert sale: {e}")))?;

    info!(sale_id = %sale.id, total = %sale.total_amount, "Sale saved");
    Ok(())
}

/// All sales in creation order.
pub fn list_sales(db: &DbState) -> Result<Vec<Sale>> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;
    list_sales_conn(&conn)
}

pub(crate) fn list_sales_conn(conn: &Connection) -> Result<Vec<Sale>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, created_at, updated_at, cashier, payment_method,
                    subtotal, discount_amount, total_amount, profit, items
             FROM sales ORDER BY created_at ASC",
        )
        .map_err(|e| LedgerError::Transaction(format!("prepare sales: {e}")))?;

    let raw: Vec<SaleRow> = stmt
        .query_map([], |row| {
            Ok(SaleRow {
                id: row.get(0)?,
                created_at: row.get(1)?,
                updated_at: row.get(2)?,
                cashier: row.get(3)?,
                payment_method: row.get(4)?,
                subtotal: row.get(5)?,
                discount_amount: row.get(6)?,
                total_amount: row.get(7)?,
                profit: row.get(8)?,
                items: row.get(9)?,
            })
        })
        .map_err(|e| LedgerError::Transaction(format!("query sales: {e}")))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| LedgerError::Transaction(format!("read sale row: {e}")))?;

    raw.into_iter().map(SaleRow::into_sale).collect()
}

struct SaleRow {
    id: String,
    created_at: String,
    updated_at: Option<String>,
    cashier: String,
    payment_method: String,
    subtotal: f64,
    discount_amount: f64,
    total_amount: f64,
    profit: f64,
    items: String,
}

impl SaleRow {
    fn into_sale(self) -> Result<Sale> {
        Ok(Sale {
            id: self.id,
            created_at: db::parse_ts(&self.created_at)?,
            updated_at: db::parse_ts_opt(self.updated_at)?,
            cashier: self.cashier,
            payment_method: PaymentMethod::from(self.payment_method),
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            profit: self.profit,
            items: serde_json::from_str(&self.items)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

/// Process a return of `quantity` units of one sale item.
///
/// Mutates the owning sale in place: `returnedQty` grows, `totalAmount`
/// drops by the discount-adjusted returned value, `profit` by the returned
/// margin, and `updatedAt` gets stamped. Cannot return more than the item's
/// unreturned remainder.
pub fn process_return(
    db: &DbState,
    sale_id: &str,
    item_id: &str,
    quantity: u32,
) -> Result<Sale> {
    if quantity == 0 {
        return Err(LedgerError::Validation(
            "Return quantity must be positive".to_string(),
        ));
    }

    let conn = db
        .conn
        .lock()
        .map_err(|e| LedgerError::Transaction(e.to_string()))?;

    let mut sale = load_sale(&conn, sale_id)?;

    let discount_ratio = sale.discount_ratio();
    let item = sale
        .items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(|| {
            LedgerError::NotFound(format!("No item {item_id} on sale {sale_id}"))
        })?;

    let unreturned = item.unreturned_qty();
    if quantity > unreturned {
        return Err(LedgerError::Validation(format!(
            "Cannot return {quantity} of {}. Only {unreturned} are unreturned.",
            item.product_name
        )));
    }

    item.returned_qty += quantity;

    let item_subtotal = item.unit_price * f64::from(quantity);
    let returned_value = item_subtotal - item_subtotal * discount_ratio;
    let returned_profit =
        (item.unit_price - item.purchase_price) * f64::from(quantity)
            - item_subtotal * discount_ratio;

    sale.total_amount -= returned_value;
    sale.profit -= returned_profit;
    sale.updated_at = Some(Utc::now());

    conn.execute(
        "UPDATE sales SET
            items = ?1, total_amount = ?2, profit = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            serde_json::to_string(&sale.items)?,
            sale.total_amount,
            sale.profit,
            sale.updated_at.map(|t| t.to_rfc3339()),
            sale.id,
        ],
    )
    .map_err(|e| LedgerError::Transaction(format!("update sale for return: {e}")))?;

    info!(
        sale_id = %sale_id,
        item_id = %item_id,
        quantity = quantity,
        returned_value = %returned_value,
        "Return processed"
    );

    Ok(sale)
}

fn load_sale(conn: &Connection, sale_id: &str) -> Result<Sale> {
    let row = conn
        .query_row(
            "SELECT id, created_at, updated_at, cashier, payment_method,
                    subtotal, discount_amount, total_amount, profit, items
             FROM sales WHERE id = ?1",
            params![sale_id],
            |row| {
                Ok(SaleRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                    cashier: row.get(3)?,
                    payment_method: row.get(4)?,
                    subtotal: row.get(5)?,
                    discount_amount: row.get(6)?,
                    total_amount: row.get(7)?,
                    profit: row.get(8)?,
                    items: row.get(9)?,
                })
            },
        )
        .map_err(|_| LedgerError::NotFound(format!("No sale found with id {sale_id}")))?;

    row.into_sale()
}

// ===========================================================================
// Tests
// ===========================================================================
