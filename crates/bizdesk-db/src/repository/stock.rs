//! # Stock Repository
//!
//! Per-warehouse stock levels, receipts (with average costing), batches and
//! manual adjustments.
//!
//! ## Receipt Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    1. INSERT stock_batches (remaining = quantity)                      │
//! │    2. UPSERT stock (product, warehouse) += quantity                    │
//! │    3. SELECT remaining batches ──► weighted_average_cost()             │
//! │    4. UPDATE products.cost_price_cents (unless no units remain)        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarded Debits
//! Every decrement is `UPDATE ... WHERE quantity >= ?`. Zero affected rows
//! means the stock was not there and the caller gets `InsufficientStock` or
//! `NoStockRecord`; a row never goes negative.
//!
//! The helpers taking `&mut SqliteConnection` are shared with the transfer
//! repository and always run inside the caller's transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::PRODUCT_COLUMNS;
use bizdesk_core::{
    allocate_issue, check_availability, weighted_average_cost, BatchValue, CoreError, IssuePlan,
    Money, NewAdjustment, Product, Stock, StockAdjustment, StockBatch, StockReceipt, Warehouse,
};

const STOCK_COLUMNS: &str = "id, product_id, warehouse, quantity, last_updated";

const BATCH_COLUMNS: &str =
    "id, product_id, quantity, remaining_quantity, unit_cost_cents, received_date, created_at";

const ADJUSTMENT_COLUMNS: &str =
    "id, product_id, warehouse, quantity, reason, note, date, created_by";

// =============================================================================
// Result Types
// =============================================================================

/// What a stock receipt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptOutcome {
    pub batch: StockBatch,
    pub stock: Stock,
    /// Product cost price after the receipt.
    pub cost_price: Money,
}

/// What an adjustment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentOutcome {
    pub adjustment: StockAdjustment,
    pub stock: Stock,
    /// Batches consumed by a removal; `None` for additions.
    pub issue: Option<IssuePlan>,
}

/// A stock row below the low-stock threshold, with product details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LowStockItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub warehouse: Warehouse,
    pub quantity: i64,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Stock of one product at one warehouse, if a row exists.
    pub async fn get_level(&self, product_id: &str, warehouse: Warehouse) -> DbResult<Option<Stock>> {
        let mut conn = self.pool.acquire().await?;
        fetch_stock(&mut conn, product_id, warehouse).await
    }

    /// Every warehouse row for a product.
    pub async fn levels_for_product(&self, product_id: &str) -> DbResult<Vec<Stock>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stock WHERE product_id = ?1 ORDER BY warehouse");
        let rows = sqlx::query_as::<_, Stock>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Sum of a product's stock across all warehouses.
    pub async fn total_quantity(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM stock WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }

    /// Rows with `quantity < threshold`, lowest first.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<Vec<LowStockItem>> {
        let rows = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT s.product_id, p.sku, p.name, s.warehouse, s.quantity
            FROM stock s
            INNER JOIN products p ON p.id = s.product_id
            WHERE s.quantity < ?1
            ORDER BY s.quantity, p.sku, s.warehouse
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        debug!(threshold, count = rows.len(), "Low stock rows");
        Ok(rows)
    }

    /// Value of all stock at current cost prices.
    pub async fn valuation(&self) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(s.quantity * p.cost_price_cents), 0)
            FROM stock s
            INNER JOIN products p ON p.id = s.product_id
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Receives stock into a warehouse and recomputes the product's average
    /// cost, in one transaction.
    pub async fn receive(&self, receipt: &StockReceipt) -> DbResult<ReceiptOutcome> {
        receipt.validate()?;

        let mut tx = self.pool.begin().await?;

        let product = fetch_product(&mut tx, &receipt.product_id).await?;
        let now = Utc::now();

        let batch = StockBatch {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            quantity: receipt.quantity,
            remaining_quantity: receipt.quantity,
            unit_cost_cents: receipt.unit_cost_cents,
            received_date: receipt.received_date,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, product_id, quantity, remaining_quantity, unit_cost_cents,
                received_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(batch.quantity)
        .bind(batch.remaining_quantity)
        .bind(batch.unit_cost_cents)
        .bind(batch.received_date)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await?;

        credit_stock(&mut tx, &product.id, receipt.warehouse, receipt.quantity, now).await?;

        let cost_price = recompute_average_cost(&mut tx, &product, now).await?;

        let stock = fetch_stock(&mut tx, &product.id, receipt.warehouse)
            .await?
            .ok_or_else(|| DbError::Internal("stock row missing after receipt".to_string()))?;

        tx.commit().await?;

        info!(
            sku = %product.sku,
            warehouse = %receipt.warehouse.code(),
            quantity = receipt.quantity,
            unit_cost = %batch.unit_cost(),
            cost_price = %cost_price,
            "Stock received"
        );

        Ok(ReceiptOutcome {
            batch,
            stock,
            cost_price,
        })
    }

    /// Batches of a product, oldest first.
    pub async fn batches(&self, product_id: &str) -> DbResult<Vec<StockBatch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_batches(&mut conn, product_id).await
    }

    /// Records a manual adjustment, in one transaction.
    ///
    /// Additions credit the warehouse. Removals are guarded debits and also
    /// consume batches in the product's valuation order. The product's cost
    /// price is not touched.
    pub async fn adjust(&self, input: &NewAdjustment) -> DbResult<AdjustmentOutcome> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let product = fetch_product(&mut tx, &input.product_id).await?;
        let now = Utc::now();

        let issue = if input.is_removal() {
            let units = -input.quantity;
            debit_stock(&mut tx, &product, input.warehouse, units, now).await?;
            Some(deplete_batches(&mut tx, &product, units).await?)
        } else {
            credit_stock(&mut tx, &product.id, input.warehouse, input.quantity, now).await?;
            None
        };

        let adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            warehouse: input.warehouse,
            quantity: input.quantity,
            reason: input.reason,
            note: input.note.trim().to_string(),
            date: now.date_naive(),
            created_by: input.created_by.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                id, product_id, warehouse, quantity, reason, note, date, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.product_id)
        .bind(adjustment.warehouse)
        .bind(adjustment.quantity)
        .bind(adjustment.reason)
        .bind(&adjustment.note)
        .bind(adjustment.date)
        .bind(&adjustment.created_by)
        .execute(&mut *tx)
        .await?;

        let stock = fetch_stock(&mut tx, &product.id, input.warehouse)
            .await?
            .ok_or_else(|| DbError::Internal("stock row missing after adjustment".to_string()))?;

        tx.commit().await?;

        info!(
            sku = %product.sku,
            warehouse = %input.warehouse.code(),
            quantity = input.quantity,
            reason = ?input.reason,
            "Stock adjusted"
        );

        Ok(AdjustmentOutcome {
            adjustment,
            stock,
            issue,
        })
    }

    /// Adjustments, newest first, optionally for one product.
    pub async fn adjustments(&self, product_id: Option<&str>) -> DbResult<Vec<StockAdjustment>> {
        let sql = format!(
            "SELECT {ADJUSTMENT_COLUMNS} FROM stock_adjustments
             WHERE (?1 IS NULL OR product_id = ?1)
             ORDER BY date DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, StockAdjustment>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    sqlx::query_as::<_, Product>(&sql)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
}

pub(crate) async fn fetch_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse: Warehouse,
) -> DbResult<Option<Stock>> {
    let sql = format!("SELECT {STOCK_COLUMNS} FROM stock WHERE product_id = ?1 AND warehouse = ?2");
    let stock = sqlx::query_as::<_, Stock>(&sql)
        .bind(product_id)
        .bind(warehouse)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(stock)
}

/// Adds units at a warehouse, creating the row on first use.
pub(crate) async fn credit_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse: Warehouse,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock (id, product_id, warehouse, quantity, last_updated)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (product_id, warehouse) DO UPDATE SET
            quantity = quantity + excluded.quantity,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(warehouse)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(product_id = %product_id, warehouse = %warehouse.code(), quantity, "Stock credited");
    Ok(())
}

/// Removes units from a warehouse without ever going below zero.
pub(crate) async fn debit_stock(
    conn: &mut SqliteConnection,
    product: &Product,
    warehouse: Warehouse,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE stock
        SET quantity = quantity - ?3, last_updated = ?4
        WHERE product_id = ?1 AND warehouse = ?2 AND quantity >= ?3
        "#,
    )
    .bind(&product.id)
    .bind(warehouse)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = fetch_stock(conn, &product.id, warehouse)
            .await?
            .map(|s| s.quantity);
        warn!(
            sku = %product.sku,
            warehouse = %warehouse.code(),
            ?available,
            requested = quantity,
            "Stock debit refused"
        );
        check_availability(&product.sku, warehouse, available, quantity)?;
        // The row appeared between the two statements; report it as short.
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            warehouse,
            available: available.unwrap_or(0),
            requested: quantity,
        }
        .into());
    }

    debug!(sku = %product.sku, warehouse = %warehouse.code(), quantity, "Stock debited");
    Ok(())
}

async fn fetch_batches(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<StockBatch>> {
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches
         WHERE product_id = ?1
         ORDER BY received_date, created_at, rowid"
    );
    let rows = sqlx::query_as::<_, StockBatch>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

/// Stores the weighted-average cost of the product's remaining batches and
/// returns the resulting cost price.
async fn recompute_average_cost(
    conn: &mut SqliteConnection,
    product: &Product,
    now: DateTime<Utc>,
) -> DbResult<Money> {
    let values: Vec<BatchValue> = fetch_batches(conn, &product.id)
        .await?
        .iter()
        .map(BatchValue::from)
        .collect();

    let Some(cost) = weighted_average_cost(&values) else {
        debug!(sku = %product.sku, "No remaining units, cost price unchanged");
        return Ok(product.cost_price());
    };

    sqlx::query("UPDATE products SET cost_price_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&product.id)
        .bind(cost.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

    debug!(sku = %product.sku, old = %product.cost_price(), new = %cost, "Average cost updated");
    Ok(cost)
}

/// Draws `quantity` units from the product's batches.
async fn deplete_batches(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
) -> DbResult<IssuePlan> {
    let batches = fetch_batches(conn, &product.id).await?;
    let plan = allocate_issue(&batches, quantity, product.valuation_method);

    for draw in &plan.draws {
        sqlx::query(
            "UPDATE stock_batches SET remaining_quantity = remaining_quantity - ?2 WHERE id = ?1",
        )
        .bind(&draw.batch_id)
        .bind(draw.quantity)
        .execute(&mut *conn)
        .await?;
    }

    if plan.shortfall > 0 {
        warn!(
            sku = %product.sku,
            shortfall = plan.shortfall,
            "Batches do not cover the removed units"
        );
    }

    Ok(plan)
}

// =============================================================================
// Unit Tests
// =============================================================================
