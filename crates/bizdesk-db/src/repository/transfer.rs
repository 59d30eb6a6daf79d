//! # Transfer Repository
//!
//! Stock transfers between warehouses.
//!
//! ## Reconciliation
//! ```text
//! update(id, status = reconciled, actual = 18)       stored: received, qty 20
//!      │
//!      ▼
//! BEGIN
//!   plan_transfer_update()  ── reconciled already? ──► InvalidTransferTransition
//!   UPDATE stock_transfers ... WHERE status = <stored>
//!   UPDATE stock main  -= 20  (guarded)           ──► InsufficientStock, rollback
//!   UPSERT stock north += 18
//! COMMIT
//! ```
//!
//! Only the move into `reconciled` touches stock, and `reconciled` is
//! terminal, so a transfer moves stock at most once.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::{credit_stock, debit_stock, fetch_product, fetch_stock};
use bizdesk_core::{
    check_availability, plan_transfer_update, CoreError, NewTransfer, StockTransfer,
    TransferStatus, TransferUpdate,
};

const TRANSFER_COLUMNS: &str = r#"
    id, from_warehouse, to_warehouse, product_id, quantity, status, driver,
    mismatch_reason, actual_quantity_received, created_by, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Creates a pending transfer after checking the route and that the
    /// source currently holds enough stock.
    ///
    /// No stock moves until the transfer is reconciled.
    pub async fn create(&self, input: &NewTransfer) -> DbResult<StockTransfer> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let product = fetch_product(&mut tx, &input.product_id).await?;
        let available = fetch_stock(&mut tx, &product.id, input.from_warehouse)
            .await?
            .map(|s| s.quantity);
        check_availability(&product.sku, input.from_warehouse, available, input.quantity)?;

        let now = Utc::now();
        let transfer = StockTransfer {
            id: Uuid::new_v4().to_string(),
            from_warehouse: input.from_warehouse,
            to_warehouse: input.to_warehouse,
            product_id: product.id.clone(),
            quantity: input.quantity,
            status: TransferStatus::Pending,
            driver: clean(input.driver.as_deref()),
            mismatch_reason: None,
            actual_quantity_received: None,
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_transfers (
                id, from_warehouse, to_warehouse, product_id, quantity, status, driver,
                mismatch_reason, actual_quantity_received, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&transfer.id)
        .bind(transfer.from_warehouse)
        .bind(transfer.to_warehouse)
        .bind(&transfer.product_id)
        .bind(transfer.quantity)
        .bind(transfer.status)
        .bind(&transfer.driver)
        .bind(&transfer.mismatch_reason)
        .bind(transfer.actual_quantity_received)
        .bind(&transfer.created_by)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            sku = %product.sku,
            from = %transfer.from_warehouse.code(),
            to = %transfer.to_warehouse.code(),
            quantity = transfer.quantity,
            "Transfer created"
        );

        Ok(transfer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<StockTransfer>> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM stock_transfers WHERE id = ?1");
        let transfer = sqlx::query_as::<_, StockTransfer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transfer)
    }

    /// Transfers newest first, optionally only those in `status`.
    pub async fn list(&self, status: Option<TransferStatus>) -> DbResult<Vec<StockTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM stock_transfers
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, StockTransfer>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Pending, approved and in-transit transfers, oldest first.
    pub async fn list_open(&self) -> DbResult<Vec<StockTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM stock_transfers
             WHERE status IN ('pending', 'approved', 'in_transit')
             ORDER BY created_at, rowid"
        );
        let rows = sqlx::query_as::<_, StockTransfer>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Number of pending, approved and in-transit transfers.
    pub async fn count_open(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_transfers WHERE status IN ('pending', 'approved', 'in_transit')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Reconciled transfers whose received quantity differs from the request.
    pub async fn list_mismatched(&self) -> DbResult<Vec<StockTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM stock_transfers
             WHERE status = 'reconciled'
               AND actual_quantity_received IS NOT NULL
               AND actual_quantity_received <> quantity
             ORDER BY updated_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, StockTransfer>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Applies a status/quantity update and, when the transfer becomes
    /// reconciled, moves the stock. All in one transaction.
    ///
    /// ## Errors
    /// - `TransferNotFound`
    /// - `InvalidTransferTransition` - backwards move or already reconciled
    /// - `InsufficientStock` / `NoStockRecord` - source can no longer cover
    ///   the requested quantity
    pub async fn update(&self, id: &str, update: &TransferUpdate) -> DbResult<StockTransfer> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM stock_transfers WHERE id = ?1");
        let current = sqlx::query_as::<_, StockTransfer>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::TransferNotFound(id.to_string()))?;

        let moves = plan_transfer_update(&current, update)?;
        let now = Utc::now();

        let written = sqlx::query(
            r#"
            UPDATE stock_transfers SET
                status = ?3,
                actual_quantity_received = ?4,
                mismatch_reason = ?5,
                updated_at = ?6
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(current.status)
        .bind(update.status)
        .bind(update.actual_quantity_received)
        .bind(clean(update.mismatch_reason.as_deref()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if written.rows_affected() == 0 {
            return Err(DbError::QueryFailed(format!(
                "transfer {id} changed while it was being updated"
            )));
        }

        if let Some(moves) = &moves {
            let product = fetch_product(&mut tx, &moves.product_id).await?;
            debit_stock(&mut tx, &product, moves.from_warehouse, moves.debit, now).await?;
            credit_stock(&mut tx, &product.id, moves.to_warehouse, moves.credit, now).await?;

            info!(
                transfer_id = %id,
                sku = %product.sku,
                debit = moves.debit,
                credit = moves.credit,
                "Transfer reconciled"
            );
        } else {
            debug!(transfer_id = %id, status = %update.status, "Transfer updated");
        }

        let updated = sqlx::query_as::<_, StockTransfer>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }
}

/// Trims optional text, mapping blank to `None`.
fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
