//! # Inventory Rules
//!
//! Products, per-warehouse stock, receipt batches, transfers and adjustments,
//! plus the three rules that keep them consistent:
//!
//! 1. [`weighted_average_cost`] - product cost after a receipt
//! 2. [`plan_transfer_update`] - transfer workflow and reconciliation moves
//! 3. [`allocate_issue`] - which batches a removal consumes
//!
//! ## Stock Movement Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Receipt (stock in)                                                     │
//! │    └── StockBatch appended ──► Stock[wh] += qty ──► cost = AVCO(batches)│
//! │                                                                         │
//! │  Transfer                                                               │
//! │    pending → approved → in_transit → received → reconciled              │
//! │                                                    │                    │
//! │                         Stock[from] -= requested ◄─┤                    │
//! │                         Stock[to]   += actual|req ◄┘  (exactly once)    │
//! │                                                                         │
//! │  Adjustment (damage, theft, correction, return)                         │
//! │    └── Stock[wh] += qty (qty < 0 consumes batches FIFO/LIFO)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{div_round_half_even, Money};
use crate::types::Warehouse;
use crate::validation::{
    validate_dimension, validate_price_cents, validate_product_name, validate_quantity,
    validate_sku,
};
use crate::{LOW_STOCK_THRESHOLD, MAX_LINE_QUANTITY};

// =============================================================================
// Product Category / Valuation Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Electronics,
    Furniture,
    Clothing,
    Food,
    Office,
    #[default]
    Other,
}

/// Inventory valuation method declared on a product.
///
/// Average cost on receipt ignores this field; it only chooses the order in
/// which [`allocate_issue`] drains batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ValuationMethod {
    /// First-In, First-Out.
    #[default]
    Fifo,
    /// Last-In, First-Out.
    Lifo,
    /// Average cost.
    Avco,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    pub category: ProductCategory,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Average cost price in cents, recomputed on every stock receipt.
    pub cost_price_cents: i64,

    pub valuation_method: ValuationMethod,

    /// Length in hundredths of a centimetre (12345 = 123.45 cm).
    pub length_cm_hundredths: i64,

    /// Width in hundredths of a centimetre.
    pub width_cm_hundredths: i64,

    /// Height in hundredths of a centimetre.
    pub height_cm_hundredths: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the average cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Volume in cubic metres (display only).
    ///
    /// ## Example
    /// 100 cm × 50 cm × 20 cm = 1.0 × 0.5 × 0.2 = 0.1 m³
    pub fn volume_cubic_meters(&self) -> f64 {
        // hundredths of a cm → m is a factor of 10_000 per axis
        let to_m = |v: i64| v as f64 / 10_000.0;
        to_m(self.length_cm_hundredths)
            * to_m(self.width_cm_hundredths)
            * to_m(self.height_cm_hundredths)
    }
}

/// Input for creating or editing a product.
///
/// Editing never touches the stored cost price: after creation it is owned
/// by stock receipts (see `cost_price_cents`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub category: ProductCategory,
    pub price_cents: i64,
    /// Opening cost price. Only used when the product is created; an edit
    /// ignores it and keeps the average computed from receipts.
    #[serde(default)]
    pub cost_price_cents: i64,
    #[serde(default)]
    pub valuation_method: ValuationMethod,
    pub length_cm_hundredths: i64,
    pub width_cm_hundredths: i64,
    pub height_cm_hundredths: i64,
}

impl ProductInput {
    /// Checks every field; returns the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_product_name(&self.name)?;
        validate_sku(&self.sku)?;
        validate_price_cents("price", self.price_cents)?;
        validate_price_cents("cost_price", self.cost_price_cents)?;
        validate_dimension("length", self.length_cm_hundredths)?;
        validate_dimension("width", self.width_cm_hundredths)?;
        validate_dimension("height", self.height_cm_hundredths)?;
        Ok(())
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Quantity of one product held at one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Stock {
    pub id: String,
    pub product_id: String,
    pub warehouse: Warehouse,
    pub quantity: i64,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl Stock {
    /// True when the quantity is below [`LOW_STOCK_THRESHOLD`].
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.is_below(LOW_STOCK_THRESHOLD)
    }

    /// True when the quantity is below `threshold`.
    #[inline]
    pub fn is_below(&self, threshold: i64) -> bool {
        self.quantity < threshold
    }
}

/// Checks that `available` units cover `requested`.
///
/// `available` is `None` when the product has no stock row at the warehouse.
pub fn check_availability(
    sku: &str,
    warehouse: Warehouse,
    available: Option<i64>,
    requested: i64,
) -> CoreResult<()> {
    match available {
        None => Err(CoreError::NoStockRecord {
            sku: sku.to_string(),
            warehouse,
        }),
        Some(available) if available < requested => Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            warehouse,
            available,
            requested,
        }),
        Some(_) => Ok(()),
    }
}

// =============================================================================
// Stock Batches & Average Cost
// =============================================================================

/// A received lot. Append-only except for `remaining_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockBatch {
    pub id: String,
    pub product_id: String,
    /// Quantity originally received.
    pub quantity: i64,
    /// Units of this lot still on hand.
    pub remaining_quantity: i64,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub received_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockBatch {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Value of the units still on hand.
    #[inline]
    pub fn remaining_value(&self) -> Money {
        self.unit_cost().multiply_quantity(self.remaining_quantity)
    }
}

/// Input for a stock receipt ("stock in").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReceipt {
    pub product_id: String,
    pub warehouse: Warehouse,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub received_date: NaiveDate,
}

impl StockReceipt {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_quantity(self.quantity)?;
        validate_price_cents("unit_cost", self.unit_cost_cents)?;
        Ok(())
    }
}

/// The slice of a batch that average costing looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchValue {
    pub remaining_quantity: i64,
    pub unit_cost: Money,
}

impl From<&StockBatch> for BatchValue {
    fn from(batch: &StockBatch) -> Self {
        BatchValue {
            remaining_quantity: batch.remaining_quantity,
            unit_cost: batch.unit_cost(),
        }
    }
}

/// Global weighted-average cost over every batch with units remaining.
///
/// ```text
/// cost = Σ(remaining_qty × unit_cost) / Σ(remaining_qty)     (remaining_qty > 0)
/// ```
///
/// Rounded half to even to whole cents. Returns `None` when no batch has
/// remaining units; the caller then keeps the previous cost.
///
/// The product's [`ValuationMethod`] plays no part here, and the average is
/// not scoped to a warehouse.
pub fn weighted_average_cost(batches: &[BatchValue]) -> Option<Money> {
    let (value, units) = batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .fold((0_i128, 0_i128), |(value, units), b| {
            (
                value + b.remaining_quantity as i128 * b.unit_cost.cents() as i128,
                units + b.remaining_quantity as i128,
            )
        });

    if units == 0 {
        return None;
    }

    div_round_half_even(value, units).map(|cents| Money::from_cents(cents as i64))
}

// =============================================================================
// Batch Depletion
// =============================================================================

/// Units taken from one batch by an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchDraw {
    pub batch_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

/// Result of [`allocate_issue`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IssuePlan {
    pub draws: Vec<BatchDraw>,
    /// Units that no batch could cover.
    pub shortfall: i64,
}

impl IssuePlan {
    /// Total units drawn from batches.
    pub fn drawn(&self) -> i64 {
        self.draws.iter().map(|d| d.quantity).sum()
    }

    /// Cost of the drawn units at their batch costs.
    pub fn issued_cost(&self) -> Money {
        self.draws
            .iter()
            .map(|d| Money::from_cents(d.unit_cost_cents).multiply_quantity(d.quantity))
            .sum()
    }
}

/// Decides which batches an outgoing `quantity` consumes.
///
/// FIFO and AVCO drain the oldest lots first (by received date, then
/// creation time); LIFO drains the newest first. Batches without remaining
/// units are skipped. If the batches cannot cover the quantity the remainder
/// is reported as `shortfall`; stock rows and batches are tracked separately
/// so this is not an error.
pub fn allocate_issue(batches: &[StockBatch], quantity: i64, method: ValuationMethod) -> IssuePlan {
    let mut ordered: Vec<&StockBatch> = batches.iter().filter(|b| b.remaining_quantity > 0).collect();
    ordered.sort_by_key(|b| (b.received_date, b.created_at));
    if method == ValuationMethod::Lifo {
        ordered.reverse();
    }

    let mut plan = IssuePlan::default();
    let mut left = quantity.max(0);

    for batch in ordered {
        if left == 0 {
            break;
        }
        let take = left.min(batch.remaining_quantity);
        plan.draws.push(BatchDraw {
            batch_id: batch.id.clone(),
            quantity: take,
            unit_cost_cents: batch.unit_cost_cents,
        });
        left -= take;
    }

    plan.shortfall = left;
    plan
}

// =============================================================================
// Transfers
// =============================================================================

/// Stock transfer workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    Approved,
    InTransit,
    Received,
    Reconciled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 5] = [
        TransferStatus::Pending,
        TransferStatus::Approved,
        TransferStatus::InTransit,
        TransferStatus::Received,
        TransferStatus::Reconciled,
    ];

    /// Stored code (`pending`, `in_transit`, ...).
    pub const fn code(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::Reconciled => "reconciled",
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            TransferStatus::Pending => 0,
            TransferStatus::Approved => 1,
            TransferStatus::InTransit => 2,
            TransferStatus::Received => 3,
            TransferStatus::Reconciled => 4,
        }
    }

    /// Transfers still on their way (shown as "open" work).
    pub const fn is_open(&self) -> bool {
        matches!(
            self,
            TransferStatus::Pending | TransferStatus::Approved | TransferStatus::InTransit
        )
    }

    /// Forward moves only (steps may be skipped), and nothing leaves
    /// `reconciled`. Staying in a non-terminal state is allowed so the
    /// received quantity and mismatch note can be edited.
    pub const fn can_transition_to(&self, next: TransferStatus) -> bool {
        match self {
            TransferStatus::Reconciled => false,
            _ => next.rank() >= self.rank(),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Movement of a product between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransfer {
    pub id: String,
    pub from_warehouse: Warehouse,
    pub to_warehouse: Warehouse,
    pub product_id: String,
    /// Requested quantity.
    pub quantity: i64,
    pub status: TransferStatus,
    pub driver: Option<String>,
    /// Reason for any quantity mismatch.
    pub mismatch_reason: Option<String>,
    pub actual_quantity_received: Option<i64>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockTransfer {
    /// True when a received quantity was recorded and differs from the request.
    pub fn has_mismatch(&self) -> bool {
        self.actual_quantity_received
            .is_some_and(|actual| actual != self.quantity)
    }

    /// Units credited to the destination: actual received, else requested.
    pub fn quantity_to_credit(&self) -> i64 {
        self.actual_quantity_received.unwrap_or(self.quantity)
    }

    /// Units gained (+) or lost (-) in transit.
    pub fn variance(&self) -> i64 {
        self.quantity_to_credit() - self.quantity
    }
}

/// Input for creating a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTransfer {
    pub from_warehouse: Warehouse,
    pub to_warehouse: Warehouse,
    pub product_id: String,
    pub quantity: i64,
    pub driver: Option<String>,
    pub created_by: Option<String>,
}

impl NewTransfer {
    /// Route and quantity checks. Availability is checked against the
    /// database by the caller with [`check_availability`].
    pub fn validate(&self) -> CoreResult<()> {
        if self.from_warehouse == self.to_warehouse {
            return Err(CoreError::SameWarehouse(self.from_warehouse));
        }
        validate_quantity(self.quantity)?;
        Ok(())
    }
}

/// Fields an operator may change on an existing transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferUpdate {
    pub status: TransferStatus,
    pub actual_quantity_received: Option<i64>,
    pub mismatch_reason: Option<String>,
}

/// Stock moves produced by reconciling a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub product_id: String,
    pub from_warehouse: Warehouse,
    /// Units removed from the source (always the requested quantity).
    pub debit: i64,
    pub to_warehouse: Warehouse,
    /// Units added to the destination (actual received, else requested).
    pub credit: i64,
}

/// Checks an update against the workflow and returns the stock moves to
/// apply, if any.
///
/// Moves are returned exactly when the stored status is not `reconciled`
/// and the new one is. Because `reconciled` is terminal this can happen at
/// most once per transfer.
pub fn plan_transfer_update(
    current: &StockTransfer,
    update: &TransferUpdate,
) -> CoreResult<Option<Reconciliation>> {
    if !current.status.can_transition_to(update.status) {
        return Err(CoreError::InvalidTransferTransition {
            transfer_id: current.id.clone(),
            from: current.status,
            to: update.status,
        });
    }

    if let Some(actual) = update.actual_quantity_received {
        if actual < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "actual_quantity_received".to_string(),
            }
            .into());
        }
    }

    if update.status != TransferStatus::Reconciled {
        return Ok(None);
    }

    Ok(Some(Reconciliation {
        product_id: current.product_id.clone(),
        from_warehouse: current.from_warehouse,
        debit: current.quantity,
        to_warehouse: current.to_warehouse,
        credit: update.actual_quantity_received.unwrap_or(current.quantity),
    }))
}

// =============================================================================
// Adjustments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentReason {
    /// Damaged stock.
    Damage,
    /// Theft / loss.
    Theft,
    /// Inventory count correction.
    Correction,
    /// Customer return.
    Return,
}

/// A manual change to stock at one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub product_id: String,
    pub warehouse: Warehouse,
    /// Negative for removal, positive for addition.
    pub quantity: i64,
    pub reason: AdjustmentReason,
    pub note: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub created_by: Option<String>,
}

/// Input for recording an adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAdjustment {
    pub product_id: String,
    pub warehouse: Warehouse,
    pub quantity: i64,
    pub reason: AdjustmentReason,
    #[serde(default)]
    pub note: String,
    pub created_by: Option<String>,
}

impl NewAdjustment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "an adjustment must add or remove at least one unit".to_string(),
            });
        }
        if self.quantity.unsigned_abs() > MAX_LINE_QUANTITY.unsigned_abs() {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: -MAX_LINE_QUANTITY,
                max: MAX_LINE_QUANTITY,
            });
        }
        Ok(())
    }

    /// True for removals (damage, theft, downward corrections).
    #[inline]
    pub fn is_removal(&self) -> bool {
        self.quantity < 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
