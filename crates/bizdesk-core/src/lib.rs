//! # bizdesk-core: Pure Business Rules for bizdesk
//!
//! This crate holds every stock-consistency and money rule of the back office
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bizdesk Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ bizdesk-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ inventory │  │   sales   │  │   staff   │  │ validation│  │   │
//! │  │   │ Transfer  │  │  Invoice  │  │    Kpi    │  │   rules   │  │   │
//! │  │   │ AVCO cost │  │  Payment  │  │   Bonus   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bizdesk-db (Database Layer)                  │   │
//! │  │      SQLite queries, migrations, one transaction per mutation   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Shared primitives (Warehouse, Percent, month helpers)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`inventory`] - Products, stock, batches, transfers, adjustments
//! - [`sales`] - Customers, invoices, sale items, payments
//! - [`staff`] - Staff profiles, KPIs, bonuses
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bizdesk_core::inventory::{weighted_average_cost, BatchValue};
//! use bizdesk_core::money::Money;
//!
//! let batches = [
//!     BatchValue { remaining_quantity: 10, unit_cost: Money::from_cents(500) },
//!     BatchValue { remaining_quantity: 30, unit_cost: Money::from_cents(700) },
//! ];
//!
//! // (10 × $5.00 + 30 × $7.00) / 40 = $6.50
//! let cost = weighted_average_cost(&batches).unwrap();
//! assert_eq!(cost.cents(), 650);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inventory;
pub mod money;
pub mod sales;
pub mod staff;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::*;
pub use money::Money;
pub use sales::*;
pub use staff::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Stock rows below this quantity are reported as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Number of bonuses shown in the monthly KPI summary.
pub const RECENT_BONUS_LIMIT: usize = 10;

/// Largest quantity accepted on one invoice line, receipt, transfer or
/// adjustment.
///
/// ## Business Reason
/// Catches typos (1000000 instead of 100) and keeps
/// `quantity × price` well inside `i64`.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Largest single money amount in cents ($99,999,999.99): ten digits with
/// two decimals, the widest amount column the back office stores.
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;
