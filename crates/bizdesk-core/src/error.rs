//! # Error Types
//!
//! Domain-specific error types for bizdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bizdesk-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bizdesk-db errors (separate crate)                                    │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller (form message)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant renders to a sentence that can be shown next to the form
//! that caused it.

use thiserror::Error;

use crate::inventory::TransferStatus;
use crate::types::Warehouse;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough units at a warehouse to move or remove.
    ///
    /// ## User Workflow
    /// ```text
    /// Create transfer (main → north, qty: 50)
    ///      │
    ///      ▼
    /// Check stock at main: available=30
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "DESK-01", warehouse: Main, available: 30, requested: 50 }
    ///      │
    ///      ▼
    /// Form shows: "Insufficient stock of DESK-01 in Main Warehouse. Available: 30"
    /// ```
    #[error("Insufficient stock of {sku} in {warehouse}. Available: {available}, requested: {requested}")]
    InsufficientStock {
        sku: String,
        warehouse: Warehouse,
        available: i64,
        requested: i64,
    },

    /// The product has never been stocked at the warehouse.
    #[error("No stock record found for {sku} in {warehouse}")]
    NoStockRecord { sku: String, warehouse: Warehouse },

    /// Transfer source and destination are the same warehouse.
    #[error("Source and destination warehouses cannot be the same ({0})")]
    SameWarehouse(Warehouse),

    /// Transfer cannot be found.
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    /// Requested status change is not allowed by the transfer workflow.
    ///
    /// ## When This Occurs
    /// - Moving a transfer backwards (in_transit → approved)
    /// - Touching the status of a reconciled transfer
    #[error("Transfer {transfer_id} cannot move from {from} to {to}")]
    InvalidTransferTransition {
        transfer_id: String,
        from: TransferStatus,
        to: TransferStatus,
    },

    /// Invoice cannot be found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Invoice has no lines.
    #[error("An invoice needs at least one line item")]
    EmptyInvoice,

    /// Flat discount is larger than the sum of the lines.
    #[error("Discount {discount_cents} exceeds invoice subtotal {subtotal_cents}")]
    DiscountExceedsSubtotal {
        discount_cents: i64,
        subtotal_cents: i64,
    },

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Staff profile cannot be found.
    #[error("Staff member not found: {0}")]
    StaffNotFound(String),

    /// The viewer's role only allows reading their own KPIs and bonuses.
    #[error("{viewer} may not view the records of staff member {staff_id}")]
    AccessDenied { viewer: String, staff_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            sku: "DESK-01".to_string(),
            warehouse: Warehouse::Main,
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock of DESK-01 in Main Warehouse. Available: 3, requested: 5"
        );
    }

    #[test]
    fn test_same_warehouse_message() {
        let err = CoreError::SameWarehouse(Warehouse::North);
        assert_eq!(
            err.to_string(),
            "Source and destination warehouses cannot be the same (North Branch)"
        );
    }

    #[test]
    fn test_transition_message() {
        let err = CoreError::InvalidTransferTransition {
            transfer_id: "t-1".to_string(),
            from: TransferStatus::Reconciled,
            to: TransferStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Transfer t-1 cannot move from reconciled to pending"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::Duplicate {
            field: "email".to_string(),
            value: "a@b.co".to_string(),
        };
        assert_eq!(err.to_string(), "email 'a@b.co' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
