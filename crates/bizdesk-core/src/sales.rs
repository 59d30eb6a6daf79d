//! # Sales Rules
//!
//! Customers, invoices and payments.
//!
//! ## Invoice Money Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleItem[0]  qty × price ─┐                                            │
//! │  SaleItem[1]  qty × price ─┼─► subtotal ─► − discount ─► total          │
//! │  SaleItem[n]  qty × price ─┘                               │            │
//! │                                                            │            │
//! │  Payment[0..n] ─► Σ amount ─► amount_paid ────────────────┤            │
//! │                                                            ▼            │
//! │                                         payment_status(paid, total)     │
//! │                                         paid ▸ partial ▸ unpaid         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals and status are derived values. They are recomputed on every save
//! and every payment and never accepted from the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{
    validate_email, validate_invoice_number, validate_payment_amount, validate_price_cents,
    validate_quantity, validate_required,
};

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Unique.
    pub email: String,
    pub phone: String,
    pub address: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl NewCustomer {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_required("name", &self.name, 200)?;
        validate_email(&self.email)?;
        Ok(())
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Payment state of an invoice, derived by [`payment_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// Derives the payment status from what has been paid against the total.
///
/// Evaluated in order:
/// 1. `paid` when `amount_paid >= total`
/// 2. `partial` when `amount_paid > 0`
/// 3. `unpaid` otherwise
///
/// A zero total with nothing paid is therefore `paid`.
///
/// ## Example
/// ```rust
/// use bizdesk_core::money::Money;
/// use bizdesk_core::sales::{payment_status, InvoiceStatus};
///
/// let total = Money::from_cents(10_000);
/// assert_eq!(payment_status(Money::zero(), total), InvoiceStatus::Unpaid);
/// assert_eq!(payment_status(Money::from_cents(4_000), total), InvoiceStatus::Partial);
/// assert_eq!(payment_status(Money::from_cents(12_000), total), InvoiceStatus::Paid);
/// ```
pub fn payment_status(amount_paid: Money, total: Money) -> InvoiceStatus {
    if amount_paid >= total {
        InvoiceStatus::Paid
    } else if amount_paid.is_positive() {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Unpaid
    }
}

// =============================================================================
// Line Items
// =============================================================================

/// Anything with a quantity and a unit price.
pub trait Priced {
    fn quantity(&self) -> i64;
    fn unit_price(&self) -> Money;

    /// `quantity × unit price`.
    fn subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity())
    }
}

/// A stored invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price charged on this invoice, in cents.
    pub price_cents: i64,
}

impl Priced for SaleItem {
    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A line as submitted with an invoice form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i64,
    pub price_cents: i64,
}

impl Priced for LineItem {
    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Sum of line subtotals.
pub fn lines_subtotal<T: Priced>(lines: &[T]) -> Money {
    lines.iter().map(Priced::subtotal).sum()
}

/// Sum of line subtotals, `None` if any product or the running sum leaves
/// the `i64` range.
pub fn checked_lines_subtotal<T: Priced>(lines: &[T]) -> Option<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        line.unit_price()
            .checked_multiply_quantity(line.quantity())
            .and_then(|subtotal| acc.checked_add(subtotal))
    })
}

/// `Σ(quantity × price) − discount`.
///
/// ## Example
/// ```rust
/// use bizdesk_core::money::Money;
/// use bizdesk_core::sales::{invoice_total, LineItem};
///
/// let lines = vec![
///     LineItem { product_id: "a".into(), quantity: 2, price_cents: 1_500 },
///     LineItem { product_id: "b".into(), quantity: 1, price_cents: 4_000 },
/// ];
/// assert_eq!(invoice_total(&lines, Money::from_cents(500)).cents(), 6_500);
/// ```
pub fn invoice_total<T: Priced>(lines: &[T], discount: Money) -> Money {
    lines_subtotal(lines) - discount
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    /// Unique business number shown on the document.
    pub invoice_number: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Flat discount in cents.
    pub discount_cents: i64,
    /// Derived: Σ line subtotals − discount.
    pub total_cents: i64,
    /// Derived: Σ payments.
    pub amount_paid_cents: i64,
    /// Derived from `amount_paid_cents` and `total_cents`.
    pub status: InvoiceStatus,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    /// `total − amount_paid`; negative when overpaid.
    #[inline]
    pub fn balance_due(&self) -> Money {
        self.total() - self.amount_paid()
    }
}

/// Header and lines for creating or replacing an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceInput {
    pub customer_id: String,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[serde(default)]
    pub discount_cents: i64,
    pub created_by: Option<String>,
    pub items: Vec<LineItem>,
}

impl InvoiceInput {
    /// Validates the header and lines and returns the invoice total.
    ///
    /// ## Errors
    /// - [`CoreError::EmptyInvoice`] without lines
    /// - [`CoreError::DiscountExceedsSubtotal`] when the discount is larger
    ///   than the lines
    /// - [`CoreError::Validation`] for field failures
    pub fn validate(&self) -> CoreResult<Money> {
        validate_invoice_number(&self.invoice_number)?;

        if self.items.is_empty() {
            return Err(CoreError::EmptyInvoice);
        }

        for item in &self.items {
            validate_quantity(item.quantity)?;
            validate_price_cents("price", item.price_cents)?;
        }

        validate_price_cents("discount", self.discount_cents)?;

        let subtotal =
            checked_lines_subtotal(&self.items).ok_or_else(|| ValidationError::OutOfRange {
                field: "subtotal".to_string(),
                min: 0,
                max: i64::MAX,
            })?;
        if self.discount_cents > subtotal.cents() {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount_cents: self.discount_cents,
                subtotal_cents: subtotal.cents(),
            });
        }

        Ok(subtotal - Money::from_cents(self.discount_cents))
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    /// Bank transfer.
    Transfer,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub method: PaymentMethod,
    /// Cheque number, card slip, bank reference.
    pub reference: String,
    pub note: String,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub invoice_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub note: String,
    pub created_by: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_payment_amount(self.amount_cents)
    }
}

/// An invoice with its lines and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64) -> LineItem {
        LineItem {
            product_id: "p".to_string(),
            quantity: qty,
            price_cents: price,
        }
    }

    fn input(items: Vec<LineItem>, discount: i64) -> InvoiceInput {
        InvoiceInput {
            customer_id: "c".to_string(),
            invoice_number: "INV-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            discount_cents: discount,
            created_by: None,
            items,
        }
    }

    #[test]
    fn test_payment_status_thresholds() {
        let total = Money::from_cents(1_000);
        assert_eq!(payment_status(Money::zero(), total), InvoiceStatus::Unpaid);
        assert_eq!(payment_status(Money::from_cents(1), total), InvoiceStatus::Partial);
        assert_eq!(payment_status(Money::from_cents(999), total), InvoiceStatus::Partial);
        assert_eq!(payment_status(Money::from_cents(1_000), total), InvoiceStatus::Paid);
        assert_eq!(payment_status(Money::from_cents(1_500), total), InvoiceStatus::Paid);
    }

    #[test]
    fn test_zero_total_counts_as_paid() {
        assert_eq!(payment_status(Money::zero(), Money::zero()), InvoiceStatus::Paid);
    }

    #[test]
    fn test_invoice_total() {
        let lines = vec![line(3, 250), line(1, 1_000)];
        assert_eq!(lines_subtotal(&lines).cents(), 1_750);
        assert_eq!(invoice_total(&lines, Money::from_cents(750)).cents(), 1_000);
        assert_eq!(invoice_total::<LineItem>(&[], Money::zero()), Money::zero());
    }

    #[test]
    fn test_invoice_input_returns_total() {
        let total = input(vec![line(2, 1_000), line(1, 500)], 500).validate().unwrap();
        assert_eq!(total.cents(), 2_000);
    }

    #[test]
    fn test_invoice_input_rejects_empty() {
        assert_eq!(input(vec![], 0).validate(), Err(CoreError::EmptyInvoice));
    }

    #[test]
    fn test_invoice_input_rejects_large_discount() {
        let err = input(vec![line(1, 1_000)], 1_001).validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::DiscountExceedsSubtotal {
                discount_cents: 1_001,
                subtotal_cents: 1_000
            }
        );
        // discount equal to the lines is fine
        assert_eq!(input(vec![line(1, 1_000)], 1_000).validate(), Ok(Money::zero()));
    }

    #[test]
    fn test_invoice_input_rejects_bad_lines() {
        assert!(input(vec![line(0, 100)], 0).validate().is_err());
        assert!(input(vec![line(1, -1)], 0).validate().is_err());
        assert!(input(vec![line(1, 100)], -1).validate().is_err());
    }

    #[test]
    fn test_invoice_input_rejects_huge_line() {
        let err = input(vec![line(i64::MAX / 2, 3)], 0).validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: crate::MAX_LINE_QUANTITY,
            })
        );

        let err = input(vec![line(2, i64::MAX / 2)], 0).validate().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));
    }

    #[test]
    fn test_invoice_input_rejects_overflowing_subtotal() {
        // Each line is within bounds; their sum is not.
        let lines = vec![line(crate::MAX_LINE_QUANTITY, crate::MAX_PRICE_CENTS); 1_000];
        let err = input(lines, 0).validate().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "subtotal"
        ));
    }

    #[test]
    fn test_checked_lines_subtotal() {
        assert_eq!(
            checked_lines_subtotal(&[line(3, 250), line(1, 1_000)]),
            Some(Money::from_cents(1_750))
        );
        assert_eq!(checked_lines_subtotal(&[line(i64::MAX / 2, 3)]), None);
        assert_eq!(checked_lines_subtotal::<LineItem>(&[]), Some(Money::zero()));
    }

    #[test]
    fn test_balance_due() {
        let now = Utc::now();
        let mut invoice = Invoice {
            id: "i".to_string(),
            customer_id: "c".to_string(),
            invoice_number: "INV-1".to_string(),
            date: now.date_naive(),
            discount_cents: 0,
            total_cents: 5_000,
            amount_paid_cents: 2_000,
            status: InvoiceStatus::Partial,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(invoice.balance_due().cents(), 3_000);
        invoice.amount_paid_cents = 6_000;
        assert_eq!(invoice.balance_due().cents(), -1_000);
    }

    #[test]
    fn test_new_customer_validation() {
        let mut c = NewCustomer {
            name: "Ana".to_string(),
            email: "ana@shop.co".to_string(),
            phone: String::new(),
            address: String::new(),
        };
        assert!(c.validate().is_ok());
        c.email = "nope".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_payment_method_wire_format() {
        let m: PaymentMethod = serde_json::from_str("\"transfer\"").unwrap();
        assert_eq!(m, PaymentMethod::Transfer);
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
        assert_eq!(InvoiceStatus::Partial.to_string(), "partial");
    }
}
