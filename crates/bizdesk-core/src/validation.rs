//! # Validation Module
//!
//! Field-level input checks for bizdesk forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front-end form                                               │
//! │  └── Required fields, input types                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (formats, ranges, signs)                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Rule functions (inventory / sales / staff)                   │
//! │  └── Cross-field rules (routes, discounts, transitions)                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── UNIQUE / FOREIGN KEY / CHECK constraints                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bizdesk_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("DESK-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_LINE_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks that a trimmed text field is present and at most `max` characters.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use bizdesk_core::validation::validate_sku;
///
/// assert!(validate_sku("DESK-01").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_required("sku", sku, 100)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required("name", name, 200)
}

/// Validates an invoice number (1-50 characters, no whitespace inside).
pub fn validate_invoice_number(number: &str) -> ValidationResult<()> {
    validate_required("invoice_number", number, 50)?;

    if number.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates a login name (1-150 characters; letters, digits, `@.+-_`).
pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_required("username", username, 150)?;

    if !username
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "may contain only letters, numbers and @ . + - _".to_string(),
        });
    }

    Ok(())
}

/// Basic e-mail shape check: `local@domain.tld`.
///
/// ## Example
/// ```rust
/// use bizdesk_core::validation::validate_email;
///
/// assert!(validate_email("ana@shop.co").is_ok());
/// assert!(validate_email("ana@shop").is_err());
/// assert!(validate_email("@shop.co").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    validate_required("email", email, 254)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity that must be strictly positive.
///
/// ## Used By
/// ```text
/// Stock receipt ─────┐
/// Transfer request ──┼──► validate_quantity(qty) ─┬─ qty <= 0 ──────────► MustBePositive
/// Invoice line ──────┘                            └─ qty > 1,000,000 ───► OutOfRange
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or cost in cents. Zero is allowed.
///
/// ## Example
/// ```rust
/// use bizdesk_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("price", 1099).is_ok());
/// assert!(validate_price_cents("price", 0).is_ok());
/// assert!(validate_price_cents("unit_cost", -1).is_err());
/// assert!(validate_price_cents("price", 10_000_000_000).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment or bonus amount in cents (must be > 0).
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
#[inline]
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    validate_amount("payment amount", cents)
}

/// Validates a product dimension in hundredths of a centimetre.
pub fn validate_dimension(field: &str, hundredths: i64) -> ValidationResult<()> {
    validate_price_cents(field, hundredths)
}

/// Validates a percentage in basis points (0 to 10000).
pub fn validate_percent_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use bizdesk_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
