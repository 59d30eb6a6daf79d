//! # Shared Types
//!
//! Primitives shared by the inventory, sales and staff modules.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number, email, username) - human-readable, unique

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::div_round_half_even;

// =============================================================================
// Warehouse
// =============================================================================

/// A stocking location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Warehouse {
    Main,
    North,
    South,
    East,
    West,
}

impl Warehouse {
    /// Every warehouse, in display order.
    pub const ALL: [Warehouse; 5] = [
        Warehouse::Main,
        Warehouse::North,
        Warehouse::South,
        Warehouse::East,
        Warehouse::West,
    ];

    /// Stored code (`main`, `north`, ...).
    pub const fn code(&self) -> &'static str {
        match self {
            Warehouse::Main => "main",
            Warehouse::North => "north",
            Warehouse::South => "south",
            Warehouse::East => "east",
            Warehouse::West => "west",
        }
    }

    /// Human-readable name.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Warehouse::Main => "Main Warehouse",
            Warehouse::North => "North Branch",
            Warehouse::South => "South Branch",
            Warehouse::East => "East Branch",
            Warehouse::West => "West Branch",
        }
    }
}

impl fmt::Display for Warehouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Warehouse {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Warehouse::ALL
            .into_iter()
            .find(|w| w.code() == code)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "warehouse".to_string(),
                allowed: Warehouse::ALL.iter().map(|w| w.code().to_string()).collect(),
            })
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 8550 bps = 85.50% (two decimal places, like the stored form fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(i64);

impl Percent {
    /// 100%.
    pub const HUNDRED: Percent = Percent(10_000);

    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Percent(bps)
    }

    /// Returns the percentage in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Returns the value as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// `part / whole × 100%`, rounded half to even to whole basis points.
    ///
    /// A non-positive `whole` yields zero.
    ///
    /// ## Example
    /// ```rust
    /// use bizdesk_core::types::Percent;
    ///
    /// assert_eq!(Percent::ratio(750, 1000).bps(), 7500);
    /// assert_eq!(Percent::ratio(1, 3).bps(), 3333);
    /// assert_eq!(Percent::ratio(500, 0), Percent::zero());
    /// ```
    pub fn ratio(part: i64, whole: i64) -> Percent {
        if whole <= 0 {
            return Percent::zero();
        }
        let bps = div_round_half_even(part as i128 * 10_000, whole as i128).unwrap_or(0);
        Percent(bps as i64)
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}%", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

// =============================================================================
// Month Helpers
// =============================================================================

/// Returns the first day of the month containing `date`.
///
/// KPIs and bonuses are keyed by month; every month value is normalised
/// through here before it is stored or queried.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

// =============================================================================
// Unit Tests
// =============================================================================
