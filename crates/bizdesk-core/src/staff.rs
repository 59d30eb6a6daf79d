//! # Staff Performance
//!
//! Staff profiles, monthly KPIs and bonuses, and who may see them.
//!
//! ## Visibility
//! ```text
//! viewer.role ∈ {admin, ceo}   ──►  StaffScope::All
//! any other role               ──►  StaffScope::Only(viewer.id)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{month_start, Percent};
use crate::validation::{
    validate_amount, validate_percent_bps, validate_price_cents, validate_required,
    validate_username,
};

// =============================================================================
// Roles & Profiles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Ceo,
    #[default]
    Sales,
    Warehouse,
    Accountant,
}

impl StaffRole {
    /// Admins and the CEO see every staff member's figures.
    #[inline]
    pub const fn can_view_all(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Ceo)
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaffRole::Admin => "Administrator",
            StaffRole::Ceo => "CEO",
            StaffRole::Sales => "Sales Staff",
            StaffRole::Warehouse => "Warehouse Staff",
            StaffRole::Accountant => "Accountant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StaffProfile {
    pub id: String,
    /// Unique login name.
    pub username: String,
    pub full_name: String,
    pub role: StaffRole,
    /// Attendance rate in basis points (10000 = 100%).
    pub attendance_bps: i64,
    /// Customer satisfaction in basis points.
    pub customer_satisfaction_bps: i64,
    #[ts(as = "Option<String>")]
    pub hire_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StaffProfile {
    #[inline]
    pub fn attendance(&self) -> Percent {
        Percent::from_bps(self.attendance_bps)
    }

    #[inline]
    pub fn customer_satisfaction(&self) -> Percent {
        Percent::from_bps(self.customer_satisfaction_bps)
    }

    /// What this profile is allowed to see.
    pub fn scope(&self) -> StaffScope {
        if self.role.can_view_all() {
            StaffScope::All
        } else {
            StaffScope::Only(self.id.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStaffProfile {
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub role: StaffRole,
    #[serde(default = "default_attendance_bps")]
    pub attendance_bps: i64,
    #[serde(default)]
    pub customer_satisfaction_bps: i64,
    #[ts(as = "Option<String>")]
    pub hire_date: Option<NaiveDate>,
}

fn default_attendance_bps() -> i64 {
    Percent::HUNDRED.bps()
}

impl NewStaffProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_required("full_name", &self.full_name, 200)?;
        validate_percent_bps("attendance", self.attendance_bps)?;
        validate_percent_bps("customer_satisfaction", self.customer_satisfaction_bps)?;
        Ok(())
    }
}

/// Which staff records a viewer may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffScope {
    All,
    Only(String),
}

impl StaffScope {
    pub fn allows(&self, staff_id: &str) -> bool {
        match self {
            StaffScope::All => true,
            StaffScope::Only(id) => id == staff_id,
        }
    }

    /// The single staff id to filter by, if any.
    pub fn staff_filter(&self) -> Option<&str> {
        match self {
            StaffScope::All => None,
            StaffScope::Only(id) => Some(id),
        }
    }
}

// =============================================================================
// KPI
// =============================================================================

/// Sales performance of one staff member for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Kpi {
    pub id: String,
    pub staff_id: String,
    /// Always the first day of the month.
    #[ts(as = "String")]
    pub month: NaiveDate,
    pub sales_amount_cents: i64,
    pub target_sales_cents: i64,
}

impl Kpi {
    #[inline]
    pub fn sales(&self) -> Money {
        Money::from_cents(self.sales_amount_cents)
    }

    #[inline]
    pub fn target(&self) -> Money {
        Money::from_cents(self.target_sales_cents)
    }

    /// `sales / target × 100%`; zero when no target is set.
    ///
    /// ## Example
    /// ```rust
    /// use bizdesk_core::staff::Kpi;
    /// use chrono::NaiveDate;
    ///
    /// let kpi = Kpi {
    ///     id: "k".into(),
    ///     staff_id: "s".into(),
    ///     month: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    ///     sales_amount_cents: 750_000,
    ///     target_sales_cents: 1_000_000,
    /// };
    /// assert_eq!(kpi.achievement().bps(), 7_500);
    /// ```
    pub fn achievement(&self) -> Percent {
        Percent::ratio(self.sales_amount_cents, self.target_sales_cents)
    }

    #[inline]
    pub fn is_target_met(&self) -> bool {
        self.sales_amount_cents >= self.target_sales_cents
    }
}

/// Input for creating or replacing a monthly KPI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct KpiInput {
    pub staff_id: String,
    /// Any day in the month; stored as the first.
    #[ts(as = "String")]
    pub month: NaiveDate,
    pub sales_amount_cents: i64,
    pub target_sales_cents: i64,
}

impl KpiInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_price_cents("sales_amount", self.sales_amount_cents)?;
        validate_price_cents("target_sales", self.target_sales_cents)?;
        Ok(())
    }

    #[inline]
    pub fn normalized_month(&self) -> NaiveDate {
        month_start(self.month)
    }
}

/// Aggregate figures over a set of KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct KpiTotals {
    pub total_sales: Money,
    pub total_target: Money,
    /// Mean sales per KPI row, rounded half to even; zero for no rows.
    pub average_sales: Money,
}

pub fn kpi_totals(kpis: &[Kpi]) -> KpiTotals {
    let total_sales: Money = kpis.iter().map(Kpi::sales).sum();
    let total_target: Money = kpis.iter().map(Kpi::target).sum();
    let average_sales = total_sales
        .average_over(kpis.len() as i64)
        .unwrap_or_default();

    KpiTotals {
        total_sales,
        total_target,
        average_sales,
    }
}

// =============================================================================
// Bonus
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Bonus {
    pub id: String,
    pub staff_id: String,
    #[ts(as = "String")]
    pub month: NaiveDate,
    pub amount_cents: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Bonus {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBonus {
    pub staff_id: String,
    #[ts(as = "String")]
    pub month: NaiveDate,
    pub amount_cents: i64,
    pub reason: String,
}

impl NewBonus {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_amount("bonus amount", self.amount_cents)?;
        validate_required("reason", &self.reason, 500)?;
        Ok(())
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// One staff member's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StaffSummary {
    pub profile: StaffProfile,
    /// Newest month first.
    pub kpis: Vec<Kpi>,
    /// Newest first.
    pub bonuses: Vec<Bonus>,
    pub total_bonuses: Money,
}

impl StaffSummary {
    pub fn new(profile: StaffProfile, kpis: Vec<Kpi>, bonuses: Vec<Bonus>) -> Self {
        let total_bonuses = bonuses.iter().map(Bonus::amount).sum();
        StaffSummary {
            profile,
            kpis,
            bonuses,
            total_bonuses,
        }
    }
}

/// KPIs of every visible staff member for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyKpiSummary {
    #[ts(as = "String")]
    pub month: NaiveDate,
    pub kpis: Vec<Kpi>,
    pub totals: KpiTotals,
    pub recent_bonuses: Vec<Bonus>,
}

// =============================================================================
// Unit Tests
// =============================================================================
