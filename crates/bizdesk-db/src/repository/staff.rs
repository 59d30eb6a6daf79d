//! # Staff Repository
//!
//! Staff profiles, monthly KPIs and bonuses.
//!
//! Reads that return KPI or bonus figures take the viewing profile and apply
//! its [`StaffScope`]: admins and the CEO see everyone, other roles only
//! themselves.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bizdesk_core::{
    kpi_totals, month_start, Bonus, CoreError, Kpi, KpiInput, MonthlyKpiSummary, NewBonus,
    NewStaffProfile, StaffProfile, StaffScope, StaffSummary, RECENT_BONUS_LIMIT,
};

const PROFILE_COLUMNS: &str = r#"
    id, username, full_name, role, attendance_bps, customer_satisfaction_bps,
    hire_date, created_at
"#;

const KPI_COLUMNS: &str = "id, staff_id, month, sales_amount_cents, target_sales_cents";

const BONUS_COLUMNS: &str = "id, staff_id, month, amount_cents, reason, created_at";

#[derive(Debug, Clone)]
pub struct StaffRepository {
    pool: SqlitePool,
}

impl StaffRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StaffRepository { pool }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username taken
    pub async fn create_profile(&self, input: &NewStaffProfile) -> DbResult<StaffProfile> {
        input.validate()?;

        let profile = StaffProfile {
            id: Uuid::new_v4().to_string(),
            username: input.username.trim().to_string(),
            full_name: input.full_name.trim().to_string(),
            role: input.role,
            attendance_bps: input.attendance_bps,
            customer_satisfaction_bps: input.customer_satisfaction_bps,
            hire_date: input.hire_date,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO staff_profiles (
                id, username, full_name, role, attendance_bps, customer_satisfaction_bps,
                hire_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(profile.role)
        .bind(profile.attendance_bps)
        .bind(profile.customer_satisfaction_bps)
        .bind(profile.hire_date)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "username", &profile.username))?;

        info!(staff_id = %profile.id, username = %profile.username, role = ?profile.role, "Staff profile created");
        Ok(profile)
    }

    pub async fn get_profile(&self, id: &str) -> DbResult<Option<StaffProfile>> {
        let mut conn = self.pool.acquire().await?;
        fetch_profile(&mut conn, id).await
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<StaffProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM staff_profiles WHERE username = ?1");
        let profile = sqlx::query_as::<_, StaffProfile>(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Profiles ordered by full name.
    pub async fn list_profiles(&self) -> DbResult<Vec<StaffProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM staff_profiles ORDER BY full_name, username");
        let profiles = sqlx::query_as::<_, StaffProfile>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(profiles)
    }

    // =========================================================================
    // KPIs & Bonuses
    // =========================================================================

    /// Creates or replaces the KPI for `(staff, month)`. Any day of the month
    /// addresses the same row.
    pub async fn upsert_kpi(&self, input: &KpiInput) -> DbResult<Kpi> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        ensure_staff(&mut conn, &input.staff_id).await?;

        let month = input.normalized_month();

        sqlx::query(
            r#"
            INSERT INTO kpis (id, staff_id, month, sales_amount_cents, target_sales_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (staff_id, month) DO UPDATE SET
                sales_amount_cents = excluded.sales_amount_cents,
                target_sales_cents = excluded.target_sales_cents
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&input.staff_id)
        .bind(month)
        .bind(input.sales_amount_cents)
        .bind(input.target_sales_cents)
        .execute(&mut *conn)
        .await?;

        let sql = format!("SELECT {KPI_COLUMNS} FROM kpis WHERE staff_id = ?1 AND month = ?2");
        let kpi = sqlx::query_as::<_, Kpi>(&sql)
            .bind(&input.staff_id)
            .bind(month)
            .fetch_one(&mut *conn)
            .await?;

        debug!(
            staff_id = %kpi.staff_id,
            month = %kpi.month,
            achievement = %kpi.achievement(),
            "KPI saved"
        );
        Ok(kpi)
    }

    /// Awards a bonus for a month.
    pub async fn award_bonus(&self, input: &NewBonus) -> DbResult<Bonus> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        ensure_staff(&mut conn, &input.staff_id).await?;

        let bonus = Bonus {
            id: Uuid::new_v4().to_string(),
            staff_id: input.staff_id.clone(),
            month: month_start(input.month),
            amount_cents: input.amount_cents,
            reason: input.reason.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO bonuses (id, staff_id, month, amount_cents, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&bonus.id)
        .bind(&bonus.staff_id)
        .bind(bonus.month)
        .bind(bonus.amount_cents)
        .bind(&bonus.reason)
        .bind(bonus.created_at)
        .execute(&mut *conn)
        .await?;

        info!(staff_id = %bonus.staff_id, amount = %bonus.amount(), "Bonus awarded");
        Ok(bonus)
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// Profile, KPIs (newest month first), bonuses (newest month first,
    /// then latest awarded) and bonus total of one staff member.
    ///
    /// ## Errors
    /// - `AccessDenied` when `viewer` may only see themselves
    /// - `StaffNotFound`
    pub async fn staff_summary(&self, viewer: &StaffProfile, staff_id: &str) -> DbResult<StaffSummary> {
        if !viewer.scope().allows(staff_id) {
            return Err(CoreError::AccessDenied {
                viewer: viewer.username.clone(),
                staff_id: staff_id.to_string(),
            }
            .into());
        }

        let mut conn = self.pool.acquire().await?;
        let profile = fetch_profile(&mut conn, staff_id)
            .await?
            .ok_or_else(|| CoreError::StaffNotFound(staff_id.to_string()))?;

        let sql = format!(
            "SELECT {KPI_COLUMNS} FROM kpis WHERE staff_id = ?1 ORDER BY month DESC"
        );
        let kpis = sqlx::query_as::<_, Kpi>(&sql)
            .bind(staff_id)
            .fetch_all(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {BONUS_COLUMNS} FROM bonuses WHERE staff_id = ?1
             ORDER BY month DESC, created_at DESC, rowid DESC"
        );
        let bonuses = sqlx::query_as::<_, Bonus>(&sql)
            .bind(staff_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(StaffSummary::new(profile, kpis, bonuses))
    }

    /// KPIs of one month with totals and the most recent bonuses, limited to
    /// what `viewer` may see.
    pub async fn monthly_summary(
        &self,
        viewer: &StaffProfile,
        month: NaiveDate,
    ) -> DbResult<MonthlyKpiSummary> {
        let month = month_start(month);
        let scope = viewer.scope();
        let only = scope.staff_filter();

        let sql = format!(
            "SELECT {KPI_COLUMNS} FROM kpis
             WHERE month = ?1 AND (?2 IS NULL OR staff_id = ?2)
             ORDER BY sales_amount_cents DESC, staff_id"
        );
        let kpis = sqlx::query_as::<_, Kpi>(&sql)
            .bind(month)
            .bind(only)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {BONUS_COLUMNS} FROM bonuses
             WHERE (?1 IS NULL OR staff_id = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );
        let recent_bonuses = sqlx::query_as::<_, Bonus>(&sql)
            .bind(only)
            .bind(RECENT_BONUS_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;

        let totals = kpi_totals(&kpis);
        debug!(
            month = %month,
            rows = kpis.len(),
            all_staff = matches!(scope, StaffScope::All),
            total_sales = %totals.total_sales,
            "Monthly KPI summary"
        );

        Ok(MonthlyKpiSummary {
            month,
            kpis,
            totals,
            recent_bonuses,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_profile(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<StaffProfile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM staff_profiles WHERE id = ?1");
    let profile = sqlx::query_as::<_, StaffProfile>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(profile)
}

async fn ensure_staff(conn: &mut SqliteConnection, staff_id: &str) -> DbResult<()> {
    match fetch_profile(conn, staff_id).await? {
        Some(_) => Ok(()),
        None => Err(CoreError::StaffNotFound(staff_id.to_string()).into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bizdesk_core::StaffRole;

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    async fn member(db: &Database, username: &str, role: StaffRole) -> StaffProfile {
        db.staff()
            .create_profile(&NewStaffProfile {
                username: username.to_string(),
                full_name: username.to_uppercase(),
                role,
                attendance_bps: 9_500,
                customer_satisfaction_bps: 8_000,
                hire_date: Some(june(1)),
            })
            .await
            .unwrap()
    }

    fn kpi(staff: &StaffProfile, day: u32, sales: i64, target: i64) -> KpiInput {
        KpiInput {
            staff_id: staff.id.clone(),
            month: june(day),
            sales_amount_cents: sales,
            target_sales_cents: target,
        }
    }

    fn bonus(staff: &StaffProfile, amount: i64) -> NewBonus {
        NewBonus {
            staff_id: staff.id.clone(),
            month: june(20),
            amount_cents: amount,
            reason: "Target exceeded".to_string(),
        }
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ana = member(&db, "ana", StaffRole::Sales).await;
        assert_eq!(db.staff().get_by_username("ana").await.unwrap().unwrap().id, ana.id);

        let err = db
            .staff()
            .create_profile(&NewStaffProfile {
                username: "ana".to_string(),
                full_name: "Other Ana".to_string(),
                role: StaffRole::Warehouse,
                attendance_bps: 10_000,
                customer_satisfaction_bps: 0,
                hire_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "username"));
    }

    #[tokio::test]
    async fn test_kpi_upsert_normalizes_month() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ana = member(&db, "ana", StaffRole::Sales).await;

        db.staff().upsert_kpi(&kpi(&ana, 3, 100, 1_000)).await.unwrap();
        let kpi = db.staff().upsert_kpi(&kpi(&ana, 28, 1_200, 1_000)).await.unwrap();

        assert_eq!(kpi.month, june(1));
        assert_eq!(kpi.sales_amount_cents, 1_200);
        assert!(kpi.is_target_met());

        let summary = db.staff().staff_summary(&ana, &ana.id).await.unwrap();
        assert_eq!(summary.kpis.len(), 1);
    }

    #[tokio::test]
    async fn test_kpi_and_bonus_require_staff() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ghost = KpiInput {
            staff_id: "ghost".to_string(),
            month: june(1),
            sales_amount_cents: 0,
            target_sales_cents: 0,
        };
        let err = db.staff().upsert_kpi(&ghost).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::StaffNotFound(_))));

        let ana = member(&db, "ana", StaffRole::Sales).await;
        assert!(db.staff().award_bonus(&bonus(&ana, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_staff_summary_visibility() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ceo = member(&db, "boss", StaffRole::Ceo).await;
        let ana = member(&db, "ana", StaffRole::Sales).await;
        let ben = member(&db, "ben", StaffRole::Warehouse).await;

        db.staff().award_bonus(&bonus(&ana, 1_000)).await.unwrap();
        db.staff().award_bonus(&bonus(&ana, 2_000)).await.unwrap();

        let summary = db.staff().staff_summary(&ceo, &ana.id).await.unwrap();
        assert_eq!(summary.total_bonuses.cents(), 3_000);
        assert_eq!(summary.bonuses[0].amount_cents, 2_000);

        assert!(db.staff().staff_summary(&ana, &ana.id).await.is_ok());

        let err = db.staff().staff_summary(&ben, &ana.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AccessDenied { .. })));
    }

    #[tokio::test]
    async fn test_staff_summary_orders_bonuses_by_month() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ana = member(&db, "ana", StaffRole::Sales).await;

        // Awarded out of month order; a late March bonus is entered last.
        for (month, amount) in [(3, 300), (6, 600), (1, 100), (3, 301)] {
            db.staff()
                .award_bonus(&NewBonus {
                    month: NaiveDate::from_ymd_opt(2024, month, 12).unwrap(),
                    ..bonus(&ana, amount)
                })
                .await
                .unwrap();
        }

        let summary = db.staff().staff_summary(&ana, &ana.id).await.unwrap();
        let amounts: Vec<i64> = summary.bonuses.iter().map(|b| b.amount_cents).collect();
        assert_eq!(amounts, vec![600, 301, 300, 100]);
        assert_eq!(summary.bonuses[0].month, june(1));
    }

    #[tokio::test]
    async fn test_monthly_summary_scoped_by_role() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let admin = member(&db, "root", StaffRole::Admin).await;
        let ana = member(&db, "ana", StaffRole::Sales).await;
        let ben = member(&db, "ben", StaffRole::Sales).await;

        db.staff().upsert_kpi(&kpi(&ana, 1, 1_000, 2_000)).await.unwrap();
        db.staff().upsert_kpi(&kpi(&ben, 1, 2_001, 2_000)).await.unwrap();
        db.staff().award_bonus(&bonus(&ben, 500)).await.unwrap();

        let all = db.staff().monthly_summary(&admin, june(15)).await.unwrap();
        assert_eq!(all.month, june(1));
        assert_eq!(all.kpis.len(), 2);
        assert_eq!(all.totals.total_sales.cents(), 3_001);
        assert_eq!(all.totals.total_target.cents(), 4_000);
        // 3001 / 2 = 1500.5 → 1500
        assert_eq!(all.totals.average_sales.cents(), 1_500);
        assert_eq!(all.recent_bonuses.len(), 1);

        let own = db.staff().monthly_summary(&ana, june(1)).await.unwrap();
        assert_eq!(own.kpis.len(), 1);
        assert_eq!(own.kpis[0].staff_id, ana.id);
        assert!(own.recent_bonuses.is_empty());
    }

    #[tokio::test]
    async fn test_recent_bonuses_are_limited() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let admin = member(&db, "root", StaffRole::Admin).await;
        for i in 1..=12 {
            db.staff().award_bonus(&bonus(&admin, i * 100)).await.unwrap();
        }

        let summary = db.staff().monthly_summary(&admin, june(1)).await.unwrap();
        assert_eq!(summary.recent_bonuses.len(), RECENT_BONUS_LIMIT);
        assert_eq!(summary.recent_bonuses[0].amount_cents, 1_200);
        assert!(summary.kpis.is_empty());
        assert!(summary.totals.average_sales.is_zero());
    }
}
