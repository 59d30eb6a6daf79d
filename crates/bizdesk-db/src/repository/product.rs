//! # Product Repository
//!
//! Catalogue operations. Cost price is owned by the stock receipt flow
//! ([`crate::repository::stock`]) and is only written here on create.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bizdesk_core::{Product, ProductInput};

pub(crate) const PRODUCT_COLUMNS: &str = r#"
    id, name, sku, category, price_cents, cost_price_cents, valuation_method,
    length_cm_hundredths, width_cm_hundredths, height_cm_hundredths,
    created_at, updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().create(&input).await?;
/// let same = db.products().get_by_sku("DESK-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn create(&self, input: &ProductInput) -> DbResult<Product> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            category: input.category,
            price_cents: input.price_cents,
            cost_price_cents: input.cost_price_cents,
            valuation_method: input.valuation_method,
            length_cm_hundredths: input.length_cm_hundredths,
            width_cm_hundredths: input.width_cm_hundredths,
            height_cm_hundredths: input.height_cm_hundredths,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, category, price_cents, cost_price_cents, valuation_method,
                length_cm_hundredths, width_cm_hundredths, height_cm_hundredths,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.valuation_method)
        .bind(product.length_cm_hundredths)
        .bind(product.width_cm_hundredths)
        .bind(product.height_cm_hundredths)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "sku", &product.sku))?;

        info!(sku = %product.sku, id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, sku");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Updates catalogue fields. The stored cost price is kept; it belongs
    /// to the receipt flow.
    pub async fn update(&self, id: &str, input: &ProductInput) -> DbResult<Product> {
        input.validate()?;

        debug!(id = %id, "Updating product");

        let sku = input.sku.trim();
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                category = ?4,
                price_cents = ?5,
                valuation_method = ?6,
                length_cm_hundredths = ?7,
                width_cm_hundredths = ?8,
                height_cm_hundredths = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(sku)
        .bind(input.category)
        .bind(input.price_cents)
        .bind(input.valuation_method)
        .bind(input.length_cm_hundredths)
        .bind(input.width_cm_hundredths)
        .bind(input.height_cm_hundredths)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "sku", sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bizdesk_core::{ProductCategory, ValuationMethod};

    fn desk() -> ProductInput {
        ProductInput {
            name: "Oak Desk".to_string(),
            sku: "DESK-01".to_string(),
            category: ProductCategory::Furniture,
            price_cents: 25_000,
            cost_price_cents: 0,
            valuation_method: ValuationMethod::Fifo,
            length_cm_hundredths: 12_000,
            width_cm_hundredths: 6_000,
            height_cm_hundredths: 7_500,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().create(&desk()).await.unwrap();

        let by_id = db.products().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "DESK-01");
        assert_eq!(by_id.category, ProductCategory::Furniture);

        let by_sku = db.products().get_by_sku("DESK-01").await.unwrap().unwrap();
        assert_eq!(by_sku.id, created.id);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_names_the_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&desk()).await.unwrap();

        let err = db.products().create(&desk()).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "sku");
                assert_eq!(value, "DESK-01");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = desk();
        input.price_cents = -1;
        assert!(matches!(
            db.products().create(&input).await,
            Err(DbError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_cost_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = desk();
        input.cost_price_cents = 9_000;
        let created = db.products().create(&input).await.unwrap();

        input.name = "Walnut Desk".to_string();
        input.cost_price_cents = 1;
        let updated = db.products().update(&created.id, &input).await.unwrap();
        assert_eq!(updated.name, "Walnut Desk");
        assert_eq!(updated.cost_price_cents, 9_000);

        assert!(matches!(
            db.products().update("missing", &input).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
