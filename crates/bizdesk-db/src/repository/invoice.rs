//! # Invoice & Customer Repositories
//!
//! ## Derived Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  invoices.total_cents        = Σ sale_items(qty × price) − discount     │
//! │  invoices.amount_paid_cents  = Σ payments.amount_cents                  │
//! │  invoices.status             = payment_status(amount_paid, total)       │
//! │                                                                         │
//! │  Rewritten inside the same transaction as every create, update and     │
//! │  payment. Callers never supply them.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bizdesk_core::{
    payment_status, CoreError, Customer, Invoice, InvoiceDetail, InvoiceInput, InvoiceStatus,
    Money, NewCustomer, NewPayment, Payment, SaleItem,
};

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, address, created_at";

const INVOICE_COLUMNS: &str = r#"
    id, customer_id, invoice_number, date, discount_cents, total_cents,
    amount_paid_cents, status, created_by, created_at, updated_at
"#;

const ITEM_COLUMNS: &str = "id, invoice_id, product_id, quantity, price_cents";

const PAYMENT_COLUMNS: &str =
    "id, invoice_id, amount_cents, date, method, reference, note, created_by, created_at";

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer. E-mail addresses are stored lower-cased.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - e-mail already registered
    pub async fn create(&self, input: &NewCustomer) -> DbResult<Customer> {
        input.validate()?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            phone: input.phone.trim().to_string(),
            address: input.address.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "email", &customer.email))?;

        info!(customer_id = %customer.id, email = %customer.email, "Customer created");
        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// All customers ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, email");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }
}

// =============================================================================
// Invoices
// =============================================================================

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates an invoice with its lines.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - invoice number already used
    /// * `Err(DbError::Domain(..))` - empty invoice, discount too large,
    ///   unknown customer, bad line
    pub async fn create(&self, input: &InvoiceInput) -> DbResult<InvoiceDetail> {
        let total = input.validate()?;

        let mut tx = self.pool.begin().await?;
        ensure_customer(&mut tx, &input.customer_id).await?;

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            customer_id: input.customer_id.clone(),
            invoice_number: input.invoice_number.trim().to_string(),
            date: input.date,
            discount_cents: input.discount_cents,
            total_cents: total.cents(),
            amount_paid_cents: 0,
            status: payment_status(Money::zero(), total),
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, customer_id, invoice_number, date, discount_cents, total_cents,
                amount_paid_cents, status, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.customer_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.date)
        .bind(invoice.discount_cents)
        .bind(invoice.total_cents)
        .bind(invoice.amount_paid_cents)
        .bind(invoice.status)
        .bind(&invoice.created_by)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from_insert(e, "invoice_number", &invoice.invoice_number))?;

        let items = insert_items(&mut tx, &invoice.id, input).await?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total(),
            lines = items.len(),
            "Invoice created"
        );

        Ok(InvoiceDetail {
            invoice,
            items,
            payments: Vec::new(),
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice(&mut conn, id).await
    }

    /// Invoice with its lines and payments.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<InvoiceDetail>> {
        let mut conn = self.pool.acquire().await?;

        let Some(invoice) = fetch_invoice(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut conn, id).await?;
        let payments = fetch_payments(&mut conn, id).await?;

        Ok(Some(InvoiceDetail {
            invoice,
            items,
            payments,
        }))
    }

    /// Invoices newest first, optionally for one customer and/or status.
    pub async fn list(
        &self,
        customer_id: Option<&str>,
        status: Option<InvoiceStatus>,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
             WHERE (?1 IS NULL OR customer_id = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY date DESC, created_at DESC, rowid DESC"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(customer_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(invoices)
    }

    /// Replaces the header and every line, then recomputes total and status
    /// against the payments already recorded.
    pub async fn update(&self, id: &str, input: &InvoiceInput) -> DbResult<InvoiceDetail> {
        let total = input.validate()?;

        let mut tx = self.pool.begin().await?;

        if fetch_invoice(&mut tx, id).await?.is_none() {
            return Err(CoreError::InvoiceNotFound(id.to_string()).into());
        }
        ensure_customer(&mut tx, &input.customer_id).await?;

        let number = input.invoice_number.trim();
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE invoices SET
                customer_id = ?2,
                invoice_number = ?3,
                date = ?4,
                discount_cents = ?5,
                total_cents = ?6,
                created_by = COALESCE(?7, created_by),
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.customer_id)
        .bind(number)
        .bind(input.date)
        .bind(input.discount_cents)
        .bind(total.cents())
        .bind(&input.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from_insert(e, "invoice_number", number))?;

        sqlx::query("DELETE FROM sale_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let items = insert_items(&mut tx, id, input).await?;

        refresh_payment_state(&mut tx, id, now).await?;

        let invoice = fetch_invoice(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;
        let payments = fetch_payments(&mut tx, id).await?;

        tx.commit().await?;

        info!(
            invoice_id = %id,
            total = %invoice.total(),
            status = %invoice.status,
            "Invoice updated"
        );

        Ok(InvoiceDetail {
            invoice,
            items,
            payments,
        })
    }

    /// Deletes an invoice together with its lines and payments.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::InvoiceNotFound(id.to_string()).into());
        }

        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    /// Records a payment and refreshes the invoice's paid amount and status.
    ///
    /// Overpayment is accepted; the invoice is then `paid` with a negative
    /// balance due.
    pub async fn record_payment(&self, input: &NewPayment) -> DbResult<(Payment, Invoice)> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        if fetch_invoice(&mut tx, &input.invoice_id).await?.is_none() {
            return Err(CoreError::InvoiceNotFound(input.invoice_id.clone()).into());
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            invoice_id: input.invoice_id.clone(),
            amount_cents: input.amount_cents,
            date: input.date,
            method: input.method,
            reference: input.reference.trim().to_string(),
            note: input.note.trim().to_string(),
            created_by: input.created_by.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, amount_cents, date, method, reference, note,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.date)
        .bind(payment.method)
        .bind(&payment.reference)
        .bind(&payment.note)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        refresh_payment_state(&mut tx, &payment.invoice_id, now).await?;

        let invoice = fetch_invoice(&mut tx, &payment.invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", &payment.invoice_id))?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            amount = %payment.amount(),
            paid = %invoice.amount_paid(),
            status = %invoice.status,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    /// Payments of an invoice, oldest first.
    pub async fn payments(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_payments(&mut conn, invoice_id).await
    }

    /// `total − amount_paid` (pre-fills the payment form).
    pub async fn balance_due(&self, invoice_id: &str) -> DbResult<Money> {
        let invoice = self
            .get(invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(invoice_id.to_string()))?;

        Ok(invoice.balance_due())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn ensure_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<()> {
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(CoreError::CustomerNotFound(customer_id.to_string()).into()),
    }
}

async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
    let invoice = sqlx::query_as::<_, Invoice>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(invoice)
}

async fn fetch_items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<SaleItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE invoice_id = ?1 ORDER BY rowid");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

async fn fetch_payments(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<Payment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY date, created_at, rowid"
    );
    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(payments)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    input: &InvoiceInput,
) -> DbResult<Vec<SaleItem>> {
    let mut items = Vec::with_capacity(input.items.len());

    for line in &input.items {
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            price_cents: line.price_cents,
        };

        sqlx::query(
            r#"
            INSERT INTO sale_items (id, invoice_id, product_id, quantity, price_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.price_cents)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ForeignKeyViolation { .. } => {
                DbError::Domain(CoreError::ProductNotFound(line.product_id.clone()))
            }
            other => other,
        })?;

        items.push(item);
    }

    Ok(items)
}

/// Sets `amount_paid_cents` to the sum of payments and re-derives the status.
async fn refresh_payment_state(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let (total_cents, paid_cents): (i64, i64) = sqlx::query_as(
        r#"
        SELECT i.total_cents,
               COALESCE((SELECT SUM(p.amount_cents) FROM payments p WHERE p.invoice_id = i.id), 0)
        FROM invoices i
        WHERE i.id = ?1
        "#,
    )
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await?;

    let status = payment_status(Money::from_cents(paid_cents), Money::from_cents(total_cents));

    sqlx::query(
        "UPDATE invoices SET amount_paid_cents = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(invoice_id)
    .bind(paid_cents)
    .bind(status)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(invoice_id = %invoice_id, paid = paid_cents, total = total_cents, %status, "Payment state refreshed");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bizdesk_core::{LineItem, PaymentMethod, Product, ProductInput};
    use chrono::NaiveDate;

    async fn setup() -> (Database, Customer, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Acme Ltd".to_string(),
                email: "Billing@Acme.io".to_string(),
                phone: String::new(),
                address: String::new(),
            })
            .await
            .unwrap();
        let product = db
            .products()
            .create(&ProductInput {
                name: "Lamp".to_string(),
                sku: "LAMP-1".to_string(),
                category: Default::default(),
                price_cents: 2_500,
                cost_price_cents: 0,
                valuation_method: Default::default(),
                length_cm_hundredths: 0,
                width_cm_hundredths: 0,
                height_cm_hundredths: 0,
            })
            .await
            .unwrap();
        (db, customer, product)
    }

    fn input(customer: &Customer, product: &Product, number: &str, lines: &[(i64, i64)], discount: i64) -> InvoiceInput {
        InvoiceInput {
            customer_id: customer.id.clone(),
            invoice_number: number.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            discount_cents: discount,
            created_by: None,
            items: lines
                .iter()
                .map(|&(quantity, price_cents)| LineItem {
                    product_id: product.id.clone(),
                    quantity,
                    price_cents,
                })
                .collect(),
        }
    }

    fn pay(invoice: &Invoice, amount: i64) -> NewPayment {
        NewPayment {
            invoice_id: invoice.id.clone(),
            amount_cents: amount,
            date: NaiveDate::from_ymd_opt(2024, 4, 11).unwrap(),
            method: PaymentMethod::Card,
            reference: "slip 42".to_string(),
            note: String::new(),
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_customer_email_is_unique() {
        let (db, customer, _) = setup().await;
        assert_eq!(customer.email, "billing@acme.io");

        let err = db
            .customers()
            .create(&NewCustomer {
                name: "Acme Again".to_string(),
                email: "billing@acme.io".to_string(),
                phone: String::new(),
                address: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "email"));
        assert_eq!(db.customers().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_computes_total_and_status() {
        let (db, customer, product) = setup().await;
        let detail = db
            .invoices()
            .create(&input(&customer, &product, "INV-1", &[(2, 2_500), (1, 1_000)], 500))
            .await
            .unwrap();

        assert_eq!(detail.invoice.total_cents, 5_500);
        assert_eq!(detail.invoice.status, InvoiceStatus::Unpaid);
        assert_eq!(detail.items.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_number() {
        let (db, customer, product) = setup().await;
        let inv = input(&customer, &product, "INV-1", &[(1, 100)], 0);
        db.invoices().create(&inv).await.unwrap();

        let err = db.invoices().create(&inv).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "INV-1"));
    }

    #[tokio::test]
    async fn test_payments_drive_status() {
        let (db, customer, product) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(&input(&customer, &product, "INV-1", &[(4, 2_500)], 0))
            .await
            .unwrap()
            .invoice;

        let (_, after_first) = repo.record_payment(&pay(&invoice, 4_000)).await.unwrap();
        assert_eq!(after_first.status, InvoiceStatus::Partial);
        assert_eq!(repo.balance_due(&invoice.id).await.unwrap().cents(), 6_000);

        let (_, after_second) = repo.record_payment(&pay(&invoice, 7_000)).await.unwrap();
        assert_eq!(after_second.amount_paid_cents, 11_000);
        assert_eq!(after_second.status, InvoiceStatus::Paid);
        assert_eq!(after_second.balance_due().cents(), -1_000);

        assert_eq!(repo.payments(&invoice.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_recomputes_against_existing_payments() {
        let (db, customer, product) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(&input(&customer, &product, "INV-1", &[(1, 10_000)], 0))
            .await
            .unwrap()
            .invoice;
        repo.record_payment(&pay(&invoice, 10_000)).await.unwrap();

        // adding a line turns a paid invoice back into partial
        let detail = repo
            .update(&invoice.id, &input(&customer, &product, "INV-1", &[(1, 10_000), (1, 5_000)], 0))
            .await
            .unwrap();
        assert_eq!(detail.invoice.total_cents, 15_000);
        assert_eq!(detail.invoice.status, InvoiceStatus::Partial);
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_rule_failures() {
        let (db, customer, product) = setup().await;
        let repo = db.invoices();

        let err = repo.create(&input(&customer, &product, "INV-1", &[], 0)).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptyInvoice));

        let err = repo
            .create(&input(&customer, &product, "INV-1", &[(1, 100)], 101))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::DiscountExceedsSubtotal { .. })));

        let mut orphan = input(&customer, &product, "INV-1", &[(1, 100)], 0);
        orphan.customer_id = "ghost".to_string();
        let err = repo.create(&orphan).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::CustomerNotFound(_))));

        let invoice = repo
            .create(&input(&customer, &product, "INV-1", &[(1, 100)], 0))
            .await
            .unwrap()
            .invoice;
        assert!(repo.record_payment(&pay(&invoice, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_total_invoice_is_paid() {
        let (db, customer, product) = setup().await;
        let detail = db
            .invoices()
            .create(&input(&customer, &product, "INV-0", &[(1, 0)], 0))
            .await
            .unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (db, customer, product) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(&input(&customer, &product, "INV-1", &[(1, 500)], 0))
            .await
            .unwrap()
            .invoice;
        repo.record_payment(&pay(&invoice, 100)).await.unwrap();

        repo.delete(&invoice.id).await.unwrap();
        assert!(repo.get_detail(&invoice.id).await.unwrap().is_none());
        assert!(repo.payments(&invoice.id).await.unwrap().is_empty());

        let err = repo.delete(&invoice.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvoiceNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, customer, product) = setup().await;
        let repo = db.invoices();
        let a = repo
            .create(&input(&customer, &product, "INV-1", &[(1, 500)], 0))
            .await
            .unwrap()
            .invoice;
        repo.create(&input(&customer, &product, "INV-2", &[(1, 500)], 0))
            .await
            .unwrap();
        repo.record_payment(&pay(&a, 500)).await.unwrap();

        assert_eq!(repo.list(Some(&customer.id), None).await.unwrap().len(), 2);
        assert_eq!(repo.list(None, Some(InvoiceStatus::Paid)).await.unwrap().len(), 1);
        assert!(repo.list(Some("nobody"), None).await.unwrap().is_empty());
    }
}
