//! Cross-repository consistency checks against an in-memory database.
//!
//! Each test drives the public `Database` API the way a caller would and then
//! checks a property that must hold across tables: units are conserved by a
//! transfer, the stored cost price is the weighted average of the units
//! still on hand, stored invoice totals match their lines, and payment status
//! follows the amount paid.

use bizdesk_core::{
    AdjustmentReason, CoreError, Customer, InvoiceInput, InvoiceStatus, LineItem, NewAdjustment,
    NewCustomer, NewPayment, NewTransfer, PaymentMethod, Product, ProductInput, StockReceipt,
    TransferStatus, TransferUpdate, ValuationMethod, Warehouse,
};
use bizdesk_db::{Database, DbConfig};
use chrono::NaiveDate;

// =============================================================================
// Helpers
// =============================================================================

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn product(db: &Database, sku: &str, price_cents: i64) -> Product {
    db.products()
        .create(&ProductInput {
            name: format!("Item {}", sku),
            sku: sku.to_string(),
            category: Default::default(),
            price_cents,
            cost_price_cents: 0,
            valuation_method: Default::default(),
            length_cm_hundredths: 0,
            width_cm_hundredths: 0,
            height_cm_hundredths: 0,
        })
        .await
        .unwrap()
}

async fn receive(db: &Database, product: &Product, wh: Warehouse, qty: i64, unit_cost: i64) -> i64 {
    db.stock()
        .receive(&StockReceipt {
            product_id: product.id.clone(),
            warehouse: wh,
            quantity: qty,
            unit_cost_cents: unit_cost,
            received_date: day(1),
        })
        .await
        .unwrap()
        .cost_price
        .cents()
}

async fn level(db: &Database, product: &Product, wh: Warehouse) -> i64 {
    db.stock()
        .get_level(&product.id, wh)
        .await
        .unwrap()
        .map(|s| s.quantity)
        .unwrap_or(0)
}

async fn customer(db: &Database, email: &str) -> Customer {
    db.customers()
        .create(&NewCustomer {
            name: "Acme Ltd".to_string(),
            email: email.to_string(),
            phone: String::new(),
            address: String::new(),
        })
        .await
        .unwrap()
}

fn status_update(status: TransferStatus, actual: Option<i64>) -> TransferUpdate {
    TransferUpdate {
        status,
        actual_quantity_received: actual,
        mismatch_reason: actual.map(|_| "counted at dock".to_string()),
    }
}

/// Same formula the costing code implements, written out independently:
/// Σ(qty × cost) / Σ qty, ties to even.
fn expected_average(receipts: &[(i64, i64)]) -> i64 {
    let units: i128 = receipts.iter().map(|(q, _)| *q as i128).sum();
    let value: i128 = receipts.iter().map(|(q, c)| *q as i128 * *c as i128).sum();
    let quotient = value / units;
    let twice_remainder = (value % units) * 2;
    let rounded = if twice_remainder > units || (twice_remainder == units && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    };
    rounded as i64
}

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn test_reconciled_transfer_conserves_units() {
    let db = db().await;
    let desk = product(&db, "DESK-01", 25_000).await;
    receive(&db, &desk, Warehouse::Main, 100, 12_000).await;

    let transfer = db
        .transfers()
        .create(&NewTransfer {
            from_warehouse: Warehouse::Main,
            to_warehouse: Warehouse::North,
            product_id: desk.id.clone(),
            quantity: 40,
            driver: Some("Sam".to_string()),
            created_by: None,
        })
        .await
        .unwrap();

    // Nothing moves until reconciliation.
    for status in [
        TransferStatus::Approved,
        TransferStatus::InTransit,
        TransferStatus::Received,
    ] {
        db.transfers()
            .update(&transfer.id, &status_update(status, None))
            .await
            .unwrap();
        assert_eq!(level(&db, &desk, Warehouse::Main).await, 100);
        assert_eq!(level(&db, &desk, Warehouse::North).await, 0);
    }

    let done = db
        .transfers()
        .update(&transfer.id, &status_update(TransferStatus::Reconciled, Some(40)))
        .await
        .unwrap();
    assert_eq!(done.status, TransferStatus::Reconciled);
    assert!(!done.has_mismatch());

    let main = level(&db, &desk, Warehouse::Main).await;
    let north = level(&db, &desk, Warehouse::North).await;
    assert_eq!((main, north), (60, 40));
    assert_eq!(db.stock().total_quantity(&desk.id).await.unwrap(), 100);

    // A second reconcile is rejected and applies nothing.
    let err = db
        .transfers()
        .update(&transfer.id, &status_update(TransferStatus::Reconciled, Some(40)))
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_domain(),
        Some(CoreError::InvalidTransferTransition { .. })
    ));
    assert_eq!(level(&db, &desk, Warehouse::Main).await, 60);
    assert_eq!(level(&db, &desk, Warehouse::North).await, 40);
    assert_eq!(db.transfers().count_open().await.unwrap(), 0);
}

#[tokio::test]
async fn test_short_delivery_loses_only_the_variance() {
    let db = db().await;
    let chair = product(&db, "CHAIR-02", 9_000).await;
    receive(&db, &chair, Warehouse::Main, 50, 4_000).await;

    let transfer = db
        .transfers()
        .create(&NewTransfer {
            from_warehouse: Warehouse::Main,
            to_warehouse: Warehouse::South,
            product_id: chair.id.clone(),
            quantity: 20,
            driver: None,
            created_by: None,
        })
        .await
        .unwrap();

    let done = db
        .transfers()
        .update(&transfer.id, &status_update(TransferStatus::Reconciled, Some(17)))
        .await
        .unwrap();

    assert!(done.has_mismatch());
    assert_eq!(done.variance(), -3);
    assert_eq!(level(&db, &chair, Warehouse::Main).await, 30);
    assert_eq!(level(&db, &chair, Warehouse::South).await, 17);
    assert_eq!(db.stock().total_quantity(&chair.id).await.unwrap(), 47);

    let mismatched = db.transfers().list_mismatched().await.unwrap();
    assert_eq!(mismatched.len(), 1);
    assert_eq!(mismatched[0].id, transfer.id);
}

// =============================================================================
// Average cost
// =============================================================================

#[tokio::test]
async fn test_cost_price_tracks_weighted_average() {
    let db = db().await;
    let lamp = product(&db, "LAMP-03", 4_500).await;

    let receipts = [(10, 1_000), (5, 1_300), (3, 999), (7, 1_150)];
    let mut seen = Vec::new();

    for (i, (qty, cost)) in receipts.iter().enumerate() {
        // Alternate warehouses; the average is per product, not per location.
        let wh = if i % 2 == 0 { Warehouse::Main } else { Warehouse::East };
        let cost_price = receive(&db, &lamp, wh, *qty, *cost).await;
        seen.push((*qty, *cost));

        assert_eq!(cost_price, expected_average(&seen), "after receipt {}", i + 1);
    }

    let stored = db.products().get_by_id(&lamp.id).await.unwrap().unwrap();
    assert_eq!(stored.cost_price_cents, expected_average(&receipts));
    assert_eq!(db.stock().total_quantity(&lamp.id).await.unwrap(), 25);
}

#[tokio::test]
async fn test_average_cost_rounds_half_to_even() {
    let db = db().await;

    let a = product(&db, "PEN-A", 200).await;
    receive(&db, &a, Warehouse::Main, 1, 100).await;
    assert_eq!(receive(&db, &a, Warehouse::Main, 1, 101).await, 100);

    let b = product(&db, "PEN-B", 200).await;
    receive(&db, &b, Warehouse::Main, 1, 101).await;
    assert_eq!(receive(&db, &b, Warehouse::Main, 1, 102).await, 102);
}

async fn remove(db: &Database, product: &Product, qty: i64) {
    db.stock()
        .adjust(&NewAdjustment {
            product_id: product.id.clone(),
            warehouse: Warehouse::Main,
            quantity: -qty,
            reason: AdjustmentReason::Damage,
            note: String::new(),
            created_by: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_average_cost_uses_remaining_units_after_removal() {
    let db = db().await;
    let vase = product(&db, "VASE-04", 900).await;

    receive(&db, &vase, Warehouse::Main, 10, 100).await;
    // FIFO removal leaves 2 units of the first lot.
    remove(&db, &vase, 8).await;

    // (2 × 100 + 10 × 200) / 12 = 183.33
    let cost = receive(&db, &vase, Warehouse::Main, 10, 200).await;
    assert_eq!(cost, expected_average(&[(2, 100), (10, 200)]));
    assert_eq!(cost, 183);

    let remaining: Vec<i64> = db
        .stock()
        .batches(&vase.id)
        .await
        .unwrap()
        .iter()
        .map(|b| b.remaining_quantity)
        .collect();
    assert_eq!(remaining, vec![2, 10]);
    assert_eq!(db.stock().total_quantity(&vase.id).await.unwrap(), 12);
}

#[tokio::test]
async fn test_average_cost_after_lifo_removal() {
    let db = db().await;
    let rug = db
        .products()
        .create(&ProductInput {
            name: "Wool Rug".to_string(),
            sku: "RUG-05".to_string(),
            category: Default::default(),
            price_cents: 5_000,
            cost_price_cents: 0,
            valuation_method: ValuationMethod::Lifo,
            length_cm_hundredths: 0,
            width_cm_hundredths: 0,
            height_cm_hundredths: 0,
        })
        .await
        .unwrap();

    receive(&db, &rug, Warehouse::Main, 10, 100).await;
    assert_eq!(receive(&db, &rug, Warehouse::Main, 10, 200).await, 150);

    // LIFO takes 8 from the 200-cent lot; the removal leaves cost untouched.
    remove(&db, &rug, 8).await;
    let stored = db.products().get_by_id(&rug.id).await.unwrap().unwrap();
    assert_eq!(stored.cost_price_cents, 150);

    // (10 × 100 + 2 × 200 + 4 × 300) / 16 = 162.5 → 162
    let cost = receive(&db, &rug, Warehouse::Main, 4, 300).await;
    assert_eq!(cost, expected_average(&[(10, 100), (2, 200), (4, 300)]));
    assert_eq!(cost, 162);
}

// =============================================================================
// Invoices
// =============================================================================

#[tokio::test]
async fn test_invoice_total_matches_lines() {
    let db = db().await;
    let buyer = customer(&db, "buyer@acme.test").await;
    let desk = product(&db, "DESK-10", 25_000).await;
    let lamp = product(&db, "LAMP-10", 4_500).await;

    // (lines as (product, qty, unit price), discount)
    let cases: Vec<(Vec<(&Product, i64, i64)>, i64)> = vec![
        (vec![(&desk, 1, 25_000)], 0),
        (vec![(&desk, 2, 24_000), (&lamp, 3, 4_500)], 1_500),
        (vec![(&lamp, 1, 0)], 0),
        (vec![(&lamp, 4, 4_499), (&desk, 1, 1)], 17_997),
    ];

    for (n, (lines, discount)) in cases.into_iter().enumerate() {
        let items: Vec<LineItem> = lines
            .iter()
            .map(|(p, qty, price)| LineItem {
                product_id: p.id.clone(),
                quantity: *qty,
                price_cents: *price,
            })
            .collect();
        let expected: i64 = lines.iter().map(|(_, q, p)| q * p).sum::<i64>() - discount;

        let detail = db
            .invoices()
            .create(&InvoiceInput {
                customer_id: buyer.id.clone(),
                invoice_number: format!("INV-{:04}", n + 1),
                date: day(5),
                discount_cents: discount,
                created_by: None,
                items,
            })
            .await
            .unwrap();

        assert_eq!(detail.invoice.total_cents, expected, "case {}", n + 1);
        assert_eq!(detail.items.len(), lines.len());

        let reloaded = db.invoices().get(&detail.invoice.id).await.unwrap().unwrap();
        assert_eq!(reloaded.total_cents, expected);
    }
}

#[tokio::test]
async fn test_payment_status_follows_amount_paid() {
    let db = db().await;
    let buyer = customer(&db, "ap@globex.test").await;
    let desk = product(&db, "DESK-20", 10_000).await;

    let detail = db
        .invoices()
        .create(&InvoiceInput {
            customer_id: buyer.id.clone(),
            invoice_number: "INV-2001".to_string(),
            date: day(10),
            discount_cents: 0,
            created_by: None,
            items: vec![LineItem {
                product_id: desk.id.clone(),
                quantity: 1,
                price_cents: 10_000,
            }],
        })
        .await
        .unwrap();
    let id = detail.invoice.id.clone();
    assert_eq!(detail.invoice.status, InvoiceStatus::Unpaid);

    let pay = |amount: i64| NewPayment {
        invoice_id: id.clone(),
        amount_cents: amount,
        date: day(12),
        method: PaymentMethod::Transfer,
        reference: String::new(),
        note: String::new(),
        created_by: None,
    };

    let (_, invoice) = db.invoices().record_payment(&pay(2_500)).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Partial);
    assert_eq!(invoice.amount_paid_cents, 2_500);
    assert_eq!(db.invoices().balance_due(&id).await.unwrap().cents(), 7_500);

    let (_, invoice) = db.invoices().record_payment(&pay(7_499)).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Partial);

    let (_, invoice) = db.invoices().record_payment(&pay(1)).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.amount_paid_cents, invoice.total_cents);
    assert_eq!(db.invoices().payments(&id).await.unwrap().len(), 3);
}
