//! # Repository Module
//!
//! One repository per area, each holding a clone of the pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database                                                               │
//! │  ├── products()   ProductRepository    catalogue                       │
//! │  ├── stock()      StockRepository      levels, receipts, adjustments   │
//! │  ├── transfers()  TransferRepository   transfer workflow               │
//! │  ├── customers()  CustomerRepository                                    │
//! │  ├── invoices()   InvoiceRepository    invoices, lines, payments       │
//! │  └── staff()      StaffRepository      profiles, KPIs, bonuses         │
//! │                                                                         │
//! │  Every multi-step write runs in one transaction (pool.begin()).        │
//! │  Rules come from bizdesk-core; SQL stays in this module.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod invoice;
pub mod product;
pub mod staff;
pub mod stock;
pub mod transfer;
