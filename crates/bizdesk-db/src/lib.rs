//! # bizdesk-db: Database Layer for bizdesk
//!
//! SQLite persistence for the back office, built on sqlx. Every rule it
//! enforces comes from `bizdesk-core`; this crate adds transactions, the
//! schema and the queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bizdesk Data Flow                                │
//! │                                                                         │
//! │  Caller (admin CLI, web handler)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bizdesk-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Stock         │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Transfer      │    │ 001_inventory│  │   │
//! │  │   │ AppConfig     │    │ Invoice       │    │ 002_sales_.. │  │   │
//! │  │   │               │    │ Staff         │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (BIZDESK_DB_PATH)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven application settings
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bizdesk_db::{AppConfig, Database};
//!
//! let config = AppConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let outcome = db.stock().receive(&receipt).await?;
//! println!("new cost price: {}", outcome.cost_price);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::invoice::{CustomerRepository, InvoiceRepository};
pub use repository::product::ProductRepository;
pub use repository::staff::StaffRepository;
pub use repository::stock::{AdjustmentOutcome, LowStockItem, ReceiptOutcome, StockRepository};
pub use repository::transfer::TransferRepository;
