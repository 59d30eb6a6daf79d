//! # bizdesk-admin
//!
//! Operator command line for a bizdesk database.
//!
//! ## Usage
//! ```bash
//! # Apply pending migrations
//! cargo run -p bizdesk-db --bin bizdesk-admin -- migrate
//!
//! # Schema state, catalogue size, open transfers, stock value
//! cargo run -p bizdesk-db --bin bizdesk-admin -- status
//!
//! # Stock rows under the configured threshold (add --json for machine output)
//! cargo run -p bizdesk-db --bin bizdesk-admin -- low-stock --json
//!
//! # Open transfers and reconciled transfers with a quantity mismatch
//! cargo run -p bizdesk-db --bin bizdesk-admin -- transfers
//! ```
//!
//! Settings come from `BIZDESK_*` variables (see `bizdesk_db::config`);
//! log verbosity from `RUST_LOG`.

use std::env;
use std::str::FromStr;

use bizdesk_db::{migrations, AppConfig, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Subcommands understood by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Migrate,
    Status,
    LowStock,
    Transfers,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "help" | "-h" | "--help" => Ok(Command::Help),
            "migrate" => Ok(Command::Migrate),
            "status" => Ok(Command::Status),
            "low-stock" => Ok(Command::LowStock),
            "transfers" => Ok(Command::Transfers),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");

    // A typo must exit non-zero so scripts notice.
    let command = match args.first().map(String::as_str).unwrap_or("help").parse::<Command>() {
        Ok(Command::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(command) => command,
        Err(message) => {
            print_usage();
            return Err(message.into());
        }
    };

    let config = AppConfig::from_env()?;
    info!(path = %config.db_path.display(), ?command, "bizdesk-admin starting");

    // Only `migrate` changes the schema.
    let db = Database::new(config.db_config().run_migrations(false)).await?;

    let result = match command {
        Command::Migrate => migrate(&db).await,
        Command::Status => status(&db, &config).await,
        Command::LowStock => low_stock(&db, &config, json).await,
        Command::Transfers => transfers(&db, json).await,
        Command::Help => Ok(()),
    };

    db.close().await;
    result
}

/// Sets up logging. `RUST_LOG` wins over the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bizdesk=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_usage() {
    println!("bizdesk-admin");
    println!();
    println!("Usage: bizdesk-admin <COMMAND> [--json]");
    println!();
    println!("Commands:");
    println!("  migrate      Apply pending migrations");
    println!("  status       Migration state and headline figures");
    println!("  low-stock    Stock rows below BIZDESK_LOW_STOCK_THRESHOLD");
    println!("  transfers    Open and mismatched transfers");
}

async fn migrate(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let before = migrations::migration_status(db.pool()).await?;
    db.run_migrations().await?;
    println!("Applied {} migration(s); {} total", before.pending(), before.total);
    Ok(())
}

async fn status(db: &Database, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let schema = migrations::migration_status(db.pool()).await?;
    println!("Database:     {}", config.db_path.display());
    println!("Migrations:   {}/{} applied", schema.applied, schema.total);

    if !schema.is_up_to_date() {
        println!("Run `bizdesk-admin migrate` before using this database.");
        return Ok(());
    }

    let products = db.products().count().await?;
    let open = db.transfers().count_open().await?;
    let value = db.stock().valuation().await?;
    let low = db.stock().low_stock(config.low_stock_threshold).await?;

    println!("Products:     {}", products);
    println!("Open transfers: {}", open);
    println!("Low stock rows: {}", low.len());
    println!("Stock value:  {}", config.format_money(value.cents()));
    Ok(())
}

async fn low_stock(
    db: &Database,
    config: &AppConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = db.stock().low_stock(config.low_stock_threshold).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing below {} units", config.low_stock_threshold);
        return Ok(());
    }

    for item in &items {
        println!(
            "{:<20} {:<30} {:<18} {:>6}",
            item.sku,
            item.name,
            item.warehouse.display_name(),
            item.quantity
        );
    }
    Ok(())
}

async fn transfers(db: &Database, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let open = db.transfers().list_open().await?;
    let mismatched = db.transfers().list_mismatched().await?;

    if json {
        let report = serde_json::json!({ "open": open, "mismatched": mismatched });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Open transfers: {}", open.len());
    for t in &open {
        println!(
            "  {}  {} -> {}  qty {}  [{}]",
            t.id, t.from_warehouse, t.to_warehouse, t.quantity, t.status
        );
    }

    println!("Mismatched: {}", mismatched.len());
    for t in &mismatched {
        println!(
            "  {}  requested {} received {}  {}",
            t.id,
            t.quantity,
            t.actual_quantity_received.unwrap_or_default(),
            t.mismatch_reason.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
