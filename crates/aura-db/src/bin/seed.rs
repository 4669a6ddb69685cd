//! # Seed Data Generator
//!
//! Populates a development database with salon cancellation policies and
//! customer loyalty balances.
//!
//! ## Usage
//! ```bash
//! # 10 salons, 50 customers (default)
//! cargo run -p aura-db --bin seed
//!
//! # Custom amounts and path
//! cargo run -p aura-db --bin seed -- --salons 25 --customers 200 --db ./data/aura.db
//! ```
//!
//! ## Generated Data
//! - `salon-NNN`: notice periods cycle through 12/24/48 hours, every third
//!   salon keeps its policy inactive
//! - `customer-NNN`: opening balances from 0 to 2,400 points

use aura_core::cancellation::CancellationPolicy;
use aura_db::{Database, DbConfig, LedgerOutcome};
use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (notice hours, late %, no-show %)
const POLICY_SHAPES: &[(u32, u8, u8)] = &[(12, 25, 100), (24, 50, 100), (48, 50, 80)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut salons: usize = 10;
    let mut customers: usize = 50;
    let mut db_path = String::from("./aura_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--salons" | "-s" => {
                if i + 1 < args.len() {
                    salons = args[i + 1].parse().unwrap_or(salons);
                    i += 1;
                }
            }
            "--customers" | "-c" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(customers);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Aura Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --salons <N>      Salons with a saved policy (default: 10)");
                println!("  -c, --customers <N>   Customers with a loyalty balance (default: 50)");
                println!("  -d, --db <PATH>       Database file path (default: ./aura_dev.db)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, salons, customers, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let now = Utc::now();

    for n in 0..salons {
        let (hours, late, no_show) = POLICY_SHAPES[n % POLICY_SHAPES.len()];
        let policy = CancellationPolicy::new(
            format!("salon-{:03}", n),
            hours,
            late,
            no_show,
            n % 3 != 2,
            None,
        )?;
        db.policies().upsert(&policy, now).await?;
    }
    info!(salons, "Policies saved");

    let mut credited = 0;
    for n in 0..customers {
        let points = ((n * 37) % 25) as i64 * 100;
        if points == 0 {
            continue;
        }
        let customer_id = format!("customer-{:03}", n);
        match db
            .loyalty()
            .earn(&customer_id, points, &format!("seed:{customer_id}"), now)
            .await?
        {
            LedgerOutcome::Applied { .. } => credited += 1,
            LedgerOutcome::AlreadyApplied => {
                warn!(customer_id = %customer_id, "Already seeded, skipping")
            }
            LedgerOutcome::InsufficientBalance { .. } => {}
        }
    }
    info!(credited, "Loyalty balances seeded");

    db.close().await;
    Ok(())
}
