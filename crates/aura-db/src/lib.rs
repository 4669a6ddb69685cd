//! # aura-db: Database Layer for Aura
//!
//! SQLite persistence for appointments, payment orders, loyalty, cancellation
//! policies and records, and add-on sales.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aura Data Flow                                   │
//! │                                                                         │
//! │  BookingService (aura-booking)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     aura-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ AppointmentRepo    │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ PaymentOrderRepo   │  │ 001_init   │  │   │
//! │  │   │ Connection    │    │ LoyaltyRepo        │  │            │  │   │
//! │  │   │ Management    │    │ PolicyRepo         │  │            │  │   │
//! │  │   │               │    │ CancellationRepo   │  │            │  │   │
//! │  │   │               │    │ AddonSaleRepo      │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every status change is a conditional `UPDATE ... WHERE status = ?`. A
//! caller that loses a race sees zero affected rows and re-reads. Payment
//! order uniqueness and ledger idempotency are enforced by indexes, not by
//! in-process locks.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aura_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("aura.db")).await?;
//! let appointment = db.appointments().get(&id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::addon_sale::AddonSaleRepository;
pub use repository::appointment::{AppointmentRepository, StatusChange};
pub use repository::cancellation::CancellationRepository;
pub use repository::loyalty::{LedgerOutcome, LoyaltyRepository};
pub use repository::payment::PaymentOrderRepository;
pub use repository::policy::PolicyRepository;
