//! # Repository Module
//!
//! Database repository implementations for the booking engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BookingService                                                         │
//! │       │                                                                 │
//! │       │  db.appointments().apply(&id, change)                           │
//! │       ▼                                                                 │
//! │  AppointmentRepository                                                  │
//! │  ├── insert / get / get_by_id                                           │
//! │  ├── apply (compare-and-set status)                                     │
//! │  ├── check_in                                                           │
//! │  └── cancel_with_record (one transaction)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`appointment::AppointmentRepository`] - Appointments and schedule reads
//! - [`payment::PaymentOrderRepository`] - Gateway orders
//! - [`loyalty::LoyaltyRepository`] - Balances and the idempotent ledger
//! - [`policy::PolicyRepository`] - Salon cancellation policies
//! - [`cancellation::CancellationRepository`] - Cancellation records and refunds
//! - [`addon_sale::AddonSaleRepository`] - Sold add-on offers

pub mod addon_sale;
pub mod appointment;
pub mod cancellation;
pub mod loyalty;
pub mod payment;
pub mod policy;
