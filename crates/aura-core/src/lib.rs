//! # aura-core: Pure Booking & Pricing Logic
//!
//! This crate is the **heart** of the Aura booking engine. It contains all
//! booking rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aura Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Client (salon app / customer app)                  │   │
//! │  │   Browse ──► Cart ──► Suggestions ──► Checkout ──► Pay          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              aura-booking (BookingService)                      │   │
//! │  │   catalog / history / predictor / gateway / ledger adapters     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aura-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │selection │ │ pricing  │ │ upsell   │ │ cancellation     │  │   │
//! │  │   │ normalize│ │ totals   │ │ 3 tiers  │ │ classify/refund  │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │lifecycle │ │ booking  │ │ schedule │ │ money / types    │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK READS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    aura-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in paise with integer arithmetic
//! - [`types`] - Appointment, payment order, loyalty, discount rate
//! - [`catalog`] - Services, packages, add-on offers, products
//! - [`selection`] - Wire cart normalization and catalog resolution
//! - [`pricing`] - The pricing aggregator and redemption rules
//! - [`upsell`] - The three-tier add-on suggestion decision
//! - [`schedule`] - Idle-slot detection
//! - [`lifecycle`] - Appointment state machine
//! - [`booking`] - Submission validation and freezing
//! - [`cancellation`] - Policy, classification, refunds
//! - [`events`] - Typed domain events
//! - [`error`] / [`validation`] - Error taxonomy and field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use aura_core::money::Money;
//! use aura_core::cancellation::compute_refund;
//!
//! // ₹1000 paid, 50% late-cancellation fee
//! let refund = compute_refund(Money::from_rupees(1_000), 50);
//! assert_eq!(refund.rupees(), 500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking;
pub mod cancellation;
pub mod catalog;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod schedule;
pub mod selection;
pub mod types;
pub mod upsell;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use events::DomainEvent;
pub use lifecycle::AppointmentStatus;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum entries in a single selection.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Loyalty points are redeemed in blocks of this size (1 point = ₹1).
pub const REDEMPTION_BLOCK_POINTS: i64 = 100;

/// Hard ceiling for any upsell discount (30%). Configured caps must not
/// exceed it.
pub const MAX_UPSELL_DISCOUNT_BPS: u32 = 3_000;

/// Longest allowed cancellation notice period (one week).
pub const MAX_NOTICE_PERIOD_HOURS: u32 = 168;

/// Longest customer note accepted with a booking.
pub const MAX_NOTES_LENGTH: usize = 1_000;

/// Currency of every amount in the engine.
pub const CURRENCY: &str = "INR";
