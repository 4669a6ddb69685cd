//! # aura-booking: Booking Orchestration for Aura
//!
//! This crate turns the pure rules in aura-core into a running booking
//! engine: it fetches catalog data, prices carts, stores appointments,
//! drives payments and refunds, and publishes lifecycle events.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BookingService                                  │
//! │                                                                         │
//! │   compose_quote   submit_booking   initiate / confirm / fail payment    │
//! │   suggest_addons  check_in         cancel_appointment / process_refund  │
//! │        │                │                       │                       │
//! │        ▼                ▼                       ▼                       │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────────────────────────┐   │
//! │  │ Suggestion │  │ aura-core  │  │ KeyedLocks (per appointment /    │   │
//! │  │ Service    │  │ rules      │  │ per refund) + CAS in aura-db     │   │
//! │  └─────┬──────┘  └────────────┘  └──────────────────────────────────┘   │
//! │        │                                                                │
//! │        ▼   RetryPolicy (backoff) around read-only collaborators         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │ CatalogProvider │ HistoryProvider │ AcceptancePredictor          │   │
//! │  │ PaymentGateway  │ LoyaltyLedger                                  │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  EventBus (tokio broadcast) ──► dashboards, notifiers                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - `BookingService`: quotes, submission, check-in, policies
//! - [`payment`] - Payment initiation, confirmation and failure
//! - [`cancellation`] - Cancellation records and refund processing
//! - [`upsell`] - `SuggestionService` with tier degradation
//! - [`providers`] - Collaborator traits
//! - [`history`] / [`ledger`] / [`predictor`] - Built-in collaborators
//! - [`signature`] - HMAC check of payment callbacks
//! - [`retry`] - Exponential backoff for collaborator calls
//! - [`events`] / [`locks`] - Event fan-out and per-key serialization
//! - [`config`] / [`error`] - Configuration and error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aura_booking::{BookingConfig, BookingService};
//!
//! let config = BookingConfig::load_or_default(None);
//! let service = BookingService::open(catalog, gateway, config).await?;
//!
//! let appointment = service.submit_booking(&request).await?;
//! let order = service.initiate_payment(&appointment.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancellation;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod locks;
pub mod payment;
pub mod predictor;
pub mod providers;
pub mod retry;
pub mod service;
pub mod signature;
pub mod upsell;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    BookingConfig, DatabaseSettings, EventSettings, LoyaltySettings, PaymentSettings, RetrySettings,
};
pub use error::{BookingError, BookingResult};
pub use events::EventBus;
pub use history::SqliteHistoryProvider;
pub use ledger::SqliteLoyaltyLedger;
pub use predictor::HeuristicPredictor;
pub use providers::{
    AcceptancePredictor, CatalogProvider, GatewayOrder, HistoryProvider, LoyaltyLedger,
    PaymentCallback, PaymentGateway, PredictionRequest, RefundReceipt,
};
pub use retry::RetryPolicy;
pub use service::{BookingService, PolicyInput, QuoteRequest};
pub use signature::HmacSignatureVerifier;
pub use upsell::{SuggestionRequest, SuggestionService};
