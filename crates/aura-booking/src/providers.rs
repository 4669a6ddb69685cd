//! # Collaborator Traits
//!
//! Everything the booking engine consumes but does not own.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BookingService                                                         │
//! │       │                                                                 │
//! │       ├── CatalogProvider      services / packages / offers / products  │
//! │       ├── HistoryProvider      loyalty count, past add-on purchases     │
//! │       ├── AcceptancePredictor  P(customer accepts an idle-slot add-on)  │
//! │       ├── PaymentGateway       orders, callback checks, refunds         │
//! │       └── LoyaltyLedger        balance, debit / credit / earn by key    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Read-only collaborators (catalog, history, predictor) may fail with
//! [`crate::BookingError::ProviderUnavailable`] and are retried; gateway and ledger
//! calls are not.

use async_trait::async_trait;
use aura_core::catalog::{AddOnOffer, Package, Product, Service};
use aura_core::money::Money;
use aura_core::types::DiscountRate;
use aura_core::upsell::CustomerHistory;
use aura_db::LedgerOutcome;
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::BookingResult;

// =============================================================================
// Catalog
// =============================================================================

/// Read-only access to a provider's offering. For freelancers the provider
/// id is passed as `salon_id`.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_services(&self, salon_id: &str) -> BookingResult<Vec<Service>>;

    async fn list_packages(&self, salon_id: &str) -> BookingResult<Vec<Package>>;

    /// Offers that are active and inside their validity window at `as_of`.
    async fn list_active_offers(
        &self,
        salon_id: &str,
        as_of: DateTime<Utc>,
    ) -> BookingResult<Vec<AddOnOffer>>;

    async fn list_products(&self, salon_id: &str) -> BookingResult<Vec<Product>>;
}

// =============================================================================
// Customer History & Prediction
// =============================================================================

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn get_history(&self, customer_id: &str, salon_id: &str) -> BookingResult<CustomerHistory>;
}

/// Inputs for an acceptance estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub customer_id: String,
    pub salon_id: String,
    pub gap_size_minutes: u32,
    pub day_of_week: Weekday,
    /// Discount the idle tier would start from.
    pub proposed_discount: DiscountRate,
    pub history: Option<CustomerHistory>,
}

#[async_trait]
pub trait AcceptancePredictor: Send + Sync {
    /// Probability in `[0, 1]` that the customer takes an idle-slot add-on.
    async fn predict(&self, request: &PredictionRequest) -> BookingResult<f64>;
}

// =============================================================================
// Payment Gateway
// =============================================================================

/// An order opened at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub order_ref: String,
    pub amount_paise: i64,
    pub currency: String,
}

/// The gateway's success callback as forwarded by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub appointment_id: String,
    pub order_ref: String,
    pub payment_ref: String,
    /// Hex-encoded HMAC-SHA256 of `order_ref|payment_ref`.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundReceipt {
    pub refund_ref: String,
    pub amount_paise: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens an order keyed by the appointment id.
    async fn create_order(
        &self,
        appointment_id: &str,
        amount: Money,
        currency: &str,
    ) -> BookingResult<GatewayOrder>;

    /// Checks a callback's signature with the gateway.
    async fn verify(&self, callback: &PaymentCallback) -> BookingResult<bool>;

    async fn report_failure(&self, appointment_id: &str, reason: &str) -> BookingResult<()>;

    async fn refund(&self, order_ref: &str, amount: Money) -> BookingResult<RefundReceipt>;
}

// =============================================================================
// Loyalty Ledger
// =============================================================================

/// Point balances with idempotent writes: a second call with the same key
/// returns [`LedgerOutcome::AlreadyApplied`] and changes nothing.
#[async_trait]
pub trait LoyaltyLedger: Send + Sync {
    async fn get_balance(&self, customer_id: &str) -> BookingResult<i64>;

    async fn debit(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome>;

    /// Returns redeemed points to the customer.
    async fn credit(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome>;

    /// Awards new points; counts toward the customer's tier.
    async fn earn(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome>;
}
