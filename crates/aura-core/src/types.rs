//! # Domain Types
//!
//! Core domain types shared by pricing, lifecycle and persistence.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Appointment    │   │  PaymentOrder   │   │ LoyaltyAccount  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  provider       │   │  appointment_id │   │  points_balance │       │
//! │  │  items (frozen) │   │  order_ref      │   │  points_earned  │       │
//! │  │  final_amount   │   │  amount_paise   │   │  tier (derived) │       │
//! │  │  status         │   │  status         │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DiscountRate   │   │ BookingProvider │   │   AddonSale     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Salon(id)      │   │  price          │       │
//! │  │  2000 = 20%     │   │  Freelancer(id) │   │  commission     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Booked items and product lines copy name and price at submission time.
//! Later catalog edits never change what the customer agreed to pay.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::lifecycle::AppointmentStatus;
use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// A discount fraction in basis points (10000 = 100%).
///
/// Upsell discounts live in `[0, 3000]`; offer percentages and commission
/// rates use the full range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from a whole percentage (e.g. an offer's `20`).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        DiscountRate(percent * 100)
    }

    /// Creates a rate from a fraction in `[0, 1]`, rounding to the nearest bp.
    ///
    /// Out-of-range and non-finite inputs are clamped.
    pub fn from_fraction(fraction: f64) -> Self {
        if !fraction.is_finite() || fraction <= 0.0 {
            return DiscountRate(0);
        }
        DiscountRate((fraction.min(1.0) * 10_000.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction (for display and predictors only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    /// Adds `bps` and clamps the result to `cap`.
    #[inline]
    pub fn step_capped(&self, bps: u32, cap: DiscountRate) -> Self {
        DiscountRate(self.0.saturating_add(bps)).min(cap)
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Booking Provider
// =============================================================================

/// Who delivers the appointment. Salon and freelancer are mutually
/// exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BookingProvider {
    Salon(String),
    Freelancer(String),
}

impl BookingProvider {
    pub fn id(&self) -> &str {
        match self {
            BookingProvider::Salon(id) | BookingProvider::Freelancer(id) => id,
        }
    }

    /// Salon id when booked with a salon; freelancers carry no policy.
    pub fn salon_id(&self) -> Option<&str> {
        match self {
            BookingProvider::Salon(id) => Some(id),
            BookingProvider::Freelancer(_) => None,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            BookingProvider::Salon(_) => "salon",
            BookingProvider::Freelancer(_) => "freelancer",
        }
    }

    /// Rebuilds a provider from its stored `(kind, id)` columns.
    pub fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "salon" => Some(BookingProvider::Salon(id)),
            "freelancer" => Some(BookingProvider::Freelancer(id)),
            _ => None,
        }
    }
}

// =============================================================================
// Appointment
// =============================================================================

/// A service line frozen into an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookedItem {
    /// Service id, package id, or offer id when `is_offer`.
    pub service_id: String,
    pub name: String,
    pub price_paise: i64,
    pub duration_minutes: u32,
    pub is_offer: bool,
}

impl BookedItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }
}

/// A retail product line frozen into an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookedProduct {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_paise: i64,
}

impl BookedProduct {
    pub fn line_total(&self) -> Money {
        Money::from_paise(self.unit_price_paise).multiply_quantity(self.quantity)
    }
}

/// Home visit details. The fee is fixed, not per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HomeServiceDetails {
    pub address: String,
    pub fee_paise: i64,
}

/// Loyalty redemption frozen at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedemptionInfo {
    pub use_points: bool,
    pub points_to_redeem: i64,
    pub discount_paise: i64,
}

impl RedemptionInfo {
    /// Points that must be debited when the appointment is confirmed.
    pub fn points_to_debit(&self) -> i64 {
        if self.use_points {
            self.points_to_redeem
        } else {
            0
        }
    }
}

/// Gateway references attached to an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMeta {
    pub order_ref: Option<String>,
    pub payment_ref: Option<String>,
    pub failure_reason: Option<String>,
}

/// A booked appointment.
///
/// Everything except `status`, `payment`, `checked_in_at` and `updated_at`
/// is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Appointment {
    pub id: String,
    pub customer_id: String,
    pub provider: BookingProvider,
    pub staff_id: Option<String>,
    pub items: Vec<BookedItem>,
    pub products: Vec<BookedProduct>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "String")]
    pub time: NaiveTime,
    pub customer_notes: Option<String>,
    pub home_service: Option<HomeServiceDetails>,
    pub redemption: RedemptionInfo,
    pub total_paise: i64,
    pub final_amount_paise: i64,
    pub status: AppointmentStatus,
    pub payment: PaymentMeta,
    #[ts(as = "Option<String>")]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }

    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_paise(self.final_amount_paise)
    }

    /// Scheduled start. Dates and times are stored in UTC.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_time(self.time))
    }

    /// Total booked service time.
    pub fn duration_minutes(&self) -> u32 {
        self.items.iter().map(|i| i.duration_minutes).sum()
    }

    /// Items that came from add-on offers.
    pub fn offer_items(&self) -> impl Iterator<Item = &BookedItem> {
        self.items.iter().filter(|i| i.is_offer)
    }

    #[inline]
    pub fn is_checked_in(&self) -> bool {
        self.checked_in_at.is_some()
    }
}

// =============================================================================
// Payment Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOrderStatus {
    /// Open; at most one per appointment.
    Created,
    Paid,
    Failed,
}

/// A gateway order opened for an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentOrder {
    pub id: String,
    pub appointment_id: String,
    /// Opaque gateway reference.
    pub order_ref: String,
    pub amount_paise: i64,
    pub currency: String,
    pub status: PaymentOrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }
}

// =============================================================================
// Loyalty
// =============================================================================

/// Lifetime points earned needed for each tier above Standard.
pub const SILVER_TIER_POINTS: i64 = 500;
pub const GOLD_TIER_POINTS: i64 = 1_500;
pub const PLATINUM_TIER_POINTS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Standard,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn from_points_earned(points: i64) -> Self {
        match points {
            p if p >= PLATINUM_TIER_POINTS => LoyaltyTier::Platinum,
            p if p >= GOLD_TIER_POINTS => LoyaltyTier::Gold,
            p if p >= SILVER_TIER_POINTS => LoyaltyTier::Silver,
            _ => LoyaltyTier::Standard,
        }
    }
}

impl Default for LoyaltyTier {
    fn default() -> Self {
        LoyaltyTier::Standard
    }
}

/// A customer's loyalty balance. One point is worth one rupee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyAccount {
    pub customer_id: String,
    pub points_balance: i64,
    pub points_earned: i64,
    pub points_redeemed: i64,
}

impl LoyaltyAccount {
    pub fn empty(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            points_balance: 0,
            points_earned: 0,
            points_redeemed: 0,
        }
    }

    #[inline]
    pub fn tier(&self) -> LoyaltyTier {
        LoyaltyTier::from_points_earned(self.points_earned)
    }
}

// =============================================================================
// Add-on Sale
// =============================================================================

/// Permanent sale record created from a confirmed appointment's add-on offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddonSale {
    pub id: String,
    pub appointment_id: String,
    pub offer_id: String,
    pub service_name: String,
    pub price_paise: i64,
    pub admin_commission_paise: i64,
    pub salon_earning_paise: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Platform commission and salon earning for one sold add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub admin_commission: Money,
    pub salon_earning: Money,
}

impl CommissionSplit {
    /// Splits `price` so that the two halves always add back up to it.
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    /// use aura_core::types::{CommissionSplit, DiscountRate};
    ///
    /// let split = CommissionSplit::compute(Money::from_rupees(400), DiscountRate::from_percent(15));
    /// assert_eq!(split.admin_commission.rupees(), 60);
    /// assert_eq!(split.salon_earning.rupees(), 340);
    /// ```
    pub fn compute(price: Money, commission: DiscountRate) -> Self {
        let admin_commission = price.portion_bps(commission.bps());
        Self {
            admin_commission,
            salon_earning: price - admin_commission,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rate_conversions() {
        assert_eq!(DiscountRate::from_percent(15).bps(), 1_500);
        assert_eq!(DiscountRate::from_fraction(0.234).bps(), 2_340);
        assert_eq!(DiscountRate::from_fraction(-1.0).bps(), 0);
        assert_eq!(DiscountRate::from_fraction(f64::NAN).bps(), 0);
        assert_eq!(DiscountRate::from_fraction(7.0).bps(), 10_000);
        assert!((DiscountRate::from_bps(2_500).fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_discount_rate_step_capped() {
        let cap = DiscountRate::from_bps(3_000);
        assert_eq!(DiscountRate::from_bps(2_500).step_capped(300, cap).bps(), 2_800);
        assert_eq!(DiscountRate::from_bps(2_800).step_capped(300, cap).bps(), 3_000);
    }

    #[test]
    fn test_provider_serde_shape() {
        let provider = BookingProvider::Freelancer("f-9".to_string());
        let json = serde_json::to_value(&provider).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "freelancer", "id": "f-9"}));
        assert_eq!(provider.salon_id(), None);
        assert_eq!(
            BookingProvider::from_parts("salon", "s-1".to_string()),
            Some(BookingProvider::Salon("s-1".to_string()))
        );
        assert_eq!(BookingProvider::from_parts("spa", "x".to_string()), None);
    }

    #[test]
    fn test_loyalty_tiers() {
        assert_eq!(LoyaltyTier::from_points_earned(0), LoyaltyTier::Standard);
        assert_eq!(LoyaltyTier::from_points_earned(500), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_points_earned(1_499), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_points_earned(1_500), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_points_earned(9_000), LoyaltyTier::Platinum);
        assert_eq!(LoyaltyAccount::empty("c1").tier(), LoyaltyTier::Standard);
    }

    #[test]
    fn test_commission_split_is_exhaustive() {
        let price = Money::from_paise(33_333);
        let split = CommissionSplit::compute(price, DiscountRate::from_percent(15));
        assert_eq!(split.admin_commission + split.salon_earning, price);
        assert_eq!(split.admin_commission.paise(), 5_000);
    }

    #[test]
    fn test_redemption_points_to_debit() {
        let info = RedemptionInfo {
            use_points: false,
            points_to_redeem: 300,
            discount_paise: 0,
        };
        assert_eq!(info.points_to_debit(), 0);
        let info = RedemptionInfo {
            use_points: true,
            ..info
        };
        assert_eq!(info.points_to_debit(), 300);
    }
}
