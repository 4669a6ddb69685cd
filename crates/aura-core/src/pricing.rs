//! # Pricing Aggregator
//!
//! Turns a resolved [`BookingCart`] into the single authoritative total.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  service_total  = Σ package price + Σ services not inside a package     │
//! │  addon_total    = Σ estimated × (1 − discount)                          │
//! │  offers_total   = Σ offer discounted price (floored at 0)               │
//! │  product_total  = Σ unit price × quantity                               │
//! │  home fee       = fixed surcharge when a home visit                     │
//! │  ───────────────────────────────────────────────────────────            │
//! │  overall_total  = sum of the above                                      │
//! │  discount       = redeemed points (1 pt = ₹1), validated                │
//! │  final_amount   = max(0, overall_total − discount)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Redemption Rules
//! Points must be a multiple of the block (100), at least one block, no
//! more than the balance, and no more than `floor(overall_rupees/100)*100`.
//! [`compute_total`] rejects anything else; [`clamp_redemption`] is the
//! forgiving variant for live UI sliders and is never used at submission.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::selection::BookingCart;
use crate::REDEMPTION_BLOCK_POINTS;

// =============================================================================
// Configuration & Inputs
// =============================================================================

fn default_home_service_fee() -> i64 {
    20_000
}

fn default_redemption_block() -> i64 {
    REDEMPTION_BLOCK_POINTS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat surcharge for a home visit, in paise.
    #[serde(default = "default_home_service_fee")]
    pub home_service_fee_paise: i64,
    /// Points are redeemed in whole blocks of this size.
    #[serde(default = "default_redemption_block")]
    pub redemption_block_points: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            home_service_fee_paise: default_home_service_fee(),
            redemption_block_points: default_redemption_block(),
        }
    }
}

impl PricingConfig {
    #[inline]
    pub fn home_service_fee(&self) -> Money {
        Money::from_paise(self.home_service_fee_paise)
    }
}

/// The customer's redemption choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedemptionRequest {
    pub use_points: bool,
    pub points_to_redeem: i64,
}

impl RedemptionRequest {
    pub const fn none() -> Self {
        Self {
            use_points: false,
            points_to_redeem: 0,
        }
    }

    pub const fn points(points: i64) -> Self {
        Self {
            use_points: true,
            points_to_redeem: points,
        }
    }
}

/// Component totals and the final amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingBreakdown {
    pub service_total: Money,
    pub addon_total: Money,
    pub offers_total: Money,
    pub product_total: Money,
    pub home_service_fee: Money,
    pub overall_total: Money,
    /// Points applied (0 when not redeeming).
    pub points_redeemed: i64,
    pub discount_amount: Money,
    pub final_amount: Money,
    /// Largest redeemable amount for this cart, before the balance check.
    pub redemption_cap_points: i64,
}

// =============================================================================
// Component Totals
// =============================================================================

/// Packages at their effective price plus individually selected services
/// that no selected package already contains.
pub fn service_total(cart: &BookingCart) -> Money {
    let packages: Money = cart.packages.iter().map(|p| p.effective_price()).sum();
    let singles: Money = cart
        .services
        .iter()
        .filter(|s| !cart.is_covered_by_package(&s.id))
        .map(|s| s.effective_price())
        .sum();
    packages + singles
}

pub fn addon_total(cart: &BookingCart) -> Money {
    cart.addons.iter().map(|a| a.discounted_price()).sum()
}

pub fn offers_total(cart: &BookingCart) -> Money {
    cart.offers.iter().map(|o| o.discounted_price()).sum()
}

pub fn product_total(cart: &BookingCart) -> Money {
    cart.products.iter().map(|l| l.line_total()).sum()
}

// =============================================================================
// Redemption
// =============================================================================

/// `floor(overall_rupees / block) × block`, never negative.
pub fn redemption_cap(overall_total: Money, block: i64) -> i64 {
    let block = block.max(1);
    (overall_total.rupees().max(0) / block) * block
}

/// Strict redemption check used at submission.
///
/// Returns the discount to apply.
pub fn validate_redemption(
    request: &RedemptionRequest,
    points_available: i64,
    overall_total: Money,
    config: &PricingConfig,
) -> CoreResult<Money> {
    if !request.use_points {
        return Ok(Money::zero());
    }

    let requested = request.points_to_redeem;
    let block = config.redemption_block_points.max(1);
    let reject = |reason: String| CoreError::InvalidRedemption { requested, reason };

    if requested < block {
        return Err(reject(format!("minimum redemption is {} points", block)));
    }
    if requested % block != 0 {
        return Err(reject(format!("must be a multiple of {}", block)));
    }
    if requested > points_available {
        return Err(reject(format!(
            "only {} points available",
            points_available.max(0)
        )));
    }
    let cap = redemption_cap(overall_total, block);
    if requested > cap {
        return Err(reject(format!("at most {} points can be redeemed on this booking", cap)));
    }

    Ok(Money::from_rupees(requested))
}

/// Forgiving clamp for interactive composition.
///
/// Rounds down to the block and clamps to `min(balance, cap)`; returns 0
/// when not even one block is redeemable.
///
/// ## Example
/// ```rust
/// use aura_core::money::Money;
/// use aura_core::pricing::{clamp_redemption, PricingConfig};
///
/// let cfg = PricingConfig::default();
/// assert_eq!(clamp_redemption(250, 500, Money::from_rupees(1_000), &cfg), 200);
/// assert_eq!(clamp_redemption(900, 500, Money::from_rupees(1_000), &cfg), 500);
/// assert_eq!(clamp_redemption(300, 50, Money::from_rupees(1_000), &cfg), 0);
/// ```
pub fn clamp_redemption(
    requested: i64,
    points_available: i64,
    overall_total: Money,
    config: &PricingConfig,
) -> i64 {
    let block = config.redemption_block_points.max(1);
    let ceiling = points_available.min(redemption_cap(overall_total, block));
    let ceiling = (ceiling.max(0) / block) * block;
    let rounded = (requested.max(0) / block) * block;
    let clamped = rounded.min(ceiling);
    if clamped < block {
        0
    } else {
        clamped
    }
}

// =============================================================================
// Total
// =============================================================================

/// Computes the authoritative breakdown for a cart.
///
/// ## Errors
/// - [`CoreError::EmptySelection`] when the cart has nothing bookable
/// - [`CoreError::InvalidRedemption`] when the redemption breaks a rule
///
/// ## Example
/// ```rust
/// use aura_core::catalog::Service;
/// use aura_core::pricing::{compute_total, PricingConfig, RedemptionRequest};
/// use aura_core::selection::BookingCart;
///
/// let svc = |id: &str, price, discounted| Service {
///     id: id.into(),
///     name: id.into(),
///     category: "hair".into(),
///     price_paise: price,
///     discounted_price_paise: discounted,
///     duration_minutes: 30,
/// };
/// let cart = BookingCart {
///     services: vec![svc("a", 50_000, None), svc("b", 40_000, Some(30_000))],
///     ..Default::default()
/// };
///
/// let b = compute_total(&cart, false, &RedemptionRequest::none(), 0, &PricingConfig::default()).unwrap();
/// assert_eq!(b.overall_total.rupees(), 800);
/// assert_eq!(b.final_amount.rupees(), 800);
/// ```
pub fn compute_total(
    cart: &BookingCart,
    home_service: bool,
    redemption: &RedemptionRequest,
    points_available: i64,
    config: &PricingConfig,
) -> CoreResult<PricingBreakdown> {
    if !cart.has_bookable_items() {
        return Err(CoreError::EmptySelection);
    }

    let service_total = service_total(cart);
    let addon_total = addon_total(cart);
    let offers_total = offers_total(cart);
    let product_total = product_total(cart);
    let home_service_fee = if home_service {
        config.home_service_fee()
    } else {
        Money::zero()
    };

    let overall_total = service_total + addon_total + offers_total + product_total + home_service_fee;
    let discount_amount = validate_redemption(redemption, points_available, overall_total, config)?;
    let final_amount = (overall_total - discount_amount).floor_zero();

    Ok(PricingBreakdown {
        service_total,
        addon_total,
        offers_total,
        product_total,
        home_service_fee,
        overall_total,
        points_redeemed: if redemption.use_points {
            redemption.points_to_redeem
        } else {
            0
        },
        discount_amount,
        final_amount,
        redemption_cap_points: redemption_cap(overall_total, config.redemption_block_points),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
