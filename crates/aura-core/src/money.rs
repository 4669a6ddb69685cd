//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A cart priced in floating point rupees:                                │
//! │    499.99 × (1 - 0.23) = 384.99230000000003  ❌ WRONG!                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise + Basis Points                             │
//! │    49999 paise × 2300 bps / 10000 = 11500 paise discount (rounded)      │
//! │    49999 - 11500 = 38499 paise                                          │
//! │                                                                         │
//! │  Every rounding step is explicit and happens exactly once.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use aura_core::money::Money;
//!
//! let haircut = Money::from_rupees(500);
//! let facial = Money::from_paise(30_000);
//!
//! let total = haircut + facial;
//! assert_eq!(total.rupees(), 800);
//! assert_eq!(total.to_string(), "₹800.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in paise (1/100 of a rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate sums may go negative before flooring
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: serializes as a bare integer of paise
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Service.price ─┐                                                       │
/// │  Package.price ─┼──► PricingBreakdown.overall_total                     │
/// │  Offer.price   ─┤            │                                          │
/// │  Product × qty ─┘            ▼                                          │
/// │                   - redemption discount                                 │
/// │                              │                                          │
/// │                              ▼                                          │
/// │                     final_amount ──► PaymentOrder ──► Refund            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let price = Money::from_paise(49_950); // ₹499.50
    /// assert_eq!(price.paise(), 49_950);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    ///
    /// Loyalty points convert through here: one point is one rupee.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// assert_eq!(Money::from_paise(79_999).rupees(), 799);
    /// assert_eq!(Money::from_paise(-550).rupees(), -5);
    /// ```
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Every customer-facing amount (final amount, refund, offer price)
    /// passes through this before it is stored.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let shampoo = Money::from_rupees(349);
    /// assert_eq!(shampoo.multiply_quantity(2).rupees(), 698);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`. The i128 widening
    /// keeps large carts from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let amount = Money::from_paise(1_000);
    /// assert_eq!(amount.portion_bps(825).paise(), 83); // 82.5 → 83
    /// ```
    pub fn portion_bps(&self, bps: u32) -> Money {
        let portion = (self.0 as i128 * bps as i128 + (BPS_SCALE as i128 / 2)) / BPS_SCALE as i128;
        Money::from_paise(portion as i64)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let facial = Money::from_rupees(1_000);
    /// let discounted = facial.apply_percentage_discount(2_300); // 23% off
    /// assert_eq!(discounted.rupees(), 770);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        *self - self.portion_bps(discount_bps)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation for logs and debugging.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rupees_and_paise() {
        let money = Money::from_rupees(499);
        assert_eq!(money.paise(), 49_900);
        assert_eq!(Money::from_paise(49_950).rupees(), 499);
        assert_eq!(Money::from_paise(49_950).paise_part(), 50);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(109_900).to_string(), "₹1099.00");
        assert_eq!(Money::from_paise(550).to_string(), "₹5.50");
        assert_eq!(Money::from_paise(-550).to_string(), "-₹5.50");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_rupees(500);
        let b = Money::from_rupees(300);
        assert_eq!((a + b).rupees(), 800);
        assert_eq!((a - b).rupees(), 200);
        assert_eq!((a * 3).rupees(), 1_500);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.rupees(), 1_100);
    }

    #[test]
    fn test_portion_rounds_half_up() {
        // 333 paise × 15% = 49.95 → 50
        assert_eq!(Money::from_paise(333).portion_bps(1_500).paise(), 50);
        // 1000 paise × 0.05% = 0.5 → 1
        assert_eq!(Money::from_paise(1_000).portion_bps(5).paise(), 1);
    }

    #[test]
    fn test_percentage_discount() {
        let price = Money::from_rupees(800);
        assert_eq!(price.apply_percentage_discount(5_000).rupees(), 400);
        assert_eq!(price.apply_percentage_discount(0), price);
        assert!(price.apply_percentage_discount(10_000).is_zero());
    }

    #[test]
    fn test_floor_zero() {
        assert!(Money::from_paise(-1).floor_zero().is_zero());
        assert_eq!(Money::from_paise(42).floor_zero().paise(), 42);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_paise(-100).is_negative());
        assert_eq!(Money::from_paise(-100).abs().paise(), 100);
    }
}
