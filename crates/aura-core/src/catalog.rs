//! # Catalog Types
//!
//! Read-only catalog entries as delivered by the catalog provider.
//! The engine never mutates these; it snapshots them into
//! [`BookedItem`](crate::types::BookedItem)s at submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Service
// =============================================================================

/// A bookable service (haircut, facial, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price_paise: i64,
    pub discounted_price_paise: Option<i64>,
    pub duration_minutes: u32,
}

impl Service {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }

    /// Discounted price when the catalog carries one, else the base price.
    #[inline]
    pub fn effective_price(&self) -> Money {
        Money::from_paise(self.discounted_price_paise.unwrap_or(self.price_paise))
    }
}

// =============================================================================
// Package
// =============================================================================

/// A service referenced from inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackageService {
    pub service_id: String,
    pub name: String,
    pub price_paise: i64,
    pub duration_minutes: u32,
}

/// A bundle of services sold at one price.
///
/// ## Rules
/// - A service inside a selected package is never charged again when it is
///   also selected individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub services: Vec<PackageService>,
    pub total_price_paise: i64,
    pub discounted_price_paise: Option<i64>,
}

impl Package {
    #[inline]
    pub fn effective_price(&self) -> Money {
        Money::from_paise(self.discounted_price_paise.unwrap_or(self.total_price_paise))
    }

    pub fn contains_service(&self, service_id: &str) -> bool {
        self.services.iter().any(|s| s.service_id == service_id)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.services.iter().map(|s| s.duration_minutes).sum()
    }
}

// =============================================================================
// Add-on Offer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `discount_value` is a whole percentage in `[0, 100]`.
    Percentage,
    /// `discount_value` is an amount in paise, at most the base price.
    Fixed,
}

/// A promotional add-on offer published by a salon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddOnOffer {
    pub id: String,
    pub salon_id: String,
    pub service_name: String,
    pub base_price_paise: i64,
    pub discount_kind: DiscountKind,
    pub discount_value: i64,
    pub duration_minutes: u32,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl AddOnOffer {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_paise(self.base_price_paise)
    }

    /// Price after the offer's discount, floored at zero.
    ///
    /// ## Example
    /// ```rust
    /// # use chrono::Utc;
    /// use aura_core::catalog::{AddOnOffer, DiscountKind};
    ///
    /// let offer = AddOnOffer {
    ///     id: "o1".into(),
    ///     salon_id: "s1".into(),
    ///     service_name: "Head massage".into(),
    ///     base_price_paise: 40_000,
    ///     discount_kind: DiscountKind::Percentage,
    ///     discount_value: 25,
    ///     duration_minutes: 20,
    ///     start_date: Utc::now(),
    ///     end_date: Utc::now(),
    ///     is_active: true,
    /// };
    /// assert_eq!(offer.discounted_price().rupees(), 300);
    /// ```
    pub fn discounted_price(&self) -> Money {
        let base = self.base_price();
        let discounted = match self.discount_kind {
            DiscountKind::Percentage => {
                let percent = self.discount_value.clamp(0, 100) as u32;
                base.apply_percentage_discount(percent * 100)
            }
            DiscountKind::Fixed => base - Money::from_paise(self.discount_value),
        };
        discounted.floor_zero()
    }

    /// Active and inside its validity window at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}

// =============================================================================
// Product
// =============================================================================

/// A retail product sold alongside a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price_paise: i64,
    pub discounted_price_paise: Option<i64>,
}

impl Product {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.discounted_price_paise.unwrap_or(self.price_paise))
    }
}

/// A product with the quantity the customer picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductLine {
    pub product: Product,
    pub quantity: i64,
}

impl ProductLine {
    pub fn line_total(&self) -> Money {
        self.product.unit_price().multiply_quantity(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(kind: DiscountKind, value: i64) -> AddOnOffer {
        let now = Utc::now();
        AddOnOffer {
            id: "offer-1".to_string(),
            salon_id: "salon-1".to_string(),
            service_name: "Hand spa".to_string(),
            base_price_paise: 30_000,
            discount_kind: kind,
            discount_value: value,
            duration_minutes: 30,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            is_active: true,
        }
    }

    #[test]
    fn test_offer_discounts() {
        assert_eq!(offer(DiscountKind::Percentage, 20).discounted_price().rupees(), 240);
        assert_eq!(offer(DiscountKind::Fixed, 5_000).discounted_price().rupees(), 250);
        assert!(offer(DiscountKind::Fixed, 90_000).discounted_price().is_zero());
    }

    #[test]
    fn test_offer_validity_window() {
        let now = Utc::now();
        let o = offer(DiscountKind::Percentage, 10);
        assert!(o.is_valid_at(now));
        assert!(!o.is_valid_at(now + Duration::days(2)));

        let inactive = AddOnOffer {
            is_active: false,
            ..o
        };
        assert!(!inactive.is_valid_at(now));
    }

    #[test]
    fn test_package_helpers() {
        let package = Package {
            id: "p1".to_string(),
            name: "Bridal".to_string(),
            services: vec![
                PackageService {
                    service_id: "a".to_string(),
                    name: "A".to_string(),
                    price_paise: 40_000,
                    duration_minutes: 30,
                },
                PackageService {
                    service_id: "b".to_string(),
                    name: "B".to_string(),
                    price_paise: 50_000,
                    duration_minutes: 45,
                },
            ],
            total_price_paise: 90_000,
            discounted_price_paise: Some(70_000),
        };
        assert!(package.contains_service("a"));
        assert!(!package.contains_service("c"));
        assert_eq!(package.effective_price().rupees(), 700);
        assert_eq!(package.duration_minutes(), 75);
    }

    #[test]
    fn test_product_line_total() {
        let line = ProductLine {
            product: Product {
                id: "pr1".to_string(),
                name: "Serum".to_string(),
                price_paise: 60_000,
                discounted_price_paise: Some(45_000),
            },
            quantity: 2,
        };
        assert_eq!(line.line_total().rupees(), 900);
    }
}
