//! # Selection
//!
//! The customer's cart as it arrives from the client, and the normalized,
//! catalog-resolved form the rest of the engine works on.
//!
//! ## Boundary Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  wire item refs (any of):                                               │
//! │    "svc-1"                                                              │
//! │    { "serviceId": "svc-1", ... }                                        │
//! │    { "_id": "svc-1", "name": "Haircut", ... }                           │
//! │    { "id": "svc-1" }                                                    │
//! │              │                                                          │
//! │              ▼  Selection::normalize()                                  │
//! │    SelectedItem::Service { id: "svc-1" }     (deduped, validated)       │
//! │              │                                                          │
//! │              ▼  BookingCart::resolve(catalog)                           │
//! │    BookingCart { services: [Service { .. }], .. }                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing downstream of [`Selection::normalize`] inspects raw refs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{AddOnOffer, Package, Product, ProductLine, Service};
use crate::error::ValidationError;
use crate::types::{BookedItem, BookedProduct, DiscountRate};
use crate::upsell::{AddonSuggestion, UpsellConfig, GENERIC_ADDON_ID};
use crate::validation::{validate_quantity, ValidationResult};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_UPSELL_DISCOUNT_BPS};

// =============================================================================
// Wire Refs
// =============================================================================

/// A polymorphic item reference as sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    Id(String),
    Keyed(KeyedRef),
}

/// Object form of an [`ItemRef`]. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedRef {
    #[serde(rename = "serviceId", alias = "service_id", default)]
    pub service_id: Option<String>,
    #[serde(rename = "_id", default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl ItemRef {
    /// The referenced id. Precedence: `serviceId`, `_id`, `id`.
    pub fn id(&self) -> Option<&str> {
        let raw = match self {
            ItemRef::Id(id) => Some(id.as_str()),
            ItemRef::Keyed(k) => k
                .service_id
                .as_deref()
                .or(k.object_id.as_deref())
                .or(k.id.as_deref()),
        };
        raw.map(str::trim).filter(|id| !id.is_empty())
    }
}

impl From<&str> for ItemRef {
    fn from(id: &str) -> Self {
        ItemRef::Id(id.to_string())
    }
}

/// A product pick with quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPick {
    #[serde(alias = "productId", alias = "_id")]
    pub id: String,
    pub quantity: i64,
}

/// The raw cart submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub services: Vec<ItemRef>,
    #[serde(default)]
    pub packages: Vec<ItemRef>,
    #[serde(default)]
    pub offers: Vec<ItemRef>,
    /// Suggestions the customer accepted.
    #[serde(default)]
    pub addons: Vec<AddonSuggestion>,
    #[serde(default)]
    pub products: Vec<ProductPick>,
}

// =============================================================================
// Normalized Items
// =============================================================================

/// One normalized cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectedItem {
    Service { id: String },
    Package { id: String },
    /// A service implied by a selected package.
    PackageComponent { package_id: String, service_id: String },
    Offer { id: String },
    Addon { service_id: String, discount: DiscountRate },
    Product { id: String, quantity: i64 },
}

impl SelectedItem {
    /// The service id this item occupies, for exclusion checks.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            SelectedItem::Service { id } => Some(id),
            SelectedItem::PackageComponent { service_id, .. } => Some(service_id),
            SelectedItem::Addon { service_id, .. } => Some(service_id),
            _ => None,
        }
    }
}

/// A validated, deduplicated selection. Order of first appearance is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSelection {
    pub items: Vec<SelectedItem>,
    pub addons: Vec<AddonSuggestion>,
}

impl NormalizedSelection {
    pub fn service_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|i| match i {
                SelectedItem::Service { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn package_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|i| match i {
                SelectedItem::Package { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn offer_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|i| match i {
                SelectedItem::Offer { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn products(&self) -> impl Iterator<Item = (&str, i64)> {
        self.items.iter().filter_map(|i| match i {
            SelectedItem::Product { id, quantity } => Some((id.as_str(), *quantity)),
            _ => None,
        })
    }
}

fn push_unique(seen: &mut HashSet<(u8, String)>, tag: u8, id: &str) -> bool {
    seen.insert((tag, id.to_string()))
}

fn ref_id(item: &ItemRef, field: &str, index: usize) -> ValidationResult<String> {
    item.id()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: format!("{}[{}]", field, index),
            reason: "item reference carries no id".to_string(),
        })
}

impl Selection {
    /// Validates and normalizes the raw cart.
    ///
    /// ## Rules
    /// - Every ref must carry an id
    /// - Repeated refs of the same kind collapse to one
    /// - Repeated products merge their quantities, then the quantity is
    ///   validated
    /// - Accepted add-on discounts must not exceed the upsell cap
    /// - At most [`MAX_CART_ITEMS`] entries
    pub fn normalize(&self) -> ValidationResult<NormalizedSelection> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for (i, r) in self.services.iter().enumerate() {
            let id = ref_id(r, "services", i)?;
            if push_unique(&mut seen, 0, &id) {
                items.push(SelectedItem::Service { id });
            }
        }
        for (i, r) in self.packages.iter().enumerate() {
            let id = ref_id(r, "packages", i)?;
            if push_unique(&mut seen, 1, &id) {
                items.push(SelectedItem::Package { id });
            }
        }
        for (i, r) in self.offers.iter().enumerate() {
            let id = ref_id(r, "offers", i)?;
            if push_unique(&mut seen, 2, &id) {
                items.push(SelectedItem::Offer { id });
            }
        }

        let mut addons = Vec::new();
        for addon in &self.addons {
            if addon.discount.bps() > MAX_UPSELL_DISCOUNT_BPS {
                return Err(ValidationError::OutOfRange {
                    field: "addons.discount".to_string(),
                    min: 0,
                    max: MAX_UPSELL_DISCOUNT_BPS as i64,
                });
            }
            if push_unique(&mut seen, 3, &addon.service.id) {
                items.push(SelectedItem::Addon {
                    service_id: addon.service.id.clone(),
                    discount: addon.discount,
                });
                addons.push(addon.clone());
            }
        }

        let mut product_order: Vec<String> = Vec::new();
        let mut quantities: Vec<i64> = Vec::new();
        for pick in &self.products {
            let id = pick.id.trim();
            if id.is_empty() {
                return Err(ValidationError::Required {
                    field: "products.id".to_string(),
                });
            }
            validate_quantity(pick.quantity)?;
            match product_order.iter().position(|p| p == id) {
                Some(pos) => {
                    quantities[pos] = quantities[pos].checked_add(pick.quantity).ok_or_else(|| {
                        ValidationError::OutOfRange {
                            field: "quantity".to_string(),
                            min: 1,
                            max: MAX_ITEM_QUANTITY,
                        }
                    })?;
                }
                None => {
                    product_order.push(id.to_string());
                    quantities.push(pick.quantity);
                }
            }
        }
        for (id, quantity) in product_order.into_iter().zip(quantities) {
            validate_quantity(quantity)?;
            items.push(SelectedItem::Product { id, quantity });
        }

        if items.len() > MAX_CART_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "selection".to_string(),
                min: 0,
                max: MAX_CART_ITEMS as i64,
            });
        }

        Ok(NormalizedSelection { items, addons })
    }
}

// =============================================================================
// Resolved Cart
// =============================================================================

/// The catalog entries needed to resolve a selection.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub services: Vec<Service>,
    pub packages: Vec<Package>,
    pub offers: Vec<AddOnOffer>,
    pub products: Vec<Product>,
}

/// A selection with every ref resolved to its catalog entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingCart {
    pub services: Vec<Service>,
    pub packages: Vec<Package>,
    pub offers: Vec<AddOnOffer>,
    pub addons: Vec<AddonSuggestion>,
    pub products: Vec<ProductLine>,
}

fn unknown(field: &str, id: &str) -> ValidationError {
    ValidationError::UnknownReference {
        field: field.to_string(),
        id: id.to_string(),
    }
}

impl BookingCart {
    /// Resolves a normalized selection against the catalog.
    ///
    /// Accepted add-ons are re-priced from the catalog so a client cannot
    /// alter the estimated price; only the (capped) discount is taken from
    /// the suggestion. Offers must be valid at `now`.
    pub fn resolve(
        selection: &NormalizedSelection,
        catalog: &CatalogSnapshot,
        upsell: &UpsellConfig,
        now: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        let mut cart = BookingCart::default();

        for id in selection.service_ids() {
            let service = catalog
                .services
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| unknown("services", id))?;
            cart.services.push(service.clone());
        }
        for id in selection.package_ids() {
            let package = catalog
                .packages
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| unknown("packages", id))?;
            cart.packages.push(package.clone());
        }
        for id in selection.offer_ids() {
            let offer = catalog
                .offers
                .iter()
                .find(|o| o.id == id && o.is_valid_at(now))
                .ok_or_else(|| unknown("offers", id))?;
            cart.offers.push(offer.clone());
        }
        for accepted in &selection.addons {
            let mut addon = if accepted.service.id == GENERIC_ADDON_ID {
                upsell.generic_suggestion(accepted.gap_size_minutes)
            } else {
                let service = catalog
                    .services
                    .iter()
                    .find(|s| s.id == accepted.service.id)
                    .ok_or_else(|| unknown("addons", &accepted.service.id))?;
                AddonSuggestion::for_service(
                    service,
                    accepted.gap_size_minutes,
                    accepted.discount,
                    accepted.tier,
                )
            };
            addon.discount = accepted.discount;
            cart.addons.push(addon);
        }
        for (id, quantity) in selection.products() {
            let product = catalog
                .products
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| unknown("products", id))?;
            cart.products.push(ProductLine {
                product: product.clone(),
                quantity,
            });
        }

        Ok(cart)
    }

    /// True when the cart holds something to book. Products alone do not
    /// count.
    pub fn has_bookable_items(&self) -> bool {
        !(self.services.is_empty()
            && self.packages.is_empty()
            && self.addons.is_empty()
            && self.offers.is_empty())
    }

    /// Whether an individually selected service is already covered by a
    /// selected package.
    pub fn is_covered_by_package(&self, service_id: &str) -> bool {
        self.packages.iter().any(|p| p.contains_service(service_id))
    }

    /// Service ids the cart already occupies: individual services,
    /// package components and accepted add-ons.
    pub fn occupied_service_ids(&self) -> HashSet<String> {
        self.items()
            .iter()
            .filter_map(|i| i.service_id().map(str::to_string))
            .collect()
    }

    /// Normalized view of the resolved cart, package components included.
    pub fn items(&self) -> Vec<SelectedItem> {
        let mut items = Vec::new();
        for s in &self.services {
            items.push(SelectedItem::Service { id: s.id.clone() });
        }
        for p in &self.packages {
            items.push(SelectedItem::Package { id: p.id.clone() });
            for c in &p.services {
                items.push(SelectedItem::PackageComponent {
                    package_id: p.id.clone(),
                    service_id: c.service_id.clone(),
                });
            }
        }
        for o in &self.offers {
            items.push(SelectedItem::Offer { id: o.id.clone() });
        }
        for a in &self.addons {
            items.push(SelectedItem::Addon {
                service_id: a.service.id.clone(),
                discount: a.discount,
            });
        }
        for line in &self.products {
            items.push(SelectedItem::Product {
                id: line.product.id.clone(),
                quantity: line.quantity,
            });
        }
        items
    }

    /// Frozen line items, priced exactly as the pricing aggregator prices
    /// them.
    pub fn booked_items(&self) -> Vec<BookedItem> {
        let mut booked = Vec::new();
        for p in &self.packages {
            booked.push(BookedItem {
                service_id: p.id.clone(),
                name: p.name.clone(),
                price_paise: p.effective_price().paise(),
                duration_minutes: p.duration_minutes(),
                is_offer: false,
            });
        }
        for s in &self.services {
            if self.is_covered_by_package(&s.id) {
                continue;
            }
            booked.push(BookedItem {
                service_id: s.id.clone(),
                name: s.name.clone(),
                price_paise: s.effective_price().paise(),
                duration_minutes: s.duration_minutes,
                is_offer: false,
            });
        }
        for a in &self.addons {
            booked.push(BookedItem {
                service_id: a.service.id.clone(),
                name: a.service.name.clone(),
                price_paise: a.discounted_price().paise(),
                duration_minutes: a.service.duration_minutes,
                is_offer: false,
            });
        }
        for o in &self.offers {
            booked.push(BookedItem {
                service_id: o.id.clone(),
                name: o.service_name.clone(),
                price_paise: o.discounted_price().paise(),
                duration_minutes: o.duration_minutes,
                is_offer: true,
            });
        }
        booked
    }

    pub fn booked_products(&self) -> Vec<BookedProduct> {
        self.products
            .iter()
            .map(|line| BookedProduct {
                product_id: line.product.id.clone(),
                name: line.product.name.clone(),
                quantity: line.quantity,
                unit_price_paise: line.product.unit_price().paise(),
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
