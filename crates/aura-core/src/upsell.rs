//! # Upsell Suggestion Engine
//!
//! Decides which discounted add-ons to offer. This is a single synchronous
//! decision function; fetching the catalog, history, idle slot and
//! acceptance probability (and degrading when they fail) happens in the
//! booking crate before it is called.
//!
//! ## Tier Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  eligible = catalog − occupied service ids                              │
//! │                                                                         │
//! │  eligible empty / catalog unavailable?                                  │
//! │       │ yes ──► Generic: 1 synthetic suggestion @ generic_bps           │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  idle slot AND probability p?                                           │
//! │       │ yes ──► IdleSlot: ≤2 suggestions, base = 10% + 20%·p            │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  History: ≤3 suggestions, base 15% / 20% (loyalty>5) / 25% (>10)        │
//! │                                                                         │
//! │  every subsequent suggestion +3%, never above 30%                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::catalog::Service;
use crate::error::ValidationError;
use crate::money::Money;
use crate::schedule::IdleSlot;
use crate::types::DiscountRate;
use crate::validation::ValidationResult;
use crate::MAX_UPSELL_DISCOUNT_BPS;

/// Service id carried by the synthetic generic suggestion.
pub const GENERIC_ADDON_ID: &str = "generic-addon";

// =============================================================================
// Suggestion Types
// =============================================================================

/// Which tier produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionTier {
    IdleSlot,
    History,
    Generic,
}

/// Catalog metadata copied into a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SuggestedService {
    pub id: String,
    pub name: String,
    pub category: String,
    pub duration_minutes: u32,
}

/// A discounted add-on offered to the customer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddonSuggestion {
    pub service: SuggestedService,
    pub gap_size_minutes: u32,
    pub discount: DiscountRate,
    pub estimated_price_paise: i64,
    pub tier: SuggestionTier,
}

impl AddonSuggestion {
    pub fn for_service(
        service: &Service,
        gap_size_minutes: u32,
        discount: DiscountRate,
        tier: SuggestionTier,
    ) -> Self {
        Self {
            service: SuggestedService {
                id: service.id.clone(),
                name: service.name.clone(),
                category: service.category.clone(),
                duration_minutes: service.duration_minutes,
            },
            gap_size_minutes,
            discount,
            estimated_price_paise: service.effective_price().paise(),
            tier,
        }
    }

    #[inline]
    pub fn estimated_price(&self) -> Money {
        Money::from_paise(self.estimated_price_paise)
    }

    /// `estimated_price × (1 − discount)`.
    #[inline]
    pub fn discounted_price(&self) -> Money {
        self.estimated_price()
            .apply_percentage_discount(self.discount.bps())
    }
}

/// What the history provider knows about a customer at a salon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerHistory {
    /// Completed appointments at the salon.
    pub customer_loyalty: u32,
    /// Whether the customer has bought add-ons before.
    pub past_addon_history: bool,
}

// =============================================================================
// Configuration
// =============================================================================

fn default_idle_base_bps() -> u32 {
    1_000
}

fn default_idle_span_bps() -> u32 {
    2_000
}

fn default_idle_max() -> usize {
    2
}

fn default_history_base_bps() -> u32 {
    1_500
}

fn default_history_mid_bps() -> u32 {
    2_000
}

fn default_history_high_bps() -> u32 {
    2_500
}

fn default_history_mid_loyalty() -> u32 {
    5
}

fn default_history_high_loyalty() -> u32 {
    10
}

fn default_history_max() -> usize {
    3
}

fn default_step_bps() -> u32 {
    300
}

fn default_cap_bps() -> u32 {
    3_000
}

fn default_generic_bps() -> u32 {
    2_000
}

fn default_generic_name() -> String {
    "Express Add-on Treatment".to_string()
}

fn default_generic_category() -> String {
    "add-on".to_string()
}

fn default_generic_price_paise() -> i64 {
    50_000
}

fn default_generic_duration() -> u32 {
    15
}

/// Rate constants for the three tiers, in basis points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsellConfig {
    #[serde(default = "default_idle_base_bps")]
    pub idle_base_bps: u32,
    /// Added on top of the idle base, scaled by the acceptance probability.
    #[serde(default = "default_idle_span_bps")]
    pub idle_span_bps: u32,
    #[serde(default = "default_idle_max")]
    pub idle_max_suggestions: usize,

    #[serde(default = "default_history_base_bps")]
    pub history_base_bps: u32,
    #[serde(default = "default_history_mid_bps")]
    pub history_mid_bps: u32,
    #[serde(default = "default_history_high_bps")]
    pub history_high_bps: u32,
    /// Loyalty strictly above this earns the mid rate.
    #[serde(default = "default_history_mid_loyalty")]
    pub history_mid_loyalty: u32,
    /// Loyalty strictly above this earns the high rate.
    #[serde(default = "default_history_high_loyalty")]
    pub history_high_loyalty: u32,
    #[serde(default = "default_history_max")]
    pub history_max_suggestions: usize,

    #[serde(default = "default_step_bps")]
    pub step_bps: u32,
    #[serde(default = "default_cap_bps")]
    pub cap_bps: u32,

    #[serde(default = "default_generic_bps")]
    pub generic_bps: u32,
    #[serde(default = "default_generic_name")]
    pub generic_name: String,
    #[serde(default = "default_generic_category")]
    pub generic_category: String,
    #[serde(default = "default_generic_price_paise")]
    pub generic_price_paise: i64,
    #[serde(default = "default_generic_duration")]
    pub generic_duration_minutes: u32,
}

impl Default for UpsellConfig {
    fn default() -> Self {
        Self {
            idle_base_bps: default_idle_base_bps(),
            idle_span_bps: default_idle_span_bps(),
            idle_max_suggestions: default_idle_max(),
            history_base_bps: default_history_base_bps(),
            history_mid_bps: default_history_mid_bps(),
            history_high_bps: default_history_high_bps(),
            history_mid_loyalty: default_history_mid_loyalty(),
            history_high_loyalty: default_history_high_loyalty(),
            history_max_suggestions: default_history_max(),
            step_bps: default_step_bps(),
            cap_bps: default_cap_bps(),
            generic_bps: default_generic_bps(),
            generic_name: default_generic_name(),
            generic_category: default_generic_category(),
            generic_price_paise: default_generic_price_paise(),
            generic_duration_minutes: default_generic_duration(),
        }
    }
}

impl UpsellConfig {
    /// Checks the constants against the hard discount ceiling.
    pub fn validate(&self) -> ValidationResult<()> {
        let cap = MAX_UPSELL_DISCOUNT_BPS as i64;
        for (field, value) in [
            ("upsell.cap_bps", self.cap_bps),
            ("upsell.idle_base_bps", self.idle_base_bps),
            ("upsell.history_base_bps", self.history_base_bps),
            ("upsell.history_mid_bps", self.history_mid_bps),
            ("upsell.history_high_bps", self.history_high_bps),
            ("upsell.generic_bps", self.generic_bps),
        ] {
            if value as i64 > cap {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    min: 0,
                    max: cap,
                });
            }
        }
        if self.idle_max_suggestions == 0 || self.history_max_suggestions == 0 {
            return Err(ValidationError::MustBePositive {
                field: "upsell.max_suggestions".to_string(),
            });
        }
        if self.generic_price_paise <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "upsell.generic_price_paise".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    fn cap(&self) -> DiscountRate {
        DiscountRate::from_bps(self.cap_bps)
    }

    /// The synthetic suggestion used when nothing in the catalog qualifies.
    pub fn generic_suggestion(&self, gap_size_minutes: u32) -> AddonSuggestion {
        AddonSuggestion {
            service: SuggestedService {
                id: GENERIC_ADDON_ID.to_string(),
                name: self.generic_name.clone(),
                category: self.generic_category.clone(),
                duration_minutes: self.generic_duration_minutes,
            },
            gap_size_minutes,
            discount: DiscountRate::from_bps(self.generic_bps).min(self.cap()),
            estimated_price_paise: self.generic_price_paise,
            tier: SuggestionTier::Generic,
        }
    }

    /// Idle-tier base: `idle_base + idle_span × p`, p clamped to `[0, 1]`.
    pub fn idle_base(&self, probability: f64) -> DiscountRate {
        let p = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let extra = (self.idle_span_bps as f64 * p).round() as u32;
        DiscountRate::from_bps(self.idle_base_bps).step_capped(extra, self.cap())
    }

    /// History-tier base, raised for loyal customers.
    pub fn history_base(&self, history: Option<&CustomerHistory>) -> DiscountRate {
        let loyalty = history.map(|h| h.customer_loyalty).unwrap_or(0);
        let bps = if loyalty > self.history_high_loyalty {
            self.history_high_bps
        } else if loyalty > self.history_mid_loyalty {
            self.history_mid_bps
        } else {
            self.history_base_bps
        };
        DiscountRate::from_bps(bps).min(self.cap())
    }
}

// =============================================================================
// Decision Function
// =============================================================================

/// Everything the decision function may use. Absent inputs select a lower
/// tier; they are never errors.
#[derive(Debug, Clone, Copy)]
pub struct UpsellContext<'a> {
    /// `None` when the catalog could not be fetched.
    pub catalog: Option<&'a [Service]>,
    /// Service ids already in the cart (services, package components,
    /// accepted add-ons).
    pub occupied: &'a HashSet<String>,
    pub idle_slot: Option<&'a IdleSlot>,
    /// Acceptance probability for the idle slot, when a predictor answered.
    pub probability: Option<f64>,
    pub history: Option<&'a CustomerHistory>,
}

/// Produces 0-3 add-on suggestions.
///
/// ## Example
/// ```rust
/// use std::collections::HashSet;
/// use aura_core::upsell::{suggest, SuggestionTier, UpsellConfig, UpsellContext};
///
/// let occupied = HashSet::new();
/// let ctx = UpsellContext {
///     catalog: None,
///     occupied: &occupied,
///     idle_slot: None,
///     probability: None,
///     history: None,
/// };
/// let suggestions = suggest(&ctx, &UpsellConfig::default());
/// assert_eq!(suggestions.len(), 1);
/// assert_eq!(suggestions[0].tier, SuggestionTier::Generic);
/// ```
pub fn suggest(ctx: &UpsellContext<'_>, config: &UpsellConfig) -> Vec<AddonSuggestion> {
    let gap = ctx.idle_slot.map(|s| s.gap_size_minutes).unwrap_or(0);

    let eligible: Vec<&Service> = ctx
        .catalog
        .unwrap_or(&[])
        .iter()
        .filter(|s| !ctx.occupied.contains(&s.id))
        .collect();

    if eligible.is_empty() {
        return vec![config.generic_suggestion(gap)];
    }

    if let (Some(slot), Some(p)) = (ctx.idle_slot, ctx.probability) {
        // Services that fit inside the gap go first; catalog order otherwise.
        let mut ranked = eligible;
        ranked.sort_by_key(|s| s.duration_minutes > slot.gap_size_minutes);
        return build(
            &ranked,
            config.idle_max_suggestions,
            config.idle_base(p),
            slot.gap_size_minutes,
            SuggestionTier::IdleSlot,
            config,
        );
    }

    build(
        &eligible,
        config.history_max_suggestions,
        config.history_base(ctx.history),
        gap,
        SuggestionTier::History,
        config,
    )
}

fn build(
    services: &[&Service],
    max: usize,
    base: DiscountRate,
    gap: u32,
    tier: SuggestionTier,
    config: &UpsellConfig,
) -> Vec<AddonSuggestion> {
    services
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, service)| {
            let discount = base.step_capped(config.step_bps * i as u32, config.cap());
            AddonSuggestion::for_service(service, gap, discount, tier)
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn service(id: &str, minutes: u32) -> Service {
        Service {
            id: id.to_string(),
            name: id.to_uppercase(),
            category: "spa".to_string(),
            price_paise: 40_000,
            discounted_price_paise: None,
            duration_minutes: minutes,
        }
    }

    fn slot(gap: u32) -> IdleSlot {
        IdleSlot {
            staff_id: "staff-1".to_string(),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap() + chrono::Duration::minutes(gap as i64),
            gap_size_minutes: gap,
        }
    }

    fn ctx<'a>(
        catalog: Option<&'a [Service]>,
        occupied: &'a HashSet<String>,
        idle_slot: Option<&'a IdleSlot>,
        probability: Option<f64>,
        history: Option<&'a CustomerHistory>,
    ) -> UpsellContext<'a> {
        UpsellContext {
            catalog,
            occupied,
            idle_slot,
            probability,
            history,
        }
    }

    #[test]
    fn test_idle_tier_scales_with_probability() {
        let catalog = vec![service("a", 30), service("b", 30), service("c", 30)];
        let occupied = HashSet::new();
        let s = slot(60);

        let out = suggest(&ctx(Some(&catalog), &occupied, Some(&s), Some(0.5), None), &UpsellConfig::default());

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.tier == SuggestionTier::IdleSlot));
        assert_eq!(out[0].discount.bps(), 2_000);
        assert_eq!(out[1].discount.bps(), 2_300);
        assert_eq!(out[0].gap_size_minutes, 60);
    }

    #[test]
    fn test_idle_tier_prefers_services_that_fit() {
        let catalog = vec![service("long", 90), service("short", 20)];
        let occupied = HashSet::new();
        let s = slot(45);

        let out = suggest(&ctx(Some(&catalog), &occupied, Some(&s), Some(1.0), None), &UpsellConfig::default());

        assert_eq!(out[0].service.id, "short");
        assert_eq!(out[1].service.id, "long");
        // 10% + 20% = 30%, then capped.
        assert_eq!(out[0].discount.bps(), 3_000);
        assert_eq!(out[1].discount.bps(), 3_000);
    }

    #[test]
    fn test_slot_without_probability_falls_to_history() {
        let catalog = vec![service("a", 30)];
        let occupied = HashSet::new();
        let s = slot(40);

        let out = suggest(&ctx(Some(&catalog), &occupied, Some(&s), None, None), &UpsellConfig::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tier, SuggestionTier::History);
        assert_eq!(out[0].discount.bps(), 1_500);
        assert_eq!(out[0].gap_size_minutes, 40);
    }

    #[test]
    fn test_history_tier_loyalty_bands() {
        let catalog = vec![service("a", 30), service("b", 30), service("c", 30), service("d", 30)];
        let occupied = HashSet::new();
        let config = UpsellConfig::default();

        let loyal = CustomerHistory {
            customer_loyalty: 11,
            past_addon_history: true,
        };
        let out = suggest(&ctx(Some(&catalog), &occupied, None, None, Some(&loyal)), &config);
        let rates: Vec<u32> = out.iter().map(|a| a.discount.bps()).collect();
        assert_eq!(rates, vec![2_500, 2_800, 3_000]);

        let regular = CustomerHistory {
            customer_loyalty: 6,
            past_addon_history: false,
        };
        let out = suggest(&ctx(Some(&catalog), &occupied, None, None, Some(&regular)), &config);
        assert_eq!(out[0].discount.bps(), 2_000);

        let boundary = CustomerHistory {
            customer_loyalty: 5,
            past_addon_history: false,
        };
        assert_eq!(config.history_base(Some(&boundary)).bps(), 1_500);
    }

    #[test]
    fn test_no_predictor_no_history_still_suggests() {
        let catalog = vec![service("a", 30)];
        let occupied = HashSet::new();

        let out = suggest(&ctx(Some(&catalog), &occupied, None, None, None), &UpsellConfig::default());

        assert!(!out.is_empty());
        assert_eq!(out[0].tier, SuggestionTier::History);
    }

    #[test]
    fn test_exclusion_falls_back_to_generic() {
        let catalog = vec![service("a", 30), service("b", 30)];
        let occupied: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();

        let out = suggest(&ctx(Some(&catalog), &occupied, None, Some(0.9), None), &UpsellConfig::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tier, SuggestionTier::Generic);
        assert_eq!(out[0].service.id, GENERIC_ADDON_ID);
        assert_eq!(out[0].discount.bps(), 2_000);
    }

    #[test]
    fn test_occupied_services_never_suggested() {
        let catalog = vec![service("a", 30), service("b", 30), service("c", 30)];
        let occupied: HashSet<String> = ["b"].iter().map(|s| s.to_string()).collect();

        let out = suggest(&ctx(Some(&catalog), &occupied, None, None, None), &UpsellConfig::default());

        assert!(out.iter().all(|a| a.service.id != "b"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_discounts_stay_within_cap() {
        let catalog: Vec<Service> = (0..5).map(|i| service(&format!("s{}", i), 30)).collect();
        let occupied = HashSet::new();
        let s = slot(90);
        for p in [0.0, 0.3, 0.99, 1.0, 7.0, f64::NAN] {
            let out = suggest(&ctx(Some(&catalog), &occupied, Some(&s), Some(p), None), &UpsellConfig::default());
            assert!(out.iter().all(|a| a.discount.bps() <= MAX_UPSELL_DISCOUNT_BPS));
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(UpsellConfig::default().validate().is_ok());
        let bad = UpsellConfig {
            cap_bps: 4_000,
            ..UpsellConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = UpsellConfig {
            history_max_suggestions: 0,
            ..UpsellConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_discounted_price() {
        let a = AddonSuggestion::for_service(
            &service("a", 30),
            0,
            DiscountRate::from_bps(2_500),
            SuggestionTier::History,
        );
        assert_eq!(a.discounted_price().rupees(), 300);
    }
}
