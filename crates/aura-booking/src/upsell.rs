//! # Suggestion Service
//!
//! Gathers everything the upsell decision function needs and calls it.
//!
//! ## Degradation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Collaborator            On failure                 Resulting tier      │
//! │  ───────────────────     ──────────────────────     ─────────────────   │
//! │  schedule / predictor    no idle slot / no p        History             │
//! │  history provider        loyalty treated as 0       History (base 15%)  │
//! │  catalog provider        no services to suggest     Generic             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure is logged at `warn` and never fails the call.

use aura_core::catalog::Service;
use aura_core::schedule::{detect_idle_slots, pick_slot, IdleSlot, IdleSlotWindow};
use aura_core::selection::Selection;
use aura_core::types::{BookingProvider, DiscountRate};
use aura_core::upsell::{suggest, AddonSuggestion, CustomerHistory, UpsellConfig, UpsellContext};
use aura_db::Database;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::BookingResult;
use crate::providers::{AcceptancePredictor, CatalogProvider, HistoryProvider, PredictionRequest};
use crate::retry::RetryPolicy;

/// What the customer is looking at when suggestions are requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub customer_id: String,
    pub provider: BookingProvider,
    pub date: NaiveDate,
    #[serde(default)]
    pub staff_id: Option<String>,
    /// The cart so far; its services are never suggested again.
    #[serde(default)]
    pub selection: Selection,
    /// A gap the caller already knows about. Detected from the stored
    /// schedule when absent.
    #[serde(default)]
    pub idle_slot: Option<IdleSlot>,
}

/// Fetches collaborators for [`suggest`] and degrades when they fail.
#[derive(Clone)]
pub struct SuggestionService {
    db: Database,
    catalog: Arc<dyn CatalogProvider>,
    history: Arc<dyn HistoryProvider>,
    predictor: Option<Arc<dyn AcceptancePredictor>>,
    config: UpsellConfig,
    window: IdleSlotWindow,
    retry: RetryPolicy,
}

impl SuggestionService {
    pub fn new(
        db: Database,
        catalog: Arc<dyn CatalogProvider>,
        history: Arc<dyn HistoryProvider>,
        predictor: Option<Arc<dyn AcceptancePredictor>>,
        config: UpsellConfig,
        window: IdleSlotWindow,
        retry: RetryPolicy,
    ) -> Self {
        SuggestionService {
            db,
            catalog,
            history,
            predictor,
            config,
            window,
            retry,
        }
    }

    /// 0-3 discounted add-on suggestions for the request.
    pub async fn suggest_addons(&self, request: &SuggestionRequest) -> Vec<AddonSuggestion> {
        let salon_id = request.provider.id();

        let services = self.fetch_services(salon_id).await;
        let occupied = self.occupied(&request.selection, salon_id).await;
        let slot = match &request.idle_slot {
            Some(slot) => Some(slot.clone()),
            None => self.find_idle_slot(request).await,
        };
        let history = self.fetch_history(&request.customer_id, salon_id).await;
        let probability = match &slot {
            Some(slot) => self.fetch_probability(request, slot, history).await,
            None => None,
        };

        let ctx = UpsellContext {
            catalog: services.as_deref(),
            occupied: &occupied,
            idle_slot: slot.as_ref(),
            probability,
            history: history.as_ref(),
        };
        let suggestions = suggest(&ctx, &self.config);

        info!(
            customer_id = %request.customer_id,
            salon_id = %salon_id,
            tier = ?suggestions.first().map(|s| s.tier),
            count = suggestions.len(),
            "Add-on suggestions ready"
        );
        suggestions
    }

    /// Gaps in the stored schedule for a provider on a date, optionally
    /// limited to one staff member.
    pub async fn idle_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        staff_id: Option<&str>,
    ) -> BookingResult<Vec<IdleSlot>> {
        let blocks = self.db.appointments().list_blocks(provider_id, date).await?;
        let mut slots = detect_idle_slots(&blocks, self.window);
        if let Some(staff) = staff_id {
            slots.retain(|s| s.staff_id == staff);
        }
        Ok(slots)
    }

    // =========================================================================
    // Collaborator fetches
    // =========================================================================

    async fn fetch_services(&self, salon_id: &str) -> Option<Vec<Service>> {
        let catalog = &self.catalog;
        match self
            .retry
            .run("catalog.list_services", move || catalog.list_services(salon_id))
            .await
        {
            Ok(services) => Some(services),
            Err(err) => {
                warn!(salon_id = %salon_id, error = %err, "Catalog unavailable, falling back to generic add-on");
                None
            }
        }
    }

    /// Service ids already in the cart. Package components need the package
    /// list; when it cannot be fetched only direct picks are excluded.
    async fn occupied(&self, selection: &Selection, salon_id: &str) -> HashSet<String> {
        let normalized = match selection.normalize() {
            Ok(normalized) => normalized,
            Err(err) => {
                debug!(error = %err, "Selection not normalizable, excluding nothing");
                return HashSet::new();
            }
        };

        let mut occupied: HashSet<String> = normalized
            .service_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        occupied.extend(normalized.addons.iter().map(|a| a.service.id.clone()));

        let package_ids = normalized.package_ids();
        if !package_ids.is_empty() {
            let catalog = &self.catalog;
            match self
                .retry
                .run("catalog.list_packages", move || catalog.list_packages(salon_id))
                .await
            {
                Ok(packages) => {
                    for package in packages.iter().filter(|p| package_ids.contains(&p.id.as_str())) {
                        occupied.extend(package.services.iter().map(|c| c.service_id.clone()));
                    }
                }
                Err(err) => {
                    warn!(salon_id = %salon_id, error = %err, "Packages unavailable, components not excluded")
                }
            }
        }

        occupied
    }

    async fn find_idle_slot(&self, request: &SuggestionRequest) -> Option<IdleSlot> {
        match self
            .idle_slots(request.provider.id(), request.date, None)
            .await
        {
            Ok(slots) => pick_slot(&slots, request.staff_id.as_deref()).cloned(),
            Err(err) => {
                warn!(error = %err, "Schedule unavailable, skipping idle-slot tier");
                None
            }
        }
    }

    async fn fetch_history(&self, customer_id: &str, salon_id: &str) -> Option<CustomerHistory> {
        let history = &self.history;
        match self
            .retry
            .run("history.get_history", move || history.get_history(customer_id, salon_id))
            .await
        {
            Ok(history) => Some(history),
            Err(err) => {
                warn!(customer_id = %customer_id, error = %err, "Customer history unavailable");
                None
            }
        }
    }

    async fn fetch_probability(
        &self,
        request: &SuggestionRequest,
        slot: &IdleSlot,
        history: Option<CustomerHistory>,
    ) -> Option<f64> {
        let predictor = self.predictor.as_ref()?;
        let prediction = PredictionRequest {
            customer_id: request.customer_id.clone(),
            salon_id: request.provider.id().to_string(),
            gap_size_minutes: slot.gap_size_minutes,
            day_of_week: request.date.weekday(),
            proposed_discount: DiscountRate::from_bps(self.config.idle_base_bps),
            history,
        };

        let prediction = &prediction;
        match self
            .retry
            .run("predictor.predict", move || predictor.predict(prediction))
            .await
        {
            Ok(p) if p.is_finite() => Some(p.clamp(0.0, 1.0)),
            Ok(p) => {
                warn!(probability = p, "Predictor returned a non-finite value");
                None
            }
            Err(err) => {
                warn!(error = %err, "Acceptance predictor unavailable, skipping idle-slot tier");
                None
            }
        }
    }
}
