//! # Booking Service
//!
//! The entry point for every booking operation. Owns the collaborators,
//! the database handle, the event bus and the per-key locks; the pure
//! rules it applies live in aura-core.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compose_quote ──► normalize ──► catalog (retry) ──► resolve ──► price  │
//! │                                                                         │
//! │  submit_booking ─► policy ──► validate ──► resolve ──► price (strict)   │
//! │                        └──► build ──► INSERT (Created) ──► event        │
//! │                                                                         │
//! │  payment.rs        initiate / confirm / fail                            │
//! │  cancellation.rs   cancel / refund                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aura_core::booking::{build_appointment, validate_submission, BookingRequest};
use aura_core::cancellation::CancellationPolicy;
use aura_core::lifecycle::AppointmentStatus;
use aura_core::pricing::{clamp_redemption, compute_total, PricingBreakdown, RedemptionRequest};
use aura_core::schedule::IdleSlot;
use aura_core::selection::{BookingCart, CatalogSnapshot, Selection};
use aura_core::types::{Appointment, BookingProvider};
use aura_core::upsell::{AddonSuggestion, GENERIC_ADDON_ID};
use aura_core::{CoreError, DomainEvent, ValidationError};
use aura_db::{Database, DbConfig, LedgerOutcome, StatusChange};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::BookingConfig;
use crate::error::{BookingError, BookingResult};
use crate::events::EventBus;
use crate::history::SqliteHistoryProvider;
use crate::ledger::SqliteLoyaltyLedger;
use crate::locks::KeyedLocks;
use crate::predictor::HeuristicPredictor;
use crate::providers::{
    AcceptancePredictor, CatalogProvider, HistoryProvider, LoyaltyLedger, PaymentGateway,
};
use crate::retry::RetryPolicy;
use crate::signature::HmacSignatureVerifier;
use crate::upsell::{SuggestionRequest, SuggestionService};

// =============================================================================
// Requests
// =============================================================================

/// A live price check while the customer edits the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub customer_id: String,
    pub provider: BookingProvider,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub home_service: bool,
    #[serde(default)]
    pub redemption: RedemptionRequest,
}

/// A salon's cancellation policy as entered in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
    pub salon_id: String,
    pub notice_period_hours: u32,
    pub late_cancellation_penalty_percent: u8,
    pub no_show_penalty_percent: u8,
    pub is_active: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct BookingService {
    pub(crate) db: Database,
    pub(crate) catalog: Arc<dyn CatalogProvider>,
    pub(crate) history: Arc<dyn HistoryProvider>,
    pub(crate) predictor: Option<Arc<dyn AcceptancePredictor>>,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) ledger: Arc<dyn LoyaltyLedger>,
    pub(crate) config: BookingConfig,
    pub(crate) retry: RetryPolicy,
    pub(crate) locks: Arc<KeyedLocks>,
    pub(crate) events: EventBus,
    /// Local callback check; the gateway verifies when absent.
    pub(crate) verifier: Option<HmacSignatureVerifier>,
}

impl BookingService {
    /// Builds a service with storage-backed history and ledger and the
    /// heuristic acceptance predictor.
    pub fn new(
        db: Database,
        catalog: Arc<dyn CatalogProvider>,
        gateway: Arc<dyn PaymentGateway>,
        config: BookingConfig,
    ) -> BookingResult<Self> {
        config.validate()?;

        let verifier = config
            .payment
            .signing_secret
            .as_deref()
            .map(HmacSignatureVerifier::new)
            .transpose()?;

        Ok(BookingService {
            history: Arc::new(SqliteHistoryProvider::new(db.clone())),
            ledger: Arc::new(SqliteLoyaltyLedger::new(db.clone())),
            predictor: Some(Arc::new(HeuristicPredictor)),
            retry: RetryPolicy::from_settings(&config.retry),
            events: EventBus::new(config.events.capacity),
            locks: Arc::new(KeyedLocks::new()),
            verifier,
            db,
            catalog,
            gateway,
            config,
        })
    }

    /// Opens the configured database file and builds the service on it.
    pub async fn open(
        catalog: Arc<dyn CatalogProvider>,
        gateway: Arc<dyn PaymentGateway>,
        config: BookingConfig,
    ) -> BookingResult<Self> {
        let path = config
            .database_path()
            .ok_or_else(|| BookingError::InvalidConfig("no database path and no data directory".into()))?;
        info!(path = %path.display(), "Opening booking database");

        let db = Database::new(DbConfig::new(path).max_connections(config.database.max_connections)).await?;
        Self::new(db, catalog, gateway, config)
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryProvider>) -> Self {
        self.history = history;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn AcceptancePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Suggestions never use the idle-slot tier.
    pub fn without_predictor(mut self) -> Self {
        self.predictor = None;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LoyaltyLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    pub async fn get_appointment(&self, id: &str) -> BookingResult<Appointment> {
        Ok(self.db.appointments().get(id).await?)
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Prices the current cart without side effects.
    ///
    /// Redemption is clamped to what the customer can actually use: whole
    /// blocks, no more than the balance or the cart allows. An unreadable
    /// balance counts as zero points.
    pub async fn compose_quote(&self, request: &QuoteRequest) -> BookingResult<PricingBreakdown> {
        let pricing = &self.config.pricing;
        let cart = self
            .resolve_cart(&request.selection, request.provider.id(), Utc::now())
            .await?;

        let unredeemed = compute_total(&cart, request.home_service, &RedemptionRequest::none(), 0, pricing)?;
        if !request.redemption.use_points {
            return Ok(unredeemed);
        }

        let available = match self.ledger.get_balance(&request.customer_id).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(customer_id = %request.customer_id, error = %err, "Loyalty balance unavailable for quote");
                0
            }
        };
        let points = clamp_redemption(
            request.redemption.points_to_redeem,
            available,
            unredeemed.overall_total,
            pricing,
        );
        if points == 0 {
            return Ok(unredeemed);
        }

        Ok(compute_total(
            &cart,
            request.home_service,
            &RedemptionRequest::points(points),
            available,
            pricing,
        )?)
    }

    pub async fn suggest_addons(&self, request: &SuggestionRequest) -> Vec<AddonSuggestion> {
        self.suggestions().suggest_addons(request).await
    }

    pub async fn detect_idle_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        staff_id: Option<&str>,
    ) -> BookingResult<Vec<IdleSlot>> {
        self.suggestions().idle_slots(provider_id, date, staff_id).await
    }

    fn suggestions(&self) -> SuggestionService {
        SuggestionService::new(
            self.db.clone(),
            self.catalog.clone(),
            self.history.clone(),
            self.predictor.clone(),
            self.config.upsell.clone(),
            self.config.schedule,
            self.retry.clone(),
        )
    }

    /// Normalizes the selection and resolves it against the provider's
    /// catalog. Only the catalog lists the selection needs are fetched.
    pub(crate) async fn resolve_cart(
        &self,
        selection: &Selection,
        salon_id: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingCart> {
        let normalized = selection.normalize()?;
        let catalog = &self.catalog;
        let retry = &self.retry;
        let mut snapshot = CatalogSnapshot::default();

        let needs_services = !normalized.service_ids().is_empty()
            || normalized.addons.iter().any(|a| a.service.id != GENERIC_ADDON_ID);
        if needs_services {
            snapshot.services = retry
                .run("catalog.list_services", move || catalog.list_services(salon_id))
                .await?;
        }
        if !normalized.package_ids().is_empty() {
            snapshot.packages = retry
                .run("catalog.list_packages", move || catalog.list_packages(salon_id))
                .await?;
        }
        if !normalized.offer_ids().is_empty() {
            snapshot.offers = retry
                .run("catalog.list_active_offers", move || catalog.list_active_offers(salon_id, now))
                .await?;
        }
        if normalized.products().next().is_some() {
            snapshot.products = retry
                .run("catalog.list_products", move || catalog.list_products(salon_id))
                .await?;
        }

        Ok(BookingCart::resolve(&normalized, &snapshot, &self.config.upsell, now)?)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validates, prices and stores a booking in `Created`.
    ///
    /// ## Errors
    /// - `InvalidDate` for a start time that is not in the future
    /// - `ConsentRequired` when the salon's active policy was not accepted
    /// - `EmptySelection` when nothing bookable was selected
    /// - `InvalidRedemption` when the points break a redemption rule
    pub async fn submit_booking(&self, request: &BookingRequest) -> BookingResult<Appointment> {
        let now = Utc::now();

        let policy = match request.provider.salon_id() {
            Some(salon_id) => self.db.policies().get(salon_id).await?,
            None => None,
        };
        let submission = validate_submission(request, policy.as_ref(), now)?;

        let cart = self
            .resolve_cart(&request.selection, request.provider.id(), now)
            .await?;

        let available = if request.redemption.use_points {
            self.ledger.get_balance(&request.customer_id).await?
        } else {
            0
        };
        let breakdown = compute_total(
            &cart,
            request.home_service,
            &request.redemption,
            available,
            &self.config.pricing,
        )?;

        let appointment = build_appointment(request, submission, &cart, &breakdown, now)?;
        self.db.appointments().insert(&appointment).await?;

        info!(
            appointment_id = %appointment.id,
            customer_id = %appointment.customer_id,
            provider = %appointment.provider.id(),
            final_amount = appointment.final_amount_paise,
            "Appointment created"
        );
        self.events.publish(DomainEvent::AppointmentCreated {
            appointment_id: appointment.id.clone(),
            customer_id: appointment.customer_id.clone(),
            provider: appointment.provider.clone(),
            final_amount: appointment.final_amount(),
        });

        Ok(appointment)
    }

    // =========================================================================
    // Visit
    // =========================================================================

    /// Records that the customer arrived. Only the first check-in counts.
    pub async fn check_in(&self, id: &str, at: DateTime<Utc>) -> BookingResult<Appointment> {
        let _guard = self.locks.lock(id).await;
        let appointments = self.db.appointments();

        let appointment = appointments.get(id).await?;
        if appointment.is_checked_in() {
            return Ok(appointment);
        }
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("check-in needs a confirmed appointment, found {}", appointment.status),
            }
            .into());
        }

        if !appointments.check_in(id, at).await? {
            debug!(appointment_id = %id, "Check-in raced with another update");
        }
        info!(appointment_id = %id, at = %at, "Customer checked in");
        self.get_appointment(id).await
    }

    /// Marks a confirmed appointment as delivered and awards loyalty points
    /// on its final amount under `earn:<id>`.
    ///
    /// Completing an already completed appointment changes nothing except
    /// retrying an award that failed the first time.
    pub async fn complete_appointment(&self, id: &str) -> BookingResult<Appointment> {
        let _guard = self.locks.lock(id).await;
        let appointments = self.db.appointments();

        let appointment = appointments.get(id).await?;
        if appointment.status == AppointmentStatus::Completed {
            self.award_points(&appointment).await;
            return Ok(appointment);
        }
        let next = appointment.status.transition(id, AppointmentStatus::Completed)?;

        let change = StatusChange::new(appointment.status, next);
        if !appointments.apply(id, &change, Utc::now()).await? {
            let current = appointments.get(id).await?;
            return Err(CoreError::InvalidTransition {
                appointment_id: id.to_string(),
                from: current.status,
                to: next,
            }
            .into());
        }

        info!(appointment_id = %id, "Appointment completed");
        self.award_points(&appointment).await;
        self.events.publish(DomainEvent::AppointmentCompleted {
            appointment_id: id.to_string(),
        });
        self.get_appointment(id).await
    }

    async fn award_points(&self, appointment: &Appointment) {
        let points = self.config.loyalty.points_for(appointment.final_amount());
        if points <= 0 {
            return;
        }

        let key = format!("earn:{}", appointment.id);
        match self.ledger.earn(&appointment.customer_id, points, &key).await {
            Ok(LedgerOutcome::Applied { balance }) => {
                info!(customer_id = %appointment.customer_id, points, balance, "Loyalty points earned")
            }
            Ok(outcome) => debug!(key = %key, ?outcome, "Points award skipped"),
            Err(err) => warn!(customer_id = %appointment.customer_id, error = %err, "Failed to award loyalty points"),
        }
    }

    // =========================================================================
    // Policy
    // =========================================================================

    /// Validates and stores a salon's policy. A blank message gets the
    /// default text for the notice period.
    pub async fn save_policy(&self, input: PolicyInput) -> BookingResult<CancellationPolicy> {
        let policy = CancellationPolicy::new(
            input.salon_id,
            input.notice_period_hours,
            input.late_cancellation_penalty_percent,
            input.no_show_penalty_percent,
            input.is_active,
            input.message,
        )?;
        self.db.policies().upsert(&policy, Utc::now()).await?;

        info!(
            salon_id = %policy.salon_id,
            notice_hours = policy.notice_period_hours,
            active = policy.is_active,
            "Cancellation policy saved"
        );
        Ok(policy)
    }

    /// The stored policy, or the inactive default when the salon has none.
    pub async fn get_policy(&self, salon_id: &str) -> BookingResult<CancellationPolicy> {
        Ok(self
            .db
            .policies()
            .get(salon_id)
            .await?
            .unwrap_or_else(|| CancellationPolicy::default_for(salon_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, harness};
    use aura_core::selection::{ItemRef, ProductPick};
    use aura_core::types::LoyaltyTier;
    use chrono::{Duration, NaiveTime};

    fn services(ids: &[&str]) -> Selection {
        Selection {
            services: ids.iter().map(|id| ItemRef::from(*id)).collect(),
            ..Default::default()
        }
    }

    fn quote(selection: Selection) -> QuoteRequest {
        QuoteRequest {
            customer_id: "cust-1".into(),
            provider: BookingProvider::Salon("salon-1".into()),
            selection,
            home_service: false,
            redemption: RedemptionRequest::none(),
        }
    }

    fn policy_input(active: bool) -> PolicyInput {
        PolicyInput {
            salon_id: "salon-1".into(),
            notice_period_hours: 24,
            late_cancellation_penalty_percent: 50,
            no_show_penalty_percent: 100,
            is_active: active,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_quote_two_services() {
        let h = harness().await;
        let breakdown = h
            .service
            .compose_quote(&quote(services(&["svc-cut", "svc-color"])))
            .await
            .unwrap();
        assert_eq!(breakdown.overall_total.rupees(), 800);
        assert_eq!(breakdown.final_amount.rupees(), 800);
    }

    #[tokio::test]
    async fn test_quote_does_not_double_count_package_services() {
        let h = harness().await;
        let selection = Selection {
            services: vec![ItemRef::from("svc-cut")],
            packages: vec![ItemRef::from("pkg-cut-color")],
            ..Default::default()
        };
        let breakdown = h.service.compose_quote(&quote(selection)).await.unwrap();
        assert_eq!(breakdown.service_total.rupees(), 700);
        assert_eq!(breakdown.final_amount.rupees(), 700);
    }

    #[tokio::test]
    async fn test_quote_clamps_redemption() {
        let h = harness().await;
        h.db.loyalty().earn("cust-1", 500, "seed", Utc::now()).await.unwrap();

        let mut request = quote(services(&["svc-cut", "svc-color"]));
        request.redemption = RedemptionRequest::points(250);
        let breakdown = h.service.compose_quote(&request).await.unwrap();
        assert_eq!(breakdown.points_redeemed, 200);
        assert_eq!(breakdown.final_amount.rupees(), 600);

        request.redemption = RedemptionRequest::points(50);
        let breakdown = h.service.compose_quote(&request).await.unwrap();
        assert_eq!(breakdown.points_redeemed, 0);
        assert_eq!(breakdown.final_amount.rupees(), 800);
    }

    #[tokio::test]
    async fn test_quote_fails_when_catalog_down() {
        let h = harness().await;
        h.catalog.set_failing(true);
        let err = h
            .service
            .compose_quote(&quote(services(&["svc-cut"])))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_quote_unknown_service() {
        let h = harness().await;
        let err = h
            .service
            .compose_quote(&quote(services(&["svc-missing"])))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_submit_creates_appointment() {
        let h = harness().await;
        let mut events = h.service.subscribe();

        let appointment = h
            .service
            .submit_booking(&testing::request(services(&["svc-cut", "svc-color"])))
            .await
            .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Created);
        assert_eq!(appointment.final_amount().rupees(), 800);
        assert_eq!(appointment.items.len(), 2);

        let stored = h.db.appointments().get(&appointment.id).await.unwrap();
        assert_eq!(stored.items, appointment.items);
        assert_eq!(stored.final_amount_paise, 80_000);

        match events.try_recv().unwrap() {
            DomainEvent::AppointmentCreated { appointment_id, .. } => assert_eq!(appointment_id, appointment.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_with_offer_product_and_home_visit() {
        let h = harness().await;
        let mut request = testing::request(Selection {
            services: vec![ItemRef::from("svc-cut")],
            offers: vec![ItemRef::from("offer-spa")],
            products: vec![ProductPick {
                id: "prod-serum".into(),
                quantity: 2,
            }],
            ..Default::default()
        });
        request.home_service = true;
        request.address = Some("12 MG Road, Bengaluru".into());

        let appointment = h.service.submit_booking(&request).await.unwrap();
        // 500 + 250 + 2 × 200 + 200 home visit
        assert_eq!(appointment.final_amount().rupees(), 1_350);
        assert_eq!(appointment.offer_items().count(), 1);
        assert!(appointment.home_service.is_some());
    }

    #[tokio::test]
    async fn test_submit_redemption_rules() {
        let h = harness().await;
        h.db.loyalty().earn("cust-1", 500, "seed", Utc::now()).await.unwrap();
        let selection = Selection {
            services: vec![ItemRef::from("svc-cut"), ItemRef::from("svc-color")],
            products: vec![ProductPick {
                id: "prod-serum".into(),
                quantity: 1,
            }],
            ..Default::default()
        };

        let mut request = testing::request(selection);
        request.redemption = RedemptionRequest::points(250);
        let err = h.service.submit_booking(&request).await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::InvalidRedemption { .. })));

        request.redemption = RedemptionRequest::points(300);
        let appointment = h.service.submit_booking(&request).await.unwrap();
        assert_eq!(appointment.total().rupees(), 1_000);
        assert_eq!(appointment.final_amount().rupees(), 700);
        assert_eq!(appointment.redemption.points_to_debit(), 300);
    }

    #[tokio::test]
    async fn test_submit_requires_consent_to_active_policy() {
        let h = harness().await;
        h.service.save_policy(policy_input(true)).await.unwrap();

        let mut request = testing::request(services(&["svc-cut"]));
        request.agreed_to_policy = false;
        let err = h.service.submit_booking(&request).await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::ConsentRequired { .. })));

        request.agreed_to_policy = true;
        assert!(h.service.submit_booking(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_rejects_past_and_empty() {
        let h = harness().await;

        let mut request = testing::request(services(&["svc-cut"]));
        request.date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let err = h.service.submit_booking(&request).await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::InvalidDate { .. })));

        let request = testing::request(Selection::default());
        let err = h.service.submit_booking(&request).await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::EmptySelection)));
    }

    #[tokio::test]
    async fn test_check_in_requires_confirmed() {
        let h = harness().await;
        let appointments = h.db.appointments();
        appointments
            .insert(&testing::stored_appointment("apt-1", AppointmentStatus::Created))
            .await
            .unwrap();
        appointments
            .insert(&testing::stored_appointment("apt-2", AppointmentStatus::Confirmed))
            .await
            .unwrap();

        assert!(h.service.check_in("apt-1", Utc::now()).await.unwrap_err().is_validation());

        let first = Utc::now();
        let checked = h.service.check_in("apt-2", first).await.unwrap();
        assert!(checked.is_checked_in());

        let again = h.service.check_in("apt-2", first + Duration::minutes(5)).await.unwrap();
        assert_eq!(again.checked_in_at, checked.checked_in_at);
    }

    #[tokio::test]
    async fn test_complete_appointment() {
        let h = harness().await;
        let appointments = h.db.appointments();
        appointments
            .insert(&testing::stored_appointment("apt-1", AppointmentStatus::Created))
            .await
            .unwrap();
        appointments
            .insert(&testing::stored_appointment("apt-2", AppointmentStatus::Confirmed))
            .await
            .unwrap();

        let err = h.service.complete_appointment("apt-1").await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::InvalidTransition { .. })));

        let done = h.service.complete_appointment("apt-2").await.unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        let err = h.service.complete_appointment("missing").await.unwrap_err();
        assert!(matches!(err, BookingError::Core(CoreError::AppointmentNotFound(_))));
    }

    #[tokio::test]
    async fn test_completion_earns_points_once() {
        let h = harness().await;
        h.db.loyalty().earn("cust-1", 480, "seed", Utc::now()).await.unwrap();
        let before = h.db.loyalty().get_account("cust-1").await.unwrap();
        assert_eq!(before.tier(), LoyaltyTier::Standard);

        h.db.appointments()
            .insert(&testing::stored_appointment("apt-1", AppointmentStatus::Confirmed))
            .await
            .unwrap();

        // 10% of ₹500
        h.service.complete_appointment("apt-1").await.unwrap();
        let after = h.db.loyalty().get_account("cust-1").await.unwrap();
        assert_eq!(after.points_balance, 530);
        assert_eq!(after.points_earned, 530);
        assert_eq!(after.tier(), LoyaltyTier::Silver);

        let again = h.service.complete_appointment("apt-1").await.unwrap();
        assert_eq!(again.status, AppointmentStatus::Completed);
        assert_eq!(h.db.loyalty().get_account("cust-1").await.unwrap(), after);
    }

    #[tokio::test]
    async fn test_policy_defaults_and_save() {
        let h = harness().await;

        let default = h.service.get_policy("salon-1").await.unwrap();
        assert!(!default.is_active);
        assert_eq!(default.notice_period_hours, 24);

        let saved = h.service.save_policy(policy_input(true)).await.unwrap();
        assert_eq!(
            saved.message,
            "Please cancel your appointment at least 24 hours in advance to avoid penalties."
        );
        assert_eq!(h.service.get_policy("salon-1").await.unwrap(), saved);

        let mut bad = policy_input(true);
        bad.notice_period_hours = 0;
        assert!(h.service.save_policy(bad).await.unwrap_err().is_validation());

        let mut inverted = policy_input(true);
        inverted.late_cancellation_penalty_percent = 80;
        inverted.no_show_penalty_percent = 20;
        assert!(h.service.save_policy(inverted).await.unwrap_err().is_validation());
        assert_eq!(h.service.get_policy("salon-1").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_detect_idle_slots_from_bookings() {
        let h = harness().await;
        h.db.appointments()
            .insert(&testing::stored_appointment("apt-1", AppointmentStatus::Confirmed))
            .await
            .unwrap();
        let mut later = testing::stored_appointment("apt-2", AppointmentStatus::Created);
        later.time = NaiveTime::from_hms_opt(11, 30, 0).unwrap();
        h.db.appointments().insert(&later).await.unwrap();

        let slots = h
            .service
            .detect_idle_slots("salon-1", testing::booking_date(), None)
            .await
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].gap_size_minutes, 45);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = BookingConfig::default();
        config.payment.commission_bps = 20_000;
        let result = BookingService::new(
            testing::db().await,
            Arc::new(testing::FakeCatalog::salon()),
            Arc::new(testing::FakeGateway::new()),
            config,
        );
        assert!(matches!(result, Err(ref e) if e.is_config_error()));
    }
}
