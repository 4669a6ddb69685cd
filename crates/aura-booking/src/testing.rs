//! In-memory collaborators and fixtures shared by the unit tests.

use async_trait::async_trait;
use aura_core::booking::BookingRequest;
use aura_core::catalog::{AddOnOffer, DiscountKind, Package, PackageService, Product, Service};
use aura_core::lifecycle::AppointmentStatus;
use aura_core::money::Money;
use aura_core::pricing::RedemptionRequest;
use aura_core::selection::Selection;
use aura_core::types::{Appointment, BookedItem, BookingProvider, PaymentMeta, RedemptionInfo};
use aura_core::upsell::CustomerHistory;
use aura_db::{Database, DbConfig};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::BookingConfig;
use crate::error::{BookingError, BookingResult};
use crate::providers::{
    AcceptancePredictor, CatalogProvider, GatewayOrder, HistoryProvider, PaymentCallback,
    PaymentGateway, PredictionRequest, RefundReceipt,
};
use crate::retry::RetryPolicy;
use crate::service::BookingService;
use crate::signature::HmacSignatureVerifier;

pub const SECRET: &str = "test-secret";

pub async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()
}

/// A wall clock comfortably before every fixture appointment.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, 20, 9, 0, 0).unwrap()
}

// =============================================================================
// Catalog
// =============================================================================

fn service(id: &str, name: &str, category: &str, rupees: i64, minutes: u32) -> Service {
    Service {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        price_paise: Money::from_rupees(rupees).paise(),
        discounted_price_paise: None,
        duration_minutes: minutes,
    }
}

pub struct FakeCatalog {
    services: Vec<Service>,
    packages: Vec<Package>,
    offers: Vec<AddOnOffer>,
    products: Vec<Product>,
    failing: AtomicBool,
}

impl FakeCatalog {
    /// Cut ₹500, color ₹300, massage ₹400, nails ₹350; package cut+color
    /// at ₹700; one ₹250 offer; one ₹200 product.
    pub fn salon() -> Self {
        let cut = service("svc-cut", "Haircut", "hair", 500, 45);
        let color = service("svc-color", "Hair color", "hair", 300, 60);
        FakeCatalog {
            packages: vec![Package {
                id: "pkg-cut-color".into(),
                name: "Cut & color".into(),
                services: [&cut, &color]
                    .iter()
                    .map(|s| PackageService {
                        service_id: s.id.clone(),
                        name: s.name.clone(),
                        price_paise: s.price_paise,
                        duration_minutes: s.duration_minutes,
                    })
                    .collect(),
                total_price_paise: Money::from_rupees(800).paise(),
                discounted_price_paise: Some(Money::from_rupees(700).paise()),
            }],
            services: vec![
                cut,
                color,
                service("svc-massage", "Head massage", "spa", 400, 20),
                service("svc-nails", "Manicure", "nails", 350, 30),
            ],
            offers: vec![AddOnOffer {
                id: "offer-spa".into(),
                salon_id: "salon-1".into(),
                service_name: "Scalp treatment".into(),
                base_price_paise: Money::from_rupees(250).paise(),
                discount_kind: DiscountKind::Fixed,
                discount_value: 0,
                duration_minutes: 15,
                start_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                end_date: Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0).unwrap(),
                is_active: true,
            }],
            products: vec![Product {
                id: "prod-serum".into(),
                name: "Hair serum".into(),
                price_paise: Money::from_rupees(200).paise(),
                discounted_price_paise: None,
            }],
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> BookingResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BookingError::provider("catalog", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn list_services(&self, _salon_id: &str) -> BookingResult<Vec<Service>> {
        self.check()?;
        Ok(self.services.clone())
    }

    async fn list_packages(&self, _salon_id: &str) -> BookingResult<Vec<Package>> {
        self.check()?;
        Ok(self.packages.clone())
    }

    async fn list_active_offers(
        &self,
        _salon_id: &str,
        as_of: DateTime<Utc>,
    ) -> BookingResult<Vec<AddOnOffer>> {
        self.check()?;
        Ok(self.offers.iter().filter(|o| o.is_valid_at(as_of)).cloned().collect())
    }

    async fn list_products(&self, _salon_id: &str) -> BookingResult<Vec<Product>> {
        self.check()?;
        Ok(self.products.clone())
    }
}

// =============================================================================
// History & Predictor
// =============================================================================

pub struct FakeHistory(Option<CustomerHistory>);

impl FakeHistory {
    pub fn loyal(visits: u32) -> Self {
        FakeHistory(Some(CustomerHistory {
            customer_loyalty: visits,
            past_addon_history: false,
        }))
    }

    pub fn failing() -> Self {
        FakeHistory(None)
    }
}

#[async_trait]
impl HistoryProvider for FakeHistory {
    async fn get_history(&self, _customer_id: &str, _salon_id: &str) -> BookingResult<CustomerHistory> {
        self.0.ok_or_else(|| BookingError::provider("history", "timed out"))
    }
}

pub struct FakePredictor(Option<f64>);

impl FakePredictor {
    pub fn answering(p: f64) -> Self {
        FakePredictor(Some(p))
    }

    pub fn failing() -> Self {
        FakePredictor(None)
    }
}

#[async_trait]
impl AcceptancePredictor for FakePredictor {
    async fn predict(&self, _request: &PredictionRequest) -> BookingResult<f64> {
        self.0.ok_or_else(|| BookingError::provider("predictor", "model offline"))
    }
}

// =============================================================================
// Gateway
// =============================================================================

pub struct FakeGateway {
    verifier: HmacSignatureVerifier,
    orders: AtomicU32,
    amount_override: Mutex<Option<i64>>,
    fail_refunds: AtomicBool,
    pub refunds: Mutex<Vec<(String, i64)>>,
    pub failures: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        FakeGateway {
            verifier: HmacSignatureVerifier::new(SECRET).unwrap(),
            orders: AtomicU32::new(0),
            amount_override: Mutex::new(None),
            fail_refunds: AtomicBool::new(false),
            refunds: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn orders_created(&self) -> u32 {
        self.orders.load(Ordering::SeqCst)
    }

    /// Makes the gateway answer with a different amount than requested.
    pub fn override_amount(&self, paise: Option<i64>) {
        *self.amount_override.lock().unwrap() = paise;
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn callback(&self, appointment_id: &str, order_ref: &str, payment_ref: &str) -> PaymentCallback {
        PaymentCallback {
            appointment_id: appointment_id.to_string(),
            order_ref: order_ref.to_string(),
            payment_ref: payment_ref.to_string(),
            signature: self.verifier.sign(order_ref, payment_ref),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        _appointment_id: &str,
        amount: Money,
        currency: &str,
    ) -> BookingResult<GatewayOrder> {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        let amount_paise = self.amount_override.lock().unwrap().unwrap_or(amount.paise());
        Ok(GatewayOrder {
            order_ref: format!("order_{}", n),
            amount_paise,
            currency: currency.to_string(),
        })
    }

    async fn verify(&self, callback: &PaymentCallback) -> BookingResult<bool> {
        Ok(self
            .verifier
            .verify(&callback.order_ref, &callback.payment_ref, &callback.signature))
    }

    async fn report_failure(&self, appointment_id: &str, reason: &str) -> BookingResult<()> {
        self.failures
            .lock()
            .unwrap()
            .push((appointment_id.to_string(), reason.to_string()));
        Ok(())
    }

    async fn refund(&self, order_ref: &str, amount: Money) -> BookingResult<RefundReceipt> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(BookingError::Gateway("refund rejected".into()));
        }
        self.refunds
            .lock()
            .unwrap()
            .push((order_ref.to_string(), amount.paise()));
        Ok(RefundReceipt {
            refund_ref: format!("rfnd_{}", order_ref),
            amount_paise: amount.paise(),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A stored ₹500 haircut for cust-1 at salon-1 on [`booking_date`] 10:00.
pub fn stored_appointment(id: &str, status: AppointmentStatus) -> Appointment {
    let now = now();
    Appointment {
        id: id.to_string(),
        customer_id: "cust-1".to_string(),
        provider: BookingProvider::Salon("salon-1".to_string()),
        staff_id: Some("staff-1".to_string()),
        items: vec![BookedItem {
            service_id: "svc-cut".to_string(),
            name: "Haircut".to_string(),
            price_paise: 50_000,
            duration_minutes: 45,
            is_offer: false,
        }],
        products: vec![],
        date: booking_date(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        customer_notes: None,
        home_service: None,
        redemption: RedemptionInfo::default(),
        total_paise: 50_000,
        final_amount_paise: 50_000,
        status,
        payment: PaymentMeta::default(),
        checked_in_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn request(selection: Selection) -> BookingRequest {
    BookingRequest {
        customer_id: "cust-1".into(),
        provider: BookingProvider::Salon("salon-1".into()),
        staff_id: Some("staff-1".into()),
        selection,
        date: booking_date(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        customer_notes: None,
        home_service: false,
        address: None,
        redemption: RedemptionRequest::none(),
        agreed_to_policy: true,
    }
}

pub struct Harness {
    pub service: BookingService,
    pub db: Database,
    pub catalog: Arc<FakeCatalog>,
    pub gateway: Arc<FakeGateway>,
}

/// A service over an in-memory database with fake collaborators, a
/// predictor-free suggestion path and no retry delays.
pub async fn harness() -> Harness {
    let db = db().await;
    let catalog = Arc::new(FakeCatalog::salon());
    let gateway = Arc::new(FakeGateway::new());
    let service = BookingService::new(
        db.clone(),
        catalog.clone(),
        gateway.clone(),
        BookingConfig::default(),
    )
    .unwrap()
    .with_history(Arc::new(FakeHistory::loyal(0)))
    .without_predictor()
    .with_retry(RetryPolicy::none());

    Harness {
        service,
        db,
        catalog,
        gateway,
    }
}
