//! # Booking Submission
//!
//! Rules for turning a client draft into a `Created` appointment. The
//! booking service resolves the cart and prices it; this module checks the
//! submission and freezes the result.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationPolicy;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::AppointmentStatus;
use crate::pricing::{PricingBreakdown, RedemptionRequest};
use crate::selection::{BookingCart, Selection};
use crate::types::{Appointment, BookingProvider, HomeServiceDetails, PaymentMeta, RedemptionInfo};
use crate::validation::{validate_address, validate_id, validate_notes};

/// A booking as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer_id: String,
    pub provider: BookingProvider,
    #[serde(default)]
    pub staff_id: Option<String>,
    pub selection: Selection,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub customer_notes: Option<String>,
    #[serde(default)]
    pub home_service: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub redemption: RedemptionRequest,
    /// Explicit agreement to the salon's cancellation policy.
    #[serde(default)]
    pub agreed_to_policy: bool,
}

impl BookingRequest {
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_time(self.time))
    }
}

/// Submission fields that survived validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub address: Option<String>,
    pub customer_notes: Option<String>,
}

/// Checks everything about a submission that does not need prices.
///
/// ## Rules
/// - customer and provider ids are present
/// - the appointment starts after `now`
/// - a home visit carries an address
/// - an active policy has been agreed to
pub fn validate_submission(
    request: &BookingRequest,
    policy: Option<&CancellationPolicy>,
    now: DateTime<Utc>,
) -> CoreResult<ValidatedSubmission> {
    validate_id("customer_id", &request.customer_id)?;
    validate_id("provider.id", request.provider.id())?;

    if request.scheduled_at() <= now {
        return Err(CoreError::InvalidDate {
            date: format!("{} {}", request.date, request.time.format("%H:%M")),
            reason: "appointment must be in the future".to_string(),
        });
    }

    let address = if request.home_service {
        Some(validate_address(request.address.as_deref())?)
    } else {
        None
    };

    if let Some(policy) = policy.filter(|p| p.is_active) {
        if !request.agreed_to_policy {
            return Err(CoreError::ConsentRequired {
                salon_id: policy.salon_id.clone(),
            });
        }
    }

    Ok(ValidatedSubmission {
        address,
        customer_notes: validate_notes(request.customer_notes.as_deref())?,
    })
}

/// Freezes a priced cart into a new appointment in `Created`.
pub fn build_appointment(
    request: &BookingRequest,
    submission: ValidatedSubmission,
    cart: &BookingCart,
    breakdown: &PricingBreakdown,
    now: DateTime<Utc>,
) -> CoreResult<Appointment> {
    if !cart.has_bookable_items() {
        return Err(CoreError::EmptySelection);
    }

    let home_service = submission.address.map(|address| HomeServiceDetails {
        address,
        fee_paise: breakdown.home_service_fee.paise(),
    });

    Ok(Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: request.customer_id.trim().to_string(),
        provider: request.provider.clone(),
        staff_id: request.staff_id.clone(),
        items: cart.booked_items(),
        products: cart.booked_products(),
        date: request.date,
        time: request.time,
        customer_notes: submission.customer_notes,
        home_service,
        redemption: RedemptionInfo {
            use_points: breakdown.points_redeemed > 0,
            points_to_redeem: breakdown.points_redeemed,
            discount_paise: breakdown.discount_amount.paise(),
        },
        total_paise: breakdown.overall_total.paise(),
        final_amount_paise: breakdown.final_amount.paise(),
        status: AppointmentStatus::Created,
        payment: PaymentMeta::default(),
        checked_in_at: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Service;
    use crate::pricing::{compute_total, PricingConfig};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn request() -> BookingRequest {
        BookingRequest {
            customer_id: "cust-1".to_string(),
            provider: BookingProvider::Salon("salon-1".to_string()),
            staff_id: None,
            selection: Selection {
                services: vec!["a".into()],
                ..Default::default()
            },
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            customer_notes: Some("  ".to_string()),
            home_service: false,
            address: None,
            redemption: RedemptionRequest::none(),
            agreed_to_policy: false,
        }
    }

    fn cart() -> BookingCart {
        BookingCart {
            services: vec![Service {
                id: "a".to_string(),
                name: "Haircut".to_string(),
                category: "hair".to_string(),
                price_paise: 50_000,
                discounted_price_paise: None,
                duration_minutes: 45,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_past_date_rejected() {
        let mut r = request();
        r.date = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert!(matches!(
            validate_submission(&r, None, now()),
            Err(CoreError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_home_service_requires_address() {
        let mut r = request();
        r.home_service = true;
        let err = validate_submission(&r, None, now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        r.address = Some("4 Park Street".to_string());
        let ok = validate_submission(&r, None, now()).unwrap();
        assert_eq!(ok.address.as_deref(), Some("4 Park Street"));
    }

    #[test]
    fn test_active_policy_requires_consent() {
        let mut policy = CancellationPolicy::default_for("salon-1");
        assert!(validate_submission(&request(), Some(&policy), now()).is_ok());

        policy.is_active = true;
        assert!(matches!(
            validate_submission(&request(), Some(&policy), now()),
            Err(CoreError::ConsentRequired { .. })
        ));

        let mut agreed = request();
        agreed.agreed_to_policy = true;
        assert!(validate_submission(&agreed, Some(&policy), now()).is_ok());
    }

    #[test]
    fn test_build_freezes_totals() {
        let mut r = request();
        r.home_service = true;
        r.address = Some("4 Park Street".to_string());
        let submission = validate_submission(&r, None, now()).unwrap();
        let breakdown = compute_total(
            &cart(),
            true,
            &RedemptionRequest::points(200),
            1_000,
            &PricingConfig::default(),
        )
        .unwrap();

        let apt = build_appointment(&r, submission, &cart(), &breakdown, now()).unwrap();

        assert_eq!(apt.status, AppointmentStatus::Created);
        assert_eq!(apt.total_paise, 70_000);
        assert_eq!(apt.final_amount_paise, 50_000);
        assert_eq!(apt.redemption.points_to_redeem, 200);
        assert_eq!(apt.home_service.as_ref().unwrap().fee_paise, 20_000);
        assert_eq!(apt.items.len(), 1);
        assert_eq!(apt.customer_notes, None);
        assert_eq!(apt.scheduled_at(), r.scheduled_at());
        assert!(apt.scheduled_at() > now() + Duration::hours(24));
    }
}
