//! # Payment Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  initiate_payment                                                       │
//! │    paid? ──► DuplicatePayment                                           │
//! │    hold redeem:<id>  ── short balance ──► InvalidRedemption             │
//! │    open order? ──► reuse        else gateway.create_order               │
//! │    amount == final_amount? ──► INSERT order ──► CAS PaymentInitiated    │
//! │                                                                         │
//! │  confirm_payment                                                        │
//! │    same payment_ref already confirmed ──► return unchanged              │
//! │    order belongs to appointment? ──► signature ok?                      │
//! │        no  ──► order failed, PaymentFailed, SignatureVerification       │
//! │        yes ──► CAS Confirmed + order paid                               │
//! │                ──► add-on sales (best-effort)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three operations hold the appointment's [`crate::locks::KeyedLocks`]
//! entry for their whole duration.
//!
//! Redeemed points leave the balance when payment is initiated, once per
//! appointment. The hold survives failed attempts, since a retry or a late
//! callback can still confirm the discounted amount, and is returned by a
//! penalty-free cancellation.

use aura_core::lifecycle::AppointmentStatus;
use aura_core::types::{AddonSale, Appointment, CommissionSplit, PaymentOrder, PaymentOrderStatus};
use aura_core::{CoreError, DomainEvent};
use aura_db::{LedgerOutcome, StatusChange};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::BookingResult;
use crate::providers::PaymentCallback;
use crate::service::BookingService;

const SIGNATURE_FAILURE: &str = "payment signature verification failed";

impl BookingService {
    /// Opens (or returns the already open) gateway order for an appointment.
    ///
    /// ## Errors
    /// - `DuplicatePayment` once the appointment is paid
    /// - `InvalidTransition` unless it is `Created`, `PaymentInitiated` or
    ///   `PaymentFailed`
    /// - `InvalidRedemption` when the balance no longer covers the redeemed
    ///   points; no gateway order is opened
    /// - `AmountMismatch` when the gateway order is not for `final_amount`
    pub async fn initiate_payment(&self, appointment_id: &str) -> BookingResult<PaymentOrder> {
        let _guard = self.locks.lock(appointment_id).await;
        let appointments = self.db.appointments();
        let orders = self.db.payment_orders();

        let appointment = appointments.get(appointment_id).await?;
        let status = appointment.status;
        if status.is_paid() {
            return Err(CoreError::DuplicatePayment {
                appointment_id: appointment_id.to_string(),
            }
            .into());
        }
        if status != AppointmentStatus::PaymentInitiated {
            status.transition(appointment_id, AppointmentStatus::PaymentInitiated)?;
        }

        self.hold_redeemed_points(&appointment).await?;

        let order = match orders.find_open(appointment_id).await? {
            Some(open) => {
                debug!(appointment_id = %appointment_id, order_ref = %open.order_ref, "Reusing open order");
                open
            }
            None => self.open_order(&appointment).await?,
        };

        let linked = appointment.payment.order_ref.as_deref() == Some(order.order_ref.as_str());
        if status != AppointmentStatus::PaymentInitiated || !linked {
            let change = StatusChange::new(status, AppointmentStatus::PaymentInitiated)
                .with_order_ref(order.order_ref.clone());
            if !appointments.apply(appointment_id, &change, Utc::now()).await? {
                let current = appointments.get(appointment_id).await?;
                return Err(CoreError::InvalidTransition {
                    appointment_id: appointment_id.to_string(),
                    from: current.status,
                    to: AppointmentStatus::PaymentInitiated,
                }
                .into());
            }

            info!(
                appointment_id = %appointment_id,
                order_ref = %order.order_ref,
                amount = order.amount_paise,
                "Payment initiated"
            );
            self.events.publish(DomainEvent::PaymentInitiated {
                appointment_id: appointment_id.to_string(),
                order_ref: order.order_ref.clone(),
            });
        }

        Ok(order)
    }

    async fn open_order(&self, appointment: &Appointment) -> BookingResult<PaymentOrder> {
        let currency = &self.config.payment.currency;
        let gateway_order = self
            .gateway
            .create_order(&appointment.id, appointment.final_amount(), currency)
            .await?;

        if gateway_order.amount_paise != appointment.final_amount_paise {
            warn!(
                appointment_id = %appointment.id,
                expected = appointment.final_amount_paise,
                actual = gateway_order.amount_paise,
                "Gateway order amount does not match"
            );
            return Err(CoreError::AmountMismatch {
                expected: appointment.final_amount_paise,
                actual: gateway_order.amount_paise,
            }
            .into());
        }

        let now = Utc::now();
        let order = PaymentOrder {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment.id.clone(),
            order_ref: gateway_order.order_ref,
            amount_paise: gateway_order.amount_paise,
            currency: gateway_order.currency,
            status: PaymentOrderStatus::Created,
            created_at: now,
            updated_at: now,
        };
        let (order, _) = self.db.payment_orders().insert_or_existing(&order).await?;
        Ok(order)
    }

    /// Applies the gateway's success callback.
    ///
    /// A repeated callback with the same payment reference returns the
    /// confirmed appointment unchanged.
    pub async fn confirm_payment(&self, callback: &PaymentCallback) -> BookingResult<Appointment> {
        let appointment_id = callback.appointment_id.as_str();
        let _guard = self.locks.lock(appointment_id).await;
        let appointments = self.db.appointments();

        let appointment = appointments.get(appointment_id).await?;
        if appointment.status.is_paid() {
            if appointment.payment.payment_ref.as_deref() == Some(callback.payment_ref.as_str()) {
                debug!(appointment_id = %appointment_id, "Duplicate payment callback ignored");
                return Ok(appointment);
            }
            return Err(CoreError::DuplicatePayment {
                appointment_id: appointment_id.to_string(),
            }
            .into());
        }
        appointment
            .status
            .transition(appointment_id, AppointmentStatus::Confirmed)?;

        // Only the appointment's latest order can confirm it.
        let order = self
            .db
            .payment_orders()
            .get_by_order_ref(&callback.order_ref)
            .await?
            .filter(|o| o.appointment_id == appointment_id)
            .filter(|o| appointment.payment.order_ref.as_deref() == Some(o.order_ref.as_str()))
            .ok_or_else(|| CoreError::PaymentOrderMismatch {
                appointment_id: appointment_id.to_string(),
                order_ref: callback.order_ref.clone(),
            })?;

        let verified = match &self.verifier {
            Some(verifier) => verifier.verify(&callback.order_ref, &callback.payment_ref, &callback.signature),
            None => self.gateway.verify(callback).await?,
        };
        if !verified {
            warn!(appointment_id = %appointment_id, order_ref = %order.order_ref, "Payment signature rejected");
            self.fail_attempt(&appointment, SIGNATURE_FAILURE).await?;
            return Err(CoreError::SignatureVerification {
                appointment_id: appointment_id.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let confirmed = appointments
            .confirm(appointment_id, appointment.status, &order.order_ref, &callback.payment_ref, now)
            .await?;
        if !confirmed {
            let current = appointments.get(appointment_id).await?;
            if current.payment.payment_ref.as_deref() == Some(callback.payment_ref.as_str()) {
                return Ok(current);
            }
            return Err(CoreError::InvalidTransition {
                appointment_id: appointment_id.to_string(),
                from: current.status,
                to: AppointmentStatus::Confirmed,
            }
            .into());
        }

        self.record_addon_sales(&appointment, now).await;

        info!(
            appointment_id = %appointment_id,
            payment_ref = %callback.payment_ref,
            amount = appointment.final_amount_paise,
            "Payment confirmed"
        );
        self.events.publish(DomainEvent::PaymentConfirmed {
            appointment_id: appointment_id.to_string(),
            payment_ref: callback.payment_ref.clone(),
            amount: appointment.final_amount(),
        });

        self.get_appointment(appointment_id).await
    }

    /// Records a failed payment attempt. The appointment stays open for a
    /// retry; a second report for the same attempt changes nothing.
    pub async fn record_payment_failure(&self, appointment_id: &str, reason: &str) -> BookingResult<Appointment> {
        let _guard = self.locks.lock(appointment_id).await;

        let appointment = self.db.appointments().get(appointment_id).await?;
        if appointment.status == AppointmentStatus::PaymentFailed {
            return Ok(appointment);
        }
        appointment
            .status
            .transition(appointment_id, AppointmentStatus::PaymentFailed)?;

        if !self.fail_attempt(&appointment, reason).await? {
            let current = self.db.appointments().get(appointment_id).await?;
            return Err(CoreError::InvalidTransition {
                appointment_id: appointment_id.to_string(),
                from: current.status,
                to: AppointmentStatus::PaymentFailed,
            }
            .into());
        }

        self.get_appointment(appointment_id).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Closes the open order and moves a `PaymentInitiated` appointment to
    /// `PaymentFailed`. Returns false when the status update lost a race.
    async fn fail_attempt(&self, appointment: &Appointment, reason: &str) -> BookingResult<bool> {
        let now = Utc::now();
        if let Some(order_ref) = appointment.payment.order_ref.as_deref() {
            self.db.payment_orders().mark_failed(order_ref, now).await?;
        }

        if appointment.status == AppointmentStatus::PaymentInitiated {
            let change = StatusChange::new(AppointmentStatus::PaymentInitiated, AppointmentStatus::PaymentFailed)
                .with_failure_reason(reason);
            if !self.db.appointments().apply(&appointment.id, &change, now).await? {
                return Ok(false);
            }
        }

        if let Err(err) = self.gateway.report_failure(&appointment.id, reason).await {
            warn!(appointment_id = %appointment.id, error = %err, "Could not report payment failure to gateway");
        }

        info!(appointment_id = %appointment.id, reason = %reason, "Payment attempt failed");
        self.events.publish(DomainEvent::PaymentFailed {
            appointment_id: appointment.id.clone(),
            reason: reason.to_string(),
        });
        Ok(true)
    }

    /// Takes the redeemed points off the balance under `redeem:<id>`.
    async fn hold_redeemed_points(&self, appointment: &Appointment) -> BookingResult<()> {
        let points = appointment.redemption.points_to_debit();
        if points <= 0 {
            return Ok(());
        }

        let key = format!("redeem:{}", appointment.id);
        match self.ledger.debit(&appointment.customer_id, points, &key).await? {
            LedgerOutcome::Applied { balance } => {
                info!(customer_id = %appointment.customer_id, points, balance, "Loyalty points held for payment")
            }
            LedgerOutcome::AlreadyApplied => debug!(key = %key, "Loyalty points already held"),
            LedgerOutcome::InsufficientBalance { available } => {
                warn!(
                    appointment_id = %appointment.id,
                    points,
                    available,
                    "Balance no longer covers redeemed points"
                );
                return Err(CoreError::InvalidRedemption {
                    requested: points,
                    reason: format!("only {} points available", available),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Turns booked add-on offers into sale records. Failures are logged.
    async fn record_addon_sales(&self, appointment: &Appointment, now: DateTime<Utc>) {
        let commission = self.config.payment.commission();
        let sales: Vec<AddonSale> = appointment
            .offer_items()
            .map(|item| {
                let split = CommissionSplit::compute(item.price(), commission);
                AddonSale {
                    id: uuid::Uuid::new_v4().to_string(),
                    appointment_id: appointment.id.clone(),
                    offer_id: item.service_id.clone(),
                    service_name: item.name.clone(),
                    price_paise: item.price_paise,
                    admin_commission_paise: split.admin_commission.paise(),
                    salon_earning_paise: split.salon_earning.paise(),
                    created_at: now,
                }
            })
            .collect();
        if sales.is_empty() {
            return;
        }

        match self.db.addon_sales().record(&sales).await {
            Ok(recorded) => info!(appointment_id = %appointment.id, recorded, "Add-on sales recorded"),
            Err(err) => warn!(appointment_id = %appointment.id, error = %err, "Failed to record add-on sales"),
        }
    }
}
