//! # Cancellation & Refunds
//!
//! Cancelling flips the appointment to `Cancelled` and stores the
//! classified record in one transaction. Refunds are a separate step so a
//! dashboard can retry them.
//!
//! ```text
//! refund_status:  Eligible ──claim──► Pending ──gateway ok──► Processed
//!                     ▲                  │
//!                     └──gateway failed──┘
//! ```

use aura_core::cancellation::{classify, CancellationActor, CancellationRecord, Classification, RefundStatus};
use aura_core::lifecycle::AppointmentStatus;
use aura_core::types::Appointment;
use aura_core::{CoreError, DomainEvent};
use aura_db::LedgerOutcome;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{BookingError, BookingResult};
use crate::service::BookingService;

impl BookingService {
    /// Cancels a confirmed appointment and records the refund owed.
    ///
    /// The salon's policy decides the fee unless the salon itself cancels.
    /// Cancelling an already cancelled appointment returns its record.
    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
        cancelled_at: DateTime<Utc>,
        actor: CancellationActor,
        reason: Option<String>,
    ) -> BookingResult<CancellationRecord> {
        let _guard = self.locks.lock(appointment_id).await;
        let appointments = self.db.appointments();

        let appointment = appointments.get(appointment_id).await?;
        if appointment.status == AppointmentStatus::Cancelled {
            if let Some(existing) = self.db.cancellations().get_by_appointment(appointment_id).await? {
                return Ok(existing);
            }
        }
        appointment
            .status
            .transition(appointment_id, AppointmentStatus::Cancelled)?;

        let classification = if actor.waives_penalty() {
            Classification::standard()
        } else {
            let policy = match appointment.provider.salon_id() {
                Some(salon_id) => self.db.policies().get(salon_id).await?,
                None => None,
            };
            classify(
                appointment.scheduled_at(),
                appointment.is_checked_in(),
                policy.as_ref(),
                cancelled_at,
            )
        };

        let record = CancellationRecord::new(
            appointment_id,
            appointment.final_amount(),
            classification,
            actor,
            reason,
            cancelled_at,
        );
        if !appointments.cancel_with_record(appointment.status, &record).await? {
            let current = appointments.get(appointment_id).await?;
            return Err(CoreError::InvalidTransition {
                appointment_id: appointment_id.to_string(),
                from: current.status,
                to: AppointmentStatus::Cancelled,
            }
            .into());
        }

        info!(
            appointment_id = %appointment_id,
            kind = %record.cancellation_type,
            fee = record.fee_paise,
            refund = record.refund_paise,
            "Appointment cancelled"
        );

        if record.fee_paise == 0 {
            self.restore_redeemed_points(&appointment).await;
        }

        self.events.publish(DomainEvent::AppointmentCancelled {
            appointment_id: appointment_id.to_string(),
            record_id: record.id.clone(),
            cancellation_type: record.cancellation_type,
            refund: record.refund(),
        });
        Ok(record)
    }

    pub async fn get_cancellation(&self, appointment_id: &str) -> BookingResult<Option<CancellationRecord>> {
        Ok(self.db.cancellations().get_by_appointment(appointment_id).await?)
    }

    /// Pays out the refund of a cancellation record.
    ///
    /// ## Errors
    /// - `CancellationNotFound` for an unknown record
    /// - `RefundAlreadyProcessed` once processed
    /// - `RefundInProgress` while another caller holds the claim
    /// - the gateway's error, after the claim is released
    pub async fn process_refund(&self, record_id: &str) -> BookingResult<CancellationRecord> {
        let _guard = self.locks.lock(&format!("refund:{}", record_id)).await;
        let cancellations = self.db.cancellations();

        let record = cancellations
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| CoreError::CancellationNotFound(record_id.to_string()))?;
        refund_claimable(&record)?;

        if !cancellations.claim_refund(record_id).await? {
            let current = cancellations
                .get_by_id(record_id)
                .await?
                .ok_or_else(|| CoreError::CancellationNotFound(record_id.to_string()))?;
            refund_claimable(&current)?;
            return Err(CoreError::RefundInProgress {
                record_id: record_id.to_string(),
            }
            .into());
        }

        if record.refund_paise > 0 {
            if let Err(err) = self.pay_refund(&record).await {
                warn!(record_id = %record_id, error = %err, "Refund failed, releasing claim");
                cancellations.release_refund(record_id).await?;
                return Err(err);
            }
        } else {
            debug!(record_id = %record_id, "Nothing to refund");
        }

        cancellations.mark_processed(record_id, Utc::now()).await?;

        info!(
            record_id = %record_id,
            appointment_id = %record.appointment_id,
            amount = record.refund_paise,
            "Refund processed"
        );
        self.events.publish(DomainEvent::RefundProcessed {
            record_id: record_id.to_string(),
            appointment_id: record.appointment_id.clone(),
            amount: record.refund(),
        });

        cancellations
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| CoreError::CancellationNotFound(record_id.to_string()).into())
    }

    async fn pay_refund(&self, record: &CancellationRecord) -> BookingResult<()> {
        let appointment = self.db.appointments().get(&record.appointment_id).await?;
        let order_ref = appointment
            .payment
            .order_ref
            .as_deref()
            .ok_or_else(|| BookingError::Gateway(format!("appointment {} has no payment order", appointment.id)))?;

        let receipt = self.gateway.refund(order_ref, record.refund()).await?;
        info!(
            record_id = %record.id,
            refund_ref = %receipt.refund_ref,
            amount = receipt.amount_paise,
            "Gateway refund issued"
        );
        Ok(())
    }

    /// Gives back points redeemed on a penalty-free cancellation.
    async fn restore_redeemed_points(&self, appointment: &Appointment) {
        let points = appointment.redemption.points_to_debit();
        if points <= 0 {
            return;
        }

        let key = format!("restore:{}", appointment.id);
        match self.ledger.credit(&appointment.customer_id, points, &key).await {
            Ok(LedgerOutcome::Applied { balance }) => {
                info!(customer_id = %appointment.customer_id, points, balance, "Redeemed points restored")
            }
            Ok(outcome) => debug!(key = %key, ?outcome, "Points restore skipped"),
            Err(err) => warn!(customer_id = %appointment.customer_id, error = %err, "Failed to restore redeemed points"),
        }
    }
}

fn refund_claimable(record: &CancellationRecord) -> BookingResult<()> {
    match record.refund_status {
        RefundStatus::Eligible => Ok(()),
        RefundStatus::Processed => Err(CoreError::RefundAlreadyProcessed {
            record_id: record.id.clone(),
        }
        .into()),
        RefundStatus::Pending => Err(CoreError::RefundInProgress {
            record_id: record.id.clone(),
        }
        .into()),
    }
}
