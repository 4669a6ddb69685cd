//! # Domain Events
//!
//! Typed lifecycle signals. The booking crate publishes these on an
//! injected bus; dashboards and notifiers subscribe instead of polling.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cancellation::CancellationType;
use crate::money::Money;
use crate::types::BookingProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AppointmentCreated {
        appointment_id: String,
        customer_id: String,
        provider: BookingProvider,
        final_amount: Money,
    },
    PaymentInitiated {
        appointment_id: String,
        order_ref: String,
    },
    PaymentConfirmed {
        appointment_id: String,
        payment_ref: String,
        amount: Money,
    },
    PaymentFailed {
        appointment_id: String,
        reason: String,
    },
    AppointmentCompleted {
        appointment_id: String,
    },
    AppointmentCancelled {
        appointment_id: String,
        record_id: String,
        cancellation_type: CancellationType,
        refund: Money,
    },
    RefundProcessed {
        record_id: String,
        appointment_id: String,
        amount: Money,
    },
}

impl DomainEvent {
    /// The appointment the event is about.
    pub fn appointment_id(&self) -> &str {
        match self {
            DomainEvent::AppointmentCreated { appointment_id, .. }
            | DomainEvent::PaymentInitiated { appointment_id, .. }
            | DomainEvent::PaymentConfirmed { appointment_id, .. }
            | DomainEvent::PaymentFailed { appointment_id, .. }
            | DomainEvent::AppointmentCompleted { appointment_id }
            | DomainEvent::AppointmentCancelled { appointment_id, .. }
            | DomainEvent::RefundProcessed { appointment_id, .. } => appointment_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = DomainEvent::PaymentFailed {
            appointment_id: "apt-1".to_string(),
            reason: "card declined".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payment_failed");
        assert_eq!(event.appointment_id(), "apt-1");
    }
}
