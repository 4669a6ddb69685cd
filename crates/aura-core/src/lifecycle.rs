//! # Appointment Lifecycle
//!
//! The appointment state machine. Every persisted status change goes
//! through [`AppointmentStatus::transition`] first, and the database layer
//! then applies it as a compare-and-set on the previous status.
//!
//! ```text
//! ┌──────────┐ initiate ┌──────────────────┐ verified ┌───────────┐
//! │ Created  │─────────►│ PaymentInitiated │─────────►│ Confirmed │
//! └──────────┘          └──────┬───────────┘          └─────┬─────┘
//!                        fail  │     ▲ retry                │
//!                              ▼     │              cancel  │  complete
//!                       ┌────────────┴──┐                   ▼      ▼
//!                       │ PaymentFailed │──late cb──► ┌─────────┐ ┌─────────┐
//!                       └───────────────┘  (verified) │Cancelled│ │Completed│
//!                                                     └─────────┘ └─────────┘
//! ```
//!
//! Draft lives on the client only; submission creates the appointment
//! directly in `Created`.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Persisted status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Submitted, totals frozen, no payment order yet.
    Created,
    /// A gateway order is open.
    PaymentInitiated,
    /// The last payment attempt failed; the customer may retry.
    PaymentFailed,
    /// Paid and booked.
    Confirmed,
    /// Service delivered.
    Completed,
    /// Cancelled after confirmation.
    Cancelled,
}

impl AppointmentStatus {
    /// Stable lowercase name, matching the serde and SQL representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Created => "created",
            AppointmentStatus::PaymentInitiated => "payment_initiated",
            AppointmentStatus::PaymentFailed => "payment_failed",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable from this one in a single step.
    pub const fn next_states(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Created => &[PaymentInitiated],
            PaymentInitiated => &[Confirmed, PaymentFailed],
            PaymentFailed => &[PaymentInitiated, Confirmed],
            Confirmed => &[Cancelled, Completed],
            Completed | Cancelled => &[],
        }
    }

    /// Statuses from which `target` can be reached in one step.
    ///
    /// Used to build the `WHERE status IN (...)` guard of a
    /// compare-and-set update.
    pub fn predecessors(target: AppointmentStatus) -> Vec<AppointmentStatus> {
        use AppointmentStatus::*;
        [Created, PaymentInitiated, PaymentFailed, Confirmed, Completed, Cancelled]
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }

    #[inline]
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.next_states().contains(&next)
    }

    /// True once nothing can happen to the appointment any more.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    /// True when money has been captured for the appointment.
    #[inline]
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Confirmed
                | AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
        )
    }

    /// Validates a transition for the given appointment.
    ///
    /// ## Example
    /// ```rust
    /// use aura_core::lifecycle::AppointmentStatus;
    ///
    /// let next = AppointmentStatus::Created
    ///     .transition("apt-1", AppointmentStatus::PaymentInitiated)
    ///     .unwrap();
    /// assert_eq!(next, AppointmentStatus::PaymentInitiated);
    ///
    /// assert!(AppointmentStatus::Created
    ///     .transition("apt-1", AppointmentStatus::Confirmed)
    ///     .is_err());
    /// ```
    pub fn transition(
        self,
        appointment_id: &str,
        next: AppointmentStatus,
    ) -> CoreResult<AppointmentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                appointment_id: appointment_id.to_string(),
                from: self,
                to: next,
            })
        }
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Created
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_happy_path() {
        let s = Created.transition("a", PaymentInitiated).unwrap();
        let s = s.transition("a", Confirmed).unwrap();
        let s = s.transition("a", Completed).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn test_payment_retry_loop() {
        let s = PaymentInitiated.transition("a", PaymentFailed).unwrap();
        let s = s.transition("a", PaymentInitiated).unwrap();
        assert_eq!(s, PaymentInitiated);
        // A verified callback can still land after the client gave up.
        assert!(PaymentFailed.can_transition_to(Confirmed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(Created.transition("a", Cancelled).is_err());
        assert!(Cancelled.transition("a", Confirmed).is_err());
        assert!(Completed.transition("a", Cancelled).is_err());
        assert!(Confirmed.transition("a", PaymentInitiated).is_err());
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(
            AppointmentStatus::predecessors(Confirmed),
            vec![PaymentInitiated, PaymentFailed]
        );
        assert_eq!(
            AppointmentStatus::predecessors(PaymentInitiated),
            vec![Created, PaymentFailed]
        );
        assert_eq!(AppointmentStatus::predecessors(Cancelled), vec![Confirmed]);
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for status in [Created, PaymentInitiated, PaymentFailed, Confirmed, Completed, Cancelled] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
