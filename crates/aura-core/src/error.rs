//! # Error Types
//!
//! Domain-specific error types for aura-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  aura-core errors (this file)                                          │
//! │  ├── CoreError        - Booking rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  aura-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  aura-booking errors (separate crate)                                  │
//! │  └── BookingError     - Orchestration + collaborator failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → BookingError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Rules
//! - Validation-class errors (`EmptySelection`, `InvalidDate`,
//!   `ConsentRequired`, `InvalidRedemption`, `Validation`) block the
//!   transition and surface to the user immediately.
//! - `SignatureVerification` fails one payment attempt, never the appointment.
//! - `PolicyNotFound` is informational: cancellation falls back to zero fee.

use thiserror::Error;

use crate::lifecycle::AppointmentStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Booking rule violations and lifecycle failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The cart has no services, packages, add-ons or offers.
    ///
    /// Products alone never make a booking.
    #[error("Select at least one service, package, add-on or offer")]
    EmptySelection,

    /// The appointment date/time is missing or already in the past.
    #[error("Invalid appointment date {date}: {reason}")]
    InvalidDate { date: String, reason: String },

    /// The salon has an active cancellation policy the customer has not
    /// agreed to.
    #[error("Cancellation policy of salon {salon_id} must be accepted before booking")]
    ConsentRequired { salon_id: String },

    /// Loyalty redemption does not satisfy the block/balance/cap rules.
    ///
    /// ## User Workflow
    /// ```text
    /// Balance: 500 pts   Overall: ₹1000   Request: 250 pts
    ///      │
    ///      ▼
    /// 250 % 100 != 0
    ///      │
    ///      ▼
    /// InvalidRedemption { requested: 250, reason: "must be a multiple of 100" }
    /// ```
    #[error("Cannot redeem {requested} points: {reason}")]
    InvalidRedemption { requested: i64, reason: String },

    /// A payment was requested for an appointment that is already paid.
    #[error("Appointment {appointment_id} is already paid")]
    DuplicatePayment { appointment_id: String },

    /// The gateway callback signature did not match.
    #[error("Payment signature verification failed for appointment {appointment_id}")]
    SignatureVerification { appointment_id: String },

    /// No cancellation policy is stored for the salon.
    #[error("No cancellation policy for salon {salon_id}")]
    PolicyNotFound { salon_id: String },

    /// The refund for this cancellation record has already been paid out.
    #[error("Refund for cancellation {record_id} already processed")]
    RefundAlreadyProcessed { record_id: String },

    /// Another operator is currently processing this refund.
    #[error("Refund for cancellation {record_id} is already in progress")]
    RefundInProgress { record_id: String },

    /// The appointment is not in a state that allows the requested transition.
    #[error("Appointment {appointment_id} cannot move from {from} to {to}")]
    InvalidTransition {
        appointment_id: String,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    /// Appointment not found.
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    /// Cancellation record not found.
    #[error("Cancellation record not found: {0}")]
    CancellationNotFound(String),

    /// The gateway returned an order for a different amount than the
    /// appointment's frozen final amount.
    #[error("Payment amount mismatch: expected {expected} paise, gateway returned {actual} paise")]
    AmountMismatch { expected: i64, actual: i64 },

    /// A callback referenced an order that is not the appointment's
    /// current order.
    #[error("Order {order_ref} does not belong to appointment {appointment_id}")]
    PaymentOrderMismatch {
        appointment_id: String,
        order_ref: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for errors caused by user input rather than state.
    ///
    /// These are safe to show verbatim next to the offending form field.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::EmptySelection
                | CoreError::InvalidDate { .. }
                | CoreError::ConsentRequired { .. }
                | CoreError::InvalidRedemption { .. }
                | CoreError::Validation(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unparseable item reference, bad window).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A referenced catalog entry does not exist or is not available.
    #[error("{field} '{id}' is not available")]
    UnknownReference { field: String, id: String },

    /// Duplicate value in a list that must be unique.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidRedemption {
            requested: 250,
            reason: "must be a multiple of 100".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot redeem 250 points: must be a multiple of 100"
        );

        let err = CoreError::InvalidTransition {
            appointment_id: "apt-1".to_string(),
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Confirmed,
        };
        assert_eq!(
            err.to_string(),
            "Appointment apt-1 cannot move from cancelled to confirmed"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(CoreError::EmptySelection.is_validation());
        assert!(CoreError::ConsentRequired {
            salon_id: "s1".to_string()
        }
        .is_validation());
        assert!(!CoreError::SignatureVerification {
            appointment_id: "a1".to_string()
        }
        .is_validation());
        assert!(!CoreError::RefundAlreadyProcessed {
            record_id: "r1".to_string()
        }
        .is_validation());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "address".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(core_err.is_validation());
    }
}
