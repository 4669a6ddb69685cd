//! # Booking Error Types
//!
//! Error types for booking orchestration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Booking Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Domain      │  │  Collaborators  │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(CoreError)│  │  Provider       │  │  InvalidConfig          │ │
//! │  │  Database       │  │  Gateway        │  │  ConfigLoadFailed       │ │
//! │  │                 │  │  Ledger         │  │  ConfigSaveFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aura_core::CoreError;
use aura_db::DbError;
use thiserror::Error;

/// Result type alias for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;

/// Everything a booking operation can fail with.
#[derive(Debug, Error)]
pub enum BookingError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A booking rule or lifecycle check rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failed.
    #[error("Database error: {0}")]
    Database(DbError),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// A read-only collaborator (catalog, history, predictor) did not answer.
    #[error("{provider} unavailable: {message}")]
    ProviderUnavailable {
        provider: &'static str,
        message: String,
    },

    /// The payment gateway rejected or failed a call.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The loyalty ledger failed.
    #[error("Loyalty ledger error: {0}")]
    Ledger(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid booking configuration.
    #[error("Invalid booking configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl BookingError {
    pub fn provider(provider: &'static str, message: impl ToString) -> Self {
        BookingError::ProviderUnavailable {
            provider,
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } if entity == "Appointment" => {
                BookingError::Core(CoreError::AppointmentNotFound(id))
            }
            other => BookingError::Database(other),
        }
    }
}

impl From<aura_core::ValidationError> for BookingError {
    fn from(err: aura_core::ValidationError) -> Self {
        BookingError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for BookingError {
    fn from(err: std::io::Error) -> Self {
        BookingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for BookingError {
    fn from(err: toml::de::Error) -> Self {
        BookingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for BookingError {
    fn from(err: toml::ser::Error) -> Self {
        BookingError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl BookingError {
    /// Returns true if the operation may succeed when repeated.
    ///
    /// ## Retryable Errors
    /// - Collaborators that did not answer
    /// - Transient database failures (pool exhausted, lost connection)
    ///
    /// ## Non-Retryable Errors
    /// - Booking rule violations
    /// - Gateway rejections (a retry could open a second order)
    /// - Configuration errors
    pub fn is_retryable(&self) -> bool {
        match self {
            BookingError::ProviderUnavailable { .. } => true,
            BookingError::Database(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true for errors caused by the customer's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, BookingError::Core(err) if err.is_validation())
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BookingError::InvalidConfig(_)
                | BookingError::ConfigLoadFailed(_)
                | BookingError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(BookingError::provider("catalog", "timeout").is_retryable());
        assert!(BookingError::Database(DbError::PoolExhausted).is_retryable());

        assert!(!BookingError::Gateway("declined".into()).is_retryable());
        assert!(!BookingError::InvalidConfig("bad".into()).is_retryable());
        assert!(!BookingError::Core(CoreError::EmptySelection).is_retryable());
    }

    #[test]
    fn test_not_found_maps_to_domain() {
        let err = BookingError::from(DbError::not_found("Appointment", "apt-9"));
        assert!(matches!(
            err,
            BookingError::Core(CoreError::AppointmentNotFound(ref id)) if id == "apt-9"
        ));

        let err = BookingError::from(DbError::not_found("PaymentOrder", "o-1"));
        assert!(matches!(err, BookingError::Database(_)));
    }

    #[test]
    fn test_categories() {
        assert!(BookingError::Core(CoreError::EmptySelection).is_validation());
        assert!(!BookingError::Gateway("x".into()).is_validation());
        assert!(BookingError::ConfigLoadFailed("missing".into()).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = BookingError::provider("catalog", "connection refused");
        assert!(err.to_string().contains("catalog"));
        assert!(err.to_string().contains("connection refused"));
    }
}
