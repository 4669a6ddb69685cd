//! # Validation Module
//!
//! Input validation utilities for the booking engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Client                                                        │
//! │  ├── Slider clamping (clamp_redemption), required fields                │
//! │  └── Immediate user feedback                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Booking service (Rust)                                        │
//! │  ├── Selection::normalize (wire shape)                                  │
//! │  └── THIS MODULE: field rules                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK constraints on percents and amounts                          │
//! │  └── UNIQUE / partial unique indexes                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_NOTES_LENGTH, MAX_NOTICE_PERIOD_HOURS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a product quantity.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
///
/// ## Example
/// ```rust
/// use aura_core::validation::validate_quantity;
///
/// assert!(validate_quantity(2).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1_000).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a whole percentage in `[0, 100]`.
pub fn validate_percent(field: &str, value: i64) -> ValidationResult<()> {
    if !(0..=100).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates a cancellation notice period in `[1, 168]` hours.
pub fn validate_notice_period(hours: u32) -> ValidationResult<()> {
    if hours < 1 || hours > MAX_NOTICE_PERIOD_HOURS {
        return Err(ValidationError::OutOfRange {
            field: "notice_period_hours".to_string(),
            min: 1,
            max: MAX_NOTICE_PERIOD_HOURS as i64,
        });
    }
    Ok(())
}

/// Validates a home-service address and returns it trimmed.
pub fn validate_address(address: Option<&str>) -> ValidationResult<String> {
    let address = address.map(str::trim).unwrap_or("");
    if address.is_empty() {
        return Err(ValidationError::Required {
            field: "address".to_string(),
        });
    }
    if address.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "address".to_string(),
            max: 500,
        });
    }
    Ok(address.to_string())
}

/// Normalizes customer notes: blank becomes `None`, long notes are rejected.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    if let Some(n) = notes {
        if n.chars().count() > MAX_NOTES_LENGTH {
            return Err(ValidationError::TooLong {
                field: "customer_notes".to_string(),
                max: MAX_NOTES_LENGTH,
            });
        }
    }
    Ok(notes.map(str::to_string))
}

/// Validates a required identifier.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}
