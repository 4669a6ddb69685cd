//! # Cancellation Policy & Refunds
//!
//! Classifies a cancellation against the salon's policy and computes the
//! fee and refund. Pure: the current time is always a parameter.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  policy absent or inactive ───────────────────────────► Standard, 0%    │
//! │                                                                         │
//! │  ──────────────┬──────────────────────┬────────────────────────► time   │
//! │                │◄── notice period ───►│                                 │
//! │     Standard   │        Late          │  NoShow (no check-in)           │
//! │       0%       │    late penalty %    │  no-show penalty %              │
//! │                                       │  Late (checked in)              │
//! │                                  appointment                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `refund = max(0, final_amount − round(final_amount × fee%))`

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_notice_period, validate_percent, ValidationResult};

/// Default notice period when a salon never saved a policy.
pub const DEFAULT_NOTICE_PERIOD_HOURS: u32 = 24;
pub const DEFAULT_LATE_PENALTY_PERCENT: u8 = 50;
pub const DEFAULT_NO_SHOW_PENALTY_PERCENT: u8 = 100;

// =============================================================================
// Policy
// =============================================================================

/// A salon's cancellation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CancellationPolicy {
    pub salon_id: String,
    /// Hours before the appointment inside which a cancellation is late.
    pub notice_period_hours: u32,
    pub late_cancellation_penalty_percent: u8,
    pub no_show_penalty_percent: u8,
    pub is_active: bool,
    pub message: String,
}

/// The message shown when a salon saves a policy without one.
pub fn default_policy_message(notice_period_hours: u32) -> String {
    format!(
        "Please cancel your appointment at least {} hours in advance to avoid penalties.",
        notice_period_hours
    )
}

impl CancellationPolicy {
    /// The policy a salon has before saving its own: 24h, 50%, 100%,
    /// inactive.
    pub fn default_for(salon_id: impl Into<String>) -> Self {
        Self {
            salon_id: salon_id.into(),
            notice_period_hours: DEFAULT_NOTICE_PERIOD_HOURS,
            late_cancellation_penalty_percent: DEFAULT_LATE_PENALTY_PERCENT,
            no_show_penalty_percent: DEFAULT_NO_SHOW_PENALTY_PERCENT,
            is_active: false,
            message: default_policy_message(DEFAULT_NOTICE_PERIOD_HOURS),
        }
    }

    /// Builds a validated policy. A blank message gets the default text.
    pub fn new(
        salon_id: impl Into<String>,
        notice_period_hours: u32,
        late_cancellation_penalty_percent: u8,
        no_show_penalty_percent: u8,
        is_active: bool,
        message: Option<String>,
    ) -> ValidationResult<Self> {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_policy_message(notice_period_hours));
        let policy = Self {
            salon_id: salon_id.into(),
            notice_period_hours,
            late_cancellation_penalty_percent,
            no_show_penalty_percent,
            is_active,
            message,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// ## Rules
    /// - salon id is required
    /// - notice period in `[1, 168]` hours
    /// - both penalties in `[0, 100]` percent
    /// - the no-show penalty is at least the late penalty
    pub fn validate(&self) -> ValidationResult<()> {
        if self.salon_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "salon_id".to_string(),
            });
        }
        validate_notice_period(self.notice_period_hours)?;
        validate_percent(
            "late_cancellation_penalty_percent",
            self.late_cancellation_penalty_percent as i64,
        )?;
        validate_percent("no_show_penalty_percent", self.no_show_penalty_percent as i64)?;
        if self.no_show_penalty_percent < self.late_cancellation_penalty_percent {
            return Err(ValidationError::OutOfRange {
                field: "no_show_penalty_percent".to_string(),
                min: self.late_cancellation_penalty_percent as i64,
                max: 100,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn notice_period(&self) -> Duration {
        Duration::hours(self.notice_period_hours as i64)
    }
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CancellationType {
    Standard,
    Late,
    NoShow,
}

impl fmt::Display for CancellationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancellationType::Standard => "standard",
            CancellationType::Late => "late",
            CancellationType::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: CancellationType,
    pub fee_percent: u8,
}

impl Classification {
    pub const fn standard() -> Self {
        Self {
            kind: CancellationType::Standard,
            fee_percent: 0,
        }
    }
}

/// Classifies a cancellation.
///
/// ## Example
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use aura_core::cancellation::{classify, CancellationPolicy, CancellationType};
///
/// let mut policy = CancellationPolicy::default_for("salon-1");
/// policy.is_active = true;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
/// let c = classify(at, false, Some(&policy), at - Duration::hours(12));
/// assert_eq!(c.kind, CancellationType::Late);
/// assert_eq!(c.fee_percent, 50);
/// ```
pub fn classify(
    scheduled_at: DateTime<Utc>,
    checked_in: bool,
    policy: Option<&CancellationPolicy>,
    cancelled_at: DateTime<Utc>,
) -> Classification {
    let policy = match policy {
        Some(p) if p.is_active => p,
        _ => return Classification::standard(),
    };

    if cancelled_at >= scheduled_at {
        return if checked_in {
            Classification {
                kind: CancellationType::Late,
                fee_percent: policy.late_cancellation_penalty_percent,
            }
        } else {
            Classification {
                kind: CancellationType::NoShow,
                fee_percent: policy.no_show_penalty_percent,
            }
        };
    }

    if scheduled_at - cancelled_at < policy.notice_period() {
        return Classification {
            kind: CancellationType::Late,
            fee_percent: policy.late_cancellation_penalty_percent,
        };
    }

    Classification::standard()
}

/// Fee withheld from `final_amount`, rounded half up to the paisa.
pub fn cancellation_fee(final_amount: Money, fee_percent: u8) -> Money {
    final_amount
        .floor_zero()
        .portion_bps(fee_percent.min(100) as u32 * 100)
}

/// Amount returned to the customer. Never negative.
pub fn compute_refund(final_amount: Money, fee_percent: u8) -> Money {
    let amount = final_amount.floor_zero();
    (amount - cancellation_fee(amount, fee_percent)).floor_zero()
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Eligible,
    Pending,
    Processed,
}

/// Who cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CancellationActor {
    Customer,
    Salon,
}

impl CancellationActor {
    /// Salon-side cancellations never penalize the customer.
    #[inline]
    pub fn waives_penalty(&self) -> bool {
        matches!(self, CancellationActor::Salon)
    }
}

/// The permanent record of a cancellation and its refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CancellationRecord {
    pub id: String,
    pub appointment_id: String,
    pub cancellation_type: CancellationType,
    pub fee_percent: u8,
    pub fee_paise: i64,
    pub refund_paise: i64,
    pub refund_status: RefundStatus,
    pub actor: CancellationActor,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub cancelled_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl CancellationRecord {
    /// Builds the record for a classified cancellation of `final_amount`.
    pub fn new(
        appointment_id: impl Into<String>,
        final_amount: Money,
        classification: Classification,
        actor: CancellationActor,
        reason: Option<String>,
        cancelled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment_id.into(),
            cancellation_type: classification.kind,
            fee_percent: classification.fee_percent,
            fee_paise: cancellation_fee(final_amount, classification.fee_percent).paise(),
            refund_paise: compute_refund(final_amount, classification.fee_percent).paise(),
            refund_status: RefundStatus::Eligible,
            actor,
            reason,
            cancelled_at,
            processed_at: None,
        }
    }

    #[inline]
    pub fn refund(&self) -> Money {
        Money::from_paise(self.refund_paise)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
