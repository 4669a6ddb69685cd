//! # Appointment Repository
//!
//! Database operations for appointments.
//!
//! ## Appointment Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Appointment Lifecycle                               │
//! │                                                                         │
//! │  1. SUBMIT                                                             │
//! │     └── insert() → Appointment { status: Created }                     │
//! │                                                                         │
//! │  2. PAY                                                                │
//! │     └── apply(Created → PaymentInitiated, order_ref)                   │
//! │     └── confirm() → Confirmed + order paid                             │
//! │         or apply(PaymentInitiated → PaymentFailed, reason)             │
//! │                                                                         │
//! │  3. VISIT                                                              │
//! │     └── check_in() → checked_in_at set                                 │
//! │     └── apply(Confirmed → Completed)                                   │
//! │                                                                         │
//! │  4. (OPTIONAL) CANCEL                                                  │
//! │     └── cancel_with_record() → Cancelled + CancellationRecord          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write is conditional on the status the caller observed. `false`
//! means another writer got there first.

use aura_core::cancellation::CancellationRecord;
use aura_core::lifecycle::AppointmentStatus;
use aura_core::schedule::ScheduledBlock;
use aura_core::types::{
    Appointment, BookedItem, BookedProduct, BookingProvider, HomeServiceDetails,
    PaymentMeta, RedemptionInfo,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::cancellation;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: String,
    customer_id: String,
    provider_kind: String,
    provider_id: String,
    staff_id: Option<String>,
    items_json: String,
    products_json: String,
    appointment_date: NaiveDate,
    appointment_time: NaiveTime,
    customer_notes: Option<String>,
    home_address: Option<String>,
    home_fee_paise: Option<i64>,
    use_points: bool,
    points_to_redeem: i64,
    redemption_discount_paise: i64,
    total_paise: i64,
    final_amount_paise: i64,
    status: AppointmentStatus,
    order_ref: Option<String>,
    payment_ref: Option<String>,
    failure_reason: Option<String>,
    checked_in_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> DbResult<Self> {
        let provider = BookingProvider::from_parts(&row.provider_kind, row.provider_id)
            .ok_or_else(|| {
                DbError::decode("appointment", format!("provider kind '{}'", row.provider_kind))
            })?;
        let items: Vec<BookedItem> = serde_json::from_str(&row.items_json)?;
        let products: Vec<BookedProduct> = serde_json::from_str(&row.products_json)?;

        let home_service = match (row.home_address, row.home_fee_paise) {
            (Some(address), fee) => Some(HomeServiceDetails {
                address,
                fee_paise: fee.unwrap_or(0),
            }),
            (None, _) => None,
        };

        Ok(Appointment {
            id: row.id,
            customer_id: row.customer_id,
            provider,
            staff_id: row.staff_id,
            items,
            products,
            date: row.appointment_date,
            time: row.appointment_time,
            customer_notes: row.customer_notes,
            home_service,
            redemption: RedemptionInfo {
                use_points: row.use_points,
                points_to_redeem: row.points_to_redeem,
                discount_paise: row.redemption_discount_paise,
            },
            total_paise: row.total_paise,
            final_amount_paise: row.final_amount_paise,
            status: row.status,
            payment: PaymentMeta {
                order_ref: row.order_ref,
                payment_ref: row.payment_ref,
                failure_reason: row.failure_reason,
            },
            checked_in_at: row.checked_in_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_APPOINTMENT: &str = r#"
    SELECT
        id, customer_id, provider_kind, provider_id, staff_id,
        items_json, products_json, appointment_date, appointment_time,
        customer_notes, home_address, home_fee_paise,
        use_points, points_to_redeem, redemption_discount_paise,
        total_paise, final_amount_paise, status,
        order_ref, payment_ref, failure_reason, checked_in_at,
        created_at, updated_at
    FROM appointments
"#;

// =============================================================================
// Status Change
// =============================================================================

/// A conditional status update with the gateway references it carries.
///
/// ## Example
/// ```rust,ignore
/// let change = StatusChange::new(AppointmentStatus::Created, AppointmentStatus::PaymentInitiated)
///     .with_order_ref("order_123");
/// let applied = db.appointments().apply(&id, &change, Utc::now()).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub order_ref: Option<String>,
    pub payment_ref: Option<String>,
    pub failure_reason: Option<String>,
}

impl StatusChange {
    pub fn new(from: AppointmentStatus, to: AppointmentStatus) -> Self {
        Self {
            from,
            to,
            order_ref: None,
            payment_ref: None,
            failure_reason: None,
        }
    }

    pub fn with_order_ref(mut self, order_ref: impl Into<String>) -> Self {
        self.order_ref = Some(order_ref.into());
        self
    }

    pub fn with_payment_ref(mut self, payment_ref: impl Into<String>) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for appointment database operations.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    /// Creates a new AppointmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    /// Inserts a freshly built appointment.
    pub async fn insert(&self, appointment: &Appointment) -> DbResult<()> {
        debug!(
            id = %appointment.id,
            provider = %appointment.provider.id(),
            final_amount = appointment.final_amount_paise,
            "Inserting appointment"
        );

        let items_json = serde_json::to_string(&appointment.items)?;
        let products_json = serde_json::to_string(&appointment.products)?;
        let (home_address, home_fee_paise) = match &appointment.home_service {
            Some(home) => (Some(home.address.as_str()), Some(home.fee_paise)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, customer_id, provider_kind, provider_id, staff_id,
                items_json, products_json, appointment_date, appointment_time,
                customer_notes, home_address, home_fee_paise,
                use_points, points_to_redeem, redemption_discount_paise,
                total_paise, final_amount_paise, status,
                order_ref, payment_ref, failure_reason, checked_in_at,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24
            )
            "#,
        )
        .bind(&appointment.id)
        .bind(&appointment.customer_id)
        .bind(appointment.provider.kind())
        .bind(appointment.provider.id())
        .bind(&appointment.staff_id)
        .bind(items_json)
        .bind(products_json)
        .bind(appointment.date)
        .bind(appointment.time)
        .bind(&appointment.customer_notes)
        .bind(home_address)
        .bind(home_fee_paise)
        .bind(appointment.redemption.use_points)
        .bind(appointment.redemption.points_to_redeem)
        .bind(appointment.redemption.discount_paise)
        .bind(appointment.total_paise)
        .bind(appointment.final_amount_paise)
        .bind(appointment.status)
        .bind(&appointment.payment.order_ref)
        .bind(&appointment.payment.payment_ref)
        .bind(&appointment.payment.failure_reason)
        .bind(appointment.checked_in_at)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an appointment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Appointment>> {
        let sql = format!("{SELECT_APPOINTMENT} WHERE id = ?1");
        let row: Option<AppointmentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Appointment::try_from).transpose()
    }

    /// Gets an appointment by ID, failing with `NotFound` when absent.
    pub async fn get(&self, id: &str) -> DbResult<Appointment> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Appointment", id))
    }

    /// Applies a status change if the appointment is still in `change.from`.
    ///
    /// References are only overwritten when the change carries them. A move
    /// to `Confirmed` clears any earlier failure reason.
    pub async fn apply(&self, id: &str, change: &StatusChange, now: DateTime<Utc>) -> DbResult<bool> {
        debug!(id = %id, from = %change.from, to = %change.to, "Applying status change");

        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                status = ?1,
                order_ref = COALESCE(?2, order_ref),
                payment_ref = COALESCE(?3, payment_ref),
                failure_reason = CASE WHEN ?1 = 'confirmed' THEN NULL
                                      ELSE COALESCE(?4, failure_reason) END,
                updated_at = ?5
            WHERE id = ?6 AND status = ?7
            "#,
        )
        .bind(change.to)
        .bind(&change.order_ref)
        .bind(&change.payment_ref)
        .bind(&change.failure_reason)
        .bind(now)
        .bind(id)
        .bind(change.from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Confirms payment in one transaction: the appointment moves to
    /// `Confirmed` and its open order is marked paid. Nothing is written
    /// when the appointment already left `from`.
    pub async fn confirm(
        &self,
        id: &str,
        from: AppointmentStatus,
        order_ref: &str,
        payment_ref: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, order_ref = %order_ref, "Confirming appointment");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                status = 'confirmed',
                order_ref = ?1,
                payment_ref = ?2,
                failure_reason = NULL,
                updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(order_ref)
        .bind(payment_ref)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE payment_orders SET status = 'paid', updated_at = ?1
            WHERE order_ref = ?2 AND appointment_id = ?3 AND status IN ('created', 'failed')
            "#,
        )
        .bind(now)
        .bind(order_ref)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(true)
    }

    /// Records the first check-in of a confirmed appointment.
    pub async fn check_in(&self, id: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE appointments SET checked_in_at = ?1, updated_at = ?1
            WHERE id = ?2 AND status = 'confirmed' AND checked_in_at IS NULL
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancels the appointment and stores its cancellation record atomically.
    pub async fn cancel_with_record(
        &self,
        from: AppointmentStatus,
        record: &CancellationRecord,
    ) -> DbResult<bool> {
        debug!(
            id = %record.appointment_id,
            kind = %record.cancellation_type,
            refund = record.refund_paise,
            "Cancelling appointment"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE appointments SET status = 'cancelled', updated_at = ?1
            WHERE id = ?2 AND status = ?3
            "#,
        )
        .bind(record.cancelled_at)
        .bind(&record.appointment_id)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            return Ok(false);
        }

        cancellation::insert_record(&mut tx, record).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(true)
    }

    /// Occupied blocks for a provider on a date, one per live appointment.
    ///
    /// Appointments without a staff member are grouped under the provider.
    pub async fn list_blocks(&self, provider_id: &str, date: NaiveDate) -> DbResult<Vec<ScheduledBlock>> {
        let rows: Vec<(String, NaiveTime, String)> = sqlx::query_as(
            r#"
            SELECT COALESCE(staff_id, provider_id), appointment_time, items_json
            FROM appointments
            WHERE provider_id = ?1
              AND appointment_date = ?2
              AND status IN ('created', 'payment_initiated', 'confirmed', 'completed')
            ORDER BY appointment_time
            "#,
        )
        .bind(provider_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(staff_id, start, items_json)| {
                let items: Vec<BookedItem> = serde_json::from_str(&items_json)?;
                Ok(ScheduledBlock {
                    staff_id,
                    start,
                    duration_minutes: items.iter().map(|i| i.duration_minutes).sum(),
                })
            })
            .collect()
    }

    /// Number of completed appointments a customer had with a provider.
    pub async fn count_completed(&self, customer_id: &str, provider_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE customer_id = ?1 AND provider_id = ?2 AND status = 'completed'
            "#,
        )
        .bind(customer_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Whether any completed appointment with the provider had more than one
    /// service line.
    pub async fn has_addon_history(&self, customer_id: &str, provider_id: &str) -> DbResult<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE customer_id = ?1 AND provider_id = ?2 AND status = 'completed'
                  AND json_array_length(items_json) > 1
            )
            "#,
        )
        .bind(customer_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{appointment, db};
    use aura_core::cancellation::{CancellationActor, CancellationType, Classification};
    use aura_core::money::Money;

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = db().await;
        let mut apt = appointment("apt-1", "salon-1", (10, 0), 45);
        apt.home_service = Some(HomeServiceDetails {
            address: "12 MG Road".to_string(),
            fee_paise: 20_000,
        });
        db.appointments().insert(&apt).await.unwrap();

        let loaded = db.appointments().get("apt-1").await.unwrap();
        assert_eq!(loaded.items, apt.items);
        assert_eq!(loaded.provider, apt.provider);
        assert_eq!(loaded.home_service, apt.home_service);
        assert_eq!(loaded.status, AppointmentStatus::Created);
        assert_eq!(loaded.date, apt.date);
        assert_eq!(loaded.time, apt.time);

        assert!(db.appointments().get_by_id("missing").await.unwrap().is_none());
        assert!(db.appointments().get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_apply_is_compare_and_set() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();

        let change = StatusChange::new(AppointmentStatus::Created, AppointmentStatus::PaymentInitiated)
            .with_order_ref("order-1");
        assert!(db.appointments().apply("apt-1", &change, Utc::now()).await.unwrap());
        // Second writer observed the same `from` and loses.
        assert!(!db.appointments().apply("apt-1", &change, Utc::now()).await.unwrap());

        let failed = StatusChange::new(AppointmentStatus::PaymentInitiated, AppointmentStatus::PaymentFailed)
            .with_failure_reason("card declined");
        assert!(db.appointments().apply("apt-1", &failed, Utc::now()).await.unwrap());

        let loaded = db.appointments().get("apt-1").await.unwrap();
        assert_eq!(loaded.status, AppointmentStatus::PaymentFailed);
        assert_eq!(loaded.payment.order_ref.as_deref(), Some("order-1"));
        assert_eq!(loaded.payment.failure_reason.as_deref(), Some("card declined"));
    }

    #[tokio::test]
    async fn test_confirm_clears_failure_and_is_single_shot() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        let to_failed = StatusChange::new(AppointmentStatus::Created, AppointmentStatus::PaymentFailed)
            .with_failure_reason("timeout");
        db.appointments().apply("apt-1", &to_failed, Utc::now()).await.unwrap();

        let ok = db
            .appointments()
            .confirm("apt-1", AppointmentStatus::PaymentFailed, "order-1", "pay-1", Utc::now())
            .await
            .unwrap();
        assert!(ok);
        let again = db
            .appointments()
            .confirm("apt-1", AppointmentStatus::PaymentFailed, "order-1", "pay-1", Utc::now())
            .await
            .unwrap();
        assert!(!again);

        let loaded = db.appointments().get("apt-1").await.unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Confirmed);
        assert_eq!(loaded.payment.payment_ref.as_deref(), Some("pay-1"));
        assert_eq!(loaded.payment.failure_reason, None);
    }

    #[tokio::test]
    async fn test_check_in_only_once_and_only_when_confirmed() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        assert!(!db.appointments().check_in("apt-1", Utc::now()).await.unwrap());

        let confirm = StatusChange::new(AppointmentStatus::Created, AppointmentStatus::Confirmed);
        db.appointments().apply("apt-1", &confirm, Utc::now()).await.unwrap();
        assert!(db.appointments().check_in("apt-1", Utc::now()).await.unwrap());
        assert!(!db.appointments().check_in("apt-1", Utc::now()).await.unwrap());
        assert!(db.appointments().get("apt-1").await.unwrap().is_checked_in());
    }

    #[tokio::test]
    async fn test_cancel_with_record_once() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        let record = CancellationRecord::new(
            "apt-1",
            Money::from_rupees(500),
            Classification::standard(),
            CancellationActor::Customer,
            None,
            Utc::now(),
        );

        assert!(db
            .appointments()
            .cancel_with_record(AppointmentStatus::Created, &record)
            .await
            .unwrap());
        assert!(!db
            .appointments()
            .cancel_with_record(AppointmentStatus::Created, &record)
            .await
            .unwrap());

        let stored = db.cancellations().get_by_appointment("apt-1").await.unwrap().unwrap();
        assert_eq!(stored.cancellation_type, CancellationType::Standard);
        assert_eq!(stored.refund_paise, 50_000);
    }

    #[tokio::test]
    async fn test_blocks_and_history() {
        let db = db().await;
        let repo = db.appointments();
        repo.insert(&appointment("a", "salon-1", (9, 0), 60)).await.unwrap();
        repo.insert(&appointment("b", "salon-1", (11, 0), 30)).await.unwrap();
        repo.insert(&appointment("other", "salon-2", (9, 0), 60)).await.unwrap();

        let blocks = repo
            .list_blocks("salon-1", NaiveDate::from_ymd_opt(2030, 6, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].duration_minutes, 60);
        assert_eq!(blocks[0].staff_id, "staff-1");

        assert_eq!(repo.count_completed("cust-1", "salon-1").await.unwrap(), 0);
        assert!(!repo.has_addon_history("cust-1", "salon-1").await.unwrap());

        let mut two_items = appointment("c", "salon-1", (14, 0), 30);
        two_items.items.push(two_items.items[0].clone());
        two_items.status = AppointmentStatus::Completed;
        repo.insert(&two_items).await.unwrap();

        assert_eq!(repo.count_completed("cust-1", "salon-1").await.unwrap(), 1);
        assert!(repo.has_addon_history("cust-1", "salon-1").await.unwrap());
    }
}
