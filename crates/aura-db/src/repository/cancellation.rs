//! # Cancellation Record Repository
//!
//! Records are written together with the appointment's move to `Cancelled`
//! (see `AppointmentRepository::cancel_with_record`). Refunds then move
//! through a claim:
//!
//! ```text
//! Eligible ──claim──► Pending ──mark_processed──► Processed
//!     ▲                  │
//!     └─────release──────┘   (gateway refund failed)
//! ```

use aura_core::cancellation::{CancellationActor, CancellationRecord, CancellationType, RefundStatus};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    appointment_id: String,
    cancellation_type: CancellationType,
    fee_percent: i64,
    fee_paise: i64,
    refund_paise: i64,
    refund_status: RefundStatus,
    actor: CancellationActor,
    reason: Option<String>,
    cancelled_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for CancellationRecord {
    type Error = DbError;

    fn try_from(row: RecordRow) -> DbResult<Self> {
        let fee_percent = u8::try_from(row.fee_percent)
            .map_err(|_| DbError::decode("cancellation record", format!("fee_percent={}", row.fee_percent)))?;
        Ok(CancellationRecord {
            id: row.id,
            appointment_id: row.appointment_id,
            cancellation_type: row.cancellation_type,
            fee_percent,
            fee_paise: row.fee_paise,
            refund_paise: row.refund_paise,
            refund_status: row.refund_status,
            actor: row.actor,
            reason: row.reason,
            cancelled_at: row.cancelled_at,
            processed_at: row.processed_at,
        })
    }
}

const SELECT_RECORD: &str = r#"
    SELECT id, appointment_id, cancellation_type, fee_percent, fee_paise, refund_paise,
           refund_status, actor, reason, cancelled_at, processed_at
    FROM cancellation_records
"#;

pub(crate) async fn insert_record(conn: &mut SqliteConnection, record: &CancellationRecord) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cancellation_records (
            id, appointment_id, cancellation_type, fee_percent, fee_paise, refund_paise,
            refund_status, actor, reason, cancelled_at, processed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&record.id)
    .bind(&record.appointment_id)
    .bind(record.cancellation_type)
    .bind(record.fee_percent as i64)
    .bind(record.fee_paise)
    .bind(record.refund_paise)
    .bind(record.refund_status)
    .bind(record.actor)
    .bind(&record.reason)
    .bind(record.cancelled_at)
    .bind(record.processed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Repository for cancellation records and refund progress.
#[derive(Debug, Clone)]
pub struct CancellationRepository {
    pool: SqlitePool,
}

impl CancellationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CancellationRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CancellationRecord>> {
        let sql = format!("{SELECT_RECORD} WHERE id = ?1");
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CancellationRecord::try_from).transpose()
    }

    pub async fn get_by_appointment(&self, appointment_id: &str) -> DbResult<Option<CancellationRecord>> {
        let sql = format!("{SELECT_RECORD} WHERE appointment_id = ?1");
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CancellationRecord::try_from).transpose()
    }

    /// Moves an eligible refund to pending. Only one caller wins.
    pub async fn claim_refund(&self, id: &str) -> DbResult<bool> {
        self.move_refund(id, RefundStatus::Eligible, RefundStatus::Pending, None)
            .await
    }

    /// Returns a pending refund to eligible after a failed gateway call.
    pub async fn release_refund(&self, id: &str) -> DbResult<bool> {
        self.move_refund(id, RefundStatus::Pending, RefundStatus::Eligible, None)
            .await
    }

    pub async fn mark_processed(&self, id: &str, at: DateTime<Utc>) -> DbResult<bool> {
        self.move_refund(id, RefundStatus::Pending, RefundStatus::Processed, Some(at))
            .await
    }

    async fn move_refund(
        &self,
        id: &str,
        from: RefundStatus,
        to: RefundStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        debug!(id = %id, ?from, ?to, "Moving refund status");

        let result = sqlx::query(
            r#"
            UPDATE cancellation_records SET
                refund_status = ?1,
                processed_at = COALESCE(?2, processed_at)
            WHERE id = ?3 AND refund_status = ?4
            "#,
        )
        .bind(to)
        .bind(processed_at)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{appointment, db};
    use aura_core::cancellation::Classification;
    use aura_core::lifecycle::AppointmentStatus;
    use aura_core::money::Money;

    async fn cancelled(db: &crate::Database) -> CancellationRecord {
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        let record = CancellationRecord::new(
            "apt-1",
            Money::from_rupees(1_000),
            Classification {
                kind: CancellationType::Late,
                fee_percent: 50,
            },
            CancellationActor::Customer,
            Some("running late".to_string()),
            Utc::now(),
        );
        db.appointments()
            .cancel_with_record(AppointmentStatus::Created, &record)
            .await
            .unwrap();
        record
    }

    #[tokio::test]
    async fn test_round_trip() {
        let db = db().await;
        let record = cancelled(&db).await;
        let stored = db.cancellations().get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.cancellation_type, CancellationType::Late);
        assert_eq!(stored.fee_percent, 50);
        assert_eq!(stored.refund_paise, 50_000);
        assert_eq!(stored.reason.as_deref(), Some("running late"));
    }

    #[tokio::test]
    async fn test_refund_claim_is_exclusive() {
        let db = db().await;
        let record = cancelled(&db).await;
        let repo = db.cancellations();

        assert!(repo.claim_refund(&record.id).await.unwrap());
        assert!(!repo.claim_refund(&record.id).await.unwrap());

        assert!(repo.release_refund(&record.id).await.unwrap());
        assert!(repo.claim_refund(&record.id).await.unwrap());
        assert!(repo.mark_processed(&record.id, Utc::now()).await.unwrap());
        assert!(!repo.claim_refund(&record.id).await.unwrap());

        let stored = repo.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.refund_status, RefundStatus::Processed);
        assert!(stored.processed_at.is_some());
    }
}
