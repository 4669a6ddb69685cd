//! # Cancellation Policy Repository
//!
//! One policy row per salon. Salons that never saved one have none; callers
//! fall back to [`CancellationPolicy::default_for`].

use aura_core::cancellation::CancellationPolicy;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    salon_id: String,
    notice_period_hours: i64,
    late_cancellation_penalty_percent: i64,
    no_show_penalty_percent: i64,
    is_active: bool,
    message: String,
}

impl TryFrom<PolicyRow> for CancellationPolicy {
    type Error = DbError;

    fn try_from(row: PolicyRow) -> DbResult<Self> {
        let narrow = |field: &str, v: i64| {
            u8::try_from(v).map_err(|_| DbError::decode("cancellation policy", format!("{field}={v}")))
        };
        Ok(CancellationPolicy {
            notice_period_hours: u32::try_from(row.notice_period_hours).map_err(|_| {
                DbError::decode(
                    "cancellation policy",
                    format!("notice_period_hours={}", row.notice_period_hours),
                )
            })?,
            late_cancellation_penalty_percent: narrow(
                "late_cancellation_penalty_percent",
                row.late_cancellation_penalty_percent,
            )?,
            no_show_penalty_percent: narrow("no_show_penalty_percent", row.no_show_penalty_percent)?,
            salon_id: row.salon_id,
            is_active: row.is_active,
            message: row.message,
        })
    }
}

/// Repository for salon cancellation policies.
#[derive(Debug, Clone)]
pub struct PolicyRepository {
    pool: SqlitePool,
}

impl PolicyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PolicyRepository { pool }
    }

    pub async fn get(&self, salon_id: &str) -> DbResult<Option<CancellationPolicy>> {
        let row: Option<PolicyRow> = sqlx::query_as(
            r#"
            SELECT salon_id, notice_period_hours, late_cancellation_penalty_percent,
                   no_show_penalty_percent, is_active, message
            FROM cancellation_policies WHERE salon_id = ?1
            "#,
        )
        .bind(salon_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CancellationPolicy::try_from).transpose()
    }

    /// Inserts or replaces the salon's policy. The caller validates first.
    pub async fn upsert(&self, policy: &CancellationPolicy, now: DateTime<Utc>) -> DbResult<()> {
        debug!(
            salon_id = %policy.salon_id,
            notice_hours = policy.notice_period_hours,
            active = policy.is_active,
            "Saving cancellation policy"
        );

        sqlx::query(
            r#"
            INSERT INTO cancellation_policies (
                salon_id, notice_period_hours, late_cancellation_penalty_percent,
                no_show_penalty_percent, is_active, message, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (salon_id) DO UPDATE SET
                notice_period_hours = excluded.notice_period_hours,
                late_cancellation_penalty_percent = excluded.late_cancellation_penalty_percent,
                no_show_penalty_percent = excluded.no_show_penalty_percent,
                is_active = excluded.is_active,
                message = excluded.message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&policy.salon_id)
        .bind(policy.notice_period_hours as i64)
        .bind(policy.late_cancellation_penalty_percent as i64)
        .bind(policy.no_show_penalty_percent as i64)
        .bind(policy.is_active)
        .bind(&policy.message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = db().await;
        let repo = db.policies();
        assert!(repo.get("salon-1").await.unwrap().is_none());

        let policy = CancellationPolicy::new("salon-1", 24, 50, 100, true, None).unwrap();
        repo.upsert(&policy, Utc::now()).await.unwrap();
        assert_eq!(repo.get("salon-1").await.unwrap(), Some(policy));

        let updated = CancellationPolicy::new("salon-1", 48, 25, 80, false, Some("Call us".into())).unwrap();
        repo.upsert(&updated, Utc::now()).await.unwrap();
        assert_eq!(repo.get("salon-1").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_bad_percent() {
        let db = db().await;
        let mut policy = CancellationPolicy::default_for("salon-1");
        policy.no_show_penalty_percent = 150;
        let err = db.policies().upsert(&policy, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
