//! # Payment Order Repository
//!
//! Gateway orders opened for appointments. A partial unique index allows at
//! most one `created` order per appointment, so two concurrent initiations
//! collapse onto the same order.

use aura_core::types::{PaymentOrder, PaymentOrderStatus};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct PaymentOrderRow {
    id: String,
    appointment_id: String,
    order_ref: String,
    amount_paise: i64,
    currency: String,
    status: PaymentOrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentOrderRow> for PaymentOrder {
    fn from(row: PaymentOrderRow) -> Self {
        PaymentOrder {
            id: row.id,
            appointment_id: row.appointment_id,
            order_ref: row.order_ref,
            amount_paise: row.amount_paise,
            currency: row.currency,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, appointment_id, order_ref, amount_paise, currency, status, created_at, updated_at
    FROM payment_orders
"#;

/// Repository for payment order operations.
#[derive(Debug, Clone)]
pub struct PaymentOrderRepository {
    pool: SqlitePool,
}

impl PaymentOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentOrderRepository { pool }
    }

    /// The open (`created`) order for an appointment, if any.
    pub async fn find_open(&self, appointment_id: &str) -> DbResult<Option<PaymentOrder>> {
        let sql = format!("{SELECT_ORDER} WHERE appointment_id = ?1 AND status = 'created'");
        let row: Option<PaymentOrderRow> = sqlx::query_as(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PaymentOrder::from))
    }

    pub async fn get_by_order_ref(&self, order_ref: &str) -> DbResult<Option<PaymentOrder>> {
        let sql = format!("{SELECT_ORDER} WHERE order_ref = ?1");
        let row: Option<PaymentOrderRow> = sqlx::query_as(&sql)
            .bind(order_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PaymentOrder::from))
    }

    /// Inserts `order` unless the appointment already has an open order.
    ///
    /// ## Returns
    /// `(order, true)` when inserted, `(existing, false)` when another open
    /// order won the unique index.
    pub async fn insert_or_existing(&self, order: &PaymentOrder) -> DbResult<(PaymentOrder, bool)> {
        debug!(
            appointment_id = %order.appointment_id,
            order_ref = %order.order_ref,
            amount = order.amount_paise,
            "Inserting payment order"
        );

        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_orders (
                id, appointment_id, order_ref, amount_paise, currency, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.appointment_id)
        .bind(&order.order_ref)
        .bind(order.amount_paise)
        .bind(&order.currency)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => Ok((order.clone(), true)),
            Err(err) if err.is_unique_violation() => {
                let existing = self
                    .find_open(&order.appointment_id)
                    .await?
                    .ok_or(err)?;
                debug!(
                    appointment_id = %order.appointment_id,
                    order_ref = %existing.order_ref,
                    "Reusing open payment order"
                );
                Ok((existing, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Closes an open order as failed so a retry can open a new one.
    pub async fn mark_failed(&self, order_ref: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders SET status = 'failed', updated_at = ?1
            WHERE order_ref = ?2 AND status = 'created'
            "#,
        )
        .bind(now)
        .bind(order_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_for_appointment(&self, appointment_id: &str) -> DbResult<Vec<PaymentOrder>> {
        let sql = format!("{SELECT_ORDER} WHERE appointment_id = ?1 ORDER BY created_at");
        let rows: Vec<PaymentOrderRow> = sqlx::query_as(&sql)
            .bind(appointment_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PaymentOrder::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{appointment, db};
    use aura_core::lifecycle::AppointmentStatus;

    fn order(id: &str, order_ref: &str) -> PaymentOrder {
        let now = Utc::now();
        PaymentOrder {
            id: id.to_string(),
            appointment_id: "apt-1".to_string(),
            order_ref: order_ref.to_string(),
            amount_paise: 50_000,
            currency: "INR".to_string(),
            status: PaymentOrderStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_one_open_order_per_appointment() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        let repo = db.payment_orders();

        let (first, created) = repo.insert_or_existing(&order("o1", "ref-1")).await.unwrap();
        assert!(created);
        let (second, created) = repo.insert_or_existing(&order("o2", "ref-2")).await.unwrap();
        assert!(!created);
        assert_eq!(second.order_ref, first.order_ref);

        assert!(repo.mark_failed("ref-1", Utc::now()).await.unwrap());
        assert!(repo.find_open("apt-1").await.unwrap().is_none());

        // A failed order no longer blocks a new one.
        let (third, created) = repo.insert_or_existing(&order("o3", "ref-3")).await.unwrap();
        assert!(created);
        assert_eq!(third.order_ref, "ref-3");
        assert_eq!(repo.list_for_appointment("apt-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_marks_order_paid() {
        let db = db().await;
        db.appointments()
            .insert(&appointment("apt-1", "salon-1", (10, 0), 45))
            .await
            .unwrap();
        db.payment_orders().insert_or_existing(&order("o1", "ref-1")).await.unwrap();

        db.appointments()
            .confirm("apt-1", AppointmentStatus::Created, "ref-1", "pay-1", Utc::now())
            .await
            .unwrap();

        let stored = db.payment_orders().get_by_order_ref("ref-1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentOrderStatus::Paid);
        assert!(db.payment_orders().find_open("apt-1").await.unwrap().is_none());
    }
}
