//! # Add-on Sale Repository
//!
//! One sale per (appointment, offer). Sales are written after the
//! appointment is confirmed; recording the same offer twice inserts nothing.

use aura_core::types::AddonSale;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    appointment_id: String,
    offer_id: String,
    service_name: String,
    price_paise: i64,
    admin_commission_paise: i64,
    salon_earning_paise: i64,
    created_at: DateTime<Utc>,
}

impl From<SaleRow> for AddonSale {
    fn from(row: SaleRow) -> Self {
        AddonSale {
            id: row.id,
            appointment_id: row.appointment_id,
            offer_id: row.offer_id,
            service_name: row.service_name,
            price_paise: row.price_paise,
            admin_commission_paise: row.admin_commission_paise,
            salon_earning_paise: row.salon_earning_paise,
            created_at: row.created_at,
        }
    }
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &AddonSale) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO addon_sales (
            id, appointment_id, offer_id, service_name, price_paise,
            admin_commission_paise, salon_earning_paise, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT (appointment_id, offer_id) DO NOTHING
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.appointment_id)
    .bind(&sale.offer_id)
    .bind(&sale.service_name)
    .bind(sale.price_paise)
    .bind(sale.admin_commission_paise)
    .bind(sale.salon_earning_paise)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Repository for sold add-on offers.
#[derive(Debug, Clone)]
pub struct AddonSaleRepository {
    pool: SqlitePool,
}

impl AddonSaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddonSaleRepository { pool }
    }

    /// Records sales in one transaction and returns how many were new.
    pub async fn record(&self, sales: &[AddonSale]) -> DbResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0;
        for sale in sales {
            inserted += insert_sale(&mut tx, sale).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(inserted)
    }

    pub async fn list_for_appointment(&self, appointment_id: &str) -> DbResult<Vec<AddonSale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(
            r#"
            SELECT id, appointment_id, offer_id, service_name, price_paise,
                   admin_commission_paise, salon_earning_paise, created_at
            FROM addon_sales WHERE appointment_id = ?1
            ORDER BY offer_id
            "#,
        )
        .bind(appointment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AddonSale::from).collect())
    }
}
