//! SQLite-backed [`LoyaltyLedger`].

use async_trait::async_trait;
use aura_db::{Database, LedgerOutcome};
use chrono::Utc;

use crate::error::BookingResult;
use crate::providers::LoyaltyLedger;

#[derive(Debug, Clone)]
pub struct SqliteLoyaltyLedger {
    db: Database,
}

impl SqliteLoyaltyLedger {
    pub fn new(db: Database) -> Self {
        SqliteLoyaltyLedger { db }
    }
}

#[async_trait]
impl LoyaltyLedger for SqliteLoyaltyLedger {
    async fn get_balance(&self, customer_id: &str) -> BookingResult<i64> {
        Ok(self.db.loyalty().get_account(customer_id).await?.points_balance)
    }

    async fn debit(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome> {
        Ok(self.db.loyalty().debit(customer_id, points, key, Utc::now()).await?)
    }

    async fn credit(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome> {
        Ok(self.db.loyalty().restore(customer_id, points, key, Utc::now()).await?)
    }

    async fn earn(&self, customer_id: &str, points: i64, key: &str) -> BookingResult<LedgerOutcome> {
        Ok(self.db.loyalty().earn(customer_id, points, key, Utc::now()).await?)
    }
}
