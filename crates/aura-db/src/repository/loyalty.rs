//! # Loyalty Repository
//!
//! Point balances plus an append-only ledger keyed by idempotency key.
//!
//! ## Ledger Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── INSERT loyalty_ledger(key)   ── duplicate key ──► AlreadyApplied  │
//! │   ├── UPDATE loyalty_accounts                                           │
//! │   │     WHERE points_balance >= n  ── 0 rows ──► ROLLBACK, Insufficient │
//! │  COMMIT ──► Applied { balance }                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aura_core::types::LoyaltyAccount;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Result of a ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The entry was written; `balance` is the new balance.
    Applied { balance: i64 },
    /// An entry with the same key already exists. Nothing changed.
    AlreadyApplied,
    /// A debit larger than the balance. Nothing changed.
    InsufficientBalance { available: i64 },
}

#[derive(Debug, Clone, Copy)]
enum CreditKind {
    Earned,
    Restored,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    customer_id: String,
    points_balance: i64,
    points_earned: i64,
    points_redeemed: i64,
}

impl From<AccountRow> for LoyaltyAccount {
    fn from(row: AccountRow) -> Self {
        LoyaltyAccount {
            customer_id: row.customer_id,
            points_balance: row.points_balance,
            points_earned: row.points_earned,
            points_redeemed: row.points_redeemed,
        }
    }
}

/// Repository for loyalty balances and the ledger.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Current account; customers without one have an empty account.
    pub async fn get_account(&self, customer_id: &str) -> DbResult<LoyaltyAccount> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT customer_id, points_balance, points_earned, points_redeemed
            FROM loyalty_accounts WHERE customer_id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(LoyaltyAccount::from)
            .unwrap_or_else(|| LoyaltyAccount::empty(customer_id)))
    }

    /// Removes `points` from the balance once per `key`.
    pub async fn debit(
        &self,
        customer_id: &str,
        points: i64,
        key: &str,
        now: DateTime<Utc>,
    ) -> DbResult<LedgerOutcome> {
        if points <= 0 {
            return Err(DbError::QueryFailed(format!("debit of {points} points")));
        }
        debug!(customer_id = %customer_id, points, key = %key, "Debiting loyalty points");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let entry = sqlx::query(
            "INSERT INTO loyalty_ledger (idempotency_key, customer_id, points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(key)
        .bind(customer_id)
        .bind(-points)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from);

        match entry {
            Ok(_) => {}
            Err(err) if err.is_unique_violation() => {
                debug!(key = %key, "Ledger entry already applied");
                return Ok(LedgerOutcome::AlreadyApplied);
            }
            // No account row yet: nothing to debit.
            Err(DbError::ForeignKeyViolation { .. }) => {
                return Ok(LedgerOutcome::InsufficientBalance { available: 0 });
            }
            Err(err) => return Err(err),
        }

        let result = sqlx::query(
            r#"
            UPDATE loyalty_accounts SET
                points_balance = points_balance - ?1,
                points_redeemed = points_redeemed + ?1,
                updated_at = ?2
            WHERE customer_id = ?3 AND points_balance >= ?1
            "#,
        )
        .bind(points)
        .bind(now)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            let available = self.get_account(customer_id).await?.points_balance;
            warn!(customer_id = %customer_id, points, available, "Insufficient loyalty balance");
            return Ok(LedgerOutcome::InsufficientBalance { available });
        }

        let balance = self.balance_in(&mut tx, customer_id).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(LedgerOutcome::Applied { balance })
    }

    /// Returns previously redeemed points once per `key`.
    pub async fn restore(
        &self,
        customer_id: &str,
        points: i64,
        key: &str,
        now: DateTime<Utc>,
    ) -> DbResult<LedgerOutcome> {
        self.credit(customer_id, points, key, now, CreditKind::Restored).await
    }

    /// Adds newly earned points once per `key`. Opens the account if needed.
    pub async fn earn(
        &self,
        customer_id: &str,
        points: i64,
        key: &str,
        now: DateTime<Utc>,
    ) -> DbResult<LedgerOutcome> {
        self.credit(customer_id, points, key, now, CreditKind::Earned).await
    }

    async fn credit(
        &self,
        customer_id: &str,
        points: i64,
        key: &str,
        now: DateTime<Utc>,
        kind: CreditKind,
    ) -> DbResult<LedgerOutcome> {
        if points <= 0 {
            return Err(DbError::QueryFailed(format!("credit of {points} points")));
        }
        debug!(customer_id = %customer_id, points, key = %key, ?kind, "Crediting loyalty points");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO loyalty_accounts (customer_id, updated_at) VALUES (?1, ?2) ON CONFLICT (customer_id) DO NOTHING",
        )
        .bind(customer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let entry = sqlx::query(
            "INSERT INTO loyalty_ledger (idempotency_key, customer_id, points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(key)
        .bind(customer_id)
        .bind(points)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from);

        match entry {
            Ok(_) => {}
            Err(err) if err.is_unique_violation() => {
                debug!(key = %key, "Ledger entry already applied");
                return Ok(LedgerOutcome::AlreadyApplied);
            }
            Err(err) => return Err(err),
        }

        let sql = match kind {
            CreditKind::Earned => {
                r#"
                UPDATE loyalty_accounts SET
                    points_balance = points_balance + ?1,
                    points_earned = points_earned + ?1,
                    updated_at = ?2
                WHERE customer_id = ?3
                "#
            }
            CreditKind::Restored => {
                r#"
                UPDATE loyalty_accounts SET
                    points_balance = points_balance + ?1,
                    points_redeemed = MAX(points_redeemed - ?1, 0),
                    updated_at = ?2
                WHERE customer_id = ?3
                "#
            }
        };

        sqlx::query(sql)
            .bind(points)
            .bind(now)
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;

        let balance = self.balance_in(&mut tx, customer_id).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(LedgerOutcome::Applied { balance })
    }

    async fn balance_in(
        &self,
        conn: &mut sqlx::SqliteConnection,
        customer_id: &str,
    ) -> DbResult<i64> {
        let balance: i64 =
            sqlx::query_scalar("SELECT points_balance FROM loyalty_accounts WHERE customer_id = ?1")
                .bind(customer_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(balance)
    }

    /// Whether a ledger entry with `key` exists.
    pub async fn has_entry(&self, key: &str) -> DbResult<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM loyalty_ledger WHERE idempotency_key = ?1)",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;

    #[tokio::test]
    async fn test_missing_account_is_empty() {
        let db = db().await;
        let account = db.loyalty().get_account("nobody").await.unwrap();
        assert_eq!(account.points_balance, 0);
        let outcome = db.loyalty().debit("nobody", 100, "redeem:x", Utc::now()).await.unwrap();
        assert_eq!(outcome, LedgerOutcome::InsufficientBalance { available: 0 });
    }

    #[tokio::test]
    async fn test_debit_is_idempotent() {
        let db = db().await;
        let repo = db.loyalty();
        repo.earn("c1", 1_000, "seed:c1", Utc::now()).await.unwrap();

        let first = repo.debit("c1", 300, "redeem:apt-1", Utc::now()).await.unwrap();
        assert_eq!(first, LedgerOutcome::Applied { balance: 700 });
        let retry = repo.debit("c1", 300, "redeem:apt-1", Utc::now()).await.unwrap();
        assert_eq!(retry, LedgerOutcome::AlreadyApplied);

        let account = repo.get_account("c1").await.unwrap();
        assert_eq!(account.points_balance, 700);
        assert_eq!(account.points_redeemed, 300);
        assert_eq!(account.points_earned, 1_000);
        assert!(repo.has_entry("redeem:apt-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_insufficient_debit_changes_nothing() {
        let db = db().await;
        let repo = db.loyalty();
        repo.earn("c1", 200, "seed:c1", Utc::now()).await.unwrap();

        let outcome = repo.debit("c1", 300, "redeem:apt-1", Utc::now()).await.unwrap();
        assert_eq!(outcome, LedgerOutcome::InsufficientBalance { available: 200 });
        assert!(!repo.has_entry("redeem:apt-1").await.unwrap());
        assert_eq!(repo.get_account("c1").await.unwrap().points_balance, 200);
    }

    #[tokio::test]
    async fn test_restore_once() {
        let db = db().await;
        let repo = db.loyalty();
        repo.earn("c1", 500, "seed:c1", Utc::now()).await.unwrap();
        repo.debit("c1", 200, "redeem:apt-1", Utc::now()).await.unwrap();

        let restored = repo.restore("c1", 200, "restore:apt-1", Utc::now()).await.unwrap();
        assert_eq!(restored, LedgerOutcome::Applied { balance: 500 });
        assert_eq!(
            repo.restore("c1", 200, "restore:apt-1", Utc::now()).await.unwrap(),
            LedgerOutcome::AlreadyApplied
        );
        assert_eq!(repo.get_account("c1").await.unwrap().points_redeemed, 0);
    }
}
