//! # Customer History from Storage
//!
//! Derives [`CustomerHistory`] from the customer's past appointments at a
//! provider: loyalty is the number of completed visits, and add-on history
//! means at least one completed visit booked more than one item.

use async_trait::async_trait;
use aura_core::upsell::CustomerHistory;
use aura_db::Database;
use tracing::debug;

use crate::error::BookingResult;
use crate::providers::HistoryProvider;

#[derive(Debug, Clone)]
pub struct SqliteHistoryProvider {
    db: Database,
}

impl SqliteHistoryProvider {
    pub fn new(db: Database) -> Self {
        SqliteHistoryProvider { db }
    }
}

#[async_trait]
impl HistoryProvider for SqliteHistoryProvider {
    async fn get_history(&self, customer_id: &str, salon_id: &str) -> BookingResult<CustomerHistory> {
        let appointments = self.db.appointments();
        let completed = appointments.count_completed(customer_id, salon_id).await?;
        let past_addon_history = appointments.has_addon_history(customer_id, salon_id).await?;

        debug!(customer_id = %customer_id, salon_id = %salon_id, completed, past_addon_history, "Loaded customer history");

        Ok(CustomerHistory {
            customer_loyalty: u32::try_from(completed).unwrap_or(u32::MAX),
            past_addon_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, stored_appointment};
    use aura_core::lifecycle::AppointmentStatus;
    use aura_core::types::BookedItem;

    #[tokio::test]
    async fn test_counts_completed_visits() {
        let db = testing::db().await;

        let mut first = stored_appointment("apt-1", AppointmentStatus::Completed);
        first.items.push(BookedItem {
            service_id: "svc-massage".into(),
            name: "Head massage".into(),
            price_paise: 30_000,
            duration_minutes: 20,
            is_offer: false,
        });
        db.appointments().insert(&first).await.unwrap();
        db.appointments()
            .insert(&stored_appointment("apt-2", AppointmentStatus::Completed))
            .await
            .unwrap();
        db.appointments()
            .insert(&stored_appointment("apt-3", AppointmentStatus::Confirmed))
            .await
            .unwrap();

        let history = SqliteHistoryProvider::new(db)
            .get_history("cust-1", "salon-1")
            .await
            .unwrap();
        assert_eq!(history.customer_loyalty, 2);
        assert!(history.past_addon_history);
    }

    #[tokio::test]
    async fn test_new_customer_has_empty_history() {
        let db = testing::db().await;
        let history = SqliteHistoryProvider::new(db)
            .get_history("nobody", "salon-1")
            .await
            .unwrap();
        assert_eq!(history, CustomerHistory::default());
    }
}
