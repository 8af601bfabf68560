//! Database repository for processed payment webhook events.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::errors::Result;

pub struct WebhookEvents<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> WebhookEvents<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Record an event id. Returns `false` if it was already recorded.
    #[instrument(skip(self), err)]
    pub async fn record(&mut self, event_id: &str, event_type: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, event_type, processed_at) VALUES (?, ?, ?) ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(Utc::now())
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_is_idempotent(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = WebhookEvents::new(&mut conn);

        assert!(repo.record("evt_1", "payment_intent.succeeded").await.unwrap());
        assert!(!repo.record("evt_1", "payment_intent.succeeded").await.unwrap());
        assert!(repo.record("evt_2", "payment_intent.payment_failed").await.unwrap());
    }
}
