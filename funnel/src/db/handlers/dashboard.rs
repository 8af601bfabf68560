//! Aggregate queries for the admin dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::{
        appointments::AppointmentStatus, dashboard::DashboardDBResponse, invoices::InvoiceStatus, leads::LeadStatus,
        reminders::ReminderStatus,
    },
};

pub struct Dashboard<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Dashboard<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn summary(&mut self, now: DateTime<Utc>) -> Result<DashboardDBResponse> {
        let lead_rows: Vec<(LeadStatus, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM leads GROUP BY status")
            .fetch_all(&mut *self.db)
            .await?;

        // Every status appears, even with zero rows, so the dashboard shape is stable
        let mut leads_by_status: BTreeMap<String, i64> = LeadStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        for (status, count) in lead_rows {
            leads_by_status.insert(status.as_str().to_string(), count);
        }
        let total_leads = leads_by_status.values().sum();

        let invoice_rows: Vec<(InvoiceStatus, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM invoices GROUP BY status")
            .fetch_all(&mut *self.db)
            .await?;
        let mut invoices_by_status: BTreeMap<String, i64> =
            InvoiceStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        for (status, count) in invoice_rows {
            invoices_by_status.insert(status.as_str().to_string(), count);
        }

        let (revenue_cents,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(amount_cents), 0) FROM invoices WHERE status = ?")
            .bind(InvoiceStatus::Paid)
            .fetch_one(&mut *self.db)
            .await?;

        let (outstanding_cents,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount_cents), 0) FROM invoices WHERE status IN (?, ?)")
                .bind(InvoiceStatus::Sent)
                .bind(InvoiceStatus::Failed)
                .fetch_one(&mut *self.db)
                .await?;

        let (upcoming_appointments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments WHERE status = ? AND start_time >= ?")
            .bind(AppointmentStatus::Scheduled)
            .bind(now)
            .fetch_one(&mut *self.db)
            .await?;

        let (pending_reminders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reminders WHERE status = ?")
            .bind(ReminderStatus::Pending)
            .fetch_one(&mut *self.db)
            .await?;

        let (video_completions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM video_views WHERE completed = 1")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(DashboardDBResponse {
            total_leads,
            leads_by_status,
            invoices_by_status,
            revenue_cents,
            outstanding_cents,
            upcoming_appointments,
            pending_reminders,
            video_completions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{
        Appointments, Invoices, Leads, Repository, appointments::tests::booking, invoices::tests::invoice_request,
        leads::tests::lead_request,
    };
    use chrono::Duration;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_dashboard(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let stats = Dashboard::new(&mut conn).summary(Utc::now()).await.unwrap();

        assert_eq!(stats.total_leads, 0);
        assert_eq!(stats.leads_by_status.len(), 6);
        assert_eq!(stats.revenue_cents, 0);
        assert_eq!(stats.conversion_rate(), 0.0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_summary_counts(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let now = Utc::now();

        let buyer = Leads::new(&mut conn).create(&lead_request("buyer@example.com")).await.unwrap();
        Leads::new(&mut conn).create(&lead_request("browser@example.com")).await.unwrap();
        Leads::new(&mut conn).advance_status(buyer.id, LeadStatus::Customer).await.unwrap();

        let paid = Invoices::new(&mut conn).create(&invoice_request(buyer.id)).await.unwrap();
        Invoices::new(&mut conn).mark_sent(paid.id, "pi_1", None).await.unwrap();
        Invoices::new(&mut conn).mark_paid(paid.id, now).await.unwrap();
        let open = Invoices::new(&mut conn).create(&invoice_request(buyer.id)).await.unwrap();
        Invoices::new(&mut conn).mark_sent(open.id, "pi_2", None).await.unwrap();

        Appointments::new(&mut conn)
            .create(&booking(buyer.id, now + Duration::days(1)))
            .await
            .unwrap();

        let stats = Dashboard::new(&mut conn).summary(now).await.unwrap();

        assert_eq!(stats.total_leads, 2);
        assert_eq!(stats.leads_by_status["customer"], 1);
        assert_eq!(stats.invoices_by_status["paid"], 1);
        assert_eq!(stats.invoices_by_status["sent"], 1);
        assert_eq!(stats.revenue_cents, 50_000);
        assert_eq!(stats.outstanding_cents, 50_000);
        assert_eq!(stats.upcoming_appointments, 1);
        assert_eq!(stats.conversion_rate(), 0.5);
    }
}
