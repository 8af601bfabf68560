//! Database repository for appointment reminders.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::reminders::{ReminderCreateDBRequest, ReminderDBResponse, ReminderStatus},
};
use crate::types::{AppointmentId, ReminderId};

/// Filter for listing reminders
#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<ReminderStatus>,
    pub appointment_id: Option<AppointmentId>,
}

impl ReminderFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(appointment_id) = self.appointment_id {
            query.push(" AND appointment_id = ");
            query.push_bind(appointment_id);
        }
    }
}

pub struct Reminders<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Reminders<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Insert pending reminders for an appointment
    #[instrument(skip(self, reminders), fields(count = reminders.len()), err)]
    pub async fn create_for_appointment(
        &mut self,
        appointment_id: AppointmentId,
        reminders: &[ReminderCreateDBRequest],
    ) -> Result<Vec<ReminderDBResponse>> {
        let now = Utc::now();
        let mut created = Vec::with_capacity(reminders.len());

        for reminder in reminders {
            let row = sqlx::query_as::<_, ReminderDBResponse>(
                r#"
                INSERT INTO reminders (appointment_id, channel, scheduled_for, status, attempts, created_at)
                VALUES (?, ?, ?, ?, 0, ?)
                RETURNING *
                "#,
            )
            .bind(appointment_id)
            .bind(reminder.channel)
            .bind(reminder.scheduled_for)
            .bind(ReminderStatus::Pending)
            .bind(now)
            .fetch_one(&mut *self.db)
            .await?;
            created.push(row);
        }

        Ok(created)
    }

    /// Pending reminders whose time has come, oldest first.
    #[instrument(skip(self), err)]
    pub async fn claim_due(&mut self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReminderDBResponse>> {
        let reminders = sqlx::query_as::<_, ReminderDBResponse>(
            r#"
            SELECT * FROM reminders
            WHERE status = ? AND scheduled_for <= ?
            ORDER BY scheduled_for ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(ReminderStatus::Pending)
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(reminders)
    }

    #[instrument(skip(self), err)]
    pub async fn mark_sent(&mut self, id: ReminderId, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reminders SET status = ?, attempts = attempts + 1, sent_at = ?, last_error = NULL WHERE id = ? AND status = ?",
        )
        .bind(ReminderStatus::Sent)
        .bind(sent_at)
        .bind(id)
        .bind(ReminderStatus::Pending)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, error), err)]
    pub async fn mark_failed(&mut self, id: ReminderId, error: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE reminders SET status = ?, attempts = attempts + 1, last_error = ? WHERE id = ? AND status = ?")
            .bind(ReminderStatus::Failed)
            .bind(error)
            .bind(id)
            .bind(ReminderStatus::Pending)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    pub async fn mark_cancelled(&mut self, id: ReminderId) -> Result<bool> {
        let result = sqlx::query("UPDATE reminders SET status = ? WHERE id = ? AND status = ?")
            .bind(ReminderStatus::Cancelled)
            .bind(id)
            .bind(ReminderStatus::Pending)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel every pending reminder of an appointment, returning how many were cancelled
    #[instrument(skip(self), err)]
    pub async fn cancel_for_appointment(&mut self, appointment_id: AppointmentId) -> Result<u64> {
        let result = sqlx::query("UPDATE reminders SET status = ? WHERE appointment_id = ? AND status = ?")
            .bind(ReminderStatus::Cancelled)
            .bind(appointment_id)
            .bind(ReminderStatus::Pending)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &ReminderFilter) -> Result<Vec<ReminderDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM reminders WHERE 1=1");
        filter.push_conditions(&mut query);

        query.push(" ORDER BY scheduled_for ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let reminders = query.build_query_as::<ReminderDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(reminders)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ReminderFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM reminders WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }
}
