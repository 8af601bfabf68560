//! Database repository for appointments.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::appointments::{AppointmentCreateDBRequest, AppointmentDBResponse, AppointmentStatus},
};
use crate::types::{AppointmentId, LeadId};

/// Filter for listing appointments
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<AppointmentStatus>,
    pub lead_id: Option<LeadId>,
    /// Only appointments starting at or after this instant
    pub starts_after: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
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
        if let Some(lead_id) = self.lead_id {
            query.push(" AND lead_id = ");
            query.push_bind(lead_id);
        }
        if let Some(after) = self.starts_after {
            query.push(" AND start_time >= ");
            query.push_bind(after);
        }
    }
}

pub struct Appointments<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Appointments<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Insert a scheduled appointment.
    ///
    /// Fails with a unique violation on `appointments.start_time` when the slot already holds a
    /// scheduled appointment.
    #[instrument(skip(self, request), fields(lead_id = request.lead_id, start = %request.start_time), err)]
    pub async fn create(&mut self, request: &AppointmentCreateDBRequest) -> Result<AppointmentDBResponse> {
        let now = Utc::now();
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            r#"
            INSERT INTO appointments (lead_id, start_time, end_time, timezone, status, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(request.lead_id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(&request.timezone)
        .bind(AppointmentStatus::Scheduled)
        .bind(&request.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(appointment)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: AppointmentId) -> Result<Option<AppointmentDBResponse>> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(appointment)
    }

    /// Attach the calendar event created for this appointment
    #[instrument(skip(self, meeting_link), err)]
    pub async fn set_calendar_event(
        &mut self,
        id: AppointmentId,
        event_id: &str,
        meeting_link: Option<&str>,
    ) -> Result<AppointmentDBResponse> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            "UPDATE appointments SET calendar_event_id = ?, meeting_link = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(event_id)
        .bind(meeting_link)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(appointment)
    }

    /// Move a scheduled appointment to `status`.
    ///
    /// Returns `None` when the appointment is no longer scheduled (or does not exist).
    #[instrument(skip(self), fields(status = status.as_str()), err)]
    pub async fn transition(&mut self, id: AppointmentId, status: AppointmentStatus) -> Result<Option<AppointmentDBResponse>> {
        if !AppointmentStatus::Scheduled.can_transition_to(status) {
            return Ok(None);
        }

        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ? RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(AppointmentStatus::Scheduled)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(appointment)
    }

    /// Remove a row that never became a real booking (calendar event creation failed).
    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, id: AppointmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AppointmentFilter) -> Result<Vec<AppointmentDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM appointments WHERE 1=1");
        filter.push_conditions(&mut query);

        // Upcoming lists read best soonest-first; history newest-first.
        if filter.starts_after.is_some() {
            query.push(" ORDER BY start_time ASC, id ASC LIMIT ");
        } else {
            query.push(" ORDER BY start_time DESC, id DESC LIMIT ");
        }
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let appointments = query.build_query_as::<AppointmentDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(appointments)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AppointmentFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM appointments WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// `(start, end)` of scheduled appointments overlapping `[from, to)`
    #[instrument(skip(self), err)]
    pub async fn scheduled_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT start_time, end_time FROM appointments WHERE status = ? AND start_time < ? AND end_time > ? ORDER BY start_time",
        )
        .bind(AppointmentStatus::Scheduled)
        .bind(to)
        .bind(from)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    /// Scheduled appointment belonging to this lead, if any
    #[instrument(skip(self), err)]
    pub async fn next_scheduled_for_lead(&mut self, lead_id: LeadId, now: DateTime<Utc>) -> Result<Option<AppointmentDBResponse>> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            "SELECT * FROM appointments WHERE lead_id = ? AND status = ? AND start_time >= ? ORDER BY start_time LIMIT 1",
        )
        .bind(lead_id)
        .bind(AppointmentStatus::Scheduled)
        .bind(now)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(appointment)
    }
}
