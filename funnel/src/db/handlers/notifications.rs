//! Database repository for the outbound notification log.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::notifications::{NotificationChannel, NotificationCreateDBRequest, NotificationDBResponse, NotificationStatus},
};
use crate::types::LeadId;

/// Filter for listing notifications
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub skip: i64,
    pub limit: i64,
    pub lead_id: Option<LeadId>,
    pub channel: Option<NotificationChannel>,
    pub status: Option<NotificationStatus>,
}

impl NotificationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(lead_id) = self.lead_id {
            query.push(" AND lead_id = ");
            query.push_bind(lead_id);
        }
        if let Some(channel) = self.channel {
            query.push(" AND channel = ");
            query.push_bind(channel);
        }
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
    }
}

pub struct Notifications<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(channel = request.channel.as_str(), kind = request.kind.as_str()), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            INSERT INTO notifications (lead_id, channel, kind, recipient, subject, status, provider_id, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(request.lead_id)
        .bind(request.channel)
        .bind(request.kind)
        .bind(&request.recipient)
        .bind(&request.subject)
        .bind(request.status)
        .bind(&request.provider_id)
        .bind(&request.error)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(notification)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &NotificationFilter) -> Result<Vec<NotificationDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM notifications WHERE 1=1");
        filter.push_conditions(&mut query);

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let notifications = query.build_query_as::<NotificationDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(notifications)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &NotificationFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM notifications WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }
}
