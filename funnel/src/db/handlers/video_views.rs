//! Database repository for video watch progress.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::video_views::{VideoProgressDBRequest, VideoProgressOutcome, VideoViewDBResponse},
};
use crate::types::LeadId;

pub struct VideoViews<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> VideoViews<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self, lead_id: LeadId, video_id: &str) -> Result<Option<VideoViewDBResponse>> {
        let view = sqlx::query_as::<_, VideoViewDBResponse>("SELECT * FROM video_views WHERE lead_id = ? AND video_id = ?")
            .bind(lead_id)
            .bind(video_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(view)
    }

    /// Record a progress report.
    ///
    /// Progress never decreases and a completed view stays completed, so out-of-order reports
    /// from the player are harmless.
    #[instrument(skip(self, request), fields(lead_id = request.lead_id, video_id = %request.video_id), err)]
    pub async fn record_progress(&mut self, request: &VideoProgressDBRequest) -> Result<VideoProgressOutcome> {
        let was_completed = self
            .get(request.lead_id, &request.video_id)
            .await?
            .is_some_and(|view| view.completed);

        let now = Utc::now();
        let completed = request.reaches_threshold();

        let view = sqlx::query_as::<_, VideoViewDBResponse>(
            r#"
            INSERT INTO video_views (
                lead_id, video_id, seconds_watched, percent_watched, completed, completed_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (lead_id, video_id) DO UPDATE SET
                seconds_watched = MAX(seconds_watched, excluded.seconds_watched),
                percent_watched = MAX(percent_watched, excluded.percent_watched),
                completed = MAX(completed, excluded.completed),
                completed_at = COALESCE(completed_at, excluded.completed_at),
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(request.lead_id)
        .bind(&request.video_id)
        .bind(request.clamped_seconds())
        .bind(request.fraction() * 100.0)
        .bind(completed)
        .bind(completed.then_some(now))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        let newly_completed = view.completed && !was_completed;
        Ok(VideoProgressOutcome { view, newly_completed })
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_lead(&mut self, lead_id: LeadId) -> Result<Vec<VideoViewDBResponse>> {
        let views = sqlx::query_as::<_, VideoViewDBResponse>("SELECT * FROM video_views WHERE lead_id = ? ORDER BY created_at, id")
            .bind(lead_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(views)
    }

    /// Whether the lead has finished any video
    #[instrument(skip(self), err)]
    pub async fn has_completed_any(&mut self, lead_id: LeadId) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM video_views WHERE lead_id = ? AND completed = 1")
            .bind(lead_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count.0 > 0)
    }
}
