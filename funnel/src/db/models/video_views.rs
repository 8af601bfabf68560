//! Database models for video watch progress.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::LeadId;

/// Database response for a lead's progress on one video
#[derive(Debug, Clone, FromRow)]
pub struct VideoViewDBResponse {
    pub id: i64,
    pub lead_id: LeadId,
    pub video_id: String,
    pub seconds_watched: i64,
    pub percent_watched: f64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A progress report for a video
#[derive(Debug, Clone)]
pub struct VideoProgressDBRequest {
    pub lead_id: LeadId,
    pub video_id: String,
    pub seconds_watched: i64,
    pub duration_seconds: i64,
    pub completion_threshold: f64,
}

impl VideoProgressDBRequest {
    /// Seconds clamped to `[0, duration]`.
    pub fn clamped_seconds(&self) -> i64 {
        self.seconds_watched.clamp(0, self.duration_seconds.max(0))
    }

    /// Fraction of the video watched in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.duration_seconds <= 0 {
            return 0.0;
        }
        self.clamped_seconds() as f64 / self.duration_seconds as f64
    }

    pub fn reaches_threshold(&self) -> bool {
        self.fraction() >= self.completion_threshold
    }
}

/// Outcome of recording progress
#[derive(Debug, Clone)]
pub struct VideoProgressOutcome {
    pub view: VideoViewDBResponse,
    /// True only on the report that first crossed the completion threshold
    pub newly_completed: bool,
}
