//! API request/response models for gated videos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{config::VideoConfig, db::models::video_views::VideoViewDBResponse};

/// Catalog entry. The playback URL is withheld until the lead presents a token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_seconds: u32,
}

impl From<&VideoConfig> for VideoSummary {
    fn from(video: &VideoConfig) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            duration_seconds: video.duration_seconds,
        }
    }
}

/// How far a lead got through one video
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VideoProgressResponse {
    pub video_id: String,
    pub seconds_watched: i64,
    /// 0.0 to 100.0
    pub percent_watched: f64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<VideoViewDBResponse> for VideoProgressResponse {
    fn from(db: VideoViewDBResponse) -> Self {
        Self {
            video_id: db.video_id,
            seconds_watched: db.seconds_watched,
            percent_watched: db.percent_watched,
            completed: db.completed,
            completed_at: db.completed_at,
            updated_at: db.updated_at,
        }
    }
}

/// An unlocked video
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VideoAccessResponse {
    #[serde(flatten)]
    pub video: VideoSummary,
    pub url: String,
    pub completion_threshold: f64,
    /// `None` until the lead reports progress
    pub progress: Option<VideoProgressResponse>,
}

/// Playback position report from the watch page
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VideoProgressUpdate {
    /// Lead access token
    pub token: String,
    pub seconds_watched: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VideoProgressUpdateResponse {
    pub progress: VideoProgressResponse,
    /// True only for the report that crossed the completion threshold
    pub newly_completed: bool,
    pub booking_unlocked: bool,
}
