//! Gated video handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use crate::{
    AppState,
    api::{
        handlers::leads::{booking_unlocked, lead_by_token},
        models::{
            leads::LeadTokenQuery,
            videos::{VideoAccessResponse, VideoProgressUpdate, VideoProgressUpdateResponse, VideoSummary},
        },
    },
    config::{Config, VideoConfig},
    db::{
        handlers::{Leads, VideoViews},
        models::{leads::LeadStatus, video_views::VideoProgressDBRequest},
    },
    errors::{Error, Result},
};

fn video_or_404<'a>(config: &'a Config, id: &str) -> Result<&'a VideoConfig> {
    config.video(id).ok_or_else(|| Error::NotFound {
        resource: "Video".to_string(),
        id: id.to_string(),
    })
}

/// List the video catalog
#[utoipa::path(
    get,
    path = "/api/videos",
    tag = "funnel",
    responses((status = 200, description = "Configured videos", body = Vec<VideoSummary>))
)]
#[instrument(skip_all)]
pub async fn list_videos(State(state): State<AppState>) -> Json<Vec<VideoSummary>> {
    Json(state.config.videos.iter().map(VideoSummary::from).collect())
}

/// Unlock a video for a lead
#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    tag = "funnel",
    params(("id" = String, Path, description = "Video ID"), LeadTokenQuery),
    responses(
        (status = 200, description = "Video with playback URL", body = VideoAccessResponse),
        (status = 401, description = "Invalid access token"),
        (status = 404, description = "Unknown video"),
    )
)]
#[instrument(skip(state, query))]
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LeadTokenQuery>,
) -> Result<Json<VideoAccessResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut conn, &query.token).await?;
    let video = video_or_404(&state.config, &id)?;

    let progress = VideoViews::new(&mut conn).get(lead.id, &video.id).await?;

    Ok(Json(VideoAccessResponse {
        video: video.into(),
        url: video.url.clone(),
        completion_threshold: video.completion_threshold,
        progress: progress.map(Into::into),
    }))
}

/// Report playback progress
///
/// Progress never goes backwards. The report that first crosses the video's completion threshold
/// marks it watched and moves the lead to `video_watched`.
#[utoipa::path(
    post,
    path = "/api/videos/{id}/progress",
    tag = "funnel",
    params(("id" = String, Path, description = "Video ID")),
    request_body = VideoProgressUpdate,
    responses(
        (status = 200, description = "Recorded progress", body = VideoProgressUpdateResponse),
        (status = 400, description = "Negative position"),
        (status = 401, description = "Invalid access token"),
        (status = 404, description = "Unknown video"),
    )
)]
#[instrument(skip(state, update), fields(seconds_watched = update.seconds_watched))]
pub async fn record_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<VideoProgressUpdate>,
) -> Result<Json<VideoProgressUpdateResponse>> {
    if update.seconds_watched < 0 {
        return Err(Error::BadRequest {
            message: "seconds_watched cannot be negative".to_string(),
        });
    }

    let video = video_or_404(&state.config, &id)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut tx, &update.token).await?;

    let outcome = VideoViews::new(&mut tx)
        .record_progress(&VideoProgressDBRequest {
            lead_id: lead.id,
            video_id: video.id.clone(),
            seconds_watched: update.seconds_watched,
            duration_seconds: i64::from(video.duration_seconds),
            completion_threshold: video.completion_threshold,
        })
        .await?;

    if outcome.newly_completed {
        let advanced = Leads::new(&mut tx).advance_status(lead.id, LeadStatus::VideoWatched).await?;
        tracing::info!(lead_id = lead.id, video_id = %video.id, advanced, "Lead completed video");
    }
    let completed_any = outcome.view.completed || VideoViews::new(&mut tx).has_completed_any(lead.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(VideoProgressUpdateResponse {
        booking_unlocked: booking_unlocked(&state.config, &lead, completed_any),
        newly_completed: outcome.newly_completed,
        progress: outcome.view.into(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{TEST_VIDEO_ID, capture_lead_json, create_test_app};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_hides_urls(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;

        let response = server.get("/api/videos").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body[0]["id"], TEST_VIDEO_ID);
        assert!(body[0].get("url").is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_video_requires_token(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;
        let lead = capture_lead_json(&server, "ada@example.com").await;
        let token = lead["access_token"].as_str().unwrap();

        let path = format!("/api/videos/{TEST_VIDEO_ID}");
        server.get(&path).add_query_param("token", "wrong").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server.get(&path).add_query_param("token", token).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["url"].as_str().unwrap().starts_with("https://"));
        assert!(body["progress"].is_null());

        server
            .get("/api/videos/missing")
            .add_query_param("token", token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completion_unlocks_booking(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;
        let lead = capture_lead_json(&server, "ada@example.com").await;
        let token = lead["access_token"].as_str().unwrap();
        let path = format!("/api/videos/{TEST_VIDEO_ID}/progress");

        let response = server.post(&path).json(&json!({ "token": token, "seconds_watched": 30 })).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["newly_completed"], false);
        assert_eq!(body["booking_unlocked"], false);

        let response = server.post(&path).json(&json!({ "token": token, "seconds_watched": 600 })).await;
        let body: Value = response.json();
        assert_eq!(body["newly_completed"], true);
        assert_eq!(body["booking_unlocked"], true);
        assert_eq!(body["progress"]["completed"], true);

        // A later, earlier position does not undo completion
        let response = server.post(&path).json(&json!({ "token": token, "seconds_watched": 10 })).await;
        let body: Value = response.json();
        assert_eq!(body["newly_completed"], false);
        assert_eq!(body["progress"]["seconds_watched"], 600);

        let response = server.get("/api/leads/me").add_query_param("token", token).await;
        let body: Value = response.json();
        assert_eq!(body["lead"]["status"], "video_watched");
        assert_eq!(body["booking_unlocked"], true);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_negative_progress_is_rejected(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;
        let lead = capture_lead_json(&server, "ada@example.com").await;

        server
            .post(&format!("/api/videos/{TEST_VIDEO_ID}/progress"))
            .json(&json!({ "token": lead["access_token"], "seconds_watched": -5 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
