//! Email and SMS preference handlers, reached through the link in every email footer.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::preferences::{PreferencesResponse, PreferencesUpdate},
    db::{errors::DbError, handlers::EmailPreferences},
    errors::{Error, Result},
    types::abbrev_token,
};

fn not_found(token: &str) -> Error {
    Error::NotFound {
        resource: "Preferences".to_string(),
        id: abbrev_token(token),
    }
}

fn map_missing(token: &str) -> impl FnOnce(DbError) -> Error + '_ {
    move |e| match e {
        DbError::NotFound => not_found(token),
        other => other.into(),
    }
}

/// Current preferences
#[utoipa::path(
    get,
    path = "/api/preferences/{token}",
    tag = "funnel",
    params(("token" = String, Path, description = "Preference token from the email footer")),
    responses(
        (status = 200, description = "Preferences", body = PreferencesResponse),
        (status = 404, description = "Unknown token"),
    )
)]
#[instrument(skip_all)]
pub async fn get_preferences(State(state): State<AppState>, Path(token): Path<String>) -> Result<Json<PreferencesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let prefs = EmailPreferences::new(&mut conn)
        .get_by_token(&token)
        .await?
        .ok_or_else(|| not_found(&token))?;
    Ok(Json(prefs.into()))
}

/// Change preferences
///
/// Turning any preference on clears an earlier unsubscribe.
#[utoipa::path(
    put,
    path = "/api/preferences/{token}",
    tag = "funnel",
    params(("token" = String, Path, description = "Preference token from the email footer")),
    request_body = PreferencesUpdate,
    responses(
        (status = 200, description = "Updated preferences", body = PreferencesResponse),
        (status = 404, description = "Unknown token"),
    )
)]
#[instrument(skip_all)]
pub async fn update_preferences(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<PreferencesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let prefs = EmailPreferences::new(&mut conn)
        .update(&token, &update.into())
        .await
        .map_err(map_missing(&token))?;

    tracing::info!(lead_id = prefs.lead_id, "Updated preferences");
    Ok(Json(prefs.into()))
}

/// Unsubscribe from everything but transactional email
#[utoipa::path(
    post,
    path = "/api/preferences/{token}/unsubscribe",
    tag = "funnel",
    params(("token" = String, Path, description = "Preference token from the email footer")),
    responses(
        (status = 200, description = "Unsubscribed", body = PreferencesResponse),
        (status = 404, description = "Unknown token"),
    )
)]
#[instrument(skip_all)]
pub async fn unsubscribe(State(state): State<AppState>, Path(token): Path<String>) -> Result<Json<PreferencesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let prefs = EmailPreferences::new(&mut conn)
        .unsubscribe(&token)
        .await
        .map_err(map_missing(&token))?;

    tracing::info!(lead_id = prefs.lead_id, "Lead unsubscribed");
    Ok(Json(prefs.into()))
}
