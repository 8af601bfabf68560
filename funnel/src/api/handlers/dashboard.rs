use axum::{Json, extract::State};
use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState,
    api::models::{auth::CurrentAdmin, dashboard::DashboardResponse},
    db::handlers::Dashboard,
    errors::{Error, Result},
};

/// Funnel metrics
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    summary = "Get funnel metrics",
    description = "Counts by lead and invoice status, revenue, upcoming appointments, pending reminders, \
                   video completions and the lead to customer conversion rate.",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn get_dashboard(State(state): State<AppState>, _admin: CurrentAdmin) -> Result<Json<DashboardResponse>> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let summary = Dashboard::new(&mut conn).summary(now).await?;

    Ok(Json(DashboardResponse::new(summary, state.reminders.is_processing(), now)))
}
