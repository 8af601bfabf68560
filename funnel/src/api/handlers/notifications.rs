//! Notification log and one-off messages from the dashboard.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        auth::CurrentAdmin,
        notifications::{ListNotificationsQuery, NotificationResponse, SendEmailRequest, SendSmsRequest},
        pagination::PaginatedResponse,
    },
    db::{
        handlers::{Leads, Notifications, Repository, notifications::NotificationFilter},
        models::{leads::LeadDBResponse, notifications::NotificationKind},
    },
    email::EmailContent,
    errors::{Error, Result},
    types::LeadId,
};

async fn lead_or_404(state: &AppState, id: LeadId) -> Result<LeadDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Leads::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lead".to_string(),
        id: id.to_string(),
    })
}

/// List sent, failed and skipped notifications
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Page of notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    _admin: CurrentAdmin,
) -> Result<Json<PaginatedResponse<NotificationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = NotificationFilter {
        lead_id: query.lead_id,
        channel: query.channel,
        status: query.status,
        ..NotificationFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut conn);
    let notifications = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        notifications.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

/// Email a lead
///
/// The message counts as marketing: it is skipped, and logged as skipped, for leads who have
/// opted out.
#[utoipa::path(
    post,
    path = "/notifications/email",
    tag = "notifications",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Logged notification", body = NotificationResponse),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin, request), fields(admin_id = admin.id, lead_id = request.lead_id))]
pub async fn send_email(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<NotificationResponse>> {
    request.validate()?;
    let lead = lead_or_404(&state, request.lead_id).await?;

    let content = EmailContent::Custom {
        first_name: lead.first_name.clone(),
        subject: request.subject.trim().to_string(),
        body: request.body,
    };
    let notification = state.notifier.email_lead(&lead, content).await?;

    Ok(Json(notification.into()))
}

/// Text a lead
#[utoipa::path(
    post,
    path = "/notifications/sms",
    tag = "notifications",
    request_body = SendSmsRequest,
    responses(
        (status = 200, description = "Logged notification", body = NotificationResponse),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin, request), fields(admin_id = admin.id, lead_id = request.lead_id))]
pub async fn send_sms(State(state): State<AppState>, admin: CurrentAdmin, Json(request): Json<SendSmsRequest>) -> Result<Json<NotificationResponse>> {
    request.validate()?;
    let lead = lead_or_404(&state, request.lead_id).await?;

    let notification = state
        .notifier
        .sms_lead(&lead, NotificationKind::Custom, request.body.trim())
        .await?;

    Ok(Json(notification.into()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{admin_bearer, capture_lead_json, create_test_app};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_send_email_and_list(pool: SqlitePool) {
        let (server, state, _dir) = create_test_app(pool).await;
        let (header, value) = admin_bearer(&state);
        let lead = capture_lead_json(&server, "ada@example.com").await;

        let response = server
            .post("/admin/api/v1/notifications/email")
            .add_header(header.clone(), value.clone())
            .json(&json!({ "lead_id": lead["id"], "subject": "Following up", "body": "Any questions?" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "sent");
        assert_eq!(body["kind"], "custom");
        assert_eq!(body["subject"], "Following up");

        let response = server
            .get("/admin/api/v1/notifications")
            .add_query_param("lead_id", lead["id"].as_i64().unwrap())
            .add_header(header, value)
            .await;
        let body: Value = response.json();
        // Welcome email plus the one above
        assert_eq!(body["total_count"], 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sms_without_consent_is_skipped(pool: SqlitePool) {
        let (server, state, _dir) = create_test_app(pool).await;
        let (header, value) = admin_bearer(&state);
        let lead = capture_lead_json(&server, "ada@example.com").await;

        let response = server
            .post("/admin/api/v1/notifications/sms")
            .add_header(header.clone(), value.clone())
            .json(&json!({ "lead_id": lead["id"], "body": "See you tomorrow" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "skipped");
        assert_eq!(body["error"], "no SMS consent");

        let response = server
            .get("/admin/api/v1/notifications")
            .add_query_param("channel", "sms")
            .add_query_param("status", "skipped")
            .add_header(header, value)
            .await;
        assert_eq!(response.json::<Value>()["total_count"], 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_manual_send_validation(pool: SqlitePool) {
        let (server, state, _dir) = create_test_app(pool).await;
        let (header, value) = admin_bearer(&state);

        server
            .post("/admin/api/v1/notifications/email")
            .add_header(header.clone(), value.clone())
            .json(&json!({ "lead_id": 9999, "subject": "Hi", "body": "Hello" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/admin/api/v1/notifications/sms")
            .add_header(header.clone(), value.clone())
            .json(&json!({ "lead_id": 9999, "body": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/admin/api/v1/notifications/email")
            .json(&json!({ "lead_id": 1, "subject": "Hi", "body": "Hello" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
