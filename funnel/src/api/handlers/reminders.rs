//! Reminder listing and on-demand processing.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        auth::CurrentAdmin,
        pagination::PaginatedResponse,
        reminders::{ListRemindersQuery, ReminderResponse},
    },
    db::handlers::{Reminders, reminders::ReminderFilter},
    errors::{Error, Result},
    reminders::ProcessSummary,
};

/// List reminders
#[utoipa::path(
    get,
    path = "/reminders",
    tag = "reminders",
    params(ListRemindersQuery),
    responses(
        (status = 200, description = "Page of reminders", body = PaginatedResponse<ReminderResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_reminders(
    State(state): State<AppState>,
    Query(query): Query<ListRemindersQuery>,
    _admin: CurrentAdmin,
) -> Result<Json<PaginatedResponse<ReminderResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ReminderFilter {
        status: query.status,
        appointment_id: query.appointment_id,
        ..ReminderFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reminders::new(&mut conn);
    let reminders = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        reminders.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

/// Send due reminders now instead of waiting for the next tick
#[utoipa::path(
    post,
    path = "/reminders/process",
    tag = "reminders",
    responses(
        (status = 200, description = "Batch processed", body = ProcessSummary),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "A batch is already being processed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin), fields(admin_id = admin.id))]
pub async fn process_reminders(State(state): State<AppState>, admin: CurrentAdmin) -> Result<Json<ProcessSummary>> {
    let summary = state.reminders.process_due().await?.ok_or_else(|| Error::Conflict {
        message: "Reminders are already being processed".to_string(),
    })?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{
            handlers::{Appointments, EmailPreferences, Leads, Reminders, Repository, appointments::tests::booking, leads::tests::lead_request},
            models::{notifications::NotificationChannel, reminders::ReminderCreateDBRequest},
        },
        test_utils::{admin_bearer, create_test_app},
    };
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_process_and_list(pool: SqlitePool) {
        let (server, state, _dir) = create_test_app(pool.clone()).await;
        let (header, value) = admin_bearer(&state);

        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("ada@example.com")).await.unwrap();
        EmailPreferences::new(&mut conn).create_for_lead(lead.id, true).await.unwrap();
        let appointment = Appointments::new(&mut conn)
            .create(&booking(lead.id, Utc::now() + Duration::hours(2)))
            .await
            .unwrap();
        Reminders::new(&mut conn)
            .create_for_appointment(
                appointment.id,
                &[ReminderCreateDBRequest {
                    channel: NotificationChannel::Email,
                    scheduled_for: Utc::now() - Duration::minutes(1),
                }],
            )
            .await
            .unwrap();
        drop(conn);

        let response = server
            .post("/admin/api/v1/reminders/process")
            .add_header(header.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let summary: Value = response.json();
        assert_eq!(summary["due"], 1);
        assert_eq!(summary["sent"], 1);

        let response = server
            .get("/admin/api/v1/reminders")
            .add_query_param("status", "sent")
            .add_header(header, value)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["data"][0]["channel"], "email");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requires_admin(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;
        server.get("/admin/api/v1/reminders").await.assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/admin/api/v1/reminders/process")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_process_while_tick_running_conflicts(pool: SqlitePool) {
        let (server, state, _dir) = create_test_app(pool).await;
        let (header, value) = admin_bearer(&state);

        state.reminders.set_processing(true);
        server
            .post("/admin/api/v1/reminders/process")
            .add_header(header.clone(), value.clone())
            .await
            .assert_status(StatusCode::CONFLICT);

        state.reminders.set_processing(false);
        let response = server
            .post("/admin/api/v1/reminders/process")
            .add_header(header, value)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["due"], 0);
    }
}
