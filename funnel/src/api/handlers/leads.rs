//! HTTP handlers for lead capture and lead management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::{
    AppState,
    api::{
        handlers::invoices::pay_url,
        models::{
            appointments::AppointmentResponse,
            auth::CurrentAdmin,
            invoices::InvoiceResponse,
            leads::{
                LeadCaptureResponse, LeadCreate, LeadDetailResponse, LeadProgressResponse, LeadPublicResponse, LeadResponse,
                LeadTokenQuery, LeadUpdate, ListLeadsQuery,
            },
            notifications::NotificationResponse,
            pagination::PaginatedResponse,
        },
    },
    config::Config,
    db::{
        handlers::{
            Appointments, EmailPreferences, Invoices, Leads, Notifications, Repository, VideoViews, appointments::AppointmentFilter,
            invoices::InvoiceFilter, leads::LeadFilter, notifications::NotificationFilter,
        },
        models::leads::{LeadDBResponse, LeadStatus},
    },
    email::EmailContent,
    errors::{Error, Result},
    types::{LeadId, abbrev_token},
};

/// Related rows shown on the lead detail page
const DETAIL_LIMIT: i64 = 100;

/// The lead holding `token`, or 401.
pub(crate) async fn lead_by_token(conn: &mut SqliteConnection, token: &str) -> Result<LeadDBResponse> {
    Leads::new(conn)
        .get_by_access_token(token.trim())
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid or expired access link".to_string()),
        })
}

/// Whether the lead may book a call.
///
/// Booking opens once the lead has finished a video. Without any configured videos it is always
/// open, and leads an admin has already moved past `new` are not sent back to watch.
pub(crate) fn booking_unlocked(config: &Config, lead: &LeadDBResponse, completed_video: bool) -> bool {
    config.videos.is_empty() || completed_video || LeadStatus::New.can_advance_to(lead.status)
}

/// Capture a lead from the landing page form
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "funnel",
    request_body = LeadCreate,
    responses(
        (status = 201, description = "Lead captured", body = LeadCaptureResponse),
        (status = 400, description = "Invalid email or name"),
        (status = 409, description = "A lead with this email already exists"),
    )
)]
#[instrument(skip_all, fields(source = request.source.as_deref()))]
pub async fn capture_lead(State(state): State<AppState>, Json(request): Json<LeadCreate>) -> Result<(StatusCode, Json<LeadCaptureResponse>)> {
    let marketing_consent = request.marketing_consent;
    let db_request = request.into_db_request()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Leads::new(&mut tx).create(&db_request).await?;
    EmailPreferences::new(&mut tx).create_for_lead(lead.id, marketing_consent).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(lead_id = lead.id, token = %abbrev_token(&lead.access_token), "Captured lead");

    let watch_link = state.config.public_link(&format!("watch?token={}", lead.access_token));
    let welcome = EmailContent::Welcome {
        first_name: lead.first_name.clone(),
        watch_link: watch_link.clone(),
    };
    if let Err(e) = state.notifier.email_lead(&lead, welcome).await {
        tracing::warn!(lead_id = lead.id, error = %e, "Failed to record welcome email");
    }

    Ok((
        StatusCode::CREATED,
        Json(LeadCaptureResponse {
            lead: LeadPublicResponse::from(&lead),
            access_token: lead.access_token,
            next_url: watch_link,
        }),
    ))
}

/// A lead's own progress through the funnel
#[utoipa::path(
    get,
    path = "/api/leads/me",
    tag = "funnel",
    params(LeadTokenQuery),
    responses(
        (status = 200, description = "Lead progress", body = LeadProgressResponse),
        (status = 401, description = "Invalid access token"),
    )
)]
#[instrument(skip_all)]
pub async fn get_lead_progress(State(state): State<AppState>, Query(query): Query<LeadTokenQuery>) -> Result<Json<LeadProgressResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut conn, &query.token).await?;

    let views = VideoViews::new(&mut conn).list_for_lead(lead.id).await?;
    let completed_video = views.iter().any(|v| v.completed);
    let upcoming = Appointments::new(&mut conn).next_scheduled_for_lead(lead.id, Utc::now()).await?;

    Ok(Json(LeadProgressResponse {
        booking_unlocked: booking_unlocked(&state.config, &lead, completed_video),
        lead: LeadPublicResponse::from(&lead),
        videos: views.into_iter().map(Into::into).collect(),
        upcoming_appointment: upcoming.map(Into::into),
    }))
}

/// List leads
#[utoipa::path(
    get,
    path = "/leads",
    tag = "leads",
    params(ListLeadsQuery),
    responses(
        (status = 200, description = "Page of leads", body = PaginatedResponse<LeadResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<ListLeadsQuery>,
    _admin: CurrentAdmin,
) -> Result<Json<PaginatedResponse<LeadResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut filter = LeadFilter::new(skip, limit);
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(search) = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        filter = filter.with_search(search);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Leads::new(&mut conn);
    let leads = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        leads.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

async fn get_lead_or_404(conn: &mut SqliteConnection, id: LeadId) -> Result<LeadDBResponse> {
    Leads::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lead".to_string(),
        id: id.to_string(),
    })
}

/// Lead detail with everything attached to it
#[utoipa::path(
    get,
    path = "/leads/{id}",
    tag = "leads",
    params(("id" = i64, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead detail", body = LeadDetailResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn get_lead(State(state): State<AppState>, Path(id): Path<LeadId>, _admin: CurrentAdmin) -> Result<Json<LeadDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = get_lead_or_404(&mut conn, id).await?;

    let preferences = EmailPreferences::new(&mut conn).get_by_lead(id).await?;
    let views = VideoViews::new(&mut conn).list_for_lead(id).await?;

    let appointments = Appointments::new(&mut conn)
        .list(&AppointmentFilter {
            lead_id: Some(id),
            ..AppointmentFilter::new(0, DETAIL_LIMIT)
        })
        .await?;

    let invoices = Invoices::new(&mut conn)
        .list(&InvoiceFilter {
            lead_id: Some(id),
            ..InvoiceFilter::new(0, DETAIL_LIMIT)
        })
        .await?;

    let notifications = Notifications::new(&mut conn)
        .list(&NotificationFilter {
            lead_id: Some(id),
            ..NotificationFilter::new(0, DETAIL_LIMIT)
        })
        .await?;

    Ok(Json(LeadDetailResponse {
        lead: lead.into(),
        preferences: preferences.map(Into::into),
        videos: views.into_iter().map(Into::into).collect(),
        appointments: appointments.into_iter().map(AppointmentResponse::from).collect(),
        invoices: invoices
            .into_iter()
            .map(|invoice| {
                let url = pay_url(&state.config, &invoice);
                InvoiceResponse::new(invoice, url)
            })
            .collect(),
        notifications: notifications.into_iter().map(NotificationResponse::from).collect(),
    }))
}

/// Edit a lead
#[utoipa::path(
    patch,
    path = "/leads/{id}",
    tag = "leads",
    params(("id" = i64, Path, description = "Lead ID")),
    request_body = LeadUpdate,
    responses(
        (status = 200, description = "Updated lead", body = LeadResponse),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin, update), fields(admin_id = admin.id))]
pub async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<LeadId>,
    admin: CurrentAdmin,
    Json(update): Json<LeadUpdate>,
) -> Result<Json<LeadResponse>> {
    let request = update.into_db_request()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Leads::new(&mut conn).update(id, &request).await.map_err(|e| match e {
        crate::db::errors::DbError::NotFound => Error::NotFound {
            resource: "Lead".to_string(),
            id: id.to_string(),
        },
        other => other.into(),
    })?;

    Ok(Json(lead.into()))
}

/// Delete a lead and everything attached to it
#[utoipa::path(
    delete,
    path = "/leads/{id}",
    tag = "leads",
    params(("id" = i64, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin), fields(admin_id = admin.id))]
pub async fn delete_lead(State(state): State<AppState>, Path(id): Path<LeadId>, admin: CurrentAdmin) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Calendar events for upcoming calls are removed first so the invitee is not left with a
    // meeting that no longer exists on our side
    let upcoming = Appointments::new(&mut conn)
        .list(&AppointmentFilter {
            lead_id: Some(id),
            status: Some(crate::db::models::appointments::AppointmentStatus::Scheduled),
            ..AppointmentFilter::new(0, DETAIL_LIMIT)
        })
        .await?;
    drop(conn);

    for appointment in upcoming {
        if let Some(event_id) = appointment.calendar_event_id.as_deref()
            && let Err(e) = state.calendar.cancel_event(event_id).await
        {
            tracing::warn!(appointment_id = appointment.id, error = %e, "Failed to cancel calendar event for deleted lead");
        }
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Leads::new(&mut conn).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Lead".to_string(),
            id: id.to_string(),
        });
    }

    tracing::info!(lead_id = id, "Deleted lead");
    Ok(StatusCode::NO_CONTENT)
}
