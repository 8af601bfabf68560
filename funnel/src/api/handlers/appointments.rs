//! Booking handlers.
//!
//! A booking is accepted only for a slot that is currently offered. The row is inserted first so
//! the partial unique index on scheduled start times settles races between two leads, then the
//! calendar event is created. If the calendar call fails the row is removed again and the error
//! is returned, so a lead is never told they are booked without an invite.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use chrono_tz::Tz;
use tracing::instrument;

use crate::{
    AppState,
    api::{
        handlers::{
            calendar::busy_for_day,
            leads::{booking_unlocked, lead_by_token},
        },
        models::{
            appointments::{AppointmentCancel, AppointmentCreate, AppointmentResponse, AppointmentUpdate, ListAppointmentsQuery},
            auth::CurrentAdmin,
            pagination::PaginatedResponse,
        },
    },
    calendar::{EventRequest, display_time, slots::find_slot},
    db::{
        handlers::{Appointments, Leads, Reminders, Repository, VideoViews, appointments::AppointmentFilter},
        models::{
            appointments::{AppointmentCreateDBRequest, AppointmentDBResponse, AppointmentStatus},
            leads::{LeadDBResponse, LeadStatus},
        },
    },
    email::EmailContent,
    errors::{Error, Result},
    reminders::plan_reminders,
    types::AppointmentId,
};

const MAX_NOTES_LEN: usize = 1000;

fn not_found(id: AppointmentId) -> Error {
    Error::NotFound {
        resource: "Appointment".to_string(),
        id: id.to_string(),
    }
}

/// Stop everything that follows from a scheduled call once it no longer is one.
///
/// Pending reminders are always cancelled. For cancellations the calendar event is removed and
/// the lead is told; both are best effort since the status change has already been committed.
async fn after_unscheduled(state: &AppState, appointment: &AppointmentDBResponse, lead: Option<&LeadDBResponse>) -> Result<()> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let cancelled = Reminders::new(&mut conn).cancel_for_appointment(appointment.id).await?;
    drop(conn);
    tracing::debug!(appointment_id = appointment.id, cancelled, "Cancelled pending reminders");

    if appointment.status != AppointmentStatus::Cancelled {
        return Ok(());
    }

    if let Some(event_id) = appointment.calendar_event_id.as_deref()
        && let Err(e) = state.calendar.cancel_event(event_id).await
    {
        tracing::warn!(appointment_id = appointment.id, error = %e, "Failed to cancel calendar event");
    }

    if let Some(lead) = lead {
        let content = EmailContent::AppointmentCancelled {
            first_name: lead.first_name.clone(),
            start_local: display_time(appointment.start_time, &appointment.timezone, state.config.scheduling.timezone),
            book_link: state.config.public_link(&format!("book?token={}", lead.access_token)),
        };
        if let Err(e) = state.notifier.email_lead(lead, content).await {
            tracing::warn!(appointment_id = appointment.id, error = %e, "Failed to record cancellation email");
        }
    }

    Ok(())
}

/// Book a call
#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "funnel",
    request_body = AppointmentCreate,
    responses(
        (status = 201, description = "Call booked", body = AppointmentResponse),
        (status = 400, description = "Not an offered slot or invalid timezone"),
        (status = 401, description = "Invalid access token"),
        (status = 403, description = "Booking not unlocked yet"),
        (status = 409, description = "Slot taken or lead already has a call booked"),
        (status = 502, description = "Calendar unavailable"),
    )
)]
#[instrument(skip(state, request), fields(start_time = %request.start_time))]
pub async fn book_appointment(
    State(state): State<AppState>,
    Json(request): Json<AppointmentCreate>,
) -> Result<(StatusCode, Json<AppointmentResponse>)> {
    let scheduling = &state.config.scheduling;
    let now = Utc::now();

    let timezone = match request.timezone.as_deref().map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(tz) => tz
            .parse::<Tz>()
            .map_err(|_| Error::BadRequest {
                message: format!("Unknown timezone '{tz}'"),
            })?
            .name()
            .to_string(),
        None => scheduling.timezone.name().to_string(),
    };
    let notes = request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(Error::BadRequest {
            message: format!("Notes must be at most {MAX_NOTES_LEN} characters"),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut conn, &request.token).await?;

    let completed_video = VideoViews::new(&mut conn).has_completed_any(lead.id).await?;
    if !booking_unlocked(&state.config, &lead, completed_video) {
        return Err(Error::Forbidden {
            message: "Watch the video before booking a call".to_string(),
        });
    }

    if Appointments::new(&mut conn).next_scheduled_for_lead(lead.id, now).await?.is_some() {
        return Err(Error::Conflict {
            message: "You already have an upcoming call booked".to_string(),
        });
    }

    if find_slot(scheduling, request.start_time, now, &[])?.is_none() {
        return Err(Error::BadRequest {
            message: "That time is not available for booking".to_string(),
        });
    }
    drop(conn);

    let date = request.start_time.with_timezone(&scheduling.timezone).date_naive();
    let busy = busy_for_day(&state, date).await?;
    let Some(slot) = find_slot(scheduling, request.start_time, now, &busy)? else {
        return Err(Error::Conflict {
            message: "This time slot has already been booked".to_string(),
        });
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let appointment = Appointments::new(&mut conn)
        .create(&AppointmentCreateDBRequest {
            lead_id: lead.id,
            start_time: slot.start,
            end_time: slot.end,
            timezone: timezone.clone(),
            notes: notes.clone(),
        })
        .await?;
    drop(conn);

    let event = EventRequest {
        summary: scheduling.meeting_title.replace("{name}", &lead.full_name()),
        description: match &notes {
            Some(notes) => format!("Booked by {} <{}>\n\n{notes}", lead.full_name(), lead.email),
            None => format!("Booked by {} <{}>", lead.full_name(), lead.email),
        },
        start: slot.start,
        end: slot.end,
        timezone: timezone.clone(),
        attendee_email: lead.email.clone(),
        attendee_name: lead.full_name(),
    };
    let created = state.calendar.create_event(&event).await;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let created = match created {
        Ok(created) => created,
        Err(e) => {
            tracing::error!(appointment_id = appointment.id, error = %e, "Calendar event creation failed, releasing slot");
            Appointments::new(&mut conn).delete(appointment.id).await?;
            return Err(e.into());
        }
    };

    let appointment = Appointments::new(&mut conn)
        .set_calendar_event(appointment.id, &created.event_id, created.meeting_link.as_deref())
        .await?;
    drop(conn);

    let planned = plan_reminders(&appointment, &state.config.reminders.schedule, now);
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    Reminders::new(&mut tx).create_for_appointment(appointment.id, &planned).await?;
    Leads::new(&mut tx).advance_status(lead.id, LeadStatus::Booked).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(
        appointment_id = appointment.id,
        lead_id = lead.id,
        reminders = planned.len(),
        "Booked appointment"
    );

    let confirmation = EmailContent::BookingConfirmation {
        first_name: lead.first_name.clone(),
        start_local: display_time(appointment.start_time, &appointment.timezone, scheduling.timezone),
        meeting_link: appointment.meeting_link.clone(),
        manage_link: state.config.public_link(&format!("book?token={}", lead.access_token)),
    };
    if let Err(e) = state.notifier.email_lead(&lead, confirmation).await {
        tracing::warn!(appointment_id = appointment.id, error = %e, "Failed to record booking confirmation");
    }

    Ok((StatusCode::CREATED, Json(appointment.into())))
}

/// Cancel a booked call
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/cancel",
    tag = "funnel",
    params(("id" = i64, Path, description = "Appointment ID")),
    request_body = AppointmentCancel,
    responses(
        (status = 200, description = "Call cancelled", body = AppointmentResponse),
        (status = 401, description = "Invalid access token"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "Appointment is no longer scheduled"),
    )
)]
#[instrument(skip(state, request))]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(request): Json<AppointmentCancel>,
) -> Result<Json<AppointmentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut conn, &request.token).await?;

    // Another lead's appointment is reported as missing
    let existing = Appointments::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|a| a.lead_id == lead.id)
        .ok_or_else(|| not_found(id))?;

    let appointment = Appointments::new(&mut conn)
        .transition(existing.id, AppointmentStatus::Cancelled)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: format!("Appointment is already {}", existing.status.as_str()),
        })?;
    drop(conn);

    tracing::info!(appointment_id = id, lead_id = lead.id, "Lead cancelled appointment");
    after_unscheduled(&state, &appointment, Some(&lead)).await?;

    Ok(Json(appointment.into()))
}

/// List appointments
#[utoipa::path(
    get,
    path = "/appointments",
    tag = "appointments",
    params(ListAppointmentsQuery),
    responses(
        (status = 200, description = "Page of appointments", body = PaginatedResponse<AppointmentResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<ListAppointmentsQuery>,
    _admin: CurrentAdmin,
) -> Result<Json<PaginatedResponse<AppointmentResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = AppointmentFilter {
        status: query.status,
        starts_after: query.upcoming.unwrap_or(false).then(Utc::now),
        ..AppointmentFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Appointments::new(&mut conn);
    let appointments = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        appointments.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

/// Change an appointment's status
///
/// Only scheduled appointments can change status. Leaving `scheduled` stops its reminders;
/// cancelling also removes the calendar event and emails the lead.
#[utoipa::path(
    patch,
    path = "/appointments/{id}",
    tag = "appointments",
    params(("id" = i64, Path, description = "Appointment ID")),
    request_body = AppointmentUpdate,
    responses(
        (status = 200, description = "Updated appointment", body = AppointmentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "Appointment is no longer scheduled"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin, update), fields(admin_id = admin.id, status = update.status.as_str()))]
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    admin: CurrentAdmin,
    Json(update): Json<AppointmentUpdate>,
) -> Result<Json<AppointmentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = Appointments::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;

    let appointment = Appointments::new(&mut conn)
        .transition(id, update.status)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: format!(
                "Cannot change appointment from {} to {}",
                existing.status.as_str(),
                update.status.as_str()
            ),
        })?;
    let lead = Leads::new(&mut conn).get_by_id(appointment.lead_id).await?;
    drop(conn);

    after_unscheduled(&state, &appointment, lead.as_ref()).await?;

    Ok(Json(appointment.into()))
}
