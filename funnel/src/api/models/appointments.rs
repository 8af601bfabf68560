//! API request/response models for appointments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::appointments::{AppointmentDBResponse, AppointmentStatus},
    types::{AppointmentId, LeadId},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: AppointmentId,
    pub lead_id: LeadId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: AppointmentStatus,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AppointmentDBResponse> for AppointmentResponse {
    fn from(db: AppointmentDBResponse) -> Self {
        Self {
            id: db.id,
            lead_id: db.lead_id,
            start_time: db.start_time,
            end_time: db.end_time,
            timezone: db.timezone,
            status: db.status,
            meeting_link: db.meeting_link,
            notes: db.notes,
            created_at: db.created_at,
        }
    }
}

/// Booking request from the booking page
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AppointmentCreate {
    /// Lead access token
    pub token: String,
    /// Start of one of the offered slots
    pub start_time: DateTime<Utc>,
    /// Lead's own timezone for emails; defaults to the business timezone
    pub timezone: Option<String>,
    pub notes: Option<String>,
}

/// Cancellation by the lead who booked
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AppointmentCancel {
    pub token: String,
}

/// Query parameters for listing appointments
#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAppointmentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<AppointmentStatus>,

    /// Only appointments that have not started yet, soonest first
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub upcoming: Option<bool>,
}

/// Admin status change after the call (or instead of it)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AppointmentUpdate {
    pub status: AppointmentStatus,
}
