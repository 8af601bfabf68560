//! API models for appointment reminders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::{
        notifications::NotificationChannel,
        reminders::{ReminderDBResponse, ReminderStatus},
    },
    types::{AppointmentId, ReminderId},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReminderResponse {
    pub id: ReminderId,
    pub appointment_id: AppointmentId,
    pub channel: NotificationChannel,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub attempts: i64,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ReminderDBResponse> for ReminderResponse {
    fn from(db: ReminderDBResponse) -> Self {
        Self {
            id: db.id,
            appointment_id: db.appointment_id,
            channel: db.channel,
            scheduled_for: db.scheduled_for,
            status: db.status,
            attempts: db.attempts,
            sent_at: db.sent_at,
            last_error: db.last_error,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for listing reminders
#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListRemindersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<ReminderStatus>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub appointment_id: Option<AppointmentId>,
}
