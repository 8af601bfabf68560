//! Database models for scheduled appointment reminders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::models::notifications::NotificationChannel;
use crate::types::{AppointmentId, ReminderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One reminder to create for an appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCreateDBRequest {
    pub channel: NotificationChannel,
    pub scheduled_for: DateTime<Utc>,
}

/// Database response for a reminder
#[derive(Debug, Clone, FromRow)]
pub struct ReminderDBResponse {
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
