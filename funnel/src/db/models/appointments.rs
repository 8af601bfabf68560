//! Database models for booked appointments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{AppointmentId, LeadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        }
    }

    /// Only scheduled appointments can change status.
    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        self == Self::Scheduled && target != Self::Scheduled
    }
}

/// Database request for booking a slot
#[derive(Debug, Clone)]
pub struct AppointmentCreateDBRequest {
    pub lead_id: LeadId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub notes: Option<String>,
}

/// Database response for an appointment
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentDBResponse {
    pub id: AppointmentId,
    pub lead_id: LeadId,
    pub calendar_event_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: AppointmentStatus,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_scheduled_appointments_transition() {
        assert!(AppointmentStatus::Scheduled.can_transition_to(AppointmentStatus::Cancelled));
        assert!(AppointmentStatus::Scheduled.can_transition_to(AppointmentStatus::NoShow));
        assert!(!AppointmentStatus::Scheduled.can_transition_to(AppointmentStatus::Scheduled));
        assert!(!AppointmentStatus::Cancelled.can_transition_to(AppointmentStatus::Completed));
        assert!(!AppointmentStatus::Completed.can_transition_to(AppointmentStatus::Scheduled));
    }
}
