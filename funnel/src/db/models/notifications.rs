//! Database models for the outbound notification log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{LeadId, NotificationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
    /// Not sent because of the lead's preferences or missing contact details
    Skipped,
}

/// What a notification was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    BookingConfirmation,
    AppointmentReminder,
    AppointmentCancelled,
    Invoice,
    PaymentReceipt,
    Custom,
}

impl NotificationKind {
    /// Transactional messages go out even to unsubscribed leads.
    pub fn is_transactional(self) -> bool {
        matches!(self, Self::BookingConfirmation | Self::Invoice | Self::PaymentReceipt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::BookingConfirmation => "booking_confirmation",
            Self::AppointmentReminder => "appointment_reminder",
            Self::AppointmentCancelled => "appointment_cancelled",
            Self::Invoice => "invoice",
            Self::PaymentReceipt => "payment_receipt",
            Self::Custom => "custom",
        }
    }
}

/// Database request for logging a dispatch attempt
#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub lead_id: Option<LeadId>,
    pub channel: NotificationChannel,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: Option<String>,
    pub status: NotificationStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
}

/// Database response for a logged notification
#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub lead_id: Option<LeadId>,
    pub channel: NotificationChannel,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: Option<String>,
    pub status: NotificationStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
