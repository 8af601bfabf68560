//! Database models for per-lead email and SMS preferences.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::LeadId;

/// Database response for a lead's preferences
#[derive(Debug, Clone, FromRow)]
pub struct EmailPreferencesDBResponse {
    pub id: i64,
    pub lead_id: LeadId,
    pub token: String,
    pub marketing_emails: bool,
    pub reminder_emails: bool,
    pub sms_reminders: bool,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EmailPreferencesDBResponse {
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed_at.is_some()
    }
}

/// Database request for changing preferences. `None` leaves the flag untouched.
#[derive(Debug, Clone, Default)]
pub struct EmailPreferencesUpdateDBRequest {
    pub marketing_emails: Option<bool>,
    pub reminder_emails: Option<bool>,
    pub sms_reminders: Option<bool>,
}
