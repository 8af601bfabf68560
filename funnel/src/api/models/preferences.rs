//! API models for a lead's email and SMS preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::email_preferences::{EmailPreferencesDBResponse, EmailPreferencesUpdateDBRequest};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub marketing_emails: bool,
    pub reminder_emails: bool,
    pub sms_reminders: bool,
    /// Set once the lead unsubscribes; only transactional email is sent afterwards
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailPreferencesDBResponse> for PreferencesResponse {
    fn from(db: EmailPreferencesDBResponse) -> Self {
        Self {
            marketing_emails: db.marketing_emails,
            reminder_emails: db.reminder_emails,
            sms_reminders: db.sms_reminders,
            unsubscribed_at: db.unsubscribed_at,
            updated_at: db.updated_at,
        }
    }
}

/// Preference changes. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PreferencesUpdate {
    pub marketing_emails: Option<bool>,
    pub reminder_emails: Option<bool>,
    pub sms_reminders: Option<bool>,
}

impl From<PreferencesUpdate> for EmailPreferencesUpdateDBRequest {
    fn from(update: PreferencesUpdate) -> Self {
        Self {
            marketing_emails: update.marketing_emails,
            reminder_emails: update.reminder_emails,
            sms_reminders: update.sms_reminders,
        }
    }
}
