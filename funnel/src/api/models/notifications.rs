//! API models for the notification log and manual sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::notifications::{NotificationChannel, NotificationDBResponse, NotificationKind, NotificationStatus},
    errors::Error,
    types::{LeadId, NotificationId},
};

const MAX_SUBJECT_LEN: usize = 200;
/// Longer bodies are split by carriers into several billed segments
const MAX_SMS_LEN: usize = 480;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: NotificationId,
    pub lead_id: Option<LeadId>,
    pub channel: NotificationChannel,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: Option<String>,
    pub status: NotificationStatus,
    pub provider_id: Option<String>,
    /// Failure or skip reason
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            lead_id: db.lead_id,
            channel: db.channel,
            kind: db.kind,
            recipient: db.recipient,
            subject: db.subject,
            status: db.status,
            provider_id: db.provider_id,
            error: db.error,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for listing notifications
#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub lead_id: Option<LeadId>,
    pub channel: Option<NotificationChannel>,
    pub status: Option<NotificationStatus>,
}

/// One-off email from the dashboard to a lead
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    pub lead_id: LeadId,
    pub subject: String,
    /// Plain text; paragraphs separated by blank lines
    pub body: String,
}

impl SendEmailRequest {
    pub fn validate(&self) -> Result<(), Error> {
        let subject = self.subject.trim();
        if subject.is_empty() || subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(Error::BadRequest {
                message: format!("Subject must be between 1 and {MAX_SUBJECT_LEN} characters"),
            });
        }
        if self.body.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Body cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// One-off SMS from the dashboard to a lead
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendSmsRequest {
    pub lead_id: LeadId,
    pub body: String,
}

impl SendSmsRequest {
    pub fn validate(&self) -> Result<(), Error> {
        let len = self.body.trim().chars().count();
        if len == 0 || len > MAX_SMS_LEN {
            return Err(Error::BadRequest {
                message: format!("Message must be between 1 and {MAX_SMS_LEN} characters"),
            });
        }
        Ok(())
    }
}
