//! API request/response models for leads.

use chrono::{DateTime, Utc};
use lettre::Address;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::{
        appointments::AppointmentResponse, invoices::InvoiceResponse, notifications::NotificationResponse, pagination::Pagination,
        preferences::PreferencesResponse, videos::VideoProgressResponse,
    },
    db::models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadStatus, LeadUpdateDBRequest},
    errors::Error,
    sms::normalize_phone,
    types::LeadId,
};

const MAX_NAME_LEN: usize = 100;

/// Trimmed value, or `None` when blank
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lowercased, syntactically valid email address
pub fn normalize_email(raw: &str) -> Result<String, Error> {
    let email = raw.trim().to_lowercase();
    email.parse::<Address>().map_err(|_| Error::BadRequest {
        message: "Please enter a valid email address".to_string(),
    })?;
    Ok(email)
}

fn validate_name(field: &str, value: &str) -> Result<(), Error> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(Error::BadRequest {
            message: format!("{field} must be at most {MAX_NAME_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_phone(phone: Option<String>) -> Result<Option<String>, Error> {
    non_empty(phone)
        .map(|p| {
            normalize_phone(&p).ok_or_else(|| Error::BadRequest {
                message: format!("'{p}' is not a valid phone number"),
            })
        })
        .transpose()
}

/// Lead capture form submission
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeadCreate {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// Landing page or campaign the lead came from
    pub source: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    /// Agreed to receive SMS reminders
    #[serde(default)]
    pub sms_consent: bool,
    /// Agreed to receive marketing email (welcome and follow-ups)
    #[serde(default = "default_true")]
    pub marketing_consent: bool,
}

fn default_true() -> bool {
    true
}

impl LeadCreate {
    /// Validate and normalize the form into a database request.
    pub fn into_db_request(self) -> Result<LeadCreateDBRequest, Error> {
        let email = normalize_email(&self.email)?;

        let first_name = self.first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(Error::BadRequest {
                message: "First name is required".to_string(),
            });
        }
        validate_name("First name", &first_name)?;

        let last_name = non_empty(self.last_name);
        if let Some(last) = &last_name {
            validate_name("Last name", last)?;
        }

        Ok(LeadCreateDBRequest {
            email,
            first_name,
            last_name,
            phone: validate_phone(self.phone)?,
            company: non_empty(self.company),
            source: non_empty(self.source),
            utm_source: non_empty(self.utm_source),
            utm_medium: non_empty(self.utm_medium),
            utm_campaign: non_empty(self.utm_campaign),
            sms_consent: self.sms_consent,
        })
    }
}

/// What a lead sees about themselves
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadPublicResponse {
    pub id: LeadId,
    pub first_name: String,
    pub email: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&LeadDBResponse> for LeadPublicResponse {
    fn from(db: &LeadDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name.clone(),
            email: db.email.clone(),
            status: db.status,
            created_at: db.created_at,
        }
    }
}

/// Response to a successful capture
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadCaptureResponse {
    #[serde(flatten)]
    pub lead: LeadPublicResponse,
    /// Bearer of this token can watch videos and book on the lead's behalf
    pub access_token: String,
    /// Where the landing page should send the lead next
    pub next_url: String,
}

/// Query parameter carrying a lead access token
#[derive(Debug, Deserialize, IntoParams)]
pub struct LeadTokenQuery {
    pub token: String,
}

/// A lead's progress through the funnel
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadProgressResponse {
    pub lead: LeadPublicResponse,
    pub videos: Vec<VideoProgressResponse>,
    /// The lead may book a call
    pub booking_unlocked: bool,
    pub upcoming_appointment: Option<AppointmentResponse>,
}

/// Admin view of a lead
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadResponse {
    pub id: LeadId,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub status: LeadStatus,
    pub sms_consent: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadDBResponse> for LeadResponse {
    fn from(db: LeadDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            phone: db.phone,
            company: db.company,
            source: db.source,
            utm_source: db.utm_source,
            utm_medium: db.utm_medium,
            utm_campaign: db.utm_campaign,
            status: db.status,
            sms_consent: db.sms_consent,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Everything the dashboard knows about one lead
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadDetailResponse {
    pub lead: LeadResponse,
    pub preferences: Option<PreferencesResponse>,
    pub videos: Vec<VideoProgressResponse>,
    pub appointments: Vec<AppointmentResponse>,
    pub invoices: Vec<InvoiceResponse>,
    pub notifications: Vec<NotificationResponse>,
}

/// Query parameters for listing leads
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListLeadsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only leads in this funnel stage
    pub status: Option<LeadStatus>,

    /// Case-insensitive substring match on email, name or company
    pub search: Option<String>,
}

/// Admin edit of a lead. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LeadUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// Admins may set any status, including moving a lead backwards or to `lost`
    pub status: Option<LeadStatus>,
    pub sms_consent: Option<bool>,
    pub notes: Option<String>,
}

impl LeadUpdate {
    pub fn into_db_request(self) -> Result<LeadUpdateDBRequest, Error> {
        let first_name = match self.first_name.map(|n| n.trim().to_string()) {
            Some(name) if name.is_empty() => {
                return Err(Error::BadRequest {
                    message: "First name cannot be empty".to_string(),
                });
            }
            Some(name) => {
                validate_name("First name", &name)?;
                Some(name)
            }
            None => None,
        };

        Ok(LeadUpdateDBRequest {
            first_name,
            last_name: non_empty(self.last_name),
            phone: validate_phone(self.phone)?,
            company: non_empty(self.company),
            status: self.status,
            sms_consent: self.sms_consent,
            notes: self.notes,
        })
    }
}
