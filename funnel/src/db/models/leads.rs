//! Database models for leads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::LeadId;

/// Where a lead is in the funnel.
///
/// `New` through `Customer` form an ordered ladder that funnel events climb. `Lost` sits outside
/// the ladder and is only ever set by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    VideoWatched,
    Booked,
    Invoiced,
    Customer,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::New,
        LeadStatus::VideoWatched,
        LeadStatus::Booked,
        LeadStatus::Invoiced,
        LeadStatus::Customer,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::VideoWatched => "video_watched",
            Self::Booked => "booked",
            Self::Invoiced => "invoiced",
            Self::Customer => "customer",
            Self::Lost => "lost",
        }
    }

    fn rank(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::VideoWatched => Some(1),
            Self::Booked => Some(2),
            Self::Invoiced => Some(3),
            Self::Customer => Some(4),
            Self::Lost => None,
        }
    }

    /// Whether a funnel event may move a lead from `self` to `target`.
    ///
    /// Only strictly forward moves along the ladder are allowed; `Lost` never moves and can never
    /// be reached this way.
    pub fn can_advance_to(self, target: LeadStatus) -> bool {
        match (self.rank(), target.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// Database request for capturing a new lead
#[derive(Debug, Clone, Default)]
pub struct LeadCreateDBRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub sms_consent: bool,
}

/// Database request for an admin edit of a lead. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct LeadUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<LeadStatus>,
    pub sms_consent: Option<bool>,
    pub notes: Option<String>,
}

/// Database response for a lead
#[derive(Debug, Clone, FromRow)]
pub struct LeadDBResponse {
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
    pub access_token: String,
    pub sms_consent: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadDBResponse {
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}
