//! Calendar provider abstraction layer
//!
//! This module defines the `CalendarProvider` trait used by booking: reading busy time to compute
//! open slots, and creating or cancelling the event for a booked appointment. Google Calendar is
//! the production provider; the dummy provider keeps events in memory.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::{config::CalendarConfig, errors::Error};

pub mod dummy;
pub mod google;
pub mod slots;

/// Create a calendar provider from configuration
///
/// This is the single point where we convert config into provider instances.
pub fn create_provider(config: CalendarConfig) -> Result<Arc<dyn CalendarProvider>> {
    Ok(match config {
        CalendarConfig::Google {
            client_id,
            client_secret,
            refresh_token,
            calendar_id,
            token_uri,
            api_base,
            timeout,
        } => Arc::new(google::GoogleCalendarProvider::new(
            google::GoogleCredentials {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            },
            calendar_id,
            api_base,
            timeout,
        )?),
        CalendarConfig::Dummy => Arc::new(dummy::DummyCalendarProvider::default()),
    })
}

/// Result type for calendar provider operations
pub type Result<T> = std::result::Result<T, CalendarError>;

/// Errors that can occur while talking to a calendar
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar authorization failed: {0}")]
    Auth(String),

    #[error("Calendar API error: {0}")]
    ProviderApi(String),

    #[error("Calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<CalendarError> for Error {
    fn from(err: CalendarError) -> Self {
        Error::Provider {
            provider: "Calendar",
            message: err.to_string(),
        }
    }
}

/// A block of time the calendar owner is not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Event to create for a booked appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone the event is shown in
    pub timezone: String,
    pub attendee_email: String,
    pub attendee_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: String,
    /// Video call link, when the calendar generated one
    pub meeting_link: Option<String>,
}

/// Format an instant for people, in the appointment's timezone, e.g.
/// "Monday 7 January 2030 at 09:00 EST". Unknown timezone names fall back to `fallback`.
pub fn display_time(at: DateTime<Utc>, timezone: &str, fallback: Tz) -> String {
    let tz = timezone.parse::<Tz>().unwrap_or(fallback);
    at.with_timezone(&tz).format("%A %-d %B %Y at %H:%M %Z").to_string()
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Busy time on the calendar between `start` and `end`
    async fn busy_intervals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>>;

    /// Create the event and invite the attendee
    async fn create_event(&self, request: &EventRequest) -> Result<CreatedEvent>;

    /// Cancel a previously created event. Cancelling an event that no longer exists succeeds.
    async fn cancel_event(&self, event_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_overlaps_is_half_open() {
        let at = |h| Utc.with_ymd_and_hms(2030, 1, 7, h, 0, 0).unwrap();
        let busy = BusyInterval { start: at(10), end: at(11) };

        assert!(busy.overlaps(at(9), at(12)));
        assert!(busy.overlaps(at(10), at(11)));
        assert!(!busy.overlaps(at(9), at(10)));
        assert!(!busy.overlaps(at(11), at(12)));
    }

    #[test]
    fn test_display_time() {
        let at = Utc.with_ymd_and_hms(2030, 1, 7, 14, 0, 0).unwrap();
        assert_eq!(display_time(at, "America/New_York", Tz::UTC), "Monday 7 January 2030 at 09:00 EST");
        assert_eq!(display_time(at, "Not/AZone", Tz::UTC), "Monday 7 January 2030 at 14:00 UTC");
    }

    #[test]
    fn test_errors_are_bad_gateway() {
        let err: Error = CalendarError::Auth("invalid_grant".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
