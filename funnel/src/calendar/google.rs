//! Google Calendar provider
//!
//! Talks to the Calendar v3 REST API directly with `reqwest`. Access tokens are minted from a
//! long-lived OAuth refresh token and cached until shortly before they expire; refreshes are
//! serialized by the cache mutex.

use std::{collections::HashMap, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use url::Url;

use crate::calendar::{BusyInterval, CalendarError, CalendarProvider, CreatedEvent, EventRequest, Result};

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth client and refresh token for the calendar owner
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    credentials: GoogleCredentials,
    calendar_id: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<FreeBusyPeriod>,
    #[serde(default)]
    errors: Vec<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyError {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    hangout_link: Option<String>,
}

impl GoogleCalendarProvider {
    pub fn new(credentials: GoogleCredentials, calendar_id: String, api_base: String, timeout: StdDuration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            calendar_id,
            api_base,
            token: Mutex::new(None),
        })
    }

    /// A valid access token, refreshing if the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) {
                return Ok(token.access_token.clone());
            }
        }

        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.client.post(&self.credentials.token_uri).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Google token refresh failed: {}", body);
            return Err(CalendarError::Auth(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600));
        tracing::debug!(%expires_at, "Refreshed Google access token");

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });

        Ok(token.access_token)
    }

    /// `{api_base}/calendar/v3/{segments...}` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| CalendarError::ProviderApi(format!("Invalid api_base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::ProviderApi("api_base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["calendar", "v3"])
            .extend(segments);
        Ok(url)
    }

    async fn error_from(response: reqwest::Response) -> CalendarError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(%status, "Google Calendar request failed: {}", body);
        CalendarError::ProviderApi(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn busy_intervals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.url(&["freeBusy"])?)
            .bearer_auth(token)
            .json(&json!({
                "timeMin": start.to_rfc3339(),
                "timeMax": end.to_rfc3339(),
                "items": [{ "id": self.calendar_id }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: FreeBusyResponse = response.json().await?;

        let mut busy = Vec::new();
        for (calendar, entry) in body.calendars {
            if let Some(error) = entry.errors.first() {
                return Err(CalendarError::ProviderApi(format!("freeBusy for {calendar}: {}", error.reason)));
            }
            busy.extend(entry.busy.into_iter().map(|p| BusyInterval { start: p.start, end: p.end }));
        }
        busy.sort_by_key(|b| b.start);

        Ok(busy)
    }

    async fn create_event(&self, request: &EventRequest) -> Result<CreatedEvent> {
        let token = self.access_token().await?;

        let mut url = self.url(&["calendars", &self.calendar_id, "events"])?;
        url.query_pairs_mut()
            .append_pair("sendUpdates", "all")
            .append_pair("conferenceDataVersion", "1");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "summary": request.summary,
                "description": request.description,
                "start": { "dateTime": request.start.to_rfc3339(), "timeZone": request.timezone },
                "end": { "dateTime": request.end.to_rfc3339(), "timeZone": request.timezone },
                "attendees": [{ "email": request.attendee_email, "displayName": request.attendee_name }],
                "conferenceData": {
                    "createRequest": {
                        "requestId": uuid::Uuid::new_v4().to_string(),
                        "conferenceSolutionKey": { "type": "hangoutsMeet" },
                    }
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let event: InsertedEvent = response.json().await?;
        tracing::info!(event_id = %event.id, "Created Google Calendar event");

        Ok(CreatedEvent {
            event_id: event.id,
            meeting_link: event.hangout_link,
        })
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        let token = self.access_token().await?;

        let mut url = self.url(&["calendars", &self.calendar_id, "events", event_id])?;
        url.query_pairs_mut().append_pair("sendUpdates", "all");

        let response = self.client.delete(url).bearer_auth(token).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // Already deleted
            reqwest::StatusCode::GONE | reqwest::StatusCode::NOT_FOUND => {
                tracing::debug!(event_id = %event_id, "Google Calendar event already gone");
                Ok(())
            }
            _ => Err(Self::error_from(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_with_timeout(server: &MockServer, timeout: StdDuration) -> GoogleCalendarProvider {
        GoogleCalendarProvider::new(
            GoogleCredentials {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "1//refresh".to_string(),
                token_uri: format!("{}/token", server.uri()),
            },
            "sales@example.com".to_string(),
            server.uri(),
            timeout,
        )
        .unwrap()
    }

    fn provider(server: &MockServer) -> GoogleCalendarProvider {
        provider_with_timeout(server, StdDuration::from_secs(10))
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.test",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_busy_intervals_and_token_caching() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/calendar/v3/freeBusy"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "calendar#freeBusy",
                "calendars": {
                    "sales@example.com": {
                        "busy": [
                            { "start": "2030-01-07T14:00:00Z", "end": "2030-01-07T15:00:00Z" },
                            { "start": "2030-01-07T10:00:00Z", "end": "2030-01-07T10:30:00Z" }
                        ]
                    }
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let calendar = provider(&server);
        let start = Utc.with_ymd_and_hms(2030, 1, 7, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);

        let busy = calendar.busy_intervals(start, end).await.unwrap();
        assert_eq!(busy.len(), 2);
        assert_eq!(busy[0].start, Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap());

        // Second call reuses the cached access token
        calendar.busy_intervals(start, end).await.unwrap();
    }

    #[tokio::test]
    async fn test_free_busy_calendar_error() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/calendar/v3/freeBusy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "calendars": { "sales@example.com": { "errors": [{ "domain": "global", "reason": "notFound" }] } }
            })))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2030, 1, 7, 0, 0, 0).unwrap();
        let err = provider(&server).busy_intervals(start, start + Duration::days(1)).await.unwrap_err();
        assert!(matches!(err, CalendarError::ProviderApi(ref m) if m.contains("notFound")));
    }

    #[tokio::test]
    async fn test_create_event() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/sales@example.com/events"))
            .and(query_param("sendUpdates", "all"))
            .and(query_param("conferenceDataVersion", "1"))
            .and(body_string_contains("ada@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt123",
                "status": "confirmed",
                "hangoutLink": "https://meet.google.com/abc-defg-hij"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap();
        let created = provider(&server)
            .create_event(&EventRequest {
                summary: "Discovery call with Ada".to_string(),
                description: "Booked through the funnel".to_string(),
                start,
                end: start + Duration::minutes(30),
                timezone: "Europe/London".to_string(),
                attendee_email: "ada@example.com".to_string(),
                attendee_name: "Ada Lovelace".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(created.event_id, "evt123");
        assert_eq!(created.meeting_link.as_deref(), Some("https://meet.google.com/abc-defg-hij"));
    }

    #[tokio::test]
    async fn test_cancel_event_treats_gone_as_success() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/sales@example.com/events/evt123"))
            .respond_with(ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/sales@example.com/events/evt500"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let calendar = provider(&server);
        calendar.cancel_event("evt123").await.unwrap();
        assert!(matches!(calendar.cancel_event("evt500").await, Err(CalendarError::ProviderApi(_))));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2030, 1, 7, 0, 0, 0).unwrap();
        let err = provider(&server).busy_intervals(start, start + Duration::days(1)).await.unwrap_err();
        assert!(matches!(err, CalendarError::Auth(ref m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_stalled_token_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "ya29.slow", "expires_in": 3599 }))
                    .set_delay(StdDuration::from_secs(60)),
            )
            .mount(&server)
            .await;

        let provider = provider_with_timeout(&server, StdDuration::from_millis(200));
        let day = Utc.with_ymd_and_hms(2030, 3, 4, 0, 0, 0).unwrap();
        let result = tokio::time::timeout(StdDuration::from_secs(5), provider.busy_intervals(day, day + Duration::days(1)))
            .await
            .expect("busy_intervals should give up at the client timeout");

        match result {
            Err(CalendarError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout error, got {other:?}"),
        }
    }
}
