//! Test utilities for integration testing.

use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::{
    AppState, Application,
    api::models::auth::CurrentAdmin,
    auth::session,
    config::{
        CalendarConfig, Config, CorsConfig, DummyConfig, EmailConfig, EmailTransportConfig, PaymentConfig, ReminderConfig, SchedulingConfig,
        SmsConfig, VideoConfig,
    },
};

pub const TEST_ADMIN_EMAIL: &str = "admin@funnel.test";
pub const TEST_ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const TEST_VIDEO_ID: &str = "intro";

/// Config for tests: dummy adapters, emails written under the returned temp dir, bookable every
/// day from 09:00 to 17:00 UTC with no minimum notice, and the reminder loop switched off.
pub fn create_test_config() -> (Config, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let emails = dir.path().join("emails");

    let mut config = Config {
        public_url: "https://funnel.test".to_string(),
        business_name: "Test Funnel".to_string(),
        admin_email: TEST_ADMIN_EMAIL.to_string(),
        admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
        secret_key: Some("test-secret-key-for-session-tokens".to_string()),
        cors: CorsConfig {
            allowed_origins: vec!["https://funnel.test".to_string()],
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: emails.to_string_lossy().into_owned(),
            },
            from_email: "hello@funnel.test".to_string(),
            from_name: "Test Funnel".to_string(),
            reply_to: None,
        },
        sms: SmsConfig::Log,
        calendar: CalendarConfig::Dummy,
        payment: Some(PaymentConfig::Dummy(DummyConfig { webhook_secret: None })),
        scheduling: SchedulingConfig {
            timezone: Tz::UTC,
            day_start: "09:00".to_string(),
            day_end: "17:00".to_string(),
            slot_length: Duration::from_secs(30 * 60),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            min_notice: Duration::ZERO,
            booking_horizon_days: 14,
            ..Default::default()
        },
        reminders: ReminderConfig {
            enabled: false,
            ..Default::default()
        },
        videos: vec![VideoConfig {
            id: TEST_VIDEO_ID.to_string(),
            title: "How we work".to_string(),
            description: Some("Ten minutes on what a project with us looks like".to_string()),
            url: "https://videos.funnel.test/intro.mp4".to_string(),
            duration_seconds: 600,
            completion_threshold: 0.9,
        }],
        ..Default::default()
    };

    config.auth.session.cookie_secure = false;

    (config, dir)
}

/// App state on `pool` without starting a server or touching the admin table
pub fn create_test_app_state(pool: SqlitePool) -> (AppState, TempDir) {
    let (config, dir) = create_test_config();
    let state = AppState::from_config(pool, Arc::new(config)).expect("Failed to build app state");
    (state, dir)
}

pub async fn create_test_app(pool: SqlitePool) -> (TestServer, AppState, TempDir) {
    let (config, dir) = create_test_config();
    let (server, state) = create_test_app_with_config(pool, config).await;
    (server, state, dir)
}

/// Test server for a caller-supplied config. The caller keeps any temp dir the config points at.
pub async fn create_test_app_with_config(pool: SqlitePool, config: Config) -> (TestServer, AppState) {
    let app = Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");
    let state = app.state().clone();
    let (server, _bg_services) = app.into_test_server();
    (server, state)
}

/// `(header name, header value)` for an admin bearer token
pub fn admin_bearer(state: &AppState) -> (String, String) {
    let admin = CurrentAdmin {
        id: 1,
        email: TEST_ADMIN_EMAIL.to_string(),
    };
    let token = session::create_session_token(&admin, &state.config).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}

/// Capture a lead through the public endpoint and return the response body
pub async fn capture_lead_json(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/leads")
        .json(&json!({
            "email": email,
            "first_name": "Ada",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

/// Tomorrow's date in UTC, the test scheduling timezone
pub fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(1)
}
