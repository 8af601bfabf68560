//! End-to-end tests that drive the whole router the way the pages and an admin would.

use axum::http::StatusCode;
use chrono::{NaiveTime, TimeZone, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::{
    payment_providers::dummy::SUCCEEDED,
    test_utils::{TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, TEST_VIDEO_ID, capture_lead_json, create_test_app, tomorrow},
};

fn emails_in(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path().join("emails")).map(|d| d.count()).unwrap_or(0)
}

/// A lead goes from the landing page to paying customer
#[sqlx::test]
#[test_log::test]
async fn test_e2e_lead_to_customer(pool: SqlitePool) {
    let (server, _state, dir) = create_test_app(pool).await;

    // Landing page form
    let lead = capture_lead_json(&server, "grace@example.com").await;
    let token = lead["access_token"].as_str().unwrap().to_string();
    assert_eq!(lead["status"], "new");
    assert!(lead["next_url"].as_str().unwrap().contains("/watch?token="));
    assert_eq!(emails_in(&dir), 1);

    // Booking stays locked until the video is watched
    let progress: Value = server.get("/api/leads/me").add_query_param("token", &token).await.json();
    assert_eq!(progress["booking_unlocked"], false);

    let watched: Value = server
        .post(&format!("/api/videos/{TEST_VIDEO_ID}/progress"))
        .json(&json!({ "token": token, "seconds_watched": 590 }))
        .await
        .json();
    assert_eq!(watched["newly_completed"], true);
    assert_eq!(watched["booking_unlocked"], true);

    // Pick the first open slot tomorrow and book it
    let availability: Value = server
        .get("/api/calendar/availability")
        .add_query_param("date", tomorrow().to_string())
        .await
        .json();
    let start = availability["slots"][0]["start"].as_str().unwrap().to_string();
    let expected_start = Utc.from_utc_datetime(&tomorrow().and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
    assert_eq!(start.parse::<chrono::DateTime<Utc>>().unwrap(), expected_start);

    let booking = server
        .post("/api/appointments")
        .json(&json!({ "token": token, "start_time": start, "timezone": "Europe/London" }))
        .await;
    booking.assert_status(StatusCode::CREATED);
    assert_eq!(emails_in(&dir), 2);

    // Admin logs in with the configured account and sees the booked lead
    let login = server
        .post("/admin/api/v1/authentication/login")
        .json(&json!({ "email": TEST_ADMIN_EMAIL, "password": TEST_ADMIN_PASSWORD }))
        .await;
    login.assert_status_ok();
    let bearer = format!("Bearer {}", login.json::<Value>()["token"].as_str().unwrap());

    let lead_id = lead["id"].as_i64().unwrap();
    let detail: Value = server
        .get(&format!("/admin/api/v1/leads/{lead_id}"))
        .add_header("authorization", bearer.clone())
        .await
        .json();
    assert_eq!(detail["lead"]["status"], "booked");
    assert_eq!(detail["appointments"].as_array().unwrap().len(), 1);

    // Invoice after the call, sent straight away
    let invoice: Value = server
        .post("/admin/api/v1/invoices")
        .add_header("authorization", bearer.clone())
        .json(&json!({
            "lead_id": lead_id,
            "description": "Website redesign deposit",
            "amount_cents": 250000,
            "send": true,
        }))
        .await
        .json();
    assert_eq!(invoice["status"], "sent");
    assert_eq!(emails_in(&dir), 3);

    // The payment page gets what it needs to take the payment
    let pay_url = invoice["pay_url"].as_str().unwrap();
    let public_token = pay_url.split("invoice=").nth(1).unwrap();
    let public: Value = server.get(&format!("/api/invoices/{public_token}")).await.json();
    assert_eq!(public["amount_display"], "2500.00 USD");
    assert!(public["client_secret"].is_string());

    // Processor confirms the payment
    server
        .post("/webhooks/payments")
        .json(&json!({ "id": "evt_e2e", "type": SUCCEEDED, "payment_id": invoice["payment_id"] }))
        .await
        .assert_status_ok();

    let progress: Value = server.get("/api/leads/me").add_query_param("token", &token).await.json();
    assert_eq!(progress["lead"]["status"], "customer");
    assert_eq!(emails_in(&dir), 4);

    let dashboard: Value = server
        .get("/admin/api/v1/dashboard")
        .add_header("authorization", bearer)
        .await
        .json();
    assert_eq!(dashboard["total_leads"], 1);
    assert_eq!(dashboard["revenue_cents"], 250000);
    assert_eq!(dashboard["upcoming_appointments"], 1);
}

#[sqlx::test]
#[test_log::test]
async fn test_router_serves_pages_docs_and_health(pool: SqlitePool) {
    let (server, _state, _dir) = create_test_app(pool).await;

    server.get("/healthz").await.assert_text("OK");

    let page = server.get("/book").await;
    page.assert_status_ok();
    assert!(page.text().contains(r#"data-page="book""#));

    server.get("/docs").await.assert_status_ok();
    server.get("/admin/docs").await.assert_status_ok();

    let missing = server.get("/api/does-not-exist").await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert!(missing.json::<Value>()["message"].is_string());
}
