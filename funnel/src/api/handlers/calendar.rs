//! Booking availability.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::instrument;

use crate::{
    AppState,
    api::models::calendar::{AvailabilityQuery, AvailabilityResponse},
    calendar::{
        BusyInterval,
        slots::{Slot, available_slots, business_day_bounds},
    },
    db::handlers::Appointments,
    errors::{Error, Result},
};

/// Busy time on `date`: the calendar owner's own events plus calls already booked here.
///
/// Booked calls are included even though they normally also appear on the calendar, since the
/// event may not have been created yet or may have been edited by hand.
pub(crate) async fn busy_for_day(state: &AppState, date: NaiveDate) -> Result<Vec<BusyInterval>> {
    let Some((from, to)) = business_day_bounds(&state.config.scheduling, date)? else {
        return Ok(Vec::new());
    };

    // No pooled connection is held while the calendar provider is called
    let mut busy = state.calendar.busy_intervals(from, to).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    busy.extend(
        Appointments::new(&mut conn)
            .scheduled_between(from, to)
            .await?
            .into_iter()
            .map(|(start, end)| BusyInterval { start, end }),
    );
    Ok(busy)
}

/// Open slots on `date` as seen at `now`.
pub(crate) async fn open_slots(state: &AppState, date: NaiveDate, now: DateTime<Utc>) -> Result<Vec<Slot>> {
    let scheduling = &state.config.scheduling;

    // Nothing to offer before busy time is even considered
    if available_slots(scheduling, date, now, &[])?.is_empty() {
        return Ok(Vec::new());
    }

    let busy = busy_for_day(state, date).await?;
    available_slots(scheduling, date, now, &busy)
}

/// Open booking slots for a day
#[utoipa::path(
    get,
    path = "/api/calendar/availability",
    tag = "funnel",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Open slots", body = AvailabilityResponse),
        (status = 400, description = "Invalid date"),
        (status = 502, description = "Calendar unavailable"),
    )
)]
#[instrument(skip(state), fields(date = %query.date))]
pub async fn get_availability(State(state): State<AppState>, Query(query): Query<AvailabilityQuery>) -> Result<Json<AvailabilityResponse>> {
    let slots = open_slots(&state, query.date, Utc::now()).await?;

    Ok(Json(AvailabilityResponse {
        date: query.date,
        timezone: state.config.scheduling.timezone.name().to_string(),
        slots,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::handlers::{Appointments, Leads, Repository, appointments::tests::booking, leads::tests::lead_request},
        test_utils::{create_test_app, tomorrow},
    };
    use axum::http::StatusCode;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_availability_lists_business_hours(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;
        let date = tomorrow();

        let response = server.get("/api/calendar/availability").add_query_param("date", date.to_string()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["timezone"], "UTC");
        // 09:00 to 17:00 in 30 minute slots
        assert_eq!(body["slots"].as_array().unwrap().len(), 16);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_booked_slots_are_hidden(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool.clone()).await;
        let date = tomorrow();

        let start = date.and_hms_opt(10, 0, 0).unwrap().and_utc();
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("ada@example.com")).await.unwrap();
        Appointments::new(&mut conn).create(&booking(lead.id, start)).await.unwrap();
        drop(conn);

        let response = server.get("/api/calendar/availability").add_query_param("date", date.to_string()).await;
        let body: Value = response.json();
        let starts: Vec<DateTime<Utc>> = body["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["start"].as_str().unwrap().parse().unwrap())
            .collect();
        assert_eq!(starts.len(), 15);
        assert!(!starts.contains(&start));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_past_and_malformed_dates(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;

        let response = server.get("/api/calendar/availability").add_query_param("date", "2001-01-01").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["slots"].as_array().unwrap().is_empty());

        server
            .get("/api/calendar/availability")
            .add_query_param("date", "next tuesday")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
