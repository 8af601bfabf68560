//! Bookable slot computation.
//!
//! Slots are laid out in the business timezone from `day_start` in steps of `slot_length`, the
//! last one ending no later than `day_end`. A slot is offered when its day is a working day within
//! the booking horizon, it starts at least `min_notice` from now, and it overlaps no busy time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{calendar::BusyInterval, config::SchedulingConfig, errors::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn slot_length(config: &SchedulingConfig) -> Result<Duration, Error> {
    Duration::from_std(config.slot_length).map_err(|e| Error::Internal {
        operation: format!("convert slot length: {e}"),
    })
}

/// UTC bounds of `date`'s business hours, or `None` if the day cannot be booked at all.
pub fn business_day_bounds(config: &SchedulingConfig, date: NaiveDate) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, Error> {
    if !config.working_days.contains(&date.weekday()) {
        return Ok(None);
    }

    let (day_start, day_end) = config.business_hours()?;
    let tz = config.timezone;
    let start = tz.from_local_datetime(&date.and_time(day_start)).earliest();
    let end = tz.from_local_datetime(&date.and_time(day_end)).latest();

    Ok(match (start, end) {
        (Some(start), Some(end)) => Some((start.with_timezone(&Utc), end.with_timezone(&Utc))),
        _ => None,
    })
}

/// Candidate slots for `date` before notice, horizon and busy time are applied.
fn candidate_slots(config: &SchedulingConfig, date: NaiveDate) -> Result<Vec<Slot>, Error> {
    if !config.working_days.contains(&date.weekday()) {
        return Ok(Vec::new());
    }

    let (day_start, day_end) = config.business_hours()?;
    let step = slot_length(config)?;
    let tz = config.timezone;

    let mut slots = Vec::new();
    let mut cursor: NaiveDateTime = date.and_time(day_start);
    let last_end = date.and_time(day_end);

    while cursor + step <= last_end {
        // Local times that fall in a DST gap are skipped
        if let Some(start) = tz.from_local_datetime(&cursor).earliest() {
            let start = start.with_timezone(&Utc);
            slots.push(Slot { start, end: start + step });
        }
        cursor += step;
    }

    Ok(slots)
}

/// Open slots on `date` (a calendar date in the business timezone).
pub fn available_slots(
    config: &SchedulingConfig,
    date: NaiveDate,
    now: DateTime<Utc>,
    busy: &[BusyInterval],
) -> Result<Vec<Slot>, Error> {
    let today = now.with_timezone(&config.timezone).date_naive();
    let horizon = today + Duration::days(i64::from(config.booking_horizon_days));
    if date < today || date > horizon {
        return Ok(Vec::new());
    }

    let earliest_start = now
        + Duration::from_std(config.min_notice).map_err(|e| Error::Internal {
            operation: format!("convert min notice: {e}"),
        })?;

    Ok(candidate_slots(config, date)?
        .into_iter()
        .filter(|slot| slot.start >= earliest_start)
        .filter(|slot| !busy.iter().any(|b| b.overlaps(slot.start, slot.end)))
        .collect())
}

/// The offered slot starting exactly at `start`, if any.
pub fn find_slot(config: &SchedulingConfig, start: DateTime<Utc>, now: DateTime<Utc>, busy: &[BusyInterval]) -> Result<Option<Slot>, Error> {
    let date = start.with_timezone(&config.timezone).date_naive();
    Ok(available_slots(config, date, now, busy)?.into_iter().find(|slot| slot.start == start))
}
