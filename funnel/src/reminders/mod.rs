//! Appointment reminders.
//!
//! Reminders are planned when an appointment is booked, one row per configured offset and
//! channel, and dispatched later by the polling [`ReminderScheduler`].

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::ReminderRule,
    db::models::{appointments::AppointmentDBResponse, reminders::ReminderCreateDBRequest},
};

mod scheduler;

pub use scheduler::{ProcessSummary, ReminderScheduler};

/// Reminders for a new appointment.
///
/// Offsets whose send time is already in the past are dropped, so a call booked for later today
/// does not get its "a day before" reminder. Duplicate channels within one rule are collapsed.
pub fn plan_reminders(appointment: &AppointmentDBResponse, schedule: &[ReminderRule], now: DateTime<Utc>) -> Vec<ReminderCreateDBRequest> {
    let mut planned = Vec::new();

    for rule in schedule {
        let Ok(before) = Duration::from_std(rule.before) else {
            tracing::warn!(before = ?rule.before, "Reminder offset out of range, skipping");
            continue;
        };
        let scheduled_for = appointment.start_time - before;
        if scheduled_for <= now {
            continue;
        }

        for &channel in &rule.channels {
            let request = ReminderCreateDBRequest { channel, scheduled_for };
            if !planned.contains(&request) {
                planned.push(request);
            }
        }
    }

    planned.sort_by_key(|r| r.scheduled_for);
    planned
}
