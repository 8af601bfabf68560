//! In-memory calendar for development and tests.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calendar::{BusyInterval, CalendarProvider, CreatedEvent, EventRequest, Result};

/// Calendar with no busy time of its own. Created events are kept in memory and count as busy.
#[derive(Default)]
pub struct DummyCalendarProvider {
    busy: Mutex<Vec<BusyInterval>>,
    events: Mutex<HashMap<String, EventRequest>>,
}

impl DummyCalendarProvider {
    /// Block out time, as if the owner had another meeting
    pub fn add_busy(&self, interval: BusyInterval) {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner).push(interval);
    }

    /// Events currently on the calendar
    pub fn events(&self) -> HashMap<String, EventRequest> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CalendarProvider for DummyCalendarProvider {
    async fn busy_intervals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>> {
        let mut busy: Vec<BusyInterval> = self
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|b| b.overlaps(start, end))
            .copied()
            .collect();

        busy.extend(
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .map(|e| BusyInterval { start: e.start, end: e.end })
                .filter(|b| b.overlaps(start, end)),
        );

        busy.sort_by_key(|b| b.start);
        Ok(busy)
    }

    async fn create_event(&self, request: &EventRequest) -> Result<CreatedEvent> {
        let event_id = format!("dummy_evt_{}", uuid::Uuid::new_v4().simple());
        let meeting_link = format!("https://meet.example.com/{}", &event_id[10..20]);

        tracing::info!(event_id = %event_id, start = %request.start, "Dummy calendar created event");

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id.clone(), request.clone());

        Ok(CreatedEvent {
            event_id,
            meeting_link: Some(meeting_link),
        })
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        let removed = self.events.lock().unwrap_or_else(PoisonError::into_inner).remove(event_id);
        tracing::info!(event_id = %event_id, existed = removed.is_some(), "Dummy calendar cancelled event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(start: DateTime<Utc>) -> EventRequest {
        EventRequest {
            summary: "Discovery call".to_string(),
            description: String::new(),
            start,
            end: start + Duration::minutes(30),
            timezone: "UTC".to_string(),
            attendee_email: "ada@example.com".to_string(),
            attendee_name: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_created_events_are_busy_until_cancelled() {
        let calendar = DummyCalendarProvider::default();
        let start = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap();
        let day = (start - Duration::hours(10), start + Duration::hours(14));

        assert!(calendar.busy_intervals(day.0, day.1).await.unwrap().is_empty());

        let event = calendar.create_event(&request(start)).await.unwrap();
        assert!(event.meeting_link.is_some());

        let busy = calendar.busy_intervals(day.0, day.1).await.unwrap();
        assert_eq!(busy, vec![BusyInterval { start, end: start + Duration::minutes(30) }]);

        calendar.cancel_event(&event.event_id).await.unwrap();
        assert!(calendar.busy_intervals(day.0, day.1).await.unwrap().is_empty());

        // Cancelling twice is fine
        calendar.cancel_event(&event.event_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_busy_time_is_filtered_to_window() {
        let calendar = DummyCalendarProvider::default();
        let at = |d, h| Utc.with_ymd_and_hms(2030, 1, d, h, 0, 0).unwrap();
        calendar.add_busy(BusyInterval { start: at(7, 12), end: at(7, 13) });
        calendar.add_busy(BusyInterval { start: at(8, 12), end: at(8, 13) });

        let busy = calendar.busy_intervals(at(7, 0), at(7, 23)).await.unwrap();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].start, at(7, 12));
    }
}
