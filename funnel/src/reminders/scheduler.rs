//! Polling reminder dispatcher.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::{
    calendar::display_time,
    config::Config,
    db::{
        errors::DbError,
        handlers::{Appointments, Leads, Reminders, Repository},
        models::{
            appointments::AppointmentStatus,
            notifications::{NotificationChannel, NotificationKind, NotificationStatus},
            reminders::ReminderDBResponse,
        },
    },
    email::EmailContent,
    errors::Error,
    notifications::Notifier,
};

/// Counts from one scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProcessSummary {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    /// Appointment gone or no longer scheduled
    pub cancelled: usize,
    /// Lead's preferences ruled the channel out
    pub skipped: usize,
}

enum Dispatch {
    Sent,
    Failed(String),
    Cancelled,
    Skipped,
}

/// Clears the processing flag when a tick ends, however it ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodically scans for due reminders and sends them.
///
/// Ticks never overlap: a tick that starts while the previous one is still running returns
/// immediately. Failed sends are recorded and not retried.
pub struct ReminderScheduler {
    pool: SqlitePool,
    notifier: Arc<Notifier>,
    config: Arc<Config>,
    processing: Arc<AtomicBool>,
}

impl ReminderScheduler {
    pub fn new(pool: SqlitePool, notifier: Arc<Notifier>, config: Arc<Config>) -> Self {
        Self {
            pool,
            notifier,
            config,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::Release);
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let poll_interval = self.config.reminders.poll_interval;
        tracing::info!(poll_interval = ?poll_interval, batch_size = self.config.reminders.batch_size, "Starting reminder scheduler");

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Reminder scheduler shutting down");
                    return;
                }
            }

            match self.process_due().await {
                Ok(Some(summary)) if summary.due > 0 => {
                    tracing::info!(
                        due = summary.due,
                        sent = summary.sent,
                        failed = summary.failed,
                        cancelled = summary.cancelled,
                        skipped = summary.skipped,
                        "Processed due reminders"
                    );
                }
                Ok(Some(_)) => {}
                Ok(None) => tracing::debug!("Previous reminder tick still running, skipping"),
                Err(e) => tracing::error!(error = %e, "Reminder tick failed"),
            }
        }
    }

    /// Process one batch of due reminders.
    ///
    /// Returns `None` without doing anything if another tick is in progress.
    pub async fn process_due(&self) -> Result<Option<ProcessSummary>, Error> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let _guard = ProcessingGuard(&self.processing);

        self.process_batch(Utc::now()).await.map(Some)
    }

    async fn process_batch(&self, now: DateTime<Utc>) -> Result<ProcessSummary, Error> {
        let due = {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            Reminders::new(&mut conn)
                .claim_due(now, i64::from(self.config.reminders.batch_size))
                .await?
        };

        let mut summary = ProcessSummary {
            due: due.len(),
            ..Default::default()
        };

        for reminder in due {
            let outcome = match self.dispatch(&reminder).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(reminder_id = reminder.id, error = %e, "Failed to dispatch reminder");
                    Dispatch::Failed(e.to_string())
                }
            };

            if let Err(e) = self.record(&reminder, &outcome, now).await {
                tracing::error!(reminder_id = reminder.id, error = %e, "Failed to record reminder outcome");
            }

            match outcome {
                Dispatch::Sent => summary.sent += 1,
                Dispatch::Failed(_) => summary.failed += 1,
                Dispatch::Cancelled => summary.cancelled += 1,
                Dispatch::Skipped => summary.skipped += 1,
            }
        }

        Ok(summary)
    }

    #[tracing::instrument(skip_all, fields(reminder_id = reminder.id, appointment_id = reminder.appointment_id, channel = reminder.channel.as_str()))]
    async fn dispatch(&self, reminder: &ReminderDBResponse) -> Result<Dispatch, Error> {
        let (appointment, lead) = {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            let Some(appointment) = Appointments::new(&mut conn).get_by_id(reminder.appointment_id).await? else {
                return Ok(Dispatch::Cancelled);
            };
            if appointment.status != AppointmentStatus::Scheduled {
                tracing::debug!(status = appointment.status.as_str(), "Appointment no longer scheduled");
                return Ok(Dispatch::Cancelled);
            }
            let Some(lead) = Leads::new(&mut conn).get_by_id(appointment.lead_id).await? else {
                return Ok(Dispatch::Cancelled);
            };
            (appointment, lead)
        };

        let start_local = display_time(appointment.start_time, &appointment.timezone, self.config.scheduling.timezone);

        let logged = match reminder.channel {
            NotificationChannel::Email => {
                self.notifier
                    .email_lead(
                        &lead,
                        EmailContent::AppointmentReminder {
                            first_name: lead.first_name.clone(),
                            start_local,
                            meeting_link: appointment.meeting_link.clone(),
                        },
                    )
                    .await?
            }
            NotificationChannel::Sms => {
                let mut body = format!("Reminder: your call is on {start_local}.");
                if let Some(link) = &appointment.meeting_link {
                    body.push_str(&format!(" Join: {link}"));
                }
                self.notifier.sms_lead(&lead, NotificationKind::AppointmentReminder, &body).await?
            }
        };

        Ok(match logged.status {
            NotificationStatus::Sent => Dispatch::Sent,
            NotificationStatus::Skipped => Dispatch::Skipped,
            NotificationStatus::Failed => Dispatch::Failed(logged.error.unwrap_or_else(|| "delivery failed".to_string())),
        })
    }

    async fn record(&self, reminder: &ReminderDBResponse, outcome: &Dispatch, now: DateTime<Utc>) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let mut reminders = Reminders::new(&mut conn);

        match outcome {
            Dispatch::Sent => reminders.mark_sent(reminder.id, now).await?,
            Dispatch::Failed(error) => reminders.mark_failed(reminder.id, error).await?,
            Dispatch::Cancelled | Dispatch::Skipped => reminders.mark_cancelled(reminder.id).await?,
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            handlers::{
                EmailPreferences, Notifications, appointments::tests::booking, leads::tests::lead_request, notifications::NotificationFilter,
                reminders::ReminderFilter,
            },
            models::{
                email_preferences::EmailPreferencesUpdateDBRequest,
                reminders::{ReminderCreateDBRequest, ReminderStatus},
            },
        },
        email::EmailService,
        sms::log::LogProvider,
        test_utils::create_test_config,
    };
    use chrono::Duration;

    fn scheduler(pool: &SqlitePool) -> (ReminderScheduler, tempfile::TempDir) {
        let (config, dir) = create_test_config();
        let config = Arc::new(config);
        let email = EmailService::new(&config).unwrap();
        let notifier = Arc::new(Notifier::new(pool.clone(), config.clone(), email, Arc::new(LogProvider)));
        (ReminderScheduler::new(pool.clone(), notifier, config), dir)
    }

    /// A lead with preferences, a booked appointment and one due reminder per channel
    async fn seed(pool: &SqlitePool, email: &str, start: DateTime<Utc>) -> (i64, String) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request(email)).await.unwrap();
        let prefs = EmailPreferences::new(&mut conn).create_for_lead(lead.id, true).await.unwrap();
        let appointment = Appointments::new(&mut conn).create(&booking(lead.id, start)).await.unwrap();

        let due = Utc::now() - Duration::minutes(1);
        Reminders::new(&mut conn)
            .create_for_appointment(
                appointment.id,
                &[
                    ReminderCreateDBRequest {
                        channel: NotificationChannel::Email,
                        scheduled_for: due,
                    },
                    ReminderCreateDBRequest {
                        channel: NotificationChannel::Sms,
                        scheduled_for: due,
                    },
                ],
            )
            .await
            .unwrap();

        (appointment.id, prefs.token)
    }

    async fn reminders_with(pool: &SqlitePool, status: ReminderStatus) -> Vec<ReminderDBResponse> {
        let mut conn = pool.acquire().await.unwrap();
        let mut filter = ReminderFilter::new(0, 100);
        filter.status = Some(status);
        Reminders::new(&mut conn).list(&filter).await.unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_due_reminders_are_sent(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        seed(&pool, "ada@example.com", Utc::now() + Duration::hours(1)).await;

        let summary = scheduler.process_due().await.unwrap().unwrap();
        assert_eq!(summary.due, 2);
        assert_eq!(summary.sent, 2);

        let sent = reminders_with(&pool, ReminderStatus::Sent).await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.attempts == 1 && r.sent_at.is_some()));

        let mut conn = pool.acquire().await.unwrap();
        let logged = Notifications::new(&mut conn).list(&NotificationFilter::new(0, 10)).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|n| n.kind == NotificationKind::AppointmentReminder));
        drop(conn);

        // Nothing left to do on the next tick
        let summary = scheduler.process_due().await.unwrap().unwrap();
        assert_eq!(summary, ProcessSummary::default());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_future_reminders_wait(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("ada@example.com")).await.unwrap();
        let appointment = Appointments::new(&mut conn)
            .create(&booking(lead.id, Utc::now() + Duration::days(2)))
            .await
            .unwrap();
        Reminders::new(&mut conn)
            .create_for_appointment(
                appointment.id,
                &[ReminderCreateDBRequest {
                    channel: NotificationChannel::Email,
                    scheduled_for: Utc::now() + Duration::days(1),
                }],
            )
            .await
            .unwrap();
        drop(conn);

        let summary = scheduler.process_due().await.unwrap().unwrap();
        assert_eq!(summary.due, 0);
        assert_eq!(reminders_with(&pool, ReminderStatus::Pending).await.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancelled_appointment_reminders_are_cancelled(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        let (appointment_id, _) = seed(&pool, "ada@example.com", Utc::now() + Duration::hours(1)).await;

        let mut conn = pool.acquire().await.unwrap();
        Appointments::new(&mut conn)
            .transition(appointment_id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        drop(conn);

        let summary = scheduler.process_due().await.unwrap().unwrap();
        assert_eq!(summary.cancelled, 2);
        assert_eq!(reminders_with(&pool, ReminderStatus::Cancelled).await.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_opted_out_channel_is_skipped(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        let (_, token) = seed(&pool, "ada@example.com", Utc::now() + Duration::hours(1)).await;

        let mut conn = pool.acquire().await.unwrap();
        EmailPreferences::new(&mut conn)
            .update(
                &token,
                &EmailPreferencesUpdateDBRequest {
                    sms_reminders: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        drop(conn);

        let summary = scheduler.process_due().await.unwrap().unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_overlapping_tick_is_skipped(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        seed(&pool, "ada@example.com", Utc::now() + Duration::hours(1)).await;

        scheduler.processing.store(true, Ordering::Release);
        assert!(scheduler.process_due().await.unwrap().is_none());
        assert_eq!(reminders_with(&pool, ReminderStatus::Pending).await.len(), 2);

        scheduler.processing.store(false, Ordering::Release);
        assert!(scheduler.process_due().await.unwrap().is_some());
        assert!(!scheduler.is_processing());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_run_stops_on_shutdown(pool: SqlitePool) {
        let (scheduler, _dir) = scheduler(&pool);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), scheduler.run(shutdown))
            .await
            .expect("scheduler should stop once cancelled");
    }
}
