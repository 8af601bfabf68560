//! Database repository for lead email/SMS preferences.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::{DbError, Result},
    models::email_preferences::{EmailPreferencesDBResponse, EmailPreferencesUpdateDBRequest},
};
use crate::types::{LeadId, generate_token};

pub struct EmailPreferences<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> EmailPreferences<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Create the preferences row for a freshly captured lead.
    ///
    /// Reminder emails and SMS reminders start enabled; marketing follows the consent given on the
    /// capture form.
    #[instrument(skip(self), err)]
    pub async fn create_for_lead(&mut self, lead_id: LeadId, marketing_emails: bool) -> Result<EmailPreferencesDBResponse> {
        let prefs = sqlx::query_as::<_, EmailPreferencesDBResponse>(
            r#"
            INSERT INTO email_preferences (lead_id, token, marketing_emails, reminder_emails, sms_reminders, updated_at)
            VALUES (?, ?, ?, 1, 1, ?)
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(generate_token())
        .bind(marketing_emails)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(prefs)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_lead(&mut self, lead_id: LeadId) -> Result<Option<EmailPreferencesDBResponse>> {
        let prefs = sqlx::query_as::<_, EmailPreferencesDBResponse>("SELECT * FROM email_preferences WHERE lead_id = ?")
            .bind(lead_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(prefs)
    }

    #[instrument(skip_all, err)]
    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<EmailPreferencesDBResponse>> {
        let prefs = sqlx::query_as::<_, EmailPreferencesDBResponse>("SELECT * FROM email_preferences WHERE token = ?")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(prefs)
    }

    /// Change individual flags. Turning any flag on clears a previous unsubscribe.
    #[instrument(skip(self, token, request), err)]
    pub async fn update(&mut self, token: &str, request: &EmailPreferencesUpdateDBRequest) -> Result<EmailPreferencesDBResponse> {
        let opted_in = [request.marketing_emails, request.reminder_emails, request.sms_reminders].contains(&Some(true));

        let prefs = sqlx::query_as::<_, EmailPreferencesDBResponse>(
            r#"
            UPDATE email_preferences SET
                marketing_emails = COALESCE(?, marketing_emails),
                reminder_emails = COALESCE(?, reminder_emails),
                sms_reminders = COALESCE(?, sms_reminders),
                unsubscribed_at = CASE WHEN ? THEN NULL ELSE unsubscribed_at END,
                updated_at = ?
            WHERE token = ?
            RETURNING *
            "#,
        )
        .bind(request.marketing_emails)
        .bind(request.reminder_emails)
        .bind(request.sms_reminders)
        .bind(opted_in)
        .bind(Utc::now())
        .bind(token)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(prefs)
    }

    /// Turn everything off and record when. Idempotent: the first unsubscribe time is kept.
    #[instrument(skip_all, err)]
    pub async fn unsubscribe(&mut self, token: &str) -> Result<EmailPreferencesDBResponse> {
        let now = Utc::now();
        let prefs = sqlx::query_as::<_, EmailPreferencesDBResponse>(
            r#"
            UPDATE email_preferences SET
                marketing_emails = 0,
                reminder_emails = 0,
                sms_reminders = 0,
                unsubscribed_at = COALESCE(unsubscribed_at, ?),
                updated_at = ?
            WHERE token = ?
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(token)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(prefs)
    }
}
