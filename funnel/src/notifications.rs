//! Notification dispatch to leads.
//!
//! The [`Notifier`] sends email and SMS on behalf of the funnel, applies the lead's preferences
//! first, and writes every attempt (sent, failed or skipped) to the `notifications` table.
//! Delivery failures are recorded rather than returned; only database errors propagate.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::{
        handlers::{EmailPreferences, Notifications},
        models::{
            email_preferences::EmailPreferencesDBResponse,
            leads::LeadDBResponse,
            notifications::{NotificationChannel, NotificationCreateDBRequest, NotificationDBResponse, NotificationKind, NotificationStatus},
        },
    },
    email::{EmailContent, EmailService},
    errors::Error,
    sms::{SmsProvider, normalize_phone},
};

/// Why a lead may not be emailed about `kind`, or `None` if they may.
pub fn email_block_reason(kind: NotificationKind, prefs: Option<&EmailPreferencesDBResponse>) -> Option<&'static str> {
    if kind.is_transactional() {
        return None;
    }
    let prefs = prefs?;

    if prefs.is_unsubscribed() {
        return Some("lead unsubscribed");
    }
    match kind {
        NotificationKind::AppointmentReminder if !prefs.reminder_emails => Some("reminder emails disabled"),
        NotificationKind::Welcome | NotificationKind::Custom if !prefs.marketing_emails => Some("marketing emails disabled"),
        _ => None,
    }
}

/// Why a lead may not be texted, or `None` if they may.
pub fn sms_block_reason(lead: &LeadDBResponse, prefs: Option<&EmailPreferencesDBResponse>) -> Option<&'static str> {
    if !lead.sms_consent {
        return Some("no SMS consent");
    }
    if lead.phone.as_deref().is_none_or(|p| p.trim().is_empty()) {
        return Some("no phone number");
    }
    match prefs {
        Some(prefs) if prefs.is_unsubscribed() => Some("lead unsubscribed"),
        Some(prefs) if !prefs.sms_reminders => Some("SMS reminders disabled"),
        _ => None,
    }
}

pub struct Notifier {
    pool: SqlitePool,
    config: Arc<Config>,
    email: EmailService,
    sms: Arc<dyn SmsProvider>,
}

impl Notifier {
    pub fn new(pool: SqlitePool, config: Arc<Config>, email: EmailService, sms: Arc<dyn SmsProvider>) -> Self {
        Self { pool, config, email, sms }
    }

    async fn preferences(&self, lead: &LeadDBResponse) -> Result<Option<EmailPreferencesDBResponse>, Error> {
        let mut conn = self.pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(EmailPreferences::new(&mut conn).get_by_lead(lead.id).await?)
    }

    async fn log(&self, request: NotificationCreateDBRequest) -> Result<NotificationDBResponse, Error> {
        let mut conn = self.pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Notifications::new(&mut conn).create(&request).await?)
    }

    /// Email a lead, unless their preferences rule it out.
    #[tracing::instrument(skip_all, fields(lead_id = lead.id, kind = content.kind().as_str()), err)]
    pub async fn email_lead(&self, lead: &LeadDBResponse, content: EmailContent) -> Result<NotificationDBResponse, Error> {
        let kind = content.kind();
        let prefs = self.preferences(lead).await?;
        let preferences_link = prefs
            .as_ref()
            .map(|p| self.config.public_link(&format!("preferences?token={}", p.token)));

        let mut request = NotificationCreateDBRequest {
            lead_id: Some(lead.id),
            channel: NotificationChannel::Email,
            kind,
            recipient: lead.email.clone(),
            subject: None,
            status: NotificationStatus::Sent,
            provider_id: None,
            error: None,
        };

        if let Some(reason) = email_block_reason(kind, prefs.as_ref()) {
            tracing::info!(reason, "Skipping email");
            request.status = NotificationStatus::Skipped;
            request.error = Some(reason.to_string());
            return self.log(request).await;
        }

        let result = match self.email.render(&content, preferences_link.as_deref()) {
            Ok(rendered) => {
                request.subject = Some(rendered.subject.clone());
                self.email.send(&lead.email, Some(&lead.full_name()), &rendered).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to send email");
            request.status = NotificationStatus::Failed;
            request.error = Some(e.to_string());
        }

        self.log(request).await
    }

    /// Text a lead, unless they have not consented or have no number.
    #[tracing::instrument(skip_all, fields(lead_id = lead.id, kind = kind.as_str()), err)]
    pub async fn sms_lead(&self, lead: &LeadDBResponse, kind: NotificationKind, body: &str) -> Result<NotificationDBResponse, Error> {
        let prefs = self.preferences(lead).await?;
        let recipient = lead
            .phone
            .as_deref()
            .map(|p| normalize_phone(p).unwrap_or_else(|| p.to_string()))
            .unwrap_or_default();

        let mut request = NotificationCreateDBRequest {
            lead_id: Some(lead.id),
            channel: NotificationChannel::Sms,
            kind,
            recipient,
            subject: None,
            status: NotificationStatus::Sent,
            provider_id: None,
            error: None,
        };

        if let Some(reason) = sms_block_reason(lead, prefs.as_ref()) {
            tracing::info!(reason, "Skipping SMS");
            request.status = NotificationStatus::Skipped;
            request.error = Some(reason.to_string());
            return self.log(request).await;
        }

        let body = format!("{}: {body}", self.config.business_name);
        match self.sms.send(&request.recipient, &body).await {
            Ok(sent) => request.provider_id = Some(sent.provider_id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send SMS");
                request.status = NotificationStatus::Failed;
                request.error = Some(e.to_string());
            }
        }

        self.log(request).await
    }
}
