//! Payment processor webhook.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState,
    db::{
        handlers::{Invoices, Leads, Repository, WebhookEvents},
        models::{
            invoices::{InvoiceDBResponse, format_amount},
            leads::{LeadDBResponse, LeadStatus},
        },
    },
    email::EmailContent,
    errors::{Error, Result},
    payment_providers::PaymentOutcome,
};

/// Handle a webhook from the payment processor
///
/// The signature is verified against the raw body before anything is parsed. Each event id is
/// processed once; redeliveries are acknowledged without effect. Events for payments we do not
/// know about are acknowledged too, so the processor stops retrying them.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "payments",
    request_body(content = String, description = "Raw event payload as sent by the processor", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Invalid signature or payload, or no payment processor configured"),
    )
)]
#[instrument(skip_all)]
pub async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<StatusCode> {
    let payments = state.payments.as_ref().ok_or_else(|| Error::BadRequest {
        message: "Payment processing is not configured".to_string(),
    })?;

    let event = payments.validate_webhook(&headers, &body).await.inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected payment webhook");
    })?;
    tracing::debug!(event_id = %event.event_id, event_type = %event.event_type, "Verified payment webhook");

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if !WebhookEvents::new(&mut tx).record(&event.event_id, &event.event_type).await? {
        tracing::info!(event_id = %event.event_id, "Duplicate webhook event, ignoring");
        return Ok(StatusCode::OK);
    }

    let invoice = match (&event.outcome, event.payment_id.as_deref()) {
        (PaymentOutcome::Ignored, _) | (_, None) => None,
        (_, Some(payment_id)) => {
            let invoice = Invoices::new(&mut tx).get_by_payment_id(payment_id).await?;
            if invoice.is_none() {
                tracing::warn!(payment_id, event_id = %event.event_id, "Webhook for unknown payment");
            }
            invoice
        }
    };

    let mut receipt: Option<(InvoiceDBResponse, LeadDBResponse)> = None;

    if let Some(invoice) = invoice {
        match &event.outcome {
            PaymentOutcome::Succeeded => {
                if let Some(paid) = Invoices::new(&mut tx).mark_paid(invoice.id, Utc::now()).await? {
                    Leads::new(&mut tx).advance_status(paid.lead_id, LeadStatus::Customer).await?;
                    tracing::info!(invoice_id = paid.id, lead_id = paid.lead_id, "Invoice paid");
                    let lead = Leads::new(&mut tx).get_by_id(paid.lead_id).await?;
                    receipt = lead.map(|lead| (paid, lead));
                } else {
                    tracing::info!(invoice_id = invoice.id, status = invoice.status.as_str(), "Invoice not payable, ignoring success");
                }
            }
            PaymentOutcome::Failed { message } => {
                match Invoices::new(&mut tx).mark_failed(invoice.id, message.as_deref()).await? {
                    Some(failed) => tracing::info!(invoice_id = failed.id, message = ?message, "Invoice payment failed"),
                    None => tracing::info!(invoice_id = invoice.id, status = invoice.status.as_str(), "Invoice not sent, ignoring failure"),
                }
            }
            PaymentOutcome::Ignored => {}
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if let Some((invoice, lead)) = receipt {
        let paid_on = invoice.paid_at.unwrap_or_else(Utc::now).date_naive().to_string();
        let content = EmailContent::PaymentReceipt {
            first_name: lead.first_name.clone(),
            invoice_number: invoice.display_number(),
            description: invoice.description.clone(),
            amount: format_amount(invoice.amount_cents, &invoice.currency),
            paid_on,
        };
        if let Err(e) = state.notifier.email_lead(&lead, content).await {
            tracing::warn!(invoice_id = invoice.id, error = %e, "Failed to record payment receipt");
        }
    }

    Ok(StatusCode::OK)
}
