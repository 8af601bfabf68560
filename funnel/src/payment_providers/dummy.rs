//! Dummy payment provider implementation
//!
//! Payments are never sent anywhere: `create_payment` returns synthetic ids and webhooks are
//! plain JSON posted by a test or an operator. Useful for testing and development purposes.
//!
//! Webhook body:
//!
//! ```json
//! { "id": "evt_1", "type": "payment_intent.succeeded", "payment_id": "dummy_pi_...", "failure_message": null }
//! ```
//!
//! When a webhook secret is configured the request must carry `x-dummy-signature`, the
//! base64 HMAC-SHA256 of the raw body.

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    config::DummyConfig,
    db::models::{invoices::InvoiceDBResponse, leads::LeadDBResponse},
    payment_providers::{CreatedPayment, PaymentError, PaymentEvent, PaymentOutcome, PaymentProvider, Result},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-dummy-signature";
pub const SUCCEEDED: &str = "payment_intent.succeeded";
pub const FAILED: &str = "payment_intent.payment_failed";

/// Dummy payment provider that accepts unsigned or HMAC-signed JSON webhooks
pub struct DummyProvider {
    webhook_secret: Option<String>,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self::new(config.webhook_secret)
    }
}

#[derive(Debug, Deserialize)]
struct DummyWebhookBody {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payment_id: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
}

impl DummyProvider {
    /// Create a new Dummy provider
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self { webhook_secret }
    }

    fn verify_signature(&self, headers: &HeaderMap, body: &str) -> Result<()> {
        let Some(secret) = &self.webhook_secret else {
            return Ok(());
        };

        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PaymentError::InvalidSignature(format!("Missing {SIGNATURE_HEADER} header")))?;
        let signature = BASE64_STANDARD
            .decode(signature)
            .map_err(|_| PaymentError::InvalidSignature("Signature is not base64".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::InvalidSignature(format!("Unusable webhook secret: {e}")))?;
        mac.update(body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| PaymentError::InvalidSignature("Signature mismatch".to_string()))
    }
}

/// Sign a webhook body the way [`DummyProvider`] expects.
pub fn sign(secret: &str, body: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body.as_bytes());
    Some(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_payment(&self, invoice: &InvoiceDBResponse, lead: &LeadDBResponse) -> Result<CreatedPayment> {
        let payment_id = format!("dummy_pi_{}", uuid::Uuid::new_v4().simple());
        let client_secret = format!("{payment_id}_secret_{}", uuid::Uuid::new_v4().simple());

        tracing::info!("Dummy provider created payment {} for invoice {} (lead {})", payment_id, invoice.id, lead.id);

        Ok(CreatedPayment {
            payment_id,
            client_secret: Some(client_secret),
        })
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<PaymentEvent> {
        self.verify_signature(headers, body)?;

        let body: DummyWebhookBody =
            serde_json::from_str(body).map_err(|e| PaymentError::InvalidData(format!("Malformed webhook body: {e}")))?;

        let outcome = match body.event_type.as_str() {
            SUCCEEDED => PaymentOutcome::Succeeded,
            FAILED => PaymentOutcome::Failed {
                message: body.failure_message,
            },
            _ => PaymentOutcome::Ignored,
        };

        Ok(PaymentEvent {
            event_id: body.id,
            event_type: body.event_type,
            payment_id: body.payment_id,
            outcome,
        })
    }

    fn publishable_key(&self) -> Option<String> {
        None
    }
}
