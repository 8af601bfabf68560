//! Stripe payment provider implementation

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use stripe::{Client, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, Currency, EventObject, EventType, PaymentIntent};

use crate::{
    config::StripeConfig,
    db::models::{invoices::InvoiceDBResponse, leads::LeadDBResponse},
    payment_providers::{CreatedPayment, PaymentError, PaymentEvent, PaymentOutcome, PaymentProvider, Result},
};

/// Stripe payment provider
pub struct StripeProvider {
    api_key: String,
    publishable_key: String,
    webhook_secret: String,
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        Self::new(config.secret_key, config.publishable_key, config.webhook_secret)
    }
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(api_key: String, publishable_key: String, webhook_secret: String) -> Self {
        Self {
            api_key,
            publishable_key,
            webhook_secret,
        }
    }

    /// Get a Stripe client
    fn client(&self) -> Client {
        Client::new(&self.api_key)
    }
}

/// Parse a lowercase ISO currency code into Stripe's currency enum
fn parse_currency(code: &str) -> Result<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
        .map_err(|_| PaymentError::InvalidData(format!("Unsupported currency '{code}'")))
}

/// Stripe's wire name for an event type, e.g. `payment_intent.succeeded`
fn event_type_name(event_type: &EventType) -> String {
    match serde_json::to_value(event_type) {
        Ok(serde_json::Value::String(name)) => name,
        _ => format!("{event_type:?}"),
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_payment(&self, invoice: &InvoiceDBResponse, lead: &LeadDBResponse) -> Result<CreatedPayment> {
        let client = self.client();

        let mut metadata = HashMap::new();
        metadata.insert("invoice_id".to_string(), invoice.id.to_string());
        metadata.insert("invoice_number".to_string(), invoice.display_number());
        metadata.insert("lead_id".to_string(), lead.id.to_string());

        let mut params = CreatePaymentIntent::new(invoice.amount_cents, parse_currency(&invoice.currency)?);
        params.description = Some(invoice.description.as_str());
        params.receipt_email = Some(lead.email.as_str());
        params.metadata = Some(metadata);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            ..Default::default()
        });

        let intent = PaymentIntent::create(&client, params).await.map_err(|e| {
            tracing::error!("Failed to create Stripe payment intent: {:?}", e);
            PaymentError::ProviderApi(e.to_string())
        })?;

        tracing::info!("Created payment intent {} for invoice {}", intent.id, invoice.id);

        Ok(CreatedPayment {
            payment_id: intent.id.to_string(),
            client_secret: intent.client_secret,
        })
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<PaymentEvent> {
        // Get the Stripe signature from headers
        let signature = headers
            .get("stripe-signature")
            .ok_or_else(|| {
                tracing::error!("Missing stripe-signature header");
                PaymentError::InvalidSignature("Missing stripe-signature header".to_string())
            })?
            .to_str()
            .map_err(|e| {
                tracing::error!("Invalid stripe-signature header: {:?}", e);
                PaymentError::InvalidSignature("Invalid stripe-signature header".to_string())
            })?;

        // Validate the webhook signature and construct the event
        let event = stripe::Webhook::construct_event(body, signature, &self.webhook_secret).map_err(|e| {
            tracing::error!("Failed to construct webhook event: {:?}", e);
            PaymentError::InvalidSignature(format!("Webhook validation failed: {}", e))
        })?;

        tracing::trace!("Validated Stripe webhook event: {:?}", event.type_);

        let payment_intent = match &event.data.object {
            EventObject::PaymentIntent(intent) => Some(intent),
            _ => None,
        };

        let outcome = match (&event.type_, payment_intent) {
            (EventType::PaymentIntentSucceeded, Some(_)) => PaymentOutcome::Succeeded,
            (EventType::PaymentIntentPaymentFailed, Some(intent)) => PaymentOutcome::Failed {
                message: intent.last_payment_error.as_ref().and_then(|e| e.message.clone()),
            },
            _ => PaymentOutcome::Ignored,
        };

        Ok(PaymentEvent {
            event_id: event.id.to_string(),
            event_type: event_type_name(&event.type_),
            payment_id: payment_intent.map(|intent| intent.id.to_string()),
            outcome,
        })
    }

    fn publishable_key(&self) -> Option<String> {
        Some(self.publishable_key.clone())
    }
}
