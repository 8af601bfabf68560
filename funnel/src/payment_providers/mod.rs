//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which abstracts invoice payment collection
//! across payment processors. An invoice is paid through a provider-side payment (a Stripe
//! PaymentIntent) and the outcome arrives later as a signed webhook.

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::{
    config::PaymentConfig,
    db::models::{invoices::InvoiceDBResponse, leads::LeadDBResponse},
    errors::Error,
};

pub mod dummy;
pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Box<dyn PaymentProvider> {
    match config {
        PaymentConfig::Stripe(stripe_config) => Box::new(stripe::StripeProvider::from(stripe_config)),
        PaymentConfig::Dummy(dummy_config) => Box::new(dummy::DummyProvider::from(dummy_config)),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),
}

impl From<PaymentError> for Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ProviderApi(message) => Error::Provider {
                provider: "Payment processor",
                message,
            },
            PaymentError::InvalidData(message) => Error::BadRequest { message },
            PaymentError::InvalidSignature(_) => Error::BadRequest {
                message: "Invalid webhook signature".to_string(),
            },
        }
    }
}

/// A payment opened with the provider for one invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    /// Provider's id for the payment (PaymentIntent id for Stripe)
    pub payment_id: String,
    /// Secret the payment page uses to confirm the payment client-side
    pub client_secret: Option<String>,
}

/// What a webhook tells us about a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed { message: Option<String> },
    /// Any event type we do not act on
    Ignored,
}

/// A verified webhook event from a payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider's event id, used for idempotency
    pub event_id: String,
    /// Provider's event type, e.g. `payment_intent.succeeded`
    pub event_type: String,
    /// Payment the event refers to, if any
    pub payment_id: Option<String>,
    pub outcome: PaymentOutcome,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a payment for `invoice` on behalf of `lead`
    async fn create_payment(&self, invoice: &InvoiceDBResponse, lead: &LeadDBResponse) -> Result<CreatedPayment>;

    /// Verify the signature of a raw webhook request and extract the event
    ///
    /// Returns Err if validation fails (invalid signature, malformed data, etc.)
    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<PaymentEvent>;

    /// Key handed to the browser payment page, if the provider has one
    fn publishable_key(&self) -> Option<String>;
}
