//! SMS provider abstraction layer
//!
//! This module defines the `SmsProvider` trait which abstracts text message delivery. Twilio is
//! the production provider; the log provider only writes the message to the trace output.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{config::SmsConfig, errors::Error};

pub mod log;
pub mod twilio;

/// Create an SMS provider from configuration
///
/// This is the single point where we convert config into provider instances.
pub fn create_provider(config: SmsConfig) -> Result<Arc<dyn SmsProvider>> {
    Ok(match config {
        SmsConfig::Twilio {
            account_sid,
            auth_token,
            from_number,
            api_base,
            timeout,
        } => Arc::new(twilio::TwilioProvider::new(account_sid, auth_token, from_number, api_base, timeout)?),
        SmsConfig::Log => Arc::new(log::LogProvider),
    })
}

/// Result type for SMS provider operations
pub type Result<T> = std::result::Result<T, SmsError>;

/// Errors that can occur while sending a text message
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("Invalid phone number: {0}")]
    InvalidNumber(String),

    #[error("SMS provider API error: {0}")]
    ProviderApi(String),

    #[error("SMS provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<SmsError> for Error {
    fn from(err: SmsError) -> Self {
        match err {
            SmsError::InvalidNumber(number) => Error::BadRequest {
                message: format!("Invalid phone number: {number}"),
            },
            other => Error::Provider {
                provider: "SMS",
                message: other.to_string(),
            },
        }
    }
}

/// A message accepted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    /// Provider's id for the message (Twilio message SID)
    pub provider_id: String,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Send `body` to `to`, an E.164 number
    async fn send(&self, to: &str, body: &str) -> Result<SentSms>;
}

/// Normalize a phone number to `+` followed by digits.
///
/// Spaces, dashes, dots and parentheses are dropped. Ten-digit numbers without a country code are
/// taken to be North American and get `+1`. Returns `None` for anything else that is not 8-15
/// digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');

    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    if !has_plus && digits.len() == 10 {
        return Some(format!("+1{digits}"));
    }
    if !has_plus && digits.len() == 11 && digits.starts_with('1') {
        return Some(format!("+{digits}"));
    }
    if has_plus && (8..=15).contains(&digits.len()) {
        return Some(format!("+{digits}"));
    }

    None
}
