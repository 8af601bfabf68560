//! Log-only SMS provider for development and tests.

use async_trait::async_trait;

use crate::sms::{Result, SentSms, SmsError, SmsProvider, normalize_phone};

/// Writes messages to the log instead of sending them
pub struct LogProvider;

#[async_trait]
impl SmsProvider for LogProvider {
    async fn send(&self, to: &str, body: &str) -> Result<SentSms> {
        let to = normalize_phone(to).ok_or_else(|| SmsError::InvalidNumber(to.to_string()))?;
        let provider_id = format!("log_{}", uuid::Uuid::new_v4().simple());

        tracing::info!(to = %to, provider_id = %provider_id, "SMS (not sent): {}", body);

        Ok(SentSms { provider_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_provider_returns_synthetic_id() {
        let sent = LogProvider.send("+15550001111", "hello").await.unwrap();
        assert!(sent.provider_id.starts_with("log_"));
    }

    #[tokio::test]
    async fn test_log_provider_validates_number() {
        assert!(matches!(LogProvider.send("nope", "hello").await, Err(SmsError::InvalidNumber(_))));
    }
}
