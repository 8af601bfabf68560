//! Twilio SMS provider implementation
//!
//! Uses the Programmable Messaging REST API: a form-encoded POST to
//! `/2010-04-01/Accounts/{AccountSid}/Messages.json` with HTTP basic auth.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::sms::{Result, SentSms, SmsError, SmsProvider, normalize_phone};

/// Twilio SMS provider
pub struct TwilioProvider {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String, api_base: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            account_sid,
            auth_token,
            from_number,
            api_base,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    async fn send(&self, to: &str, body: &str) -> Result<SentSms> {
        let to = normalize_phone(to).ok_or_else(|| SmsError::InvalidNumber(to.to_string()))?;

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error: TwilioErrorBody = response.json().await.unwrap_or(TwilioErrorBody {
                code: None,
                message: None,
            });
            tracing::error!(%status, code = ?error.code, "Twilio rejected message");
            return Err(SmsError::ProviderApi(format!(
                "{status}: {}",
                error.message.unwrap_or_else(|| "no error message".to_string())
            )));
        }

        let message: TwilioMessage = response.json().await?;
        tracing::debug!(sid = %message.sid, status = ?message.status, "Twilio accepted message");

        Ok(SentSms { provider_id: message.sid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_with_timeout(server: &MockServer, timeout: Duration) -> TwilioProvider {
        TwilioProvider::new("AC123".into(), "token".into(), "+15559990000".into(), server.uri(), timeout).unwrap()
    }

    fn provider(server: &MockServer) -> TwilioProvider {
        provider_with_timeout(server, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_send_posts_form_to_messages_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15550001111"))
            .and(body_string_contains("From=%2B15559990000"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM0001",
                "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sent = provider(&server).send("(555) 000-1111", "See you soon").await.unwrap();
        assert_eq!(sent.provider_id, "SM0001");
    }

    #[tokio::test]
    async fn test_provider_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number."
            })))
            .mount(&server)
            .await;

        let err = provider(&server).send("+15550001111", "hi").await.unwrap_err();
        match err {
            SmsError::ProviderApi(message) => assert!(message.contains("not a valid phone number")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_number_never_reaches_twilio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(
            provider(&server).send("not-a-number", "hi").await,
            Err(SmsError::InvalidNumber(_))
        ));
    }

    #[tokio::test]
    async fn test_stalled_twilio_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "sid": "SM0002" }))
                    .set_delay(Duration::from_secs(60)),
            )
            .mount(&server)
            .await;

        let provider = provider_with_timeout(&server, Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), provider.send("+15550001111", "hi"))
            .await
            .expect("send should give up at the client timeout");

        match result {
            Err(SmsError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout error, got {other:?}"),
        }
    }
}
