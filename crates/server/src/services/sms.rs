//! SMS delivery for login codes and order updates.
//!
//! Message bodies are rendered from Askama text templates. The provider is
//! called through the [`SmsSender`] trait so development setups without
//! provider credentials can log messages instead.

use askama::Template;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;

use haat_core::Phone;

use crate::config::SmsConfig;

/// Login code message.
#[derive(Template)]
#[template(path = "sms/otp.txt")]
pub struct OtpMessage<'a> {
    pub code: &'a str,
    pub ttl_minutes: u64,
}

/// Order confirmation message.
#[derive(Template)]
#[template(path = "sms/order_placed.txt")]
pub struct OrderPlacedMessage<'a> {
    pub order_number: &'a str,
    pub total: &'a str,
    pub order_url: &'a str,
}

/// Errors that can occur when sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the message.
    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Something that can deliver a text message.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver `body` to `to`.
    async fn send(&self, to: &Phone, body: &str) -> Result<(), SmsError>;
}

/// Payload posted to the provider.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    sender: &'a str,
    to: &'a str,
    message: &'a str,
}

/// Sends through an HTTP provider that accepts JSON messages.
#[derive(Clone)]
pub struct HttpSmsSender {
    client: reqwest::Client,
    api_url: String,
    api_key: secrecy::SecretString,
    sender_id: String,
}

impl HttpSmsSender {
    /// Create a sender from provider settings.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    #[tracing::instrument(skip(self, body), fields(to = %to.masked()))]
    async fn send(&self, to: &Phone, body: &str) -> Result<(), SmsError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&SendRequest {
                sender: &self.sender_id,
                to: to.as_str(),
                message: body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!("SMS accepted by provider");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, to: &Phone, body: &str) -> Result<(), SmsError> {
        tracing::info!(to = %to, body, "SMS provider not configured, message logged");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_message_renders_code_and_ttl() {
        let body = OtpMessage {
            code: "482913",
            ttl_minutes: 5,
        }
        .render()
        .unwrap();
        assert!(body.starts_with("482913 is your Haat login code."));
        assert!(body.contains("valid for 5 minutes"));
    }

    #[test]
    fn test_order_placed_message() {
        let body = OrderPlacedMessage {
            order_number: "HT-20261018-4F7K2Q",
            total: "1249.00",
            order_url: "https://haat.example/orders/7",
        }
        .render()
        .unwrap();
        assert!(body.contains("HT-20261018-4F7K2Q"));
        assert!(body.contains("Rs. 1249.00"));
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let phone = Phone::parse("9876543210").unwrap();
        assert!(LogSmsSender.send(&phone, "hello").await.is_ok());
    }
}
