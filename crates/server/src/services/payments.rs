//! Razorpay payment gateway client.
//!
//! Checkout creates a Razorpay order for the amount in paise. The browser
//! completes payment with Razorpay Checkout and posts back the payment id and
//! signature, which are verified here. Webhooks are verified with a separate
//! webhook secret.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Razorpay API base URL.
const BASE_URL: &str = "https://api.razorpay.com/v1";

/// Errors that can occur when interacting with Razorpay.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Signature did not match.
    #[error("payment signature mismatch")]
    InvalidSignature,

    /// Webhook secret is not configured.
    #[error("webhook secret not configured")]
    WebhookNotConfigured,

    /// Amount cannot be charged (negative or too large).
    #[error("invalid amount")]
    InvalidAmount,
}

/// Order creation request.
#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a BTreeMap<String, String>,
}

/// Razorpay order as returned by the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

/// Razorpay error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    description: Option<String>,
}

/// Webhook event envelope. Only the fields the order flow needs are parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookEntity<WebhookPayment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntity<T> {
    pub entity: T,
}

/// Payment entity inside a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    pub order_id: Option<String>,
    pub status: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_owned(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// Public key id, handed to the browser for Razorpay Checkout.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Api` if Razorpay rejects the request.
    #[tracing::instrument(skip(self, notes))]
    pub async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        notes: &BTreeMap<String, String>,
    ) -> Result<GatewayOrder, PaymentError> {
        if amount_paise <= 0 {
            return Err(PaymentError::InvalidAmount);
        }

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount: amount_paise,
                currency,
                receipt,
                notes,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error.description)
                .unwrap_or(text);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response.json().await?;
        tracing::info!(razorpay_order_id = %order.id, "Gateway order created");
        Ok(order)
    }

    /// Verify the signature Razorpay Checkout returns after payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_payment_signature(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
        verify_hex_hmac(&self.key_secret, message.as_bytes(), signature)
    }

    /// Verify a webhook body against the `X-Razorpay-Signature` header.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::WebhookNotConfigured` without a webhook secret.
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), PaymentError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(PaymentError::WebhookNotConfigured)?;
        verify_hex_hmac(secret, body, signature)
    }
}

/// Hex HMAC-SHA256 of `message`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the key is rejected.
pub fn sign(secret: &SecretString, message: &[u8]) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature.
fn verify_hex_hmac(secret: &SecretString, message: &[u8], signature: &str) -> Result<(), PaymentError> {
    let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(message);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            key_id: "rzp_test_1DP5mmOlF5G5ag".to_owned(),
            key_secret: SecretString::from("thisisatestsecret"),
            webhook_secret: Some(SecretString::from("whsec-test")),
        })
        .unwrap()
    }

    #[test]
    fn test_payment_signature_round_trip() {
        let client = client();
        let signature = sign(
            &SecretString::from("thisisatestsecret"),
            b"order_IluGWxBm9U8zJ8|pay_IluGWxBm9U8zJ9",
        )
        .unwrap();

        assert!(
            client
                .verify_payment_signature("order_IluGWxBm9U8zJ8", "pay_IluGWxBm9U8zJ9", &signature)
                .is_ok()
        );
        assert!(matches!(
            client.verify_payment_signature("order_IluGWxBm9U8zJ8", "pay_other", &signature),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert!(matches!(
            client().verify_payment_signature("order_1", "pay_1", "not hex"),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(&SecretString::from("whsec-test"), body).unwrap();
        assert!(client().verify_webhook_signature(body, &signature).is_ok());
        assert!(client().verify_webhook_signature(b"{}", &signature).is_err());
    }

    #[test]
    fn test_webhook_requires_secret() {
        let client = RazorpayClient::new(&RazorpayConfig {
            key_id: "rzp_test".to_owned(),
            key_secret: SecretString::from("secret"),
            webhook_secret: None,
        })
        .unwrap();
        assert!(matches!(
            client.verify_webhook_signature(b"{}", "00"),
            Err(PaymentError::WebhookNotConfigured)
        ));
    }

    #[test]
    fn test_parse_captured_webhook() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "entity": "event",
                "event": "payment.captured",
                "payload": {"payment": {"entity": {
                    "id": "pay_29QQoUBi66xm2f", "order_id": "order_9A33XWu170gUtm",
                    "status": "captured", "amount": 50000
                }}}
            }"#,
        )
        .unwrap();
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(event.event, "payment.captured");
        assert_eq!(payment.order_id.as_deref(), Some("order_9A33XWu170gUtm"));
    }
}
