//! Payment gateway webhooks.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::checkout::{CheckoutError, CheckoutService};
use crate::services::payments::WebhookEvent;
use crate::state::AppState;

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Build the `/api/webhooks` router.
pub fn router() -> Router<AppState> {
    Router::new().route("/razorpay", post(razorpay))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// POST /api/webhooks/razorpay
///
/// The signature is checked against the raw body before anything is
/// parsed. Replays are harmless: paid and failed transitions only apply
/// once.
#[instrument(skip_all)]
pub async fn razorpay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let client = state
        .razorpay()
        .ok_or(AppError::Checkout(CheckoutError::PaymentsDisabled))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing webhook signature".to_owned()))?;
    client.verify_webhook_signature(&body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;
    tracing::info!(event = %event.event, "Razorpay webhook received");

    CheckoutService::new(
        state.pool(),
        Some(client),
        state.sms(),
        &state.config().base_url,
    )
    .handle_webhook(&event)
    .await?;

    Ok(Json(WebhookAck { status: "ok" }))
}
