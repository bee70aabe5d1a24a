//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use haat_core::{EmailError, PhoneError, SlugError, TransitionError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::blog::BlogError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::otp::OtpError;
use crate::services::payments::PaymentError;
use crate::services::uploads::UploadError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Staff authentication failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// OTP login failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Payment gateway failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Blog error: {0}")]
    Blog(#[from] BlogError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Status change not allowed from the current status.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        Self::BadRequest(format!("invalid email: {err}"))
    }
}

impl From<PhoneError> for AppError {
    fn from(err: PhoneError) -> Self {
        Self::BadRequest(format!("invalid phone number: {err}"))
    }
}

impl From<SlugError> for AppError {
    fn from(err: SlugError) -> Self {
        Self::BadRequest(format!("invalid slug: {err}"))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Response parts for an error: status, client message, and seconds to wait
/// before retrying.
struct Rendered {
    status: StatusCode,
    message: String,
    retry_after: Option<u64>,
}

impl Rendered {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    fn bad_request(err: &impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

fn render_repository(err: &RepositoryError) -> Rendered {
    match err {
        RepositoryError::NotFound => Rendered::new(StatusCode::NOT_FOUND, "Not found"),
        RepositoryError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => Rendered::internal(),
    }
}

fn render_payment(err: &PaymentError) -> Rendered {
    match err {
        PaymentError::InvalidSignature => {
            Rendered::new(StatusCode::BAD_REQUEST, "Payment verification failed")
        }
        PaymentError::InvalidAmount => Rendered::bad_request(err),
        PaymentError::WebhookNotConfigured => {
            Rendered::new(StatusCode::SERVICE_UNAVAILABLE, "Webhooks are not configured")
        }
        PaymentError::Http(_) | PaymentError::Api { .. } => {
            Rendered::new(StatusCode::BAD_GATEWAY, "Payment service error")
        }
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            Self::Database(err) => render_repository(err),
            Self::Internal(_) => Rendered::internal(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    Rendered::new(StatusCode::UNAUTHORIZED, "Invalid credentials")
                }
                AuthError::UserAlreadyExists => Rendered::new(
                    StatusCode::CONFLICT,
                    "An account with this email already exists",
                ),
                AuthError::WeakPassword(msg) => Rendered::new(StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::InvalidEmail(_) => {
                    Rendered::new(StatusCode::BAD_REQUEST, "Invalid email address")
                }
                AuthError::NotStaffRole(_) => Rendered::bad_request(err),
                AuthError::Repository(e) => render_repository(e),
                AuthError::PasswordHash => Rendered::internal(),
            },
            Self::Otp(err) => match err {
                OtpError::Cooldown {
                    retry_after_seconds,
                } => Rendered {
                    retry_after: Some(*retry_after_seconds),
                    ..Rendered::new(StatusCode::TOO_MANY_REQUESTS, err.to_string())
                },
                OtpError::InvalidPhone(_)
                | OtpError::InvalidCode { .. }
                | OtpError::Expired
                | OtpError::TooManyAttempts => Rendered::bad_request(err),
                OtpError::AccountDisabled => Rendered::new(StatusCode::FORBIDDEN, err.to_string()),
                OtpError::Sms(_) => {
                    Rendered::new(StatusCode::BAD_GATEWAY, "Could not send the code, please try again")
                }
                OtpError::Repository(e) => render_repository(e),
                OtpError::Template(_) | OtpError::Key(_) => Rendered::internal(),
            },
            Self::Payment(err) => render_payment(err),
            Self::Cart(err) => match err {
                CartError::NotInCart | CartError::CouponNotFound => {
                    Rendered::new(StatusCode::NOT_FOUND, err.to_string())
                }
                CartError::Repository(e) => render_repository(e),
                CartError::InvalidQuantity
                | CartError::ProductUnavailable
                | CartError::InsufficientStock { .. }
                | CartError::Coupon(_) => Rendered::bad_request(err),
            },
            Self::Catalog(err) => match err {
                CatalogError::Invalid(_) | CatalogError::Slug(_) => Rendered::bad_request(err),
                CatalogError::Repository(e) => render_repository(e),
            },
            Self::Checkout(err) => match err {
                CheckoutError::OrderNotFound => Rendered::new(StatusCode::NOT_FOUND, err.to_string()),
                CheckoutError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, msg.clone()),
                CheckoutError::Payment(e) => render_payment(e),
                CheckoutError::Repository(e) => render_repository(e),
                CheckoutError::EmptyCart
                | CheckoutError::InvalidAddress(_)
                | CheckoutError::ProductUnavailable { .. }
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::CouponNotFound
                | CheckoutError::Coupon(_)
                | CheckoutError::PaymentsDisabled
                | CheckoutError::AmountTooSmall
                | CheckoutError::PaymentMismatch => Rendered::bad_request(err),
            },
            Self::Order(err) => match err {
                OrderError::NotFound => Rendered::new(StatusCode::NOT_FOUND, err.to_string()),
                OrderError::Transition(_) | OrderError::NotReady => {
                    Rendered::new(StatusCode::CONFLICT, err.to_string())
                }
                OrderError::Repository(e) => render_repository(e),
            },
            Self::Blog(err) => match err {
                BlogError::NotFound => Rendered::new(StatusCode::NOT_FOUND, err.to_string()),
                BlogError::InvalidInput(_) | BlogError::Slug(_) => Rendered::bad_request(err),
                BlogError::Transition(_) => Rendered::new(StatusCode::CONFLICT, err.to_string()),
                BlogError::Repository(e) => render_repository(e),
            },
            Self::Upload(err) => match err {
                UploadError::TooLarge { .. } => {
                    Rendered::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
                }
                UploadError::Io(_) => Rendered::internal(),
                UploadError::Missing
                | UploadError::UnsupportedType
                | UploadError::ContentMismatch => Rendered::bad_request(err),
            },
            Self::Transition(err) => Rendered::new(StatusCode::CONFLICT, err.to_string()),
            Self::NotFound(what) => Rendered::new(StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Unauthorized(msg) => Rendered::new(StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => Rendered::new(StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => Rendered::new(StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => Rendered::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
        }
    }

    /// HTTP status this error responds with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.render().status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let rendered = self.render();

        // Capture server errors to Sentry
        if rendered.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %rendered.status, "Request rejected");
        }

        let mut body = json!({ "error": rendered.message });
        if let Some(seconds) = rendered.retry_after {
            body["retry_after_seconds"] = json!(seconds);
        }
        let mut response = (rendered.status, Json(body)).into_response();
        if let Some(seconds) = rendered.retry_after
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use haat_core::{CouponError, OrderStatus};

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let retry = response
            .headers()
            .get(header::RETRY_AFTER)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, retry, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(RepositoryError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CartError::Coupon(CouponError::Expired)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(UploadError::TooLarge { max_bytes: 10 }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::from(PaymentError::Api {
                status: 500,
                message: "boom".into()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_invalid_transition_is_conflict() {
        let err = OrderStatus::Delivered
            .transition_to(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(AppError::from(err).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(OrderError::NotReady).status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let (status, retry, body) = body_json(AppError::BadRequest("quantity must be positive".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(retry.is_none());
        assert_eq!(body, json!({ "error": "quantity must be positive" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, _, body) = body_json(AppError::Internal("connection refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_otp_cooldown_carries_retry_after() {
        let err = AppError::from(OtpError::Cooldown {
            retry_after_seconds: 17,
        });
        let (status, retry, body) = body_json(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry.as_deref(), Some("17"));
        assert_eq!(body["retry_after_seconds"], 17);
    }
}
