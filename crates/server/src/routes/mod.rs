//! HTTP routes for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//! GET  /uploads/{file}                  - Uploaded images
//!
//! # Auth (strict rate limit)
//! POST /api/auth/otp/send               - Text a login code
//! POST /api/auth/otp/verify             - Log in with the code
//! POST /api/auth/login                  - Staff email and password login
//! POST /api/auth/logout                 - End the session
//! GET  /api/auth/me                     - Current user
//!
//! # Storefront
//! /api/shopping/...                     - Catalog, cart, checkout, orders
//! /api/notifications/...                - In-app notifications
//! /api/blog/...                         - Published posts and authors
//! /api/services/...                     - Careers and franchise enquiries
//! POST /api/uploads                     - Image upload (staff)
//! POST /api/webhooks/razorpay           - Payment gateway callbacks
//!
//! # Back office
//! /api/admin/...                        - Admin dashboard API
//! /api/vendor-portal/...                - Vendor self-service
//! /api/franchise-portal/...             - Franchise order fulfilment
//! /api/author-portal/...                - Blog drafting
//! ```
//!
//! Each module documents its own routes.

pub mod admin;
pub mod auth;
pub mod author_portal;
pub mod blog;
pub mod franchise_portal;
pub mod health;
pub mod notifications;
pub mod services;
pub mod shopping;
pub mod uploads;
pub mod vendor_portal;
pub mod webhooks;

use axum::{Router, body::Body, http::Request, middleware as axum_middleware};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::services::uploads::PUBLIC_PREFIX;
use crate::state::AppState;

/// Create the `/api` routes.
///
/// `/api/auth` gets the strict limiter, everything else the relaxed one.
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    let auth = auth::router().layer(auth_rate_limiter());

    let api = Router::new()
        .nest("/shopping", shopping::router())
        .nest("/notifications", notifications::router())
        .nest("/blog", blog::router())
        .nest("/services", services::router())
        .nest("/uploads", uploads::router(max_upload_bytes))
        .nest("/webhooks", webhooks::router())
        .nest("/admin", admin::router())
        .nest("/vendor-portal", vendor_portal::router())
        .nest("/franchise-portal", franchise_portal::router())
        .nest("/author-portal", author_portal::router())
        .layer(api_rate_limiter());

    Router::new().nest("/auth", auth).merge(api)
}

/// Unmatched paths get the same JSON error body as everything else.
async fn not_found() -> AppError {
    AppError::NotFound("route".to_owned())
}

/// Build the complete application with its middleware stack.
///
/// Sentry layers are added by the binary, outside this stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let uploads_dir = ServeDir::new(state.uploads().dir());

    Router::new()
        .merge(health::router())
        .nest("/api", api_routes(state.config().uploads.max_bytes))
        .nest_service(PUBLIC_PREFIX, uploads_dir)
        .fallback(not_found)
        .layer(session_layer)
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
