//! Authentication route handlers.
//!
//! Customers log in with a one-time code texted to their phone. Staff
//! (admin, vendor, franchise, author) log in with email and password. Both
//! flows end with the same session: a [`CurrentUser`] under a fresh id.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use haat_core::Phone;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::services::otp::{OtpSent, OtpService};
use crate::state::AppState;

/// Build the `/api/auth` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/otp/send", post(send_otp))
        .route("/otp/verify", post(verify_otp))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// POST /api/auth/otp/send
///
/// Texts a login code. A second request inside the cooldown is rejected
/// with 429 and `retry_after_seconds`.
#[instrument(skip(state, body))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<OtpSent>> {
    let phone = Phone::parse(&body.phone)?;
    let config = state.config();
    let sent = OtpService::new(state.pool(), state.sms(), config.otp, &config.session_secret)
        .send(&phone)
        .await?;
    Ok(Json(sent))
}

/// POST /api/auth/otp/verify
///
/// Checks the code and logs the customer in, creating the account on first
/// login.
#[instrument(skip(state, session, body))]
pub async fn verify_otp(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<CurrentUser>> {
    let phone = Phone::parse(&body.phone)?;
    let config = state.config();
    let user = OtpService::new(state.pool(), state.sms(), config.otp, &config.session_secret)
        .verify(&phone, body.code.trim())
        .await?;
    start_session(&session, &user).await.map(Json)
}

/// POST /api/auth/login
///
/// Staff login with email and password.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let user = AuthService::new(state.pool())
        .login_with_password(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "staff login failed"))?;
    start_session(&session, &user).await.map(Json)
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<Json<LogoutResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Json(LogoutResponse { success: true }))
}

/// GET /api/auth/me
pub async fn me(RequireUser(user): RequireUser) -> Json<CurrentUser> {
    Json(user)
}

async fn start_session(session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;

    set_sentry_user(&current.id, current.email.as_ref().map(|e| e.as_str()));
    add_breadcrumb("auth", "login", Some(&[("role", current.role.as_str())]));
    tracing::info!(user_id = %current.id, role = %current.role, "user logged in");
    Ok(current)
}
