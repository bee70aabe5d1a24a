//! User administration.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{Page, PageRequest, UserId, UserRole};

use crate::db::UserRepository;
use crate::db::users::{UserFilter, UserUpdate};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::services::auth::AuthService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list).post(create))
        .route("/users/{id}", get(show).patch(update))
}

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

/// GET /api/admin/users
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<User>>> {
    let users = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(users))
}

/// POST /api/admin/users
///
/// Staff accounts only. Customers sign themselves up through OTP login.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, role = %body.role))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<User>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    let user = AuthService::new(state.pool())
        .create_staff(&body.name, &body.email, &body.password, body.role)
        .await?;
    tracing::info!(user_id = %user.id, "staff account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/admin/users/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// PATCH /api/admin/users/{id}
///
/// Admins cannot demote or deactivate themselves. Changes take effect at the
/// user's next login.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>> {
    if id == admin.id
        && (body.is_active == Some(false) || body.role.is_some_and(|r| r != UserRole::Admin))
    {
        return Err(AppError::BadRequest(
            "you cannot demote or deactivate your own account".to_owned(),
        ));
    }
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_owned()));
    }
    let user = UserRepository::new(state.pool()).update(id, &body).await?;
    Ok(Json(user))
}
