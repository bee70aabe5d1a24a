//! Notification tray for any logged-in user.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use haat_core::{NotificationId, Page, PageRequest};

use crate::db::NotificationRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Notification;
use crate::state::AppState;

/// Build the `/api/notifications` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Notification page plus the unread badge count.
#[derive(Debug, Serialize)]
pub struct NotificationList {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(page): Query<PageRequest>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationList>> {
    let repo = NotificationRepository::new(state.pool());
    let page = repo.list_for_user(user.id, query.unread_only, page).await?;
    let unread_count = repo.unread_count(user.id).await?;
    Ok(Json(NotificationList { page, unread_count }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>> {
    let notification = NotificationRepository::new(state.pool())
        .mark_read(id, user.id)
        .await?;
    Ok(Json(notification))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<MarkAllReadResponse>> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
