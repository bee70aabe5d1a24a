//! Coupons and admin notifications.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use haat_core::{CouponId, Page, PageRequest, UserId, UserRole};

use crate::db::coupons::{CouponUpdate, NewCoupon};
use crate::db::{CouponRepository, NotificationRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Coupon;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/coupons/{id}",
            patch(update_coupon).delete(delete_coupon),
        )
        .route("/notifications", post(send_notification))
}

/// GET /api/admin/coupons
pub async fn list_coupons(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Coupon>>> {
    let coupons = CouponRepository::new(state.pool()).list(page).await?;
    Ok(Json(coupons))
}

/// POST /api/admin/coupons
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, code = %body.code))]
pub async fn create_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool()).create(&body).await?;
    tracing::info!(coupon_id = %coupon.id, "coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// PATCH /api/admin/coupons/{id}
pub async fn update_coupon(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(body): Json<CouponUpdate>,
) -> Result<Json<Coupon>> {
    body.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &body)
        .await?;
    Ok(Json(coupon))
}

/// DELETE /api/admin/coupons/{id}
pub async fn delete_coupon(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body of `POST /api/admin/notifications`. Exactly one of `user_id` and
/// `role` picks the audience.
#[derive(Debug, Deserialize)]
pub struct SendNotification {
    pub user_id: Option<UserId>,
    pub role: Option<UserRole>,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsSent {
    pub recipients: u64,
}

impl SendNotification {
    fn check(&self) -> Result<()> {
        if self.user_id.is_some() == self.role.is_some() {
            return Err(AppError::BadRequest(
                "give exactly one of user_id or role".to_owned(),
            ));
        }
        if self.title.trim().is_empty() || self.body.trim().is_empty() {
            return Err(AppError::BadRequest("title and body are required".to_owned()));
        }
        Ok(())
    }
}

/// POST /api/admin/notifications
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn send_notification(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<SendNotification>,
) -> Result<(StatusCode, Json<NotificationsSent>)> {
    body.check()?;
    let repo = NotificationRepository::new(state.pool());
    let title = body.title.trim();
    let link = body.link.as_deref();

    let recipients = match (body.user_id, body.role) {
        (Some(user_id), _) => {
            UserRepository::new(state.pool())
                .get_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
            repo.create(user_id, title, &body.body, link).await?;
            1
        }
        (None, Some(role)) => repo.broadcast(role, title, &body.body, link).await?,
        (None, None) => 0,
    };
    tracing::info!(recipients, "notification sent");
    Ok((StatusCode::CREATED, Json(NotificationsSent { recipients })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(json: &str) -> SendNotification {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_notification_needs_exactly_one_audience() {
        assert!(body(r#"{"title":"t","body":"b"}"#).check().is_err());
        assert!(
            body(r#"{"user_id":3,"role":"vendor","title":"t","body":"b"}"#)
                .check()
                .is_err()
        );
        assert!(body(r#"{"role":"vendor","title":"t","body":"b"}"#).check().is_ok());
        assert!(body(r#"{"user_id":3,"title":"t","body":"b"}"#).check().is_ok());
    }

    #[test]
    fn test_notification_rejects_blank_title() {
        assert!(body(r#"{"user_id":3,"title":" ","body":"b"}"#).check().is_err());
    }
}
