//! Careers and franchise enquiries.
//!
//! Submissions are public. Admins are notified in-app of each new one; a
//! failed notification is logged and does not fail the submission.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use haat_core::{Page, PageRequest, UserRole};

use crate::db::franchises::NewFranchiseApplication;
use crate::db::services::NewCareerApplication;
use crate::db::{
    CareerApplicationRepository, CareerRepository, FranchiseApplicationRepository,
    NotificationRepository,
};
use crate::error::{AppError, Result};
use crate::models::{Career, CareerApplication, FranchiseApplication};
use crate::state::AppState;

/// Build the `/api/services` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/careers", get(list_careers))
        .route("/careers/{slug}", get(show_career))
        .route("/careers/{slug}/apply", post(apply_for_career))
        .route("/franchise-applications", post(apply_for_franchise))
}

/// GET /api/services/careers
///
/// Open positions only.
pub async fn list_careers(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Career>>> {
    let careers = CareerRepository::new(state.pool()).list(true, page).await?;
    Ok(Json(careers))
}

/// GET /api/services/careers/{slug}
pub async fn show_career(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Career>> {
    open_career(&state, &slug).await.map(Json)
}

/// POST /api/services/careers/{slug}/apply
///
/// One application per email address and opening.
#[instrument(skip(state, body))]
pub async fn apply_for_career(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<NewCareerApplication>,
) -> Result<(StatusCode, Json<CareerApplication>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let career = open_career(&state, &slug).await?;
    let application = CareerApplicationRepository::new(state.pool())
        .create(career.id, &body)
        .await?;

    notify_admins(
        &state,
        "New job application",
        &format!("{} applied for {}", application.name, career.title),
        "/admin/career-applications",
    )
    .await;
    Ok((StatusCode::CREATED, Json(application)))
}

/// POST /api/services/franchise-applications
#[instrument(skip(state, body))]
pub async fn apply_for_franchise(
    State(state): State<AppState>,
    Json(body): Json<NewFranchiseApplication>,
) -> Result<(StatusCode, Json<FranchiseApplication>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let application = FranchiseApplicationRepository::new(state.pool())
        .create(&body)
        .await?;

    notify_admins(
        &state,
        "New franchise enquiry",
        &format!("{} from {}", application.name, application.city),
        "/admin/franchise-applications",
    )
    .await;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn open_career(state: &AppState, slug: &str) -> Result<Career> {
    CareerRepository::new(state.pool())
        .get_by_slug(slug)
        .await?
        .filter(|career| career.is_open)
        .ok_or_else(|| AppError::NotFound(format!("career {slug}")))
}

async fn notify_admins(state: &AppState, title: &str, body: &str, link: &str) {
    if let Err(e) = NotificationRepository::new(state.pool())
        .broadcast(UserRole::Admin, title, body, Some(link))
        .await
    {
        tracing::warn!(error = %e, "failed to notify admins");
    }
}
