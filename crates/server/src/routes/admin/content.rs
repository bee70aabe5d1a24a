//! Careers, authors and the blog review queue.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{
    ApplicationStatus, BlogPostId, CareerApplicationId, CareerId, Page, PageRequest, Slug, UserId,
    UserRole,
};

use super::grant_role;
use crate::db::blog::PostFilter;
use crate::db::services::{ApplicationFilter, CareerUpdate, NewCareer};
use crate::db::{
    AuthorRepository, BlogPostRepository, CareerApplicationRepository, CareerRepository,
    SlugTable, unique_slug,
};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Author, BlogPost, BlogPostSummary, Career, CareerApplication};
use crate::services::blog::{BlogService, ReviewDecision};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/careers", get(list_careers).post(create_career))
        .route("/careers/{id}", patch(update_career).delete(delete_career))
        .route("/career-applications", get(list_applications))
        .route("/career-applications/{id}", patch(update_application))
        .route("/authors", get(list_authors).post(create_author))
        .route("/blog-posts", get(list_posts))
        .route("/blog-posts/{id}/publish", post(publish_post))
        .route("/blog-posts/{id}/reject", post(reject_post))
        .route("/blog-posts/{id}/unpublish", post(unpublish_post))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationStatusUpdate {
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct NewAuthorRequest {
    pub user_id: UserId,
    pub display_name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub notes: Option<String>,
}

/// GET /api/admin/careers
pub async fn list_careers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Career>>> {
    let careers = CareerRepository::new(state.pool()).list(false, page).await?;
    Ok(Json(careers))
}

/// POST /api/admin/careers
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create_career(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewCareer>,
) -> Result<(StatusCode, Json<Career>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let slug = unique_slug(
        state.pool(),
        SlugTable::Career,
        &Slug::from_title(&body.title)?,
    )
    .await?;
    let career = CareerRepository::new(state.pool())
        .create(&slug, &body)
        .await?;
    tracing::info!(career_id = %career.id, slug = %career.slug, "career opening created");
    Ok((StatusCode::CREATED, Json(career)))
}

/// PATCH /api/admin/careers/{id}
///
/// The slug is kept when the title changes so shared links keep working.
pub async fn update_career(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CareerId>,
    Json(body): Json<CareerUpdate>,
) -> Result<Json<Career>> {
    let blank = [
        &body.title,
        &body.department,
        &body.location,
        &body.employment_type,
        &body.description,
    ]
    .into_iter()
    .flatten()
    .any(|v| v.trim().is_empty());
    if blank {
        return Err(AppError::BadRequest("fields cannot be empty".to_owned()));
    }
    let career = CareerRepository::new(state.pool()).update(id, &body).await?;
    Ok(Json(career))
}

/// DELETE /api/admin/careers/{id}
///
/// Applications for the opening are deleted with it.
pub async fn delete_career(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CareerId>,
) -> Result<StatusCode> {
    CareerRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/career-applications
pub async fn list_applications(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Page<CareerApplication>>> {
    let applications = CareerApplicationRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(applications))
}

/// PATCH /api/admin/career-applications/{id}
pub async fn update_application(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CareerApplicationId>,
    Json(body): Json<ApplicationStatusUpdate>,
) -> Result<Json<CareerApplication>> {
    let application = CareerApplicationRepository::new(state.pool())
        .set_status(id, body.status)
        .await?;
    Ok(Json(application))
}

/// GET /api/admin/authors
pub async fn list_authors(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Author>>> {
    let authors = AuthorRepository::new(state.pool()).list(page).await?;
    Ok(Json(authors))
}

/// POST /api/admin/authors
///
/// Promotes the user to the author role.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, user_id = %body.user_id))]
pub async fn create_author(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewAuthorRequest>,
) -> Result<(StatusCode, Json<Author>)> {
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::BadRequest("display_name is required".to_owned()));
    }
    grant_role(&state, body.user_id, UserRole::Author).await?;
    let author = AuthorRepository::new(state.pool())
        .create(body.user_id, display_name, body.bio.as_deref())
        .await?;
    tracing::info!(author_id = %author.id, "author created");
    Ok((StatusCode::CREATED, Json(author)))
}

/// GET /api/admin/blog-posts
///
/// Filter with `status=pending_review` for the review queue.
pub async fn list_posts(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Page<BlogPostSummary>>> {
    let posts = BlogPostRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(posts))
}

/// POST /api/admin/blog-posts/{id}/publish
pub async fn publish_post(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BlogPostId>,
) -> Result<Json<BlogPost>> {
    let post = BlogService::new(state.pool())
        .review(id, ReviewDecision::Publish, None)
        .await?;
    Ok(Json(post))
}

/// POST /api/admin/blog-posts/{id}/reject
pub async fn reject_post(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BlogPostId>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<BlogPost>> {
    let notes = body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let post = BlogService::new(state.pool())
        .review(id, ReviewDecision::Reject, notes)
        .await?;
    Ok(Json(post))
}

/// POST /api/admin/blog-posts/{id}/unpublish
pub async fn unpublish_post(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BlogPostId>,
) -> Result<Json<BlogPost>> {
    let post = BlogService::new(state.pool()).unpublish(id).await?;
    Ok(Json(post))
}
