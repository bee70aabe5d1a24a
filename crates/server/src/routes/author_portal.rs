//! Author portal: profile and post drafting.
//!
//! Authors never publish directly. Submitting moves a post into the admin
//! review queue.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{BlogPostId, BlogPostStatus, Page, PageRequest};

use crate::db::blog::{AuthorProfileUpdate, PostFilter};
use crate::db::{AuthorRepository, BlogPostRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuthor;
use crate::models::{Author, BlogPost, BlogPostSummary, CurrentUser};
use crate::services::blog::{BlogService, PostInput};
use crate::state::AppState;

/// Build the `/api/author-portal` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(show_profile).patch(update_profile))
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(show_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/{id}/submit", post(submit_post))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorPostQuery {
    pub status: Option<BlogPostStatus>,
    pub q: Option<String>,
}

async fn author_for(state: &AppState, user: &CurrentUser) -> Result<Author> {
    AuthorRepository::new(state.pool())
        .get_by_user(user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No author profile for this account".to_owned()))
}

/// GET /api/author-portal/profile
pub async fn show_profile(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
) -> Result<Json<Author>> {
    author_for(&state, &user).await.map(Json)
}

/// PATCH /api/author-portal/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Json(body): Json<AuthorProfileUpdate>,
) -> Result<Json<Author>> {
    let author = author_for(&state, &user).await?;
    if body
        .display_name
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("display_name cannot be empty".to_owned()));
    }
    let author = AuthorRepository::new(state.pool())
        .update_profile(author.id, &body)
        .await?;
    Ok(Json(author))
}

/// GET /api/author-portal/posts
///
/// All of the author's posts, in every status.
pub async fn list_posts(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Query(page): Query<PageRequest>,
    Query(query): Query<AuthorPostQuery>,
) -> Result<Json<Page<BlogPostSummary>>> {
    let author = author_for(&state, &user).await?;
    let filter = PostFilter {
        author: Some(author.id),
        status: query.status,
        q: query.q,
    };
    let posts = BlogPostRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(posts))
}

/// POST /api/author-portal/posts
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Json(body): Json<PostInput>,
) -> Result<(StatusCode, Json<BlogPost>)> {
    let author = author_for(&state, &user).await?;
    let post = BlogService::new(state.pool())
        .create_post(author.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/author-portal/posts/{id}
pub async fn show_post(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Path(id): Path<BlogPostId>,
) -> Result<Json<BlogPost>> {
    let author = author_for(&state, &user).await?;
    BlogPostRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|post| post.author_id == author.id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("post {id}")))
}

/// PATCH /api/author-portal/posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Path(id): Path<BlogPostId>,
    Json(body): Json<PostInput>,
) -> Result<Json<BlogPost>> {
    let author = author_for(&state, &user).await?;
    let post = BlogService::new(state.pool())
        .update_post(author.id, id, &body)
        .await?;
    Ok(Json(post))
}

/// POST /api/author-portal/posts/{id}/submit
pub async fn submit_post(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Path(id): Path<BlogPostId>,
) -> Result<Json<BlogPost>> {
    let author = author_for(&state, &user).await?;
    let post = BlogService::new(state.pool()).submit(author.id, id).await?;
    Ok(Json(post))
}

/// DELETE /api/author-portal/posts/{id}
///
/// Only unpublished posts can be deleted.
pub async fn delete_post(
    State(state): State<AppState>,
    RequireAuthor(user): RequireAuthor,
    Path(id): Path<BlogPostId>,
) -> Result<StatusCode> {
    let author = author_for(&state, &user).await?;
    BlogService::new(state.pool())
        .delete_draft(author.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
