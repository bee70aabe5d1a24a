//! Public blog route handlers.
//!
//! Only published posts are visible here. Drafts and posts under review are
//! reachable through the author portal and the admin API.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Serialize;
use tracing::instrument;

use haat_core::{AuthorId, BlogPostStatus, Page, PageRequest};

use crate::db::blog::PostFilter;
use crate::db::{AuthorRepository, BlogPostRepository};
use crate::error::{AppError, Result};
use crate::models::{Author, BlogPost, BlogPostSummary};
use crate::state::AppState;

/// Build the `/api/blog` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{slug}", get(show_post))
        .route("/authors/{id}", get(show_author))
}

/// A post with its byline.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author: Option<Author>,
}

/// An author with the first page of their published posts.
#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    #[serde(flatten)]
    pub author: Author,
    pub posts: Page<BlogPostSummary>,
}

/// GET /api/blog/posts
#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(mut filter): Query<PostFilter>,
) -> Result<Json<Page<BlogPostSummary>>> {
    filter.status = Some(BlogPostStatus::Published);
    let posts = BlogPostRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(posts))
}

/// GET /api/blog/posts/{slug}
pub async fn show_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostResponse>> {
    let post = BlogPostRepository::new(state.pool())
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {slug}")))?;
    let author = AuthorRepository::new(state.pool())
        .get(post.author_id)
        .await?;
    Ok(Json(PostResponse { post, author }))
}

/// GET /api/blog/authors/{id}
pub async fn show_author(
    State(state): State<AppState>,
    Path(id): Path<AuthorId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<AuthorResponse>> {
    let author = AuthorRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("author {id}")))?;
    let filter = PostFilter {
        author: Some(id),
        status: Some(BlogPostStatus::Published),
        q: None,
    };
    let posts = BlogPostRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(AuthorResponse { author, posts }))
}
