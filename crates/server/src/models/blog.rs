//! Blog authors and posts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{AuthorId, BlogPostId, BlogPostStatus, Slug, UserId};

/// Public author profile, owned by a user with the author role.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Author {
    pub id: AuthorId,
    pub user_id: UserId,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A full blog post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub author_id: AuthorId,
    pub title: String,
    pub slug: Slug,
    pub excerpt: Option<String>,
    pub body_markdown: String,
    /// `body_markdown` rendered at write time.
    pub body_html: String,
    pub cover_image_url: Option<String>,
    pub status: BlogPostStatus,
    /// Moderator feedback when a post is rejected.
    pub review_notes: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row for blog indexes.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPostSummary {
    pub id: BlogPostId,
    pub author_id: AuthorId,
    pub author_name: String,
    pub title: String,
    pub slug: Slug,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    pub status: BlogPostStatus,
    pub published_at: Option<DateTime<Utc>>,
}
