//! Blog authoring and moderation.
//!
//! Authors write markdown; the HTML is rendered once on every write and
//! stored next to the source. Posts go `draft -> pending_review` by the
//! author, then `published` or `rejected` by an admin.

use chrono::Utc;
use comrak::{Options, markdown_to_html};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use haat_core::{AuthorId, BlogPostId, BlogPostStatus, Slug, SlugError, TransitionError};

use crate::db::blog::{AuthorRepository, BlogPostRepository, PostContent};
use crate::db::notifications::NotificationRepository;
use crate::db::{RepositoryError, SlugTable, unique_slug};
use crate::models::BlogPost;

const MAX_TITLE_LEN: usize = 200;
const MAX_EXCERPT_LEN: usize = 500;

/// Errors from blog operations.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("post not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid title: {0}")]
    Slug(#[from] SlugError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Post body accepted from authors.
#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub body_markdown: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

impl PostInput {
    /// Check lengths and required fields.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title is required".to_owned());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("title must be at most {MAX_TITLE_LEN} characters"));
        }
        if self
            .excerpt
            .as_deref()
            .is_some_and(|e| e.chars().count() > MAX_EXCERPT_LEN)
        {
            return Err(format!("excerpt must be at most {MAX_EXCERPT_LEN} characters"));
        }
        if self.body_markdown.trim().is_empty() {
            return Err("body_markdown is required".to_owned());
        }
        Ok(())
    }
}

/// Moderator decision on a post in review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Publish,
    Reject,
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
///
/// Raw HTML in the source is escaped, not passed through.
#[must_use]
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    options.render.escape = true;

    markdown_to_html(markdown, &options)
}

/// Blog service.
pub struct BlogService<'a> {
    pool: &'a PgPool,
    authors: AuthorRepository<'a>,
    posts: BlogPostRepository<'a>,
    notifications: NotificationRepository<'a>,
}

impl<'a> BlogService<'a> {
    /// Create a new blog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            authors: AuthorRepository::new(pool),
            posts: BlogPostRepository::new(pool),
            notifications: NotificationRepository::new(pool),
        }
    }

    /// Create a draft with a slug derived from the title.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::InvalidInput` for missing or oversized fields.
    #[tracing::instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_post(
        &self,
        author_id: AuthorId,
        input: &PostInput,
    ) -> Result<BlogPost, BlogError> {
        input.validate().map_err(BlogError::InvalidInput)?;
        let base = Slug::from_title(&input.title)?;
        let slug = unique_slug(self.pool, SlugTable::BlogPost, &base).await?;
        let html = render_markdown(&input.body_markdown);
        let post = self
            .posts
            .create(author_id, &slug, &content(input, &html))
            .await?;
        tracing::info!(post_id = %post.id, slug = %post.slug, "Draft created");
        Ok(post)
    }

    /// Replace a draft's content. The slug is kept so links stay valid.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::NotFound` if the post is not the author's and
    /// `BlogError::Repository` with a conflict if it is in review or live.
    pub async fn update_post(
        &self,
        author_id: AuthorId,
        post_id: BlogPostId,
        input: &PostInput,
    ) -> Result<BlogPost, BlogError> {
        input.validate().map_err(BlogError::InvalidInput)?;
        self.owned_post(author_id, post_id).await?;
        let html = render_markdown(&input.body_markdown);
        let post = self
            .posts
            .update_content(post_id, &content(input, &html))
            .await?;
        Ok(post)
    }

    /// Send a draft for review.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::Transition` unless the post is a draft or rejected.
    pub async fn submit(&self, author_id: AuthorId, post_id: BlogPostId) -> Result<BlogPost, BlogError> {
        let post = self.owned_post(author_id, post_id).await?;
        let to = post.status.transition_to(BlogPostStatus::PendingReview)?;
        let post = self
            .posts
            .set_status(post.id, post.status, to, None, Utc::now())
            .await?;
        tracing::info!(post_id = %post.id, "Post submitted for review");
        Ok(post)
    }

    /// Delete an unpublished post.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::NotFound` if the post is not the author's.
    pub async fn delete_draft(&self, author_id: AuthorId, post_id: BlogPostId) -> Result<(), BlogError> {
        self.owned_post(author_id, post_id).await?;
        self.posts.delete_draft(post_id).await?;
        Ok(())
    }

    /// Publish or reject a post in review, and tell the author.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::Transition` unless the post is pending review.
    #[tracing::instrument(skip(self, notes))]
    pub async fn review(
        &self,
        post_id: BlogPostId,
        decision: ReviewDecision,
        notes: Option<&str>,
    ) -> Result<BlogPost, BlogError> {
        let post = self.posts.get(post_id).await?.ok_or(BlogError::NotFound)?;
        let to = match decision {
            ReviewDecision::Publish => BlogPostStatus::Published,
            ReviewDecision::Reject => BlogPostStatus::Rejected,
        };
        post.status.transition_to(to)?;
        let post = self
            .posts
            .set_status(post.id, post.status, to, notes, Utc::now())
            .await?;
        tracing::info!(post_id = %post.id, status = %post.status, "Post reviewed");

        if let Some(author) = self.authors.get(post.author_id).await? {
            let (title, body) = match decision {
                ReviewDecision::Publish => ("Post published", format!("\"{}\" is now live.", post.title)),
                ReviewDecision::Reject => (
                    "Post needs changes",
                    format!("\"{}\" was not approved. Check the review notes.", post.title),
                ),
            };
            let link = format!("/author/posts/{}", post.id);
            if let Err(e) = self
                .notifications
                .create(author.user_id, title, &body, Some(&link))
                .await
            {
                tracing::warn!(error = %e, "Failed to notify author");
            }
        }
        Ok(post)
    }

    /// Take a published post back to draft.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::Transition` unless the post is published.
    pub async fn unpublish(&self, post_id: BlogPostId) -> Result<BlogPost, BlogError> {
        let post = self.posts.get(post_id).await?.ok_or(BlogError::NotFound)?;
        let to = post.status.transition_to(BlogPostStatus::Draft)?;
        let post = self
            .posts
            .set_status(post.id, post.status, to, None, Utc::now())
            .await?;
        Ok(post)
    }

    async fn owned_post(&self, author_id: AuthorId, post_id: BlogPostId) -> Result<BlogPost, BlogError> {
        self.posts
            .get(post_id)
            .await?
            .filter(|p| p.author_id == author_id)
            .ok_or(BlogError::NotFound)
    }
}

fn content<'b>(input: &'b PostInput, html: &'b str) -> PostContent<'b> {
    PostContent {
        title: input.title.trim(),
        excerpt: input.excerpt.as_deref().map(str::trim).filter(|e| !e.is_empty()),
        body_markdown: &input.body_markdown,
        body_html: html,
        cover_image_url: input.cover_image_url.as_deref().filter(|u| !u.is_empty()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(title: &str, body: &str) -> PostInput {
        PostInput {
            title: title.to_owned(),
            excerpt: None,
            body_markdown: body.to_owned(),
            cover_image_url: None,
        }
    }

    #[test]
    fn test_render_gfm() {
        let html = render_markdown("# Block Printing\n\n~~old~~ and **bold**\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_escapes_raw_html() {
        let html = render_markdown("Hello <script>alert(1)</script>\n\n<iframe src=\"x\"></iframe>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<iframe"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_input_validation() {
        assert!(input("Indigo dyeing in Bagru", "Some text").validate().is_ok());
        assert_eq!(input("   ", "x").validate().unwrap_err(), "title is required");
        assert_eq!(
            input("Title", "  \n").validate().unwrap_err(),
            "body_markdown is required"
        );
        assert!(input(&"t".repeat(201), "x").validate().is_err());

        let mut long_excerpt = input("Title", "x");
        long_excerpt.excerpt = Some("e".repeat(501));
        assert!(long_excerpt.validate().is_err());
    }

    #[test]
    fn test_content_trims_optional_fields() {
        let mut post = input("  Kantha Stitch  ", "body");
        post.excerpt = Some("   ".to_owned());
        post.cover_image_url = Some(String::new());
        let c = content(&post, "<p>body</p>");
        assert_eq!(c.title, "Kantha Stitch");
        assert!(c.excerpt.is_none());
        assert!(c.cover_image_url.is_none());
    }

    #[test]
    fn test_review_decision_parses() {
        let d: ReviewDecision = serde_json::from_str("\"publish\"").unwrap();
        assert_eq!(d, ReviewDecision::Publish);
    }
}
