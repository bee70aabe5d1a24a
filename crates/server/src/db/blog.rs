//! Author and blog post repositories.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use haat_core::{AuthorId, BlogPostId, BlogPostStatus, Page, PageRequest, Slug, UserId};

use super::{RepositoryError, conflict_on_unique, like_pattern};
use crate::models::{Author, BlogPost, BlogPostSummary};

const AUTHOR_COLUMNS: &str = "id, user_id, display_name, bio, avatar_url, created_at";

const POST_COLUMNS: &str = "id, author_id, title, slug, excerpt, body_markdown, body_html, \
     cover_image_url, status, review_notes, published_at, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT p.id, p.author_id, a.display_name AS author_name, p.title, \
     p.slug, p.excerpt, p.cover_image_url, p.status, p.published_at \
     FROM haat.blog_post p JOIN haat.author a ON a.id = p.author_id WHERE TRUE";

/// Blog listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    /// Author ID.
    pub author: Option<AuthorId>,
    pub status: Option<BlogPostStatus>,
    /// Case-insensitive match on title and excerpt.
    pub q: Option<String>,
}

/// Author profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Rendered post content ready to store.
#[derive(Debug, Clone)]
pub struct PostContent<'a> {
    pub title: &'a str,
    pub excerpt: Option<&'a str>,
    pub body_markdown: &'a str,
    pub body_html: &'a str,
    pub cover_image_url: Option<&'a str>,
}

/// Repository for blog authors.
pub struct AuthorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthorRepository<'a> {
    /// Create a new author repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an author by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AuthorId) -> Result<Option<Author>, RepositoryError> {
        let sql = format!("SELECT {AUTHOR_COLUMNS} FROM haat.author WHERE id = $1");
        let author = sqlx::query_as::<_, Author>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(author)
    }

    /// Get the author profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Author>, RepositoryError> {
        let sql = format!("SELECT {AUTHOR_COLUMNS} FROM haat.author WHERE user_id = $1");
        let author = sqlx::query_as::<_, Author>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(author)
    }

    /// List authors by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: PageRequest) -> Result<Page<Author>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM haat.author")
            .fetch_one(self.pool)
            .await?;
        let sql = format!(
            "SELECT {AUTHOR_COLUMNS} FROM haat.author ORDER BY display_name, id LIMIT $1 OFFSET $2"
        );
        let authors = sqlx::query_as::<_, Author>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(authors, page, total))
    }

    /// Create an author profile for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a profile.
    pub async fn create(
        &self,
        user_id: UserId,
        display_name: &str,
        bio: Option<&str>,
    ) -> Result<Author, RepositoryError> {
        let sql = format!(
            "INSERT INTO haat.author (user_id, display_name, bio) VALUES ($1, $2, $3) RETURNING {AUTHOR_COLUMNS}"
        );
        let author = sqlx::query_as::<_, Author>(&sql)
            .bind(user_id)
            .bind(display_name)
            .bind(bio)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("user already has an author profile"))?;
        Ok(author)
    }

    /// Author self-service profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the author does not exist.
    pub async fn update_profile(
        &self,
        id: AuthorId,
        update: &AuthorProfileUpdate,
    ) -> Result<Author, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.author SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url)
            WHERE id = $1
            RETURNING {AUTHOR_COLUMNS}
            "
        );
        sqlx::query_as::<_, Author>(&sql)
            .bind(id)
            .bind(update.display_name.as_deref().map(str::trim))
            .bind(update.bio.as_deref())
            .bind(update.avatar_url.as_deref())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

/// Repository for blog posts.
pub struct BlogPostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BlogPostRepository<'a> {
    /// Create a new blog post repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List post summaries, newest first. Published posts sort by publish date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<BlogPostSummary>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM haat.blog_post p WHERE TRUE",
        );
        push_post_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_post_filters(&mut query, filter);
        query
            .push(" ORDER BY COALESCE(p.published_at, p.updated_at) DESC, p.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let posts = query
            .build_query_as::<BlogPostSummary>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(posts, page, total))
    }

    /// Get a published post by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<BlogPost>, RepositoryError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM haat.blog_post WHERE slug = $1 AND status = 'published'"
        );
        let post = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(post)
    }

    /// Get any post by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BlogPostId) -> Result<Option<BlogPost>, RepositoryError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM haat.blog_post WHERE id = $1");
        let post = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(post)
    }

    /// Create a draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        author_id: AuthorId,
        slug: &Slug,
        content: &PostContent<'_>,
    ) -> Result<BlogPost, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.blog_post
                (author_id, title, slug, excerpt, body_markdown, body_html, cover_image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "
        );
        let post = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(author_id)
            .bind(content.title)
            .bind(slug)
            .bind(content.excerpt)
            .bind(content.body_markdown)
            .bind(content.body_html)
            .bind(content.cover_image_url)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("post slug already exists"))?;
        Ok(post)
    }

    /// Replace the content of an editable post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the post left an editable status.
    pub async fn update_content(
        &self,
        id: BlogPostId,
        content: &PostContent<'_>,
    ) -> Result<BlogPost, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.blog_post SET
                title = $2, excerpt = $3, body_markdown = $4, body_html = $5,
                cover_image_url = $6, updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'rejected')
            RETURNING {POST_COLUMNS}
            "
        );
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .bind(content.title)
            .bind(content.excerpt)
            .bind(content.body_markdown)
            .bind(content.body_html)
            .bind(content.cover_image_url)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("post is not editable".to_owned()))
    }

    /// Move a post from `from` to `to`, recording moderator notes.
    ///
    /// `published_at` is set the first time a post is published.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the post is no longer in `from`.
    pub async fn set_status(
        &self,
        id: BlogPostId,
        from: BlogPostStatus,
        to: BlogPostStatus,
        review_notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BlogPost, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.blog_post SET
                status = $3,
                review_notes = $4,
                published_at = CASE WHEN $3 = 'published' THEN COALESCE(published_at, $5)
                                    ELSE published_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {POST_COLUMNS}
            "
        );
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(review_notes)
            .bind(now)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("post was updated concurrently".to_owned()))
    }

    /// Delete a post that was never published.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the post is not a draft.
    pub async fn delete_draft(&self, id: BlogPostId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM haat.blog_post WHERE id = $1 AND status IN ('draft', 'rejected')",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "only drafts can be deleted".to_owned(),
            ));
        }
        Ok(())
    }
}

fn push_post_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    if let Some(author) = filter.author {
        query.push(" AND p.author_id = ").push_bind(author);
    }
    if let Some(status) = filter.status {
        query.push(" AND p.status = ").push_bind(status);
    }
    if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = like_pattern(q);
        query
            .push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.excerpt ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
