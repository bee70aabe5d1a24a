//! Notification repository.

use sqlx::PgPool;

use haat_core::{NotificationId, Page, PageRequest, UserId, UserRole};

use super::RepositoryError;
use crate::models::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, link, read_at, created_at";

/// Repository for in-app notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM haat.notification WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(self.pool)
        .await?;
        let sql = format!(
            r"
            SELECT {NOTIFICATION_COLUMNS} FROM haat.notification
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(rows, page, total))
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM haat.notification WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Send a notification to one user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> Result<Notification, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.notification (user_id, title, body, link)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(title)
            .bind(body)
            .bind(link)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Send a notification to every active user with `role`.
    ///
    /// Returns the number of recipients.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn broadcast(
        &self,
        role: UserRole,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO haat.notification (user_id, title, body, link)
            SELECT id, $2, $3, $4 FROM haat.user WHERE role = $1 AND is_active
            ",
        )
        .bind(role)
        .bind(title)
        .bind(body)
        .bind(link)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark one of the user's notifications read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not belong to the user.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.notification SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Mark everything read. Returns how many were unread.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE haat.notification SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
