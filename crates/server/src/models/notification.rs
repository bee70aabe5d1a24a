//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{NotificationId, UserId};

/// A message shown in a user's notification tray.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    /// Client-side route to open, e.g. `/orders/42`.
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
