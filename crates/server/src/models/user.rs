//! User accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{Email, Phone, UserId, UserRole};

/// A marketplace account.
///
/// Customers are identified by phone, staff (admin, vendor, franchise,
/// author) by email.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
