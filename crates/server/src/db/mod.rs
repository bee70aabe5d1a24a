//! Database operations for the marketplace `PostgreSQL`.
//!
//! # Schema: `haat`
//!
//! ## Tables
//!
//! - `user`, `user_password` - Accounts; staff accounts carry an Argon2 hash
//! - `otp_code` - Hashed one-time login codes
//! - `category`, `product` - Catalog
//! - `cart`, `cart_item`, `coupon` - Shopping cart and discounts
//! - `order`, `order_item` - Orders with per-vendor fulfillment
//! - `vendor`, `franchise`, `franchise_application` - Partner accounts
//! - `author`, `blog_post` - Blog
//! - `career`, `career_application` - Job listings
//! - `notification` - In-app notifications
//!
//! Sessions live in `tower_sessions.session`, created by the session store.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p haat-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` models,
//! so the workspace builds without a live database.

pub mod blog;
pub mod carts;
pub mod categories;
pub mod coupons;
pub mod franchises;
pub mod notifications;
pub mod orders;
pub mod otp;
pub mod products;
pub mod services;
pub mod stats;
pub mod users;
pub mod vendors;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use haat_core::Slug;

pub use blog::{AuthorRepository, BlogPostRepository};
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use coupons::CouponRepository;
pub use franchises::{FranchiseApplicationRepository, FranchiseRepository};
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use otp::OtpRepository;
pub use products::ProductRepository;
pub use services::{CareerApplicationRepository, CareerRepository};
pub use stats::StatsRepository;
pub use users::UserRepository;
pub use vendors::VendorRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug, insufficient stock).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Tables with a unique `slug` column.
#[derive(Debug, Clone, Copy)]
pub enum SlugTable {
    Category,
    Product,
    Vendor,
    BlogPost,
    Career,
}

impl SlugTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Category => "haat.category",
            Self::Product => "haat.product",
            Self::Vendor => "haat.vendor",
            Self::BlogPost => "haat.blog_post",
            Self::Career => "haat.career",
        }
    }
}

/// Find a free slug in `table`, appending `-2`, `-3`, ... to `base` as needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn unique_slug(
    pool: &PgPool,
    table: SlugTable,
    base: &Slug,
) -> Result<Slug, RepositoryError> {
    let sql = format!(
        "SELECT slug FROM {} WHERE slug = $1 OR slug LIKE $1 || '-%'",
        table.table()
    );
    let taken: Vec<String> = sqlx::query_scalar(&sql)
        .bind(base.as_str())
        .fetch_all(pool)
        .await?;

    if !taken.iter().any(|s| s == base.as_str()) {
        return Ok(base.clone());
    }
    let mut n = 2;
    loop {
        let candidate = base.with_suffix(n);
        if !taken.iter().any(|s| s == candidate.as_str()) {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Escape `LIKE` wildcards in user input and wrap it for a substring match.
#[must_use]
pub fn like_pattern(q: &str) -> String {
    let escaped = q
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" saree "), "%saree%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
