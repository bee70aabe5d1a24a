//! Franchise and franchise application repositories.

use serde::Deserialize;
use sqlx::PgPool;

use haat_core::{
    ApplicationStatus, Email, FranchiseApplicationId, FranchiseId, FranchiseStatus, Page,
    PageRequest, Phone, UserId,
};

use super::services::require_text;
use super::{RepositoryError, conflict_on_unique};
use crate::models::{Franchise, FranchiseApplication};

const FRANCHISE_COLUMNS: &str =
    "id, user_id, name, city, state, address, status, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, name, email, phone, city, investment_capacity, message, \
     status, admin_notes, created_at, updated_at";

/// Fields for a new franchise outlet.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFranchise {
    pub user_id: UserId,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
}

impl NewFranchise {
    /// Check required text fields.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&[
            ("name", self.name.as_str()),
            ("city", self.city.as_str()),
            ("state", self.state.as_str()),
            ("address", self.address.as_str()),
        ])
    }
}

/// Partial franchise update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FranchiseUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub status: Option<FranchiseStatus>,
}

/// A public franchise enquiry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFranchiseApplication {
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub city: String,
    pub investment_capacity: Option<String>,
    pub message: Option<String>,
}

impl NewFranchiseApplication {
    /// Check required text fields.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&[("name", self.name.as_str()), ("city", self.city.as_str())])
    }
}

/// Repository for franchise outlets.
pub struct FranchiseRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FranchiseRepository<'a> {
    /// Create a new franchise repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a franchise by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: FranchiseId) -> Result<Option<Franchise>, RepositoryError> {
        let sql = format!("SELECT {FRANCHISE_COLUMNS} FROM haat.franchise WHERE id = $1");
        let row = sqlx::query_as::<_, Franchise>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Get the franchise run by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Franchise>, RepositoryError> {
        let sql = format!("SELECT {FRANCHISE_COLUMNS} FROM haat.franchise WHERE user_id = $1");
        let row = sqlx::query_as::<_, Franchise>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// List franchises by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: PageRequest) -> Result<Page<Franchise>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM haat.franchise")
            .fetch_one(self.pool)
            .await?;
        let sql = format!(
            "SELECT {FRANCHISE_COLUMNS} FROM haat.franchise ORDER BY name, id LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, Franchise>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(rows, page, total))
    }

    /// Create a franchise for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already runs a franchise.
    pub async fn create(&self, input: &NewFranchise) -> Result<Franchise, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.franchise (user_id, name, city, state, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FRANCHISE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, Franchise>(&sql)
            .bind(input.user_id)
            .bind(input.name.trim())
            .bind(input.city.trim())
            .bind(input.state.trim())
            .bind(input.address.trim())
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("user already runs a franchise"))?;
        Ok(row)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the franchise does not exist.
    pub async fn update(
        &self,
        id: FranchiseId,
        update: &FranchiseUpdate,
    ) -> Result<Franchise, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.franchise SET
                name = COALESCE($2, name),
                city = COALESCE($3, city),
                state = COALESCE($4, state),
                address = COALESCE($5, address),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FRANCHISE_COLUMNS}
            "
        );
        sqlx::query_as::<_, Franchise>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.city.as_deref())
            .bind(update.state.as_deref())
            .bind(update.address.as_deref())
            .bind(update.status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

/// Repository for franchise enquiries.
pub struct FranchiseApplicationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FranchiseApplicationRepository<'a> {
    /// Create a new franchise application repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store an enquiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        input: &NewFranchiseApplication,
    ) -> Result<FranchiseApplication, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.franchise_application
                (name, email, phone, city, investment_capacity, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {APPLICATION_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, FranchiseApplication>(&sql)
            .bind(input.name.trim())
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.city.trim())
            .bind(input.investment_capacity.as_deref())
            .bind(input.message.as_deref())
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// List enquiries, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<FranchiseApplication>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM haat.franchise_application WHERE ($1::haat.application_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;
        let sql = format!(
            r"
            SELECT {APPLICATION_COLUMNS} FROM haat.franchise_application
            WHERE ($1::haat.application_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let rows = sqlx::query_as::<_, FranchiseApplication>(&sql)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(rows, page, total))
    }

    /// Update review status and notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist.
    pub async fn update(
        &self,
        id: FranchiseApplicationId,
        status: Option<ApplicationStatus>,
        admin_notes: Option<&str>,
    ) -> Result<FranchiseApplication, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.franchise_application SET
                status = COALESCE($2, status),
                admin_notes = COALESCE($3, admin_notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {APPLICATION_COLUMNS}
            "
        );
        sqlx::query_as::<_, FranchiseApplication>(&sql)
            .bind(id)
            .bind(status)
            .bind(admin_notes)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
