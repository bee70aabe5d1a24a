//! Vendor repository.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use haat_core::{Page, PageRequest, Slug, UserId, VendorId, VendorStatus};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Vendor;

const VENDOR_COLUMNS: &str =
    "id, user_id, business_name, slug, gst_number, status, commission_rate, created_at, updated_at";

/// Fields a vendor may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorProfileUpdate {
    pub business_name: Option<String>,
    pub gst_number: Option<String>,
}

/// Repository for vendors.
pub struct VendorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VendorRepository<'a> {
    /// Create a new vendor repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a vendor by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let sql = format!("SELECT {VENDOR_COLUMNS} FROM haat.vendor WHERE id = $1");
        let vendor = sqlx::query_as::<_, Vendor>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(vendor)
    }

    /// Get the vendor owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let sql = format!("SELECT {VENDOR_COLUMNS} FROM haat.vendor WHERE user_id = $1");
        let vendor = sqlx::query_as::<_, Vendor>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(vendor)
    }

    /// List vendors, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<VendorStatus>,
        page: PageRequest,
    ) -> Result<Page<Vendor>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM haat.vendor WHERE ($1::haat.vendor_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;
        let sql = format!(
            r"
            SELECT {VENDOR_COLUMNS} FROM haat.vendor
            WHERE ($1::haat.vendor_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let vendors = sqlx::query_as::<_, Vendor>(&sql)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(vendors, page, total))
    }

    /// Create a vendor profile for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a vendor.
    pub async fn create(
        &self,
        user_id: UserId,
        business_name: &str,
        slug: &Slug,
        gst_number: Option<&str>,
        commission_rate: Decimal,
    ) -> Result<Vendor, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.vendor (user_id, business_name, slug, gst_number, commission_rate)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VENDOR_COLUMNS}
            "
        );
        let vendor = sqlx::query_as::<_, Vendor>(&sql)
            .bind(user_id)
            .bind(business_name)
            .bind(slug)
            .bind(gst_number)
            .bind(commission_rate)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("user already has a vendor profile"))?;
        Ok(vendor)
    }

    /// Admin update of status and commission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor does not exist.
    pub async fn update_admin(
        &self,
        id: VendorId,
        status: Option<VendorStatus>,
        commission_rate: Option<Decimal>,
    ) -> Result<Vendor, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.vendor SET
                status = COALESCE($2, status),
                commission_rate = COALESCE($3, commission_rate),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "
        );
        sqlx::query_as::<_, Vendor>(&sql)
            .bind(id)
            .bind(status)
            .bind(commission_rate)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Vendor self-service profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor does not exist.
    pub async fn update_profile(
        &self,
        id: VendorId,
        update: &VendorProfileUpdate,
    ) -> Result<Vendor, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.vendor SET
                business_name = COALESCE($2, business_name),
                gst_number = COALESCE($3, gst_number),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "
        );
        sqlx::query_as::<_, Vendor>(&sql)
            .bind(id)
            .bind(update.business_name.as_deref().map(str::trim))
            .bind(update.gst_number.as_deref().map(str::trim))
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
