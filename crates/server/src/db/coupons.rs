//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use haat_core::{CouponId, CouponKind, Page, PageRequest};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Coupon;

const COUPON_COLUMNS: &str = "id, code, description, kind, value, min_order_amount, max_discount, \
     usage_limit, used_count, starts_at, expires_at, is_active, created_at";

/// Fields for a new coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    pub kind: CouponKind,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewCoupon {
    /// Check the value range for the coupon kind and the validity window.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let code = self.code.trim();
        if code.is_empty() || code.len() > 32 {
            return Err("code must be 1 to 32 characters".to_owned());
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err("code may only contain letters, digits, '-' and '_'".to_owned());
        }
        if self.value <= Decimal::ZERO {
            return Err("value must be positive".to_owned());
        }
        if self.kind == CouponKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err("percentage cannot exceed 100".to_owned());
        }
        if self.min_order_amount.is_sign_negative() {
            return Err("min_order_amount cannot be negative".to_owned());
        }
        if self.usage_limit.is_some_and(|l| l <= 0) {
            return Err("usage_limit must be positive".to_owned());
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.expires_at)
            && end <= start
        {
            return Err("expires_at must be after starts_at".to_owned());
        }
        Ok(())
    }
}

/// Partial coupon update. The code and kind are fixed once created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponUpdate {
    pub description: Option<String>,
    pub value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponUpdate {
    /// Check the fields that can be checked without the stored coupon.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.value.is_some_and(|v| v <= Decimal::ZERO) {
            return Err("value must be positive".to_owned());
        }
        if self.min_order_amount.is_some_and(|m| m.is_sign_negative()) {
            return Err("min_order_amount cannot be negative".to_owned());
        }
        if self.max_discount.is_some_and(|m| m.is_sign_negative()) {
            return Err("max_discount cannot be negative".to_owned());
        }
        if self.usage_limit.is_some_and(|l| l <= 0) {
            return Err("usage_limit must be positive".to_owned());
        }
        Ok(())
    }
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM haat.coupon WHERE code = $1");
        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(Coupon::normalize_code(code))
            .fetch_optional(self.pool)
            .await?;
        Ok(coupon)
    }

    /// List coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: PageRequest) -> Result<Page<Coupon>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM haat.coupon")
            .fetch_one(self.pool)
            .await?;
        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM haat.coupon ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let coupons = sqlx::query_as::<_, Coupon>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(coupons, page, total))
    }

    /// Create a coupon. The code is stored upper-case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.coupon
                (code, description, kind, value, min_order_amount, max_discount,
                 usage_limit, starts_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COUPON_COLUMNS}
            "
        );
        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(Coupon::normalize_code(&input.code))
            .bind(input.description.as_deref())
            .bind(input.kind)
            .bind(input.value)
            .bind(input.min_order_amount)
            .bind(input.max_discount)
            .bind(input.usage_limit)
            .bind(input.starts_at)
            .bind(input.expires_at)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("coupon code already exists"))?;
        Ok(coupon)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist, or
    /// `RepositoryError::Conflict` if a percentage coupon would exceed 100.
    pub async fn update(
        &self,
        id: CouponId,
        update: &CouponUpdate,
    ) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.coupon SET
                description = COALESCE($2, description),
                value = COALESCE($3, value),
                min_order_amount = COALESCE($4, min_order_amount),
                max_discount = COALESCE($5, max_discount),
                usage_limit = COALESCE($6, usage_limit),
                starts_at = COALESCE($7, starts_at),
                expires_at = COALESCE($8, expires_at),
                is_active = COALESCE($9, is_active)
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        );
        sqlx::query_as::<_, Coupon>(&sql)
            .bind(id)
            .bind(update.description.as_deref())
            .bind(update.value)
            .bind(update.min_order_amount)
            .bind(update.max_discount)
            .bind(update.usage_limit)
            .bind(update.starts_at)
            .bind(update.expires_at)
            .bind(update.is_active)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
                    RepositoryError::Conflict("percentage cannot exceed 100".to_owned())
                }
                e => RepositoryError::Database(e),
            })?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep the code as text.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM haat.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn coupon(json: &str) -> NewCoupon {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_new_coupon_defaults() {
        let input = coupon(r#"{"code":"diwali10","kind":"percentage","value":"10"}"#);
        assert!(input.is_active);
        assert_eq!(input.min_order_amount, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_percentage_over_hundred_rejected() {
        let input = coupon(r#"{"code":"HALF","kind":"percentage","value":"150"}"#);
        assert_eq!(input.validate().unwrap_err(), "percentage cannot exceed 100");
    }

    #[test]
    fn test_code_characters() {
        let input = coupon(r#"{"code":"SAVE 50","kind":"flat","value":"50"}"#);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_window_must_be_ordered() {
        let input = coupon(
            r#"{"code":"X","kind":"flat","value":"5",
                "starts_at":"2026-05-02T00:00:00Z","expires_at":"2026-05-01T00:00:00Z"}"#,
        );
        assert_eq!(input.validate().unwrap_err(), "expires_at must be after starts_at");
    }
}
