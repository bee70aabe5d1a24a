//! One-time login codes.

use chrono::{DateTime, Utc};

use haat_core::{OtpCodeId, OtpPurpose, Phone};
use sqlx::PgPool;

use super::RepositoryError;

/// A stored code. Only the HMAC of the code is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub id: OtpCodeId,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Repository for OTP codes.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    /// Create a new OTP repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// When the most recent code for this phone and purpose was issued.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn last_issued_at(
        &self,
        phone: &Phone,
        purpose: OtpPurpose,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let at = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM haat.otp_code WHERE phone = $1 AND purpose = $2",
        )
        .bind(phone)
        .bind(purpose)
        .fetch_one(self.pool)
        .await?;
        Ok(at)
    }

    /// Store a new code, retiring any earlier unconsumed code for the same phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        phone: &Phone,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpCodeId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE haat.otp_code SET consumed_at = NOW()
            WHERE phone = $1 AND purpose = $2 AND consumed_at IS NULL
            ",
        )
        .bind(phone)
        .bind(purpose)
        .execute(&mut *tx)
        .await?;

        let id = sqlx::query_scalar(
            r"
            INSERT INTO haat.otp_code (phone, purpose, code_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(phone)
        .bind(purpose)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// The newest unconsumed, unexpired code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_active(
        &self,
        phone: &Phone,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r"
            SELECT id, code_hash, attempts, expires_at, created_at
            FROM haat.otp_code
            WHERE phone = $1 AND purpose = $2
              AND consumed_at IS NULL AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(phone)
        .bind(purpose)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Count one guess against a live code and return the new attempt count.
    ///
    /// Returns `None` once the code has used up `max_attempts`, or was
    /// consumed or expired meanwhile. Concurrent guesses each take their own
    /// attempt, so no more than `max_attempts` are ever checked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn take_attempt(
        &self,
        id: OtpCodeId,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let attempts = sqlx::query_scalar(
            r"
            UPDATE haat.otp_code SET attempts = attempts + 1
            WHERE id = $1 AND attempts < $2
              AND consumed_at IS NULL AND expires_at > NOW()
            RETURNING attempts
            ",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(attempts)
    }

    /// Mark a code used. Returns `false` if another request consumed it
    /// first or it has gone over `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(&self, id: OtpCodeId, max_attempts: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE haat.otp_code SET consumed_at = NOW()
            WHERE id = $1 AND consumed_at IS NULL AND attempts <= $2
            ",
        )
        .bind(id)
        .bind(max_attempts)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
