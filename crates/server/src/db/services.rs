//! Career and career application repositories.

use serde::Deserialize;
use sqlx::PgPool;

use haat_core::{
    ApplicationStatus, CareerApplicationId, CareerId, Email, Page, PageRequest, Phone, Slug,
};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Career, CareerApplication};

const CAREER_COLUMNS: &str = "id, title, slug, department, location, employment_type, \
     description, is_open, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, career_id, name, email, phone, resume_url, cover_letter, \
     status, created_at, updated_at";

/// Fields for a new job opening.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCareer {
    pub title: String,
    pub department: String,
    pub location: String,
    pub employment_type: String,
    pub description: String,
    #[serde(default = "default_open")]
    pub is_open: bool,
}

const fn default_open() -> bool {
    true
}

impl NewCareer {
    /// Check required text fields.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&[
            ("title", self.title.as_str()),
            ("department", self.department.as_str()),
            ("location", self.location.as_str()),
            ("employment_type", self.employment_type.as_str()),
            ("description", self.description.as_str()),
        ])
    }
}

/// Partial job opening update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CareerUpdate {
    pub title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub description: Option<String>,
    pub is_open: Option<bool>,
}

/// A job application as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCareerApplication {
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}

impl NewCareerApplication {
    /// Check the applicant's name and the free-text lengths.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&[("name", self.name.as_str())])?;
        if self.cover_letter.as_ref().is_some_and(|c| c.len() > MAX_COVER_LETTER_LEN) {
            return Err("cover_letter is too long".to_owned());
        }
        Ok(())
    }
}

const MAX_COVER_LETTER_LEN: usize = 5000;

/// Fails on the first field that is blank after trimming.
pub(crate) fn require_text(fields: &[(&str, &str)]) -> Result<(), String> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(format!("{name} is required")),
        None => Ok(()),
    }
}

/// Admin application list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    pub career_id: Option<CareerId>,
    pub status: Option<ApplicationStatus>,
}

/// Repository for job openings.
pub struct CareerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CareerRepository<'a> {
    /// Create a new career repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List openings, newest first. With `open_only`, closed ones are hidden.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        open_only: bool,
        page: PageRequest,
    ) -> Result<Page<Career>, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM haat.career WHERE (NOT $1 OR is_open)")
                .bind(open_only)
                .fetch_one(self.pool)
                .await?;
        let sql = format!(
            r"
            SELECT {CAREER_COLUMNS} FROM haat.career
            WHERE (NOT $1 OR is_open)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let rows = sqlx::query_as::<_, Career>(&sql)
            .bind(open_only)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(rows, page, total))
    }

    /// Get an opening by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Career>, RepositoryError> {
        let sql = format!("SELECT {CAREER_COLUMNS} FROM haat.career WHERE slug = $1");
        let row = sqlx::query_as::<_, Career>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create an opening.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, slug: &Slug, input: &NewCareer) -> Result<Career, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.career
                (title, slug, department, location, employment_type, description, is_open)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CAREER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, Career>(&sql)
            .bind(input.title.trim())
            .bind(slug)
            .bind(input.department.trim())
            .bind(input.location.trim())
            .bind(input.employment_type.trim())
            .bind(&input.description)
            .bind(input.is_open)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("career slug already exists"))?;
        Ok(row)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the opening does not exist.
    pub async fn update(
        &self,
        id: CareerId,
        update: &CareerUpdate,
    ) -> Result<Career, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.career SET
                title = COALESCE($2, title),
                department = COALESCE($3, department),
                location = COALESCE($4, location),
                employment_type = COALESCE($5, employment_type),
                description = COALESCE($6, description),
                is_open = COALESCE($7, is_open),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CAREER_COLUMNS}
            "
        );
        sqlx::query_as::<_, Career>(&sql)
            .bind(id)
            .bind(update.title.as_deref())
            .bind(update.department.as_deref())
            .bind(update.location.as_deref())
            .bind(update.employment_type.as_deref())
            .bind(update.description.as_deref())
            .bind(update.is_open)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete an opening and its applications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the opening does not exist.
    pub async fn delete(&self, id: CareerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM haat.career WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Repository for job applications.
pub struct CareerApplicationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CareerApplicationRepository<'a> {
    /// Create a new career application repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store an application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if this email already applied to the opening.
    pub async fn create(
        &self,
        career_id: CareerId,
        input: &NewCareerApplication,
    ) -> Result<CareerApplication, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM haat.career_application WHERE career_id = $1 AND email = $2)",
        )
        .bind(career_id)
        .bind(&input.email)
        .fetch_one(self.pool)
        .await?;
        if exists {
            return Err(RepositoryError::Conflict(
                "you have already applied for this role".to_owned(),
            ));
        }

        let sql = format!(
            r"
            INSERT INTO haat.career_application
                (career_id, name, email, phone, resume_url, cover_letter)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {APPLICATION_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CareerApplication>(&sql)
            .bind(career_id)
            .bind(input.name.trim())
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.resume_url.as_deref())
            .bind(input.cover_letter.as_deref())
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// List applications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<CareerApplication>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM haat.career_application
            WHERE ($1::INTEGER IS NULL OR career_id = $1)
              AND ($2::haat.application_status IS NULL OR status = $2)
            ",
        )
        .bind(filter.career_id)
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;
        let sql = format!(
            r"
            SELECT {APPLICATION_COLUMNS} FROM haat.career_application
            WHERE ($1::INTEGER IS NULL OR career_id = $1)
              AND ($2::haat.application_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        );
        let rows = sqlx::query_as::<_, CareerApplication>(&sql)
            .bind(filter.career_id)
            .bind(filter.status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(rows, page, total))
    }

    /// Update review status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist.
    pub async fn set_status(
        &self,
        id: CareerApplicationId,
        status: ApplicationStatus,
    ) -> Result<CareerApplication, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.career_application SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {APPLICATION_COLUMNS}
            "
        );
        sqlx::query_as::<_, CareerApplication>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_names_first_blank_field() {
        assert!(require_text(&[("name", "Asha")]).is_ok());
        assert_eq!(
            require_text(&[("name", "Asha"), ("city", "  "), ("state", "")]).unwrap_err(),
            "city is required"
        );
    }

    #[test]
    fn test_career_application_validation() {
        let mut application: NewCareerApplication = serde_json::from_value(serde_json::json!({
            "name": "Ravi Kumar",
            "email": "ravi@example.in",
            "phone": "+91 98450 12345",
        }))
        .unwrap();
        assert!(application.validate().is_ok());

        application.cover_letter = Some("x".repeat(MAX_COVER_LETTER_LEN + 1));
        assert_eq!(application.validate().unwrap_err(), "cover_letter is too long");

        application.cover_letter = None;
        application.name = " ".to_owned();
        assert_eq!(application.validate().unwrap_err(), "name is required");
    }
}
