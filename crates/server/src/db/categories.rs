//! Category repository.

use sqlx::PgPool;

use haat_core::{CategoryId, Slug};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, name, slug, parent_id, created_at";

/// Repository for catalog categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM haat.category ORDER BY name");
        let rows = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM haat.category WHERE slug = $1");
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &Slug,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            "INSERT INTO haat.category (name, slug, parent_id) VALUES ($1, $2, $3) RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(slug)
            .bind(parent_id)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("category slug already exists"))?;
        Ok(row)
    }

    /// Insert a category unless one with the same slug exists.
    ///
    /// Returns `true` if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_if_missing(
        &self,
        name: &str,
        slug: &Slug,
        parent_id: Option<CategoryId>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO haat.category (name, slug, parent_id) VALUES ($1, $2, $3) ON CONFLICT (slug) DO NOTHING",
        )
        .bind(name)
        .bind(slug)
        .bind(parent_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Rename or re-parent a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if a category would become its own parent.
    pub async fn update(
        &self,
        id: CategoryId,
        name: Option<&str>,
        parent_id: Option<Option<CategoryId>>,
    ) -> Result<Category, RepositoryError> {
        if parent_id == Some(Some(id)) {
            return Err(RepositoryError::Conflict(
                "a category cannot be its own parent".to_owned(),
            ));
        }
        let sql = format!(
            r"
            UPDATE haat.category SET
                name = COALESCE($2, name),
                parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(name)
            .bind(parent_id.is_some())
            .bind(parent_id.flatten())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Products and children keep existing with no category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM haat.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
