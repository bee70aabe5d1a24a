//! Catalog writes and the cached category tree.
//!
//! Every storefront page asks for the category list, and it changes only
//! when an admin edits it, so it is held in a `moka` cache for 5 minutes and
//! dropped on every category mutation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};

use haat_core::{CategoryId, ProductId, Slug, SlugError, VendorId};

use crate::db::categories::CategoryRepository;
use crate::db::products::{NewProduct, ProductUpdate};
use crate::db::{ProductRepository, RepositoryError, SlugTable, unique_slug};
use crate::models::{Category, Product};

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Category list cache.
#[derive(Clone)]
pub struct CategoryCache {
    cache: Cache<(), Arc<Vec<Category>>>,
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    /// Cache with a custom time-to-live.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// All categories, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if loading fails.
    pub async fn list(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(categories) = self.cache.get(&()).await {
            debug!("Category cache hit");
            return Ok(categories);
        }
        debug!("Category cache miss");
        let categories = Arc::new(CategoryRepository::new(pool).list().await?);
        self.cache.insert((), Arc::clone(&categories)).await;
        Ok(categories)
    }

    /// Drop the cached list.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

/// Errors from catalog writes.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(String),

    #[error("invalid name: {0}")]
    Slug(#[from] SlugError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Category and product writes shared by the admin API and the vendor portal.
///
/// `vendor_id` scopes product writes to one vendor's products; `None` is the
/// admin view over the whole catalog.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    categories: &'a CategoryCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, categories: &'a CategoryCache) -> Self {
        Self { pool, categories }
    }

    /// Create a category with a slug derived from its name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Slug` if the name has no usable characters.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, CatalogError> {
        let name = name.trim();
        let slug = unique_slug(self.pool, SlugTable::Category, &Slug::from_title(name)?).await?;
        let category = CategoryRepository::new(self.pool)
            .create(name, &slug, parent_id)
            .await?;
        self.categories.invalidate().await;
        Ok(category)
    }

    /// Rename or re-parent a category. The slug is kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for an empty name.
    pub async fn update_category(
        &self,
        id: CategoryId,
        name: Option<&str>,
        parent_id: Option<Option<CategoryId>>,
    ) -> Result<Category, CatalogError> {
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(CatalogError::Invalid("name cannot be empty".to_owned()));
        }
        let category = CategoryRepository::new(self.pool)
            .update(id, name, parent_id)
            .await?;
        self.categories.invalidate().await;
        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` with `NotFound` for unknown IDs.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), CatalogError> {
        CategoryRepository::new(self.pool).delete(id).await?;
        self.categories.invalidate().await;
        Ok(())
    }

    /// Create a product with a unique slug derived from its name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if the input fails validation.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        vendor_id: Option<VendorId>,
        input: &NewProduct,
    ) -> Result<Product, CatalogError> {
        input.validate().map_err(CatalogError::Invalid)?;
        let base = Slug::from_title(&input.name)?;
        let slug = unique_slug(self.pool, SlugTable::Product, &base).await?;
        let product = ProductRepository::new(self.pool)
            .create(vendor_id, &slug, input)
            .await?;
        tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    /// Apply a partial product update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if the update fails validation.
    pub async fn update_product(
        &self,
        id: ProductId,
        vendor_id: Option<VendorId>,
        update: &ProductUpdate,
    ) -> Result<Product, CatalogError> {
        update.validate().map_err(CatalogError::Invalid)?;
        let product = ProductRepository::new(self.pool)
            .update(id, vendor_id, update)
            .await?;
        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use haat_core::{CategoryId, Slug};

    use super::*;

    fn category(id: i32, name: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: name.to_owned(),
            slug: Slug::from_title(name).unwrap(),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_invalidate_drops_cached_list() {
        let cache = CategoryCache::new();
        assert!(cache.cache.get(&()).await.is_none());

        let categories = vec![category(1, "Home Decor"), category(2, "Textiles")];
        cache.cache.insert((), Arc::new(categories)).await;
        let cached = cache.cache.get(&()).await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[1].slug.as_str(), "textiles");

        cache.invalidate().await;
        assert!(cache.cache.get(&()).await.is_none());
    }
}
