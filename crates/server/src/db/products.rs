//! Product repository.
//!
//! Listing queries are assembled with `QueryBuilder` because every filter is
//! optional. The storefront only ever sees `active` products; admin and vendor
//! listings pass an explicit status filter (or none).

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use haat_core::{CategoryId, Page, PageRequest, ProductId, ProductStatus, Slug, VendorId};

use super::{RepositoryError, conflict_on_unique, like_pattern};
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "p.id, p.vendor_id, p.category_id, p.name, p.slug, p.description, \
     p.price, p.compare_at_price, p.stock, p.image_urls, p.status, p.created_at, p.updated_at";

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY p.price ASC, p.id ASC",
            Self::PriceDesc => " ORDER BY p.price DESC, p.id DESC",
            Self::Name => " ORDER BY p.name ASC, p.id ASC",
        }
    }
}

/// Product list filters, shared by the storefront, admin and vendor portal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    pub category_id: Option<CategoryId>,
    pub vendor_id: Option<VendorId>,
    pub status: Option<ProductStatus>,
    /// Case-insensitive match on name and description.
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// Fields for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "default_new_status")]
    pub status: ProductStatus,
}

const fn default_new_status() -> ProductStatus {
    ProductStatus::Draft
}

impl NewProduct {
    /// Check amounts and stock.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        validate_amounts(Some(self.price), self.compare_at_price, Some(self.stock))
    }
}

/// Partial product update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image_urls: Option<Vec<String>>,
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Check amounts and stock.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name cannot be empty".to_owned());
        }
        validate_amounts(self.price, self.compare_at_price, self.stock)
    }
}

fn validate_amounts(
    price: Option<Decimal>,
    compare_at_price: Option<Decimal>,
    stock: Option<i32>,
) -> Result<(), String> {
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err("price cannot be negative".to_owned());
    }
    if compare_at_price.is_some_and(|p| p.is_sign_negative()) {
        return Err("compare_at_price cannot be negative".to_owned());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("stock cannot be negative".to_owned());
    }
    Ok(())
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM haat.product p LEFT JOIN haat.category c ON c.id = p.category_id WHERE TRUE",
        );
        push_product_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM haat.product p LEFT JOIN haat.category c ON c.id = p.category_id WHERE TRUE"
        ));
        push_product_filters(&mut query, filter);
        query
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let products = query.build_query_as::<Product>().fetch_all(self.pool).await?;

        Ok(Page::new(products, page, total))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM haat.product p WHERE p.slug = $1 AND p.status = 'active'"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Get any product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM haat.product p WHERE p.id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Create a product, optionally owned by a vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        vendor_id: Option<VendorId>,
        slug: &Slug,
        input: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO haat.product AS p
                (vendor_id, category_id, name, slug, description, price,
                 compare_at_price, stock, image_urls, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(vendor_id)
            .bind(input.category_id)
            .bind(input.name.trim())
            .bind(slug)
            .bind(&input.description)
            .bind(input.price)
            .bind(input.compare_at_price)
            .bind(input.stock)
            .bind(&input.image_urls)
            .bind(input.status)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique("product slug already exists"))?;
        Ok(product)
    }

    /// Apply a partial update. With `vendor_id` set, only that vendor's
    /// products match.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no matching product exists.
    pub async fn update(
        &self,
        id: ProductId,
        vendor_id: Option<VendorId>,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.product AS p SET
                name = COALESCE($3, p.name),
                category_id = COALESCE($4, p.category_id),
                description = COALESCE($5, p.description),
                price = COALESCE($6, p.price),
                compare_at_price = COALESCE($7, p.compare_at_price),
                stock = COALESCE($8, p.stock),
                image_urls = COALESCE($9, p.image_urls),
                status = COALESCE($10, p.status),
                updated_at = NOW()
            WHERE p.id = $1 AND ($2::INTEGER IS NULL OR p.vendor_id = $2)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(vendor_id)
            .bind(update.name.as_deref().map(str::trim))
            .bind(update.category_id)
            .bind(update.description.as_deref())
            .bind(update.price)
            .bind(update.compare_at_price)
            .bind(update.stock)
            .bind(update.image_urls.as_deref())
            .bind(update.status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Archive a product so it leaves the storefront but stays on past orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no matching product exists.
    pub async fn archive(
        &self,
        id: ProductId,
        vendor_id: Option<VendorId>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE haat.product SET status = 'archived', updated_at = NOW()
            WHERE id = $1 AND ($2::INTEGER IS NULL OR vendor_id = $2)
            ",
        )
        .bind(id)
        .bind(vendor_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

fn push_product_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(slug) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        query
            .push(" AND (c.slug = ")
            .push_bind(slug.to_owned())
            .push(" OR c.parent_id = (SELECT id FROM haat.category WHERE slug = ")
            .push_bind(slug.to_owned())
            .push("))");
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND p.category_id = ").push_bind(category_id);
    }
    if let Some(vendor_id) = filter.vendor_id {
        query.push(" AND p.vendor_id = ").push_bind(vendor_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND p.status = ").push_bind(status);
    }
    if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = like_pattern(q);
        query
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filter.min_price {
        query.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND p.price <= ").push_bind(max);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_query_string() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"category":"sarees","min_price":"100","sort":"price_desc"}"#)
                .unwrap();
        assert_eq!(filter.category.as_deref(), Some("sarees"));
        assert_eq!(filter.min_price, Some(Decimal::ONE_HUNDRED));
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_new_product_validation() {
        let mut input: NewProduct =
            serde_json::from_str(r#"{"name":"Brass Diya","price":"349.00","stock":12}"#).unwrap();
        assert_eq!(input.status, ProductStatus::Draft);
        assert!(input.validate().is_ok());

        input.stock = -1;
        assert_eq!(input.validate().unwrap_err(), "stock cannot be negative");

        input.stock = 1;
        input.name = "  ".to_owned();
        assert_eq!(input.validate().unwrap_err(), "name is required");
    }
}
