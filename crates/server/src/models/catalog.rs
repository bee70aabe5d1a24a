//! Catalog models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use haat_core::{CategoryId, ProductId, ProductStatus, Slug, VendorId};

/// A product category. Categories nest one level through `parent_id`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    /// `None` for products sold by the marketplace itself.
    pub vendor_id: Option<VendorId>,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    /// Struck-through "MRP" shown next to the price.
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub image_urls: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether customers can add the product to a cart.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active && self.stock > 0
    }
}
