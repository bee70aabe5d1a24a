//! Category and product administration.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{CategoryId, Page, PageRequest, ProductId};

use super::double_option;
use crate::db::categories::CategoryRepository;
use crate::db::products::{NewProduct, ProductFilter, ProductUpdate};
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, Product};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            patch(update_category).delete(delete_category),
        )
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(show_product)
                .patch(update_product)
                .delete(archive_product),
        )
}

#[derive(Debug, Deserialize)]
pub struct NewCategoryRequest {
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryUpdateRequest {
    pub name: Option<String>,
    /// `null` moves the category to the top level.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<CategoryId>>,
}

/// GET /api/admin/categories
///
/// Read from the database, not the storefront cache.
pub async fn list_categories(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(categories))
}

/// POST /api/admin/categories
#[instrument(skip(state, _admin))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<NewCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = CatalogService::new(state.pool(), state.categories())
        .create_category(&body.name, body.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PATCH /api/admin/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryUpdateRequest>,
) -> Result<Json<Category>> {
    let category = CatalogService::new(state.pool(), state.categories())
        .update_category(id, body.name.as_deref(), body.parent_id)
        .await?;
    Ok(Json(category))
}

/// DELETE /api/admin/categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CatalogService::new(state.pool(), state.categories())
        .delete_category(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/products
///
/// Every product in every status unless filtered.
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// POST /api/admin/products
///
/// Products created here are sold by the marketplace itself.
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.pool(), state.categories())
        .create_product(None, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/admin/products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// PATCH /api/admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    let product = CatalogService::new(state.pool(), state.categories())
        .update_product(id, None, &body)
        .await?;
    Ok(Json(product))
}

/// DELETE /api/admin/products/{id}
pub async fn archive_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).archive(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}
