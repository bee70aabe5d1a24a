//! Vendor portal: a seller's own profile, products, orders and numbers.
//!
//! Every route needs the vendor role. Apart from reading the profile, the
//! vendor account must also be approved by an admin.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{
    FulfillmentStatus, OrderItemId, Page, PageRequest, ProductId, VendorStatus,
};

use crate::db::products::{NewProduct, ProductFilter, ProductUpdate};
use crate::db::stats::VendorStats;
use crate::db::vendors::VendorProfileUpdate;
use crate::db::{OrderRepository, ProductRepository, StatsRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireVendor;
use crate::models::{CurrentUser, OrderDetail, OrderItem, Product, Vendor};
use crate::models::vendor::is_valid_gstin;
use crate::services::catalog::CatalogService;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Build the `/api/vendor-portal` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(show_profile).patch(update_profile))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(show_product)
                .patch(update_product)
                .delete(archive_product),
        )
        .route("/orders", get(list_orders))
        .route("/orders/items/{item_id}", patch(update_item))
        .route("/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct VendorOrderQuery {
    pub fulfillment_status: Option<FulfillmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentUpdate {
    pub fulfillment_status: FulfillmentStatus,
}

async fn vendor_for(state: &AppState, user: &CurrentUser) -> Result<Vendor> {
    VendorRepository::new(state.pool())
        .get_by_user(user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No vendor profile for this account".to_owned()))
}

async fn approved_vendor(state: &AppState, user: &CurrentUser) -> Result<Vendor> {
    let vendor = vendor_for(state, user).await?;
    if vendor.status != VendorStatus::Approved {
        return Err(AppError::Forbidden(format!(
            "Vendor account is {}",
            vendor.status
        )));
    }
    Ok(vendor)
}

/// GET /api/vendor-portal/profile
///
/// Readable while the account is pending or suspended so the vendor can see
/// its status.
pub async fn show_profile(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
) -> Result<Json<Vendor>> {
    vendor_for(&state, &user).await.map(Json)
}

/// PATCH /api/vendor-portal/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Json(body): Json<VendorProfileUpdate>,
) -> Result<Json<Vendor>> {
    let vendor = approved_vendor(&state, &user).await?;
    if body
        .business_name
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("business_name cannot be empty".to_owned()));
    }
    if let Some(gst) = body.gst_number.as_deref()
        && !is_valid_gstin(gst.trim())
    {
        return Err(AppError::BadRequest("invalid GST number".to_owned()));
    }
    let vendor = VendorRepository::new(state.pool())
        .update_profile(vendor.id, &body)
        .await?;
    Ok(Json(vendor))
}

/// GET /api/vendor-portal/products
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_products(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Query(page): Query<PageRequest>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>> {
    let vendor = approved_vendor(&state, &user).await?;
    filter.vendor_id = Some(vendor.id);
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// POST /api/vendor-portal/products
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let vendor = approved_vendor(&state, &user).await?;
    let product = CatalogService::new(state.pool(), state.categories())
        .create_product(Some(vendor.id), &body)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/vendor-portal/products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let vendor = approved_vendor(&state, &user).await?;
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| p.vendor_id == Some(vendor.id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// PATCH /api/vendor-portal/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    let vendor = approved_vendor(&state, &user).await?;
    let product = CatalogService::new(state.pool(), state.categories())
        .update_product(id, Some(vendor.id), &body)
        .await?;
    Ok(Json(product))
}

/// DELETE /api/vendor-portal/products/{id}
///
/// Archives the product. It stays on past orders.
pub async fn archive_product(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let vendor = approved_vendor(&state, &user).await?;
    ProductRepository::new(state.pool())
        .archive(id, Some(vendor.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/vendor-portal/orders
///
/// Orders containing this vendor's items, with other vendors' items left out.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Query(page): Query<PageRequest>,
    Query(query): Query<VendorOrderQuery>,
) -> Result<Json<Page<OrderDetail>>> {
    let vendor = approved_vendor(&state, &user).await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_vendor(vendor.id, query.fulfillment_status, page)
        .await?;
    Ok(Json(orders))
}

/// PATCH /api/vendor-portal/orders/items/{item_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
    Path(item_id): Path<OrderItemId>,
    Json(body): Json<FulfillmentUpdate>,
) -> Result<Json<OrderItem>> {
    let vendor = approved_vendor(&state, &user).await?;
    let item = OrderService::new(state.pool())
        .update_item_fulfillment(vendor.id, item_id, body.fulfillment_status)
        .await?;
    Ok(Json(item))
}

/// GET /api/vendor-portal/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireVendor(user): RequireVendor,
) -> Result<Json<VendorStats>> {
    let vendor = approved_vendor(&state, &user).await?;
    let stats = StatsRepository::new(state.pool()).vendor(vendor.id).await?;
    Ok(Json(stats))
}
