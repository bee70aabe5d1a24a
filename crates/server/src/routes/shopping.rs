//! Storefront route handlers: catalog, cart, checkout and order history.
//!
//! Catalog reads are public. Everything under `/cart`, `/checkout` and
//! `/orders` belongs to the logged-in customer.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{OrderId, Page, PageRequest, ProductId, ProductStatus};

use crate::db::products::ProductFilter;
use crate::db::{OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{CartView, Category, Order, OrderDetail, Product};
use crate::services::cart::CartService;
use crate::services::checkout::{
    CheckoutRequest, CheckoutResponse, CheckoutService, VerifyPaymentRequest,
};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Build the `/api/shopping` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/{slug}", get(show_product))
        .route("/cart", get(show_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/{product_id}",
            patch(update_item).delete(remove_item),
        )
        .route("/cart/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/checkout", post(checkout))
        .route("/checkout/verify", post(verify_payment))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(show_order))
        .route("/orders/{id}/cancel", post(cancel_order))
}

// =============================================================================
// Catalog
// =============================================================================

/// GET /api/shopping/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.categories().list(state.pool()).await?;
    Ok(Json(categories.as_ref().clone()))
}

/// GET /api/shopping/products
///
/// Only active products are listed, whatever `status` the client sends.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>> {
    filter.status = Some(ProductStatus::Active);
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// GET /api/shopping/products/{slug}
pub async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
}

/// GET /api/shopping/cart
pub async fn show_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool()).view(user.id).await?;
    Ok(Json(cart))
}

/// POST /api/shopping/cart/items
///
/// Adds to the existing quantity when the product is already in the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .add_item(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// PATCH /api/shopping/cart/items/{product_id}
///
/// A quantity of zero removes the line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .set_quantity(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/shopping/cart/items/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .remove_item(user.id, product_id)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/shopping/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool()).clear(user.id).await?;
    Ok(Json(cart))
}

/// POST /api/shopping/cart/coupon
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CouponRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .apply_coupon(user.id, &body.code)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/shopping/cart/coupon
pub async fn remove_coupon(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool()).remove_coupon(user.id).await?;
    Ok(Json(cart))
}

// =============================================================================
// Checkout
// =============================================================================

/// POST /api/shopping/checkout
///
/// Turns the cart into an order. For online payment the response carries
/// the Razorpay order the client opens the payment sheet with.
#[instrument(skip(state, user, body), fields(user_id = %user.id, method = %body.payment_method))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let response = CheckoutService::new(
        state.pool(),
        state.razorpay(),
        state.sms(),
        &state.config().base_url,
    )
    .place_order(user.id, &body)
    .await?;
    Ok(Json(response))
}

/// POST /api/shopping/checkout/verify
///
/// Confirms a Razorpay payment from the signature the payment sheet returns.
#[instrument(skip(state, user, body), fields(user_id = %user.id, order_id = %body.order_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>> {
    let order = CheckoutService::new(
        state.pool(),
        state.razorpay(),
        state.sms(),
        &state.config().base_url,
    )
    .verify_payment(user.id, &body)
    .await?;
    Ok(Json(order))
}

// =============================================================================
// Orders
// =============================================================================

/// GET /api/shopping/orders
pub async fn list_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, page)
        .await?;
    Ok(Json(orders))
}

/// GET /api/shopping/orders/{id}
///
/// Other customers' orders are reported as not found.
pub async fn show_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    OrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .filter(|detail| detail.order.user_id == user.id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// POST /api/shopping/orders/{id}/cancel
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .cancel_for_customer(user.id, id)
        .await?;
    Ok(Json(order))
}
