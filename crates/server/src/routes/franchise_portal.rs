//! Franchise portal: orders assigned to the operator's outlet.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{FranchiseStatus, OrderId, OrderStatus, Page, PageRequest};

use crate::db::orders::OrderFilter;
use crate::db::stats::FranchiseStats;
use crate::db::{FranchiseRepository, OrderRepository, StatsRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireFranchise;
use crate::models::{CurrentUser, Franchise, Order, OrderDetail};
use crate::services::orders::{OrderScope, OrderService};
use crate::state::AppState;

/// Build the `/api/franchise-portal` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(show_profile))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(show_order))
        .route("/orders/{id}/status", patch(update_status))
        .route("/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct FranchiseOrderQuery {
    pub status: Option<OrderStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

async fn franchise_for(state: &AppState, user: &CurrentUser) -> Result<Franchise> {
    FranchiseRepository::new(state.pool())
        .get_by_user(user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No franchise outlet for this account".to_owned()))
}

async fn active_franchise(state: &AppState, user: &CurrentUser) -> Result<Franchise> {
    let franchise = franchise_for(state, user).await?;
    if franchise.status != FranchiseStatus::Active {
        return Err(AppError::Forbidden("Franchise outlet is inactive".to_owned()));
    }
    Ok(franchise)
}

/// GET /api/franchise-portal/profile
pub async fn show_profile(
    State(state): State<AppState>,
    RequireFranchise(user): RequireFranchise,
) -> Result<Json<Franchise>> {
    franchise_for(&state, &user).await.map(Json)
}

/// GET /api/franchise-portal/orders
pub async fn list_orders(
    State(state): State<AppState>,
    RequireFranchise(user): RequireFranchise,
    Query(page): Query<PageRequest>,
    Query(query): Query<FranchiseOrderQuery>,
) -> Result<Json<Page<Order>>> {
    let franchise = active_franchise(&state, &user).await?;
    let filter = OrderFilter {
        status: query.status,
        payment_status: None,
        franchise_id: Some(franchise.id),
        q: query.q,
    };
    let orders = OrderRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(orders))
}

/// GET /api/franchise-portal/orders/{id}
pub async fn show_order(
    State(state): State<AppState>,
    RequireFranchise(user): RequireFranchise,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let franchise = active_franchise(&state, &user).await?;
    OrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .filter(|detail| detail.order.franchise_id == Some(franchise.id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// PATCH /api/franchise-portal/orders/{id}/status
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireFranchise(user): RequireFranchise,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let franchise = active_franchise(&state, &user).await?;
    let order = OrderService::new(state.pool())
        .update_status(OrderScope::Franchise(franchise.id), id, body.status)
        .await?;
    Ok(Json(order))
}

/// GET /api/franchise-portal/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireFranchise(user): RequireFranchise,
) -> Result<Json<FranchiseStats>> {
    let franchise = active_franchise(&state, &user).await?;
    let stats = StatsRepository::new(state.pool())
        .franchise(franchise.id)
        .await?;
    Ok(Json(stats))
}
