//! Order administration.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use haat_core::{FranchiseId, OrderId, OrderStatus, Page, PageRequest};

use crate::db::orders::OrderFilter;
use crate::db::{FranchiseRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderDetail};
use crate::services::orders::{OrderScope, OrderService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", patch(update_status))
        .route("/orders/{id}/franchise", patch(assign_franchise))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct FranchiseAssignment {
    /// `null` clears the assignment.
    pub franchise_id: Option<FranchiseId>,
}

/// GET /api/admin/orders
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Page<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(orders))
}

/// GET /api/admin/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    OrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// PATCH /api/admin/orders/{id}/status
///
/// Invalid transitions are rejected with 409. Cancelling restores stock.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .update_status(OrderScope::Admin, id, body.status)
        .await?;
    Ok(Json(order))
}

/// PATCH /api/admin/orders/{id}/franchise
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn assign_franchise(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<FranchiseAssignment>,
) -> Result<Json<Order>> {
    if let Some(franchise_id) = body.franchise_id {
        FranchiseRepository::new(state.pool())
            .get(franchise_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("unknown franchise {franchise_id}")))?;
    }
    let order = OrderRepository::new(state.pool())
        .assign_franchise(id, body.franchise_id)
        .await?;
    Ok(Json(order))
}
