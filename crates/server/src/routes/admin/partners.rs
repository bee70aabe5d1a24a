//! Vendor, franchise and franchise enquiry administration.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use haat_core::{
    ApplicationStatus, FranchiseApplicationId, FranchiseId, Page, PageRequest, Slug, UserId,
    UserRole, VendorId, VendorStatus,
};

use super::grant_role;
use crate::db::franchises::{FranchiseUpdate, NewFranchise};
use crate::db::{
    FranchiseApplicationRepository, FranchiseRepository, NotificationRepository, SlugTable,
    VendorRepository, unique_slug,
};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::vendor::is_valid_gstin;
use crate::models::{Franchise, FranchiseApplication, Vendor};
use crate::state::AppState;

/// Commission charged when an admin does not set one.
const DEFAULT_COMMISSION_RATE: Decimal = Decimal::TEN;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(list_vendors).post(create_vendor))
        .route("/vendors/{id}", get(show_vendor).patch(update_vendor))
        .route("/franchises", get(list_franchises).post(create_franchise))
        .route("/franchises/{id}", patch(update_franchise))
        .route("/franchise-applications", get(list_applications))
        .route("/franchise-applications/{id}", patch(update_application))
}

#[derive(Debug, Default, Deserialize)]
pub struct VendorQuery {
    pub status: Option<VendorStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NewVendorRequest {
    pub user_id: UserId,
    pub business_name: String,
    pub gst_number: Option<String>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VendorAdminUpdate {
    pub status: Option<VendorStatus>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationReview {
    pub status: Option<ApplicationStatus>,
    pub admin_notes: Option<String>,
}

fn check_commission(rate: Option<Decimal>) -> Result<()> {
    if rate.is_some_and(|r| r.is_sign_negative() || r > Decimal::ONE_HUNDRED) {
        return Err(AppError::BadRequest(
            "commission_rate must be between 0 and 100".to_owned(),
        ));
    }
    Ok(())
}

fn check_gstin(gst_number: Option<&str>) -> Result<Option<&str>> {
    match gst_number.map(str::trim).filter(|g| !g.is_empty()) {
        Some(gstin) if !is_valid_gstin(gstin) => {
            Err(AppError::BadRequest("invalid GST number".to_owned()))
        }
        other => Ok(other),
    }
}

/// GET /api/admin/vendors
pub async fn list_vendors(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(query): Query<VendorQuery>,
) -> Result<Json<Page<Vendor>>> {
    let vendors = VendorRepository::new(state.pool())
        .list(query.status, page)
        .await?;
    Ok(Json(vendors))
}

/// POST /api/admin/vendors
///
/// Promotes the user to the vendor role. New vendors start `pending`.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, user_id = %body.user_id))]
pub async fn create_vendor(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewVendorRequest>,
) -> Result<(StatusCode, Json<Vendor>)> {
    let business_name = body.business_name.trim();
    if business_name.is_empty() {
        return Err(AppError::BadRequest("business_name is required".to_owned()));
    }
    let gst_number = check_gstin(body.gst_number.as_deref())?;
    check_commission(body.commission_rate)?;

    let slug = unique_slug(
        state.pool(),
        SlugTable::Vendor,
        &Slug::from_title(business_name)?,
    )
    .await?;
    grant_role(&state, body.user_id, UserRole::Vendor).await?;

    let vendor = VendorRepository::new(state.pool())
        .create(
            body.user_id,
            business_name,
            &slug,
            gst_number,
            body.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE),
        )
        .await?;
    tracing::info!(vendor_id = %vendor.id, "vendor created");
    Ok((StatusCode::CREATED, Json(vendor)))
}

/// GET /api/admin/vendors/{id}
pub async fn show_vendor(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<VendorId>,
) -> Result<Json<Vendor>> {
    VendorRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("vendor {id}")))
}

/// PATCH /api/admin/vendors/{id}
///
/// The vendor is notified when their status changes.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update_vendor(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<VendorId>,
    Json(body): Json<VendorAdminUpdate>,
) -> Result<Json<Vendor>> {
    check_commission(body.commission_rate)?;
    let vendors = VendorRepository::new(state.pool());
    let before = vendors
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vendor {id}")))?;
    let vendor = vendors
        .update_admin(id, body.status, body.commission_rate)
        .await?;

    if vendor.status != before.status {
        tracing::info!(vendor_id = %vendor.id, from = %before.status, to = %vendor.status, "vendor status changed");
        let message = format!("Your vendor account is now {}.", vendor.status);
        if let Err(e) = NotificationRepository::new(state.pool())
            .create(vendor.user_id, "Vendor account updated", &message, None)
            .await
        {
            tracing::warn!(error = %e, "failed to notify vendor");
        }
    }
    Ok(Json(vendor))
}

/// GET /api/admin/franchises
pub async fn list_franchises(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Franchise>>> {
    let franchises = FranchiseRepository::new(state.pool()).list(page).await?;
    Ok(Json(franchises))
}

/// POST /api/admin/franchises
///
/// Promotes the user to the franchise role.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, user_id = %body.user_id))]
pub async fn create_franchise(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewFranchise>,
) -> Result<(StatusCode, Json<Franchise>)> {
    body.validate().map_err(AppError::BadRequest)?;
    grant_role(&state, body.user_id, UserRole::Franchise).await?;
    let franchise = FranchiseRepository::new(state.pool()).create(&body).await?;
    tracing::info!(franchise_id = %franchise.id, "franchise created");
    Ok((StatusCode::CREATED, Json(franchise)))
}

/// PATCH /api/admin/franchises/{id}
pub async fn update_franchise(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FranchiseId>,
    Json(body): Json<FranchiseUpdate>,
) -> Result<Json<Franchise>> {
    let blank = [&body.name, &body.city, &body.state, &body.address]
        .into_iter()
        .flatten()
        .any(|v| v.trim().is_empty());
    if blank {
        return Err(AppError::BadRequest("fields cannot be empty".to_owned()));
    }
    let franchise = FranchiseRepository::new(state.pool())
        .update(id, &body)
        .await?;
    Ok(Json(franchise))
}

/// GET /api/admin/franchise-applications
pub async fn list_applications(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(query): Query<ApplicationQuery>,
) -> Result<Json<Page<FranchiseApplication>>> {
    let applications = FranchiseApplicationRepository::new(state.pool())
        .list(query.status, page)
        .await?;
    Ok(Json(applications))
}

/// PATCH /api/admin/franchise-applications/{id}
pub async fn update_application(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FranchiseApplicationId>,
    Json(body): Json<ApplicationReview>,
) -> Result<Json<FranchiseApplication>> {
    let application = FranchiseApplicationRepository::new(state.pool())
        .update(id, body.status, body.admin_notes.as_deref())
        .await?;
    Ok(Json(application))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_commission_range() {
        assert!(check_commission(None).is_ok());
        assert!(check_commission(Some(Decimal::ZERO)).is_ok());
        assert!(check_commission(Some(Decimal::ONE_HUNDRED)).is_ok());
        assert!(check_commission(Some(Decimal::NEGATIVE_ONE)).is_err());
        assert!(check_commission(Some(Decimal::new(1005, 1))).is_err());
    }

    #[test]
    fn test_check_gstin_treats_blank_as_absent() {
        assert_eq!(check_gstin(Some("  ")).unwrap(), None);
        assert_eq!(check_gstin(None).unwrap(), None);
        assert_eq!(
            check_gstin(Some(" 29ABCDE1234F1Z5 ")).unwrap(),
            Some("29ABCDE1234F1Z5")
        );
        assert!(check_gstin(Some("not-a-gstin")).is_err());
    }
}
