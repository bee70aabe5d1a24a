//! Franchises and franchise applications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{
    ApplicationStatus, Email, FranchiseApplicationId, FranchiseId, FranchiseStatus, Phone, UserId,
};

/// A franchise outlet that fulfils orders assigned to it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Franchise {
    pub id: FranchiseId,
    pub user_id: UserId,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub status: FranchiseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A public "become a franchise partner" enquiry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FranchiseApplication {
    pub id: FranchiseApplicationId,
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub city: String,
    pub investment_capacity: Option<String>,
    pub message: Option<String>,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
