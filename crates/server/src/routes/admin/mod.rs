//! Admin API. Every route requires the `admin` role.
//!
//! # Route Structure
//!
//! ```text
//! GET    /dashboard                         - Counts and revenue
//! GET    /users                             - List users (role, is_active, q)
//! POST   /users                             - Create a staff account
//! GET    /users/{id}                        - User detail
//! PATCH  /users/{id}                        - Update name, role, active flag
//! GET    /vendors                           - List vendors (status)
//! POST   /vendors                           - Create a vendor for a user
//! GET    /vendors/{id}                      - Vendor detail
//! PATCH  /vendors/{id}                      - Update status, commission
//! GET    /categories                        - List categories
//! POST   /categories                        - Create category
//! PATCH  /categories/{id}                   - Rename or re-parent
//! DELETE /categories/{id}                   - Delete category
//! GET    /products                          - List products (status, vendor_id, category)
//! POST   /products                          - Create marketplace product
//! GET    /products/{id}                     - Product detail
//! PATCH  /products/{id}                     - Update product
//! DELETE /products/{id}                     - Archive product
//! GET    /orders                            - List orders (status, payment_status, franchise_id, q)
//! GET    /orders/{id}                       - Order with items
//! PATCH  /orders/{id}/status                - Move order through its lifecycle
//! PATCH  /orders/{id}/franchise             - Assign or clear franchise
//! GET    /coupons                           - List coupons
//! POST   /coupons                           - Create coupon
//! PATCH  /coupons/{id}                      - Update coupon
//! DELETE /coupons/{id}                      - Delete coupon
//! POST   /notifications                     - Send to a user or broadcast to a role
//! GET    /franchises                        - List franchises
//! POST   /franchises                        - Create franchise for a user
//! PATCH  /franchises/{id}                   - Update franchise
//! GET    /franchise-applications            - List enquiries (status)
//! PATCH  /franchise-applications/{id}       - Update status and notes
//! GET    /careers                           - List openings (open and closed)
//! POST   /careers                           - Create opening
//! PATCH  /careers/{id}                      - Update opening
//! DELETE /careers/{id}                      - Delete opening
//! GET    /career-applications               - List applications (career_id, status)
//! PATCH  /career-applications/{id}          - Update status
//! GET    /authors                           - List authors
//! POST   /authors                           - Create author for a user
//! GET    /blog-posts                        - List posts (status, author, q)
//! POST   /blog-posts/{id}/publish           - Approve and publish
//! POST   /blog-posts/{id}/reject            - Reject with notes
//! POST   /blog-posts/{id}/unpublish         - Take a live post down
//! ```

pub mod catalog;
pub mod content;
pub mod marketing;
pub mod orders;
pub mod partners;
pub mod users;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Deserializer};

use haat_core::{UserId, UserRole};

use crate::db::stats::DashboardStats;
use crate::db::{StatsRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::state::AppState;

/// Build the `/api/admin` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .merge(users::router())
        .merge(catalog::router())
        .merge(orders::router())
        .merge(marketing::router())
        .merge(partners::router())
        .merge(content::router())
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    let stats = StatsRepository::new(state.pool()).dashboard().await?;
    Ok(Json(stats))
}

/// Give a user the role a new vendor, franchise or author profile needs.
///
/// Customers are promoted. A user who already holds `role` is left alone.
/// Any other staff role is a conflict: one account, one portal.
async fn grant_role(state: &AppState, user_id: UserId, role: UserRole) -> Result<User> {
    let users = UserRepository::new(state.pool());
    let user = users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;

    if user.role == role {
        return Ok(user);
    }
    if user.role != UserRole::Customer {
        return Err(AppError::Conflict(format!(
            "user already has the {} role",
            user.role
        )));
    }
    users.set_role(user.id, role).await?;
    tracing::info!(user_id = %user.id, role = %role, "role granted");
    Ok(User { role, ..user })
}

/// Deserialize a field where `null` and absence mean different things:
/// absent is `None`, `null` is `Some(None)`.
fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use haat_core::CategoryId;
    use serde::Deserialize;

    use super::double_option;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "double_option")]
        parent_id: Option<Option<CategoryId>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);

        let cleared: Body = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));

        let set: Body = serde_json::from_str(r#"{"parent_id": 4}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(CategoryId::new(4))));
    }
}
