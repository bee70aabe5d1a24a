//! Dashboard aggregates for the admin, vendor and franchise portals.
//!
//! Revenue only counts orders that are not cancelled and whose payment is
//! captured (online) or still due on delivery (COD).

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use haat_core::{FranchiseId, VendorId};

use super::RepositoryError;

/// Admin dashboard numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub total_customers: i64,
    pub total_vendors: i64,
    pub pending_vendors: i64,
    pub active_products: i64,
    pub total_orders: i64,
    pub orders_today: i64,
    pub pending_orders: i64,
    pub revenue: Decimal,
    pub revenue_last_30_days: Decimal,
    pub open_franchise_applications: i64,
    pub posts_pending_review: i64,
}

/// Vendor portal numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VendorStats {
    pub total_products: i64,
    pub active_products: i64,
    pub out_of_stock_products: i64,
    pub pending_items: i64,
    pub units_sold: i64,
    pub gross_sales: Decimal,
    /// Gross sales minus the marketplace commission.
    pub net_earnings: Decimal,
}

/// Franchise portal numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FranchiseStats {
    pub total_orders: i64,
    pub open_orders: i64,
    pub delivered_orders: i64,
    pub revenue: Decimal,
}

const COUNTED_ORDER: &str = "o.status <> 'cancelled' \
     AND (o.payment_status = 'paid' OR (o.payment_method = 'cod' AND o.status <> 'pending_payment'))";

/// Repository for aggregate queries.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Marketplace-wide numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let sql = format!(
            r"
            SELECT
                (SELECT COUNT(*) FROM haat.user WHERE role = 'customer') AS total_customers,
                (SELECT COUNT(*) FROM haat.vendor) AS total_vendors,
                (SELECT COUNT(*) FROM haat.vendor WHERE status = 'pending') AS pending_vendors,
                (SELECT COUNT(*) FROM haat.product WHERE status = 'active') AS active_products,
                (SELECT COUNT(*) FROM haat.order) AS total_orders,
                (SELECT COUNT(*) FROM haat.order WHERE created_at >= date_trunc('day', NOW())) AS orders_today,
                (SELECT COUNT(*) FROM haat.order WHERE status IN ('placed', 'processing')) AS pending_orders,
                (SELECT COALESCE(SUM(o.total), 0) FROM haat.order o WHERE {COUNTED_ORDER}) AS revenue,
                (SELECT COALESCE(SUM(o.total), 0) FROM haat.order o
                 WHERE {COUNTED_ORDER} AND o.created_at >= NOW() - INTERVAL '30 days') AS revenue_last_30_days,
                (SELECT COUNT(*) FROM haat.franchise_application
                 WHERE status IN ('new', 'reviewing')) AS open_franchise_applications,
                (SELECT COUNT(*) FROM haat.blog_post WHERE status = 'pending_review') AS posts_pending_review
            "
        );
        let stats = sqlx::query_as::<_, DashboardStats>(&sql)
            .fetch_one(self.pool)
            .await?;
        Ok(stats)
    }

    /// Numbers for one vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn vendor(&self, vendor_id: VendorId) -> Result<VendorStats, RepositoryError> {
        let sql = format!(
            r"
            SELECT
                (SELECT COUNT(*) FROM haat.product WHERE vendor_id = $1
                   AND status <> 'archived') AS total_products,
                (SELECT COUNT(*) FROM haat.product WHERE vendor_id = $1
                   AND status = 'active') AS active_products,
                (SELECT COUNT(*) FROM haat.product WHERE vendor_id = $1
                   AND status = 'active' AND stock = 0) AS out_of_stock_products,
                (SELECT COUNT(*) FROM haat.order_item oi JOIN haat.order o ON o.id = oi.order_id
                 WHERE oi.vendor_id = $1 AND oi.fulfillment_status = 'pending'
                   AND o.status IN ('placed', 'processing')) AS pending_items,
                COALESCE(s.units, 0)::BIGINT AS units_sold,
                COALESCE(s.gross, 0) AS gross_sales,
                ROUND(COALESCE(s.gross, 0) * (100 - v.commission_rate) / 100, 2) AS net_earnings
            FROM haat.vendor v
            LEFT JOIN (
                SELECT oi.vendor_id, SUM(oi.quantity) AS units, SUM(oi.line_total) AS gross
                FROM haat.order_item oi JOIN haat.order o ON o.id = oi.order_id
                WHERE oi.vendor_id = $1 AND oi.fulfillment_status <> 'cancelled' AND {COUNTED_ORDER}
                GROUP BY oi.vendor_id
            ) s ON s.vendor_id = v.id
            WHERE v.id = $1
            "
        );
        sqlx::query_as::<_, VendorStats>(&sql)
            .bind(vendor_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Numbers for one franchise.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn franchise(
        &self,
        franchise_id: FranchiseId,
    ) -> Result<FranchiseStats, RepositoryError> {
        let sql = format!(
            r"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE o.status IN ('placed', 'processing', 'shipped')) AS open_orders,
                COUNT(*) FILTER (WHERE o.status = 'delivered') AS delivered_orders,
                COALESCE(SUM(o.total) FILTER (WHERE {COUNTED_ORDER}), 0) AS revenue
            FROM haat.order o
            WHERE o.franchise_id = $1
            "
        );
        let stats = sqlx::query_as::<_, FranchiseStats>(&sql)
            .bind(franchise_id)
            .fetch_one(self.pool)
            .await?;
        Ok(stats)
    }
}
