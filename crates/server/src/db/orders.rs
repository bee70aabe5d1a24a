//! Order repository.
//!
//! Placing and cancelling orders touch stock and coupon usage, so both run in
//! a single transaction with conditional updates. A concurrent checkout that
//! loses the race for the last unit gets `RepositoryError::Conflict` and the
//! whole order rolls back.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use haat_core::{
    CartId, CartTotals, FranchiseId, FulfillmentStatus, OrderId, OrderItemId, OrderStatus, Page,
    PageRequest, PaymentMethod, PaymentStatus, UserId, VendorId,
};

use super::RepositoryError;
use crate::models::{CartLine, Order, OrderDetail, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.franchise_id, o.status, \
     o.payment_method, o.payment_status, o.subtotal, o.discount, o.total, o.coupon_code, \
     o.shipping_address, o.razorpay_order_id, o.razorpay_payment_id, o.created_at, o.updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, vendor_id, product_name, unit_price, \
     quantity, line_total, fulfillment_status";

/// Everything needed to turn a cart into an order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: String,
    pub user_id: UserId,
    pub cart_id: CartId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub totals: CartTotals,
    pub coupon_code: Option<&'a str>,
    pub shipping_address: &'a ShippingAddress,
    pub lines: &'a [CartLine],
}

/// Admin and franchise order list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub franchise_id: Option<FranchiseId>,
    /// Order number prefix or substring.
    pub q: Option<String>,
}

/// Repository for orders and order items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an order from cart lines.
    ///
    /// In one transaction: inserts the order and its items, takes stock for
    /// each line, counts one use of the coupon and empties the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a product no longer has enough
    /// stock or the coupon ran out of uses.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn place(&self, new: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO haat.order AS o
                (order_number, user_id, status, payment_method, payment_status,
                 subtotal, discount, total, coupon_code, shipping_address)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(&new.order_number)
            .bind(new.user_id)
            .bind(new.status)
            .bind(new.payment_method)
            .bind(new.totals.subtotal)
            .bind(new.totals.discount)
            .bind(new.totals.total)
            .bind(new.coupon_code)
            .bind(Json(new.shipping_address))
            .fetch_one(&mut *tx)
            .await?;

        for line in new.lines {
            let taken = sqlx::query(
                r"
                UPDATE haat.product SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND status = 'active' AND stock >= $2
                ",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "{} is out of stock",
                    line.name
                )));
            }

            sqlx::query(
                r"
                INSERT INTO haat.order_item
                    (order_id, product_id, vendor_id, product_name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.vendor_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(code) = new.coupon_code {
            let used = sqlx::query(
                r"
                UPDATE haat.coupon SET used_count = used_count + 1
                WHERE code = $1 AND is_active
                  AND (usage_limit IS NULL OR used_count < usage_limit)
                ",
            )
            .bind(code)
            .execute(&mut *tx)
            .await?;
            if used.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(
                    "coupon is no longer available".to_owned(),
                ));
            }
        }

        sqlx::query("DELETE FROM haat.cart_item WHERE cart_id = $1")
            .bind(new.cart_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE haat.cart SET coupon_code = NULL, updated_at = NOW() WHERE id = $1")
            .bind(new.cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Get an order header by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM haat.order o WHERE o.id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get an order by the gateway order ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_razorpay_order_id(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM haat.order o WHERE o.razorpay_order_id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(razorpay_order_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get an order with all its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// Items of one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM haat.order_item WHERE order_id = $1 ORDER BY id");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM haat.order WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM haat.order o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        Ok(Page::new(orders, page, total))
    }

    /// List orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM haat.order o WHERE TRUE");
        push_order_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM haat.order o WHERE TRUE"));
        push_order_filters(&mut query, filter);
        query
            .push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let orders = query.build_query_as::<Order>().fetch_all(self.pool).await?;

        Ok(Page::new(orders, page, total))
    }

    /// Orders containing at least one of the vendor's items. Each order only
    /// carries that vendor's items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_vendor(
        &self,
        vendor_id: VendorId,
        fulfillment_status: Option<FulfillmentStatus>,
        page: PageRequest,
    ) -> Result<Page<OrderDetail>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(DISTINCT order_id) FROM haat.order_item
            WHERE vendor_id = $1 AND ($2::haat.fulfillment_status IS NULL OR fulfillment_status = $2)
            ",
        )
        .bind(vendor_id)
        .bind(fulfillment_status)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM haat.order o
            WHERE EXISTS (
                SELECT 1 FROM haat.order_item oi
                WHERE oi.order_id = o.id AND oi.vendor_id = $1
                  AND ($2::haat.fulfillment_status IS NULL OR oi.fulfillment_status = $2)
            )
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $3 OFFSET $4
            "
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(vendor_id)
            .bind(fulfillment_status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let sql = format!(
            r"
            SELECT {ITEM_COLUMNS} FROM haat.order_item
            WHERE order_id = ANY($1) AND vendor_id = $2
            ORDER BY id
            "
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(ids.iter().map(|id| id.as_i32()).collect::<Vec<_>>())
            .bind(vendor_id)
            .fetch_all(self.pool)
            .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        let details = orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderDetail { order, items }
            })
            .collect();

        Ok(Page::new(details, page, total))
    }

    /// Get one item, scoped to a vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_vendor_item(
        &self,
        item_id: OrderItemId,
        vendor_id: VendorId,
    ) -> Result<Option<OrderItem>, RepositoryError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM haat.order_item WHERE id = $1 AND vendor_id = $2");
        let item = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(item_id)
            .bind(vendor_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(item)
    }

    /// Move an item from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the item is no longer in `from`.
    pub async fn set_item_fulfillment(
        &self,
        item_id: OrderItemId,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    ) -> Result<OrderItem, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.order_item SET fulfillment_status = $3
            WHERE id = $1 AND fulfillment_status = $2
            RETURNING {ITEM_COLUMNS}
            "
        );
        sqlx::query_as::<_, OrderItem>(&sql)
            .bind(item_id)
            .bind(from)
            .bind(to)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("order item was updated concurrently".to_owned()))
    }

    /// Move an order from `from` to `to`. Delivered cash-on-delivery orders
    /// are marked paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
    pub async fn set_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.order AS o SET
                status = $3,
                payment_status = CASE
                    WHEN $3 = 'delivered' AND o.payment_method = 'cod' THEN 'paid'
                    ELSE o.payment_status
                END,
                updated_at = NOW()
            WHERE o.id = $1 AND o.status = $2
            RETURNING {ORDER_COLUMNS}
            "
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("order was updated concurrently".to_owned()))
    }

    /// Cancel an order that is still in `from`, returning unshipped stock.
    ///
    /// Paid orders are flagged `refunded`; the refund itself is issued from
    /// the gateway dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
    pub async fn cancel(&self, id: OrderId, from: OrderStatus) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            UPDATE haat.order AS o SET
                status = 'cancelled',
                payment_status = CASE WHEN o.payment_status = 'paid' THEN 'refunded'
                                      WHEN o.payment_status = 'pending' THEN 'failed'
                                      ELSE o.payment_status END,
                updated_at = NOW()
            WHERE o.id = $1 AND o.status = $2
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(from)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("order was updated concurrently".to_owned()))?;

        sqlx::query(
            r"
            UPDATE haat.product p SET stock = p.stock + oi.quantity, updated_at = NOW()
            FROM haat.order_item oi
            WHERE oi.order_id = $1 AND oi.product_id = p.id AND oi.fulfillment_status = 'pending'
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE haat.order_item SET fulfillment_status = 'cancelled'
            WHERE order_id = $1 AND fulfillment_status = 'pending'
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Record the gateway order created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_razorpay_order_id(
        &self,
        id: OrderId,
        razorpay_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE haat.order SET razorpay_order_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(razorpay_order_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Mark an online payment captured and release the order for fulfilment.
    ///
    /// Returns `None` if the order was not awaiting payment, so repeated
    /// callbacks are harmless.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        razorpay_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.order AS o SET
                payment_status = 'paid',
                status = 'placed',
                razorpay_payment_id = $2,
                updated_at = NOW()
            WHERE o.id = $1 AND o.status = 'pending_payment'
              AND o.payment_status IN ('pending', 'failed')
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(razorpay_payment_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Store the payment id of a capture that arrived after cancellation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_late_capture(
        &self,
        id: OrderId,
        razorpay_payment_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE haat.order SET razorpay_payment_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'cancelled' AND razorpay_payment_id IS NULL
            ",
        )
        .bind(id)
        .bind(razorpay_payment_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed payment attempt. The customer may retry or cancel.
    ///
    /// Returns `false` if the order was not awaiting payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_payment_failed(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE haat.order SET payment_status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending_payment' AND payment_status = 'pending'
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Assign an order to a franchise outlet, or clear the assignment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn assign_franchise(
        &self,
        id: OrderId,
        franchise_id: Option<FranchiseId>,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            UPDATE haat.order AS o SET franchise_id = $2, updated_at = NOW()
            WHERE o.id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(franchise_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

fn push_order_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        query.push(" AND o.status = ").push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        query.push(" AND o.payment_status = ").push_bind(payment_status);
    }
    if let Some(franchise_id) = filter.franchise_id {
        query.push(" AND o.franchise_id = ").push_bind(franchise_id);
    }
    if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
        query
            .push(" AND o.order_number ILIKE ")
            .push_bind(super::like_pattern(q));
    }
}
