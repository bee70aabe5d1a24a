//! Order lifecycle after checkout: status changes, cancellation and vendor
//! fulfilment. Every change is checked against the state machines in
//! `haat_core` before the conditional update runs.

use sqlx::PgPool;
use thiserror::Error;

use haat_core::{
    FranchiseId, FulfillmentStatus, OrderId, OrderItemId, OrderStatus, TransitionError, UserId,
    VendorId,
};

use crate::db::RepositoryError;
use crate::db::notifications::NotificationRepository;
use crate::db::orders::OrderRepository;
use crate::models::{Order, OrderItem};

/// Errors from order updates.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Items cannot ship before the order is placed, or after it is cancelled.
    #[error("order is not ready for fulfilment")]
    NotReady,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Who is changing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Admin,
    Franchise(FranchiseId),
    Customer(UserId),
}

impl OrderScope {
    fn allows(self, order: &Order) -> bool {
        match self {
            Self::Admin => true,
            Self::Franchise(id) => order.franchise_id == Some(id),
            Self::Customer(id) => order.user_id == id,
        }
    }
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    notifications: NotificationRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            notifications: NotificationRepository::new(pool),
        }
    }

    /// Move an order to `to`. Cancelling returns unshipped stock.
    ///
    /// Orders awaiting payment are only released to `placed` by a verified
    /// payment, never through here.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is outside `scope` and
    /// `OrderError::Transition` if `to` is not reachable.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        scope: OrderScope,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .filter(|o| scope.allows(o))
            .ok_or(OrderError::NotFound)?;
        manual_transition(order.status, to)?;

        let updated = if to == OrderStatus::Cancelled {
            self.orders.cancel(order.id, order.status).await?
        } else {
            self.orders.set_status(order.id, order.status, to).await?
        };
        tracing::info!(
            order_number = %updated.order_number,
            from = %order.status,
            to = %updated.status,
            "Order status changed"
        );

        if !matches!(scope, OrderScope::Customer(_)) {
            self.notify_status(&updated).await;
        }
        Ok(updated)
    }

    /// Cancel one of the customer's own orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transition` once the order has shipped.
    pub async fn cancel_for_customer(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        self.update_status(OrderScope::Customer(user_id), order_id, OrderStatus::Cancelled)
            .await
    }

    /// Update the fulfilment status of one of the vendor's items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the item is not the vendor's,
    /// `OrderError::NotReady` if the order is unpaid or cancelled and
    /// `OrderError::Transition` if `to` is not reachable.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_fulfillment(
        &self,
        vendor_id: VendorId,
        item_id: OrderItemId,
        to: FulfillmentStatus,
    ) -> Result<OrderItem, OrderError> {
        let item = self
            .orders
            .get_vendor_item(item_id, vendor_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let order = self
            .orders
            .get(item.order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if matches!(order.status, OrderStatus::PendingPayment | OrderStatus::Cancelled) {
            return Err(OrderError::NotReady);
        }
        item.fulfillment_status.transition_to(to)?;
        let updated = self
            .orders
            .set_item_fulfillment(item.id, item.fulfillment_status, to)
            .await?;
        tracing::info!(order_number = %order.order_number, item_id = %updated.id, to = %to, "Item fulfilment changed");
        Ok(updated)
    }

    async fn notify_status(&self, order: &Order) {
        let body = match order.status {
            OrderStatus::Processing => format!("Your order {} is being prepared.", order.order_number),
            OrderStatus::Shipped => format!("Your order {} has shipped.", order.order_number),
            OrderStatus::Delivered => format!("Your order {} was delivered.", order.order_number),
            OrderStatus::Cancelled => format!("Your order {} was cancelled.", order.order_number),
            OrderStatus::PendingPayment | OrderStatus::Placed => return,
        };
        let link = format!("/orders/{}", order.id);
        if let Err(e) = self
            .notifications
            .create(order.user_id, "Order update", &body, Some(&link))
            .await
        {
            tracing::warn!(error = %e, "Failed to store order notification");
        }
    }
}

/// Validate a status change requested by staff or a customer.
fn manual_transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, TransitionError> {
    if to == OrderStatus::Placed {
        return Err(TransitionError {
            entity: "order",
            from: from.as_str(),
            to: to.as_str(),
        });
    }
    from.transition_to(to)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    use haat_core::{PaymentMethod, PaymentStatus, Phone};

    use super::*;
    use crate::models::ShippingAddress;

    fn order(user: i32, franchise: Option<i32>) -> Order {
        Order {
            id: OrderId::new(7),
            order_number: "HT-20260301-ABC234".to_owned(),
            user_id: UserId::new(user),
            franchise_id: franchise.map(FranchiseId::new),
            status: OrderStatus::Placed,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            subtotal: Decimal::new(49_900, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(49_900, 2),
            coupon_code: None,
            shipping_address: Json(ShippingAddress {
                full_name: "Meera Iyer".to_owned(),
                phone: Phone::parse("9840012345").unwrap(),
                line1: "22 Nungambakkam High Road".to_owned(),
                line2: None,
                city: "Chennai".to_owned(),
                state: "Tamil Nadu".to_owned(),
                pincode: "600034".to_owned(),
            }),
            razorpay_order_id: None,
            razorpay_payment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unpaid_order_cannot_be_placed_by_hand() {
        let err = manual_transition(OrderStatus::PendingPayment, OrderStatus::Placed).unwrap_err();
        assert_eq!(err.from, "pending_payment");
        assert_eq!(err.to, "placed");
        assert!(manual_transition(OrderStatus::Placed, OrderStatus::Placed).is_err());
    }

    #[test]
    fn test_manual_transitions_follow_lifecycle() {
        assert_eq!(
            manual_transition(OrderStatus::PendingPayment, OrderStatus::Cancelled),
            Ok(OrderStatus::Cancelled)
        );
        assert_eq!(
            manual_transition(OrderStatus::Placed, OrderStatus::Processing),
            Ok(OrderStatus::Processing)
        );
        assert!(manual_transition(OrderStatus::PendingPayment, OrderStatus::Processing).is_err());
        assert!(manual_transition(OrderStatus::Shipped, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_admin_scope_allows_everything() {
        assert!(OrderScope::Admin.allows(&order(1, None)));
        assert!(OrderScope::Admin.allows(&order(2, Some(3))));
    }

    #[test]
    fn test_franchise_scope_requires_assignment() {
        let scope = OrderScope::Franchise(FranchiseId::new(3));
        assert!(scope.allows(&order(1, Some(3))));
        assert!(!scope.allows(&order(1, Some(4))));
        assert!(!scope.allows(&order(1, None)));
    }

    #[test]
    fn test_customer_scope_requires_ownership() {
        let scope = OrderScope::Customer(UserId::new(5));
        assert!(scope.allows(&order(5, None)));
        assert!(!scope.allows(&order(6, None)));
    }
}
