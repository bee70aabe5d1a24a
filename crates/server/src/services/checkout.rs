//! Checkout: turning a cart into an order and settling its payment.
//!
//! Cash-on-delivery orders are `placed` immediately. Online orders start in
//! `pending_payment` with a Razorpay order; they are released either by the
//! browser posting back the signed payment (`verify`) or by the gateway
//! webhook, whichever arrives first.

use std::collections::BTreeMap;

use askama::Template;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use haat_core::{
    CURRENCY_CODE, CouponError, OrderId, OrderStatus, PaymentMethod, ProductStatus, UserId,
    to_minor_units,
};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::coupons::CouponRepository;
use crate::db::notifications::NotificationRepository;
use crate::db::orders::{NewOrder, OrderRepository};
use crate::models::{Order, ShippingAddress};
use crate::services::cart::price_lines;
use crate::services::payments::{PaymentError, RazorpayClient, WebhookEvent};
use crate::services::sms::{OrderPlacedMessage, SmsSender};

/// Smallest amount Razorpay accepts, in paise.
const MIN_ONLINE_AMOUNT_PAISE: i64 = 100;

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid shipping address: {0}")]
    InvalidAddress(String),

    #[error("{product} is no longer available")]
    ProductUnavailable { product: String },

    #[error("only {available} of {product} left in stock")]
    InsufficientStock { product: String, available: i32 },

    #[error("coupon is no longer available")]
    CouponNotFound,

    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Online payment requested but Razorpay is not configured.
    #[error("online payments are not available")]
    PaymentsDisabled,

    #[error("online payments need a total of at least Rs. 1")]
    AmountTooSmall,

    #[error("order not found")]
    OrderNotFound,

    /// Posted gateway order id does not belong to this order.
    #[error("payment does not match this order")]
    PaymentMismatch,

    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Stock or coupon usage changed while the order was being placed.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// What the browser needs to open Razorpay Checkout.
#[derive(Debug, Clone, Serialize)]
pub struct RazorpayCheckout {
    pub key_id: String,
    pub razorpay_order_id: String,
    pub amount: i64,
    pub currency: String,
}

/// Checkout response body.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// Present for online payments.
    pub payment: Option<RazorpayCheckout>,
}

/// Payment confirmation posted by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    coupons: CouponRepository<'a>,
    orders: OrderRepository<'a>,
    notifications: NotificationRepository<'a>,
    razorpay: Option<&'a RazorpayClient>,
    sms: &'a dyn SmsSender,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        razorpay: Option<&'a RazorpayClient>,
        sms: &'a dyn SmsSender,
        base_url: &'a str,
    ) -> Self {
        Self {
            carts: CartRepository::new(pool),
            coupons: CouponRepository::new(pool),
            orders: OrderRepository::new(pool),
            notifications: NotificationRepository::new(pool),
            razorpay,
            sms,
            base_url,
        }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `ProductUnavailable` or
    /// `InsufficientStock` when the cart cannot be bought as-is,
    /// `CheckoutError::Coupon` when the applied coupon no longer holds, and
    /// `CheckoutError::Payment` if the gateway order cannot be created.
    #[tracing::instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, CheckoutError> {
        request
            .shipping_address
            .validate()
            .map_err(CheckoutError::InvalidAddress)?;

        let razorpay = match request.payment_method {
            PaymentMethod::Razorpay => {
                Some(self.razorpay.ok_or(CheckoutError::PaymentsDisabled)?)
            }
            PaymentMethod::Cod => None,
        };

        let cart = self
            .carts
            .get(user_id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let lines = self.carts.lines(cart.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        for line in &lines {
            if line.status != ProductStatus::Active {
                return Err(CheckoutError::ProductUnavailable {
                    product: line.name.clone(),
                });
            }
            if line.quantity > line.stock {
                return Err(CheckoutError::InsufficientStock {
                    product: line.name.clone(),
                    available: line.stock,
                });
            }
        }

        let coupon = match cart.coupon_code.as_deref() {
            Some(code) => Some(
                self.coupons
                    .get_by_code(code)
                    .await?
                    .ok_or(CheckoutError::CouponNotFound)?,
            ),
            None => None,
        };
        let (totals, coupon_error) = price_lines(&lines, coupon.as_ref());
        if let Some(e) = coupon_error {
            return Err(CheckoutError::Coupon(e));
        }

        if razorpay.is_some() && !is_chargeable_online(totals.total) {
            return Err(CheckoutError::AmountTooSmall);
        }
        let amount_paise = to_minor_units(totals.total).unwrap_or_default();

        let status = match request.payment_method {
            PaymentMethod::Razorpay => OrderStatus::PendingPayment,
            PaymentMethod::Cod => OrderStatus::Placed,
        };
        let order = self
            .orders
            .place(&NewOrder {
                order_number: generate_order_number(),
                user_id,
                cart_id: cart.id,
                status,
                payment_method: request.payment_method,
                totals,
                coupon_code: coupon.as_ref().map(|c| c.code.as_str()),
                shipping_address: &request.shipping_address,
                lines: &lines,
            })
            .await?;
        tracing::info!(order_number = %order.order_number, total = %order.total, "Order placed");

        let Some(razorpay) = razorpay else {
            self.notify_placed(&order).await;
            return Ok(CheckoutResponse {
                order,
                payment: None,
            });
        };

        let mut notes = BTreeMap::new();
        notes.insert("order_id".to_owned(), order.id.to_string());
        let gateway_order = match razorpay
            .create_order(amount_paise, CURRENCY_CODE, &order.order_number, &notes)
            .await
        {
            Ok(gateway_order) => gateway_order,
            Err(e) => {
                tracing::error!(error = %e, order_number = %order.order_number, "Gateway order failed");
                if let Err(cancel_err) = self.orders.cancel(order.id, OrderStatus::PendingPayment).await {
                    tracing::error!(error = %cancel_err, "Failed to release stock for unpaid order");
                }
                return Err(CheckoutError::Payment(e));
            }
        };
        self.orders
            .set_razorpay_order_id(order.id, &gateway_order.id)
            .await?;

        let payment = RazorpayCheckout {
            key_id: razorpay.key_id().to_owned(),
            razorpay_order_id: gateway_order.id.clone(),
            amount: gateway_order.amount,
            currency: gateway_order.currency,
        };
        let order = Order {
            razorpay_order_id: Some(gateway_order.id),
            ..order
        };
        Ok(CheckoutResponse {
            order,
            payment: Some(payment),
        })
    }

    /// Confirm an online payment from the browser callback.
    ///
    /// Repeated confirmations return the order unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payment` with `InvalidSignature` on a forged
    /// or mangled callback; the order's payment is then marked failed.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        user_id: UserId,
        request: &VerifyPaymentRequest,
    ) -> Result<Order, CheckoutError> {
        let razorpay = self.razorpay.ok_or(CheckoutError::PaymentsDisabled)?;
        let order = self
            .orders
            .get(request.order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)?;
        if order.razorpay_order_id.as_deref() != Some(request.razorpay_order_id.as_str()) {
            return Err(CheckoutError::PaymentMismatch);
        }

        if let Err(e) = razorpay.verify_payment_signature(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        ) {
            tracing::warn!(order_number = %order.order_number, "Payment signature mismatch");
            self.orders.mark_payment_failed(order.id).await?;
            return Err(CheckoutError::Payment(e));
        }

        match self
            .orders
            .mark_paid(order.id, &request.razorpay_payment_id)
            .await?
        {
            Some(paid) => {
                tracing::info!(order_number = %paid.order_number, "Payment captured");
                self.notify_placed(&paid).await;
                Ok(paid)
            }
            None => {
                if order.status == OrderStatus::Cancelled {
                    self.flag_late_capture(&order, &request.razorpay_payment_id)
                        .await?;
                }
                Ok(order)
            }
        }
    }

    /// A payment captured after the order was cancelled has to be refunded
    /// from the gateway dashboard. Keep the payment id on the order so staff
    /// can find it.
    async fn flag_late_capture(&self, order: &Order, payment_id: &str) -> Result<(), CheckoutError> {
        self.orders.record_late_capture(order.id, payment_id).await?;
        tracing::warn!(
            order_number = %order.order_number,
            razorpay_payment_id = payment_id,
            "Payment captured for a cancelled order, refund required"
        );
        Ok(())
    }

    /// Apply a verified Razorpay webhook event.
    ///
    /// Events for unknown orders and unrelated event types are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a query fails.
    #[tracing::instrument(skip(self, event), fields(event = %event.event))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<(), CheckoutError> {
        let Some(payment) = event.payload.payment.as_ref().map(|p| &p.entity) else {
            return Ok(());
        };
        let Some(gateway_order_id) = payment.order_id.as_deref() else {
            return Ok(());
        };
        let Some(order) = self.orders.get_by_razorpay_order_id(gateway_order_id).await? else {
            tracing::warn!(razorpay_order_id = gateway_order_id, "Webhook for unknown order");
            return Ok(());
        };

        match event.event.as_str() {
            "payment.captured" => match self.orders.mark_paid(order.id, &payment.id).await? {
                Some(paid) => {
                    tracing::info!(order_number = %paid.order_number, "Payment captured by webhook");
                    self.notify_placed(&paid).await;
                }
                None if order.status == OrderStatus::Cancelled => {
                    self.flag_late_capture(&order, &payment.id).await?;
                }
                None => tracing::debug!(order_number = %order.order_number, "Capture already applied"),
            },
            "payment.failed" => {
                if self.orders.mark_payment_failed(order.id).await? {
                    tracing::info!(order_number = %order.order_number, "Payment failed");
                }
            }
            other => tracing::debug!(event = other, "Ignoring webhook event"),
        }
        Ok(())
    }

    /// In-app notification and SMS for a confirmed order. Failures are logged.
    async fn notify_placed(&self, order: &Order) {
        let link = format!("/orders/{}", order.id);
        let body = format!(
            "Your order {} for Rs. {} has been placed.",
            order.order_number, order.total
        );
        if let Err(e) = self
            .notifications
            .create(order.user_id, "Order placed", &body, Some(&link))
            .await
        {
            tracing::warn!(error = %e, "Failed to store order notification");
        }

        let total = order.total.to_string();
        let order_url = format!("{}{link}", self.base_url.trim_end_matches('/'));
        let message = OrderPlacedMessage {
            order_number: &order.order_number,
            total: &total,
            order_url: &order_url,
        };
        match message.render() {
            Ok(text) => {
                if let Err(e) = self.sms.send(&order.shipping_address.phone, &text).await {
                    tracing::warn!(error = %e, "Failed to send order SMS");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to render order SMS"),
        }
    }
}

/// Human-facing order number, e.g. `HT-20260301-4KQ9ZB`.
#[must_use]
pub fn generate_order_number() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    format!("HT-{}-{suffix}", Utc::now().format("%Y%m%d"))
}

/// Whether an amount can be charged online.
#[must_use]
pub fn is_chargeable_online(total: Decimal) -> bool {
    to_minor_units(total).is_some_and(|paise| paise >= MIN_ONLINE_AMOUNT_PAISE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "HT");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(
            parts[2]
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn test_order_numbers_differ() {
        assert_ne!(generate_order_number(), generate_order_number());
    }

    #[test]
    fn test_minimum_online_amount() {
        assert!(is_chargeable_online(Decimal::from_str("1.00").unwrap()));
        assert!(is_chargeable_online(Decimal::from_str("1499.50").unwrap()));
        assert!(!is_chargeable_online(Decimal::from_str("0.99").unwrap()));
        assert!(!is_chargeable_online(Decimal::ZERO));
    }

    #[test]
    fn test_conflict_maps_to_checkout_conflict() {
        let err = CheckoutError::from(RepositoryError::Conflict("Brass Lamp is out of stock".into()));
        assert!(matches!(err, CheckoutError::Conflict(ref m) if m == "Brass Lamp is out of stock"));
        assert!(matches!(
            CheckoutError::from(RepositoryError::NotFound),
            CheckoutError::Repository(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn test_checkout_request_parses() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "payment_method": "cod",
            "shipping_address": {
                "full_name": "Ravi Kumar",
                "phone": "9876543210",
                "line1": "Flat 3B, Lake View Apartments",
                "city": "Pune",
                "state": "Maharashtra",
                "pincode": "411001"
            }
        }))
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Cod);
        assert!(request.shipping_address.validate().is_ok());
    }
}
