//! OTP, checkout and payment flows against a migrated database.
//!
//! These tests call the server's services directly, so no HTTP server is
//! needed, but they do require:
//! - A migrated `PostgreSQL` database (`haat-cli migrate`)
//! - `HAAT_TEST_DATABASE_URL` pointing at it
//!
//! Every test creates its own customer, products and coupons with unique
//! names, so the tests can share a database and run in parallel.
//!
//! Run with: `cargo test -p haat-integration-tests --test database_flows -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use tokio::task::JoinSet;

use haat_core::{
    CouponKind, FulfillmentStatus, OrderStatus, OtpPurpose, PageRequest, PaymentMethod,
    PaymentStatus, Phone, ProductId, ProductStatus, Slug,
};
use haat_integration_tests::{database_pool, unique_number};
use haat_server::config::{OtpConfig, RazorpayConfig};
use haat_server::db::RepositoryError;
use haat_server::db::coupons::NewCoupon;
use haat_server::db::orders::NewOrder;
use haat_server::db::products::{NewProduct, ProductUpdate};
use haat_server::db::{
    CartRepository, CouponRepository, NotificationRepository, OrderRepository, OtpRepository,
    ProductRepository, UserRepository,
};
use haat_server::models::{Order, Product, ShippingAddress, User};
use haat_server::services::cart::price_lines;
use haat_server::services::checkout::{
    CheckoutError, CheckoutRequest, CheckoutService, VerifyPaymentRequest,
    generate_order_number,
};
use haat_server::services::orders::{OrderError, OrderScope, OrderService};
use haat_server::services::otp::{OtpError, OtpService, code_hash};
use haat_server::services::payments::{PaymentError, RazorpayClient, WebhookEvent, sign};
use haat_server::services::sms::LogSmsSender;

const BASE_URL: &str = "http://localhost:3000";

// ============================================================================
// Fixtures
// ============================================================================

fn otp_secret() -> SecretString {
    SecretString::from("t7#Kq2vLx8!Wm4Zp7rB6nY1cF3hJ5sD9")
}

fn razorpay_secret() -> SecretString {
    SecretString::from("rzp-test-key-secret-for-database-flows")
}

fn razorpay() -> RazorpayClient {
    RazorpayClient::new(&RazorpayConfig {
        key_id: "rzp_test_haat".to_owned(),
        key_secret: razorpay_secret(),
        webhook_secret: None,
    })
    .unwrap()
}

fn fresh_phone() -> Phone {
    Phone::parse(&format!("9{:09}", unique_number())).unwrap()
}

async fn customer(pool: &PgPool) -> User {
    UserRepository::new(pool)
        .find_or_create_customer(&fresh_phone())
        .await
        .unwrap()
}

async fn product(pool: &PgPool, price: i64, stock: i32) -> Product {
    let n = unique_number();
    let slug = Slug::parse(&format!("test-product-{n}")).unwrap();
    ProductRepository::new(pool)
        .create(
            None,
            &slug,
            &NewProduct {
                name: format!("Test Product {n}"),
                category_id: None,
                description: String::new(),
                price: Decimal::from(price),
                compare_at_price: None,
                stock,
                image_urls: Vec::new(),
                status: ProductStatus::Active,
            },
        )
        .await
        .unwrap()
}

async fn stock_of(pool: &PgPool, id: ProductId) -> i32 {
    ProductRepository::new(pool)
        .get(id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn flat_coupon(pool: &PgPool, value: i64, usage_limit: i32) -> String {
    let coupon = CouponRepository::new(pool)
        .create(&NewCoupon {
            code: format!("DB{}", unique_number()),
            description: None,
            kind: CouponKind::Flat,
            value: Decimal::from(value),
            min_order_amount: Decimal::ZERO,
            max_discount: None,
            usage_limit: Some(usage_limit),
            starts_at: None,
            expires_at: None,
            is_active: true,
        })
        .await
        .unwrap();
    coupon.code
}

async fn used_count(pool: &PgPool, code: &str) -> i32 {
    CouponRepository::new(pool)
        .get_by_code(code)
        .await
        .unwrap()
        .unwrap()
        .used_count
}

async fn fill_cart(pool: &PgPool, user: &User, items: &[(ProductId, i32)], coupon: Option<&str>) {
    let carts = CartRepository::new(pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    for &(product_id, quantity) in items {
        carts.upsert_item(cart.id, product_id, quantity).await.unwrap();
    }
    carts.set_coupon(cart.id, coupon).await.unwrap();
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Anjali Deshmukh".to_owned(),
        phone: Phone::parse("9822012345").unwrap(),
        line1: "14 Prabhat Road".to_owned(),
        line2: Some("Deccan Gymkhana".to_owned()),
        city: "Pune".to_owned(),
        state: "Maharashtra".to_owned(),
        pincode: "411004".to_owned(),
    }
}

fn cod_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: address(),
        payment_method: PaymentMethod::Cod,
    }
}

/// An online order awaiting payment, with a gateway order id attached.
///
/// Built through the repository so no call to Razorpay is made.
async fn pending_online_order(pool: &PgPool, user: &User, product_id: ProductId) -> Order {
    fill_cart(pool, user, &[(product_id, 1)], None).await;
    let carts = CartRepository::new(pool);
    let cart = carts.get(user.id).await.unwrap().unwrap();
    let lines = carts.lines(cart.id).await.unwrap();
    let (totals, _) = price_lines(&lines, None);
    let shipping_address = address();

    let orders = OrderRepository::new(pool);
    let order = orders
        .place(&NewOrder {
            order_number: generate_order_number(),
            user_id: user.id,
            cart_id: cart.id,
            status: OrderStatus::PendingPayment,
            payment_method: PaymentMethod::Razorpay,
            totals,
            coupon_code: None,
            shipping_address: &shipping_address,
            lines: &lines,
        })
        .await
        .unwrap();
    orders
        .set_razorpay_order_id(order.id, &format!("order_DB{}", unique_number()))
        .await
        .unwrap();
    orders.get(order.id).await.unwrap().unwrap()
}

async fn reload(pool: &PgPool, order: &Order) -> Order {
    OrderRepository::new(pool).get(order.id).await.unwrap().unwrap()
}

fn payment_event(event: &str, razorpay_order_id: &str, payment_id: &str) -> WebhookEvent {
    serde_json::from_value(serde_json::json!({
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": razorpay_order_id,
                    "status": if event == "payment.captured" { "captured" } else { "failed" }
                }
            }
        }
    }))
    .unwrap()
}

async fn issue_code(pool: &PgPool, phone: &Phone, code: &str, expires_in: TimeDelta) {
    let hash = code_hash(&otp_secret(), phone, OtpPurpose::Login, code).unwrap();
    OtpRepository::new(pool)
        .create(phone, OtpPurpose::Login, &hash, Utc::now() + expires_in)
        .await
        .unwrap();
}

async fn verify_code(pool: &PgPool, phone: &Phone, code: &str) -> Result<User, OtpError> {
    let secret = otp_secret();
    OtpService::new(pool, &LogSmsSender, OtpConfig::default(), &secret)
        .verify(phone, code)
        .await
}

async fn stored_attempts(pool: &PgPool, phone: &Phone) -> i32 {
    OtpRepository::new(pool)
        .latest_active(phone, OtpPurpose::Login)
        .await
        .unwrap()
        .unwrap()
        .attempts
}

// ============================================================================
// OTP Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_wrong_codes_count_down_then_lock_the_code() {
    let pool = database_pool().await;
    let phone = fresh_phone();
    issue_code(&pool, &phone, "246810", TimeDelta::minutes(5)).await;

    for used in 1..=4 {
        let err = verify_code(&pool, &phone, "135790").await.unwrap_err();
        assert!(
            matches!(err, OtpError::InvalidCode { remaining_attempts } if remaining_attempts == 5 - used),
            "guess {used}: {err}"
        );
        assert_eq!(stored_attempts(&pool, &phone).await, used);
    }

    let err = verify_code(&pool, &phone, "135790").await.unwrap_err();
    assert!(matches!(err, OtpError::TooManyAttempts));

    // The right code is no use once the attempts are spent
    let err = verify_code(&pool, &phone, "246810").await.unwrap_err();
    assert!(matches!(err, OtpError::TooManyAttempts));
    assert_eq!(stored_attempts(&pool, &phone).await, 5);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_concurrent_guesses_share_the_attempt_limit() {
    let pool = database_pool().await;
    let phone = fresh_phone();
    issue_code(&pool, &phone, "112233", TimeDelta::minutes(5)).await;

    let mut guesses = JoinSet::new();
    for _ in 0..12 {
        let pool = pool.clone();
        let phone = phone.clone();
        guesses.spawn(async move { verify_code(&pool, &phone, "998877").await });
    }

    let mut invalid = 0;
    let mut locked = 0;
    while let Some(result) = guesses.join_next().await {
        match result.unwrap() {
            Err(OtpError::InvalidCode { .. }) => invalid += 1,
            Err(OtpError::TooManyAttempts) => locked += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(invalid, 4);
    assert_eq!(locked, 8);
    assert_eq!(stored_attempts(&pool, &phone).await, 5);

    let err = verify_code(&pool, &phone, "112233").await.unwrap_err();
    assert!(matches!(err, OtpError::TooManyAttempts));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_code_logs_in_only_once() {
    let pool = database_pool().await;
    let phone = fresh_phone();
    issue_code(&pool, &phone, "507193", TimeDelta::minutes(5)).await;

    let user = verify_code(&pool, &phone, " 507193 ").await.unwrap();
    assert_eq!(user.phone.as_ref(), Some(&phone));
    assert!(user.is_active);

    let err = verify_code(&pool, &phone, "507193").await.unwrap_err();
    assert!(matches!(err, OtpError::Expired));

    // A second login by code finds the same account
    issue_code(&pool, &phone, "640021", TimeDelta::minutes(5)).await;
    let again = verify_code(&pool, &phone, "640021").await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_expired_code_is_rejected() {
    let pool = database_pool().await;
    let phone = fresh_phone();
    issue_code(&pool, &phone, "314159", TimeDelta::minutes(-1)).await;

    let err = verify_code(&pool, &phone, "314159").await.unwrap_err();
    assert!(matches!(err, OtpError::Expired));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_new_code_retires_the_previous_one() {
    let pool = database_pool().await;
    let phone = fresh_phone();
    issue_code(&pool, &phone, "111111", TimeDelta::minutes(5)).await;
    issue_code(&pool, &phone, "222222", TimeDelta::minutes(5)).await;

    let err = verify_code(&pool, &phone, "111111").await.unwrap_err();
    assert!(matches!(err, OtpError::InvalidCode { .. }));
    assert!(verify_code(&pool, &phone, "222222").await.is_ok());
}

// ============================================================================
// Checkout Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_cod_checkout_takes_stock_and_clears_cart() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let lamp = product(&pool, 200, 5).await;
    let rug = product(&pool, 150, 3).await;
    let code = flat_coupon(&pool, 50, 10).await;
    fill_cart(&pool, &user, &[(lamp.id, 2), (rug.id, 1)], Some(&code)).await;

    let response = CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL)
        .place_order(user.id, &cod_request())
        .await
        .unwrap();
    let order = response.order;
    assert!(response.payment.is_none());
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.subtotal, Decimal::from(550));
    assert_eq!(order.discount, Decimal::from(50));
    assert_eq!(order.total, Decimal::from(500));
    assert_eq!(order.coupon_code.as_deref(), Some(code.as_str()));

    let items = OrderRepository::new(&pool).items(order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(stock_of(&pool, lamp.id).await, 3);
    assert_eq!(stock_of(&pool, rug.id).await, 2);
    assert_eq!(used_count(&pool, &code).await, 1);

    let carts = CartRepository::new(&pool);
    let cart = carts.get(user.id).await.unwrap().unwrap();
    assert!(carts.lines(cart.id).await.unwrap().is_empty());
    assert!(cart.coupon_code.is_none());

    // The customer was told about the order
    let unread = NotificationRepository::new(&pool)
        .unread_count(user.id)
        .await
        .unwrap();
    assert_eq!(unread, 1);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_oversold_line_rolls_back_the_whole_order() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let kettle = product(&pool, 900, 5).await;
    let teapot = product(&pool, 450, 2).await;
    fill_cart(&pool, &user, &[(kettle.id, 1), (teapot.id, 2)], None).await;

    let carts = CartRepository::new(&pool);
    let cart = carts.get(user.id).await.unwrap().unwrap();
    let lines = carts.lines(cart.id).await.unwrap();

    // Another checkout takes a teapot after this cart was priced
    ProductRepository::new(&pool)
        .update(
            teapot.id,
            None,
            &ProductUpdate {
                stock: Some(1),
                ..ProductUpdate::default()
            },
        )
        .await
        .unwrap();

    let (totals, _) = price_lines(&lines, None);
    let shipping_address = address();
    let err = OrderRepository::new(&pool)
        .place(&NewOrder {
            order_number: generate_order_number(),
            user_id: user.id,
            cart_id: cart.id,
            status: OrderStatus::Placed,
            payment_method: PaymentMethod::Cod,
            totals,
            coupon_code: None,
            shipping_address: &shipping_address,
            lines: &lines,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("out of stock")));
    assert!(matches!(
        CheckoutError::from(err),
        CheckoutError::Conflict(_)
    ));

    assert_eq!(stock_of(&pool, kettle.id).await, 5);
    assert_eq!(stock_of(&pool, teapot.id).await, 1);
    assert_eq!(carts.lines(cart.id).await.unwrap().len(), 2);
    let orders = OrderRepository::new(&pool)
        .list_for_user(user.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(orders.total, 0);

    // Checking out the same cart now reports the shortage up front
    let err = CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL)
        .place_order(user.id, &cod_request())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { available: 1, .. }));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_coupon_usage_limit_is_enforced() {
    let pool = database_pool().await;
    let first = customer(&pool).await;
    let second = customer(&pool).await;
    let vase = product(&pool, 300, 10).await;
    let code = flat_coupon(&pool, 25, 1).await;
    fill_cart(&pool, &first, &[(vase.id, 1)], Some(&code)).await;
    fill_cart(&pool, &second, &[(vase.id, 1)], Some(&code)).await;

    // Both carts were priced while the coupon still had a use left
    let carts = CartRepository::new(&pool);
    let second_cart = carts.get(second.id).await.unwrap().unwrap();
    let second_lines = carts.lines(second_cart.id).await.unwrap();

    let checkout = CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL);
    checkout.place_order(first.id, &cod_request()).await.unwrap();
    assert_eq!(used_count(&pool, &code).await, 1);
    assert_eq!(stock_of(&pool, vase.id).await, 9);

    let (totals, _) = price_lines(&second_lines, None);
    let shipping_address = address();
    let err = OrderRepository::new(&pool)
        .place(&NewOrder {
            order_number: generate_order_number(),
            user_id: second.id,
            cart_id: second_cart.id,
            status: OrderStatus::Placed,
            payment_method: PaymentMethod::Cod,
            totals,
            coupon_code: Some(&code),
            shipping_address: &shipping_address,
            lines: &second_lines,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref m) if m == "coupon is no longer available"));
    assert_eq!(stock_of(&pool, vase.id).await, 9);

    let err = checkout.place_order(second.id, &cod_request()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Coupon(_)));
    assert_eq!(used_count(&pool, &code).await, 1);
}

// ============================================================================
// Order Lifecycle Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_cancelling_returns_stock() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let shawl = product(&pool, 1200, 4).await;
    fill_cart(&pool, &user, &[(shawl.id, 3)], None).await;

    let order = CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL)
        .place_order(user.id, &cod_request())
        .await
        .unwrap()
        .order;
    assert_eq!(stock_of(&pool, shawl.id).await, 1);

    let cancelled = OrderService::new(&pool)
        .cancel_for_customer(user.id, order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, shawl.id).await, 4);

    let items = OrderRepository::new(&pool).items(order.id).await.unwrap();
    assert!(items.iter().all(|i| i.fulfillment_status == FulfillmentStatus::Cancelled));

    // Cancelling twice is a transition error, and stock is not returned again
    let err = OrderService::new(&pool)
        .cancel_for_customer(user.id, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Transition(_)));
    assert_eq!(stock_of(&pool, shawl.id).await, 4);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_staff_cannot_release_unpaid_order() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let mat = product(&pool, 650, 3).await;
    let order = pending_online_order(&pool, &user, mat.id).await;

    let err = OrderService::new(&pool)
        .update_status(OrderScope::Admin, order.id, OrderStatus::Placed)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Transition(_)));

    let order = reload(&pool, &order).await;
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

// ============================================================================
// Payment Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_signature_mismatch_marks_payment_failed() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let basket = product(&pool, 480, 2).await;
    let order = pending_online_order(&pool, &user, basket.id).await;
    let razorpay_order_id = order.razorpay_order_id.clone().unwrap();
    let gateway = razorpay();
    let checkout = CheckoutService::new(&pool, Some(&gateway), &LogSmsSender, BASE_URL);

    let err = checkout
        .verify_payment(
            user.id,
            &VerifyPaymentRequest {
                order_id: order.id,
                razorpay_order_id: razorpay_order_id.clone(),
                razorpay_payment_id: "pay_forged".to_owned(),
                razorpay_signature: "00ff".to_owned(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Payment(PaymentError::InvalidSignature)
    ));
    let failed = reload(&pool, &order).await;
    assert_eq!(failed.status, OrderStatus::PendingPayment);
    assert_eq!(failed.payment_status, PaymentStatus::Failed);

    // The customer can still pay after a failed attempt
    let payment_id = format!("pay_DB{}", unique_number());
    let signature = sign(
        &razorpay_secret(),
        format!("{razorpay_order_id}|{payment_id}").as_bytes(),
    )
    .unwrap();
    let paid = checkout
        .verify_payment(
            user.id,
            &VerifyPaymentRequest {
                order_id: order.id,
                razorpay_order_id,
                razorpay_payment_id: payment_id.clone(),
                razorpay_signature: signature,
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Placed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.razorpay_payment_id.as_deref(), Some(payment_id.as_str()));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_repeated_webhooks_apply_once() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let quilt = product(&pool, 2100, 2).await;
    let order = pending_online_order(&pool, &user, quilt.id).await;
    let razorpay_order_id = order.razorpay_order_id.clone().unwrap();
    let checkout = CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL);

    checkout
        .handle_webhook(&payment_event("payment.failed", &razorpay_order_id, "pay_declined"))
        .await
        .unwrap();
    assert_eq!(reload(&pool, &order).await.payment_status, PaymentStatus::Failed);

    let captured = payment_event("payment.captured", &razorpay_order_id, "pay_captured");
    checkout.handle_webhook(&captured).await.unwrap();
    checkout.handle_webhook(&captured).await.unwrap();

    let paid = reload(&pool, &order).await;
    assert_eq!(paid.status, OrderStatus::Placed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.razorpay_payment_id.as_deref(), Some("pay_captured"));

    // A late failure does not undo the capture
    checkout
        .handle_webhook(&payment_event("payment.failed", &razorpay_order_id, "pay_late"))
        .await
        .unwrap();
    assert_eq!(reload(&pool, &order).await.payment_status, PaymentStatus::Paid);

    let unread = NotificationRepository::new(&pool)
        .unread_count(user.id)
        .await
        .unwrap();
    assert_eq!(unread, 1);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_capture_after_cancel_keeps_payment_for_refund() {
    let pool = database_pool().await;
    let user = customer(&pool).await;
    let lantern = product(&pool, 750, 2).await;
    let order = pending_online_order(&pool, &user, lantern.id).await;
    let razorpay_order_id = order.razorpay_order_id.clone().unwrap();

    OrderService::new(&pool)
        .cancel_for_customer(user.id, order.id)
        .await
        .unwrap();
    assert_eq!(stock_of(&pool, lantern.id).await, 2);

    CheckoutService::new(&pool, None, &LogSmsSender, BASE_URL)
        .handle_webhook(&payment_event(
            "payment.captured",
            &razorpay_order_id,
            "pay_after_cancel",
        ))
        .await
        .unwrap();

    let order = reload(&pool, &order).await;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.razorpay_payment_id.as_deref(), Some("pay_after_cancel"));
    assert_eq!(stock_of(&pool, lantern.id).await, 2);
}
