//! Cross-crate checks of the pricing and lifecycle rules the server relies on.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use haat_core::{
    BlogPostStatus, CartTotals, CouponError, CouponKind, CouponRule, LineAmount, OrderStatus,
    Page, PageRequest,
};

fn rupees(amount: i64) -> Decimal {
    Decimal::new(amount, 0)
}

fn festival_coupon() -> CouponRule {
    CouponRule {
        kind: CouponKind::Percentage,
        value: rupees(20),
        min_order_amount: rupees(500),
        max_discount: Some(rupees(150)),
        usage_limit: Some(100),
        used_count: 0,
        starts_at: Some(Utc::now() - Duration::days(1)),
        expires_at: Some(Utc::now() + Duration::days(6)),
        is_active: true,
    }
}

#[test]
fn test_cart_with_capped_percentage_coupon() {
    let lines = [
        LineAmount::new(Decimal::new(45_000, 2), 2),
        LineAmount::new(Decimal::new(12_950, 2), 1),
    ];
    let coupon = festival_coupon();
    let plain = CartTotals::from_lines(&lines);
    assert_eq!(plain.subtotal, Decimal::new(102_950, 2));
    assert_eq!(plain.item_count, 3);

    coupon.check_redeemable(Utc::now(), plain.subtotal).unwrap();
    let totals = CartTotals::with_coupon(&lines, &coupon);
    // 20% of 1029.50 is 205.90, capped at 150
    assert_eq!(totals.discount, rupees(150));
    assert_eq!(totals.total, Decimal::new(87_950, 2));
}

#[test]
fn test_coupon_rejected_below_minimum_and_when_used_up() {
    let mut coupon = festival_coupon();
    assert_eq!(
        coupon.check_redeemable(Utc::now(), rupees(499)),
        Err(CouponError::BelowMinimum {
            minimum: rupees(500)
        })
    );

    coupon.used_count = 100;
    assert_eq!(
        coupon.check_redeemable(Utc::now(), rupees(900)),
        Err(CouponError::UsageLimitReached)
    );
}

#[test]
fn test_flat_coupon_never_makes_total_negative() {
    let coupon = CouponRule {
        kind: CouponKind::Flat,
        value: rupees(300),
        min_order_amount: Decimal::ZERO,
        max_discount: None,
        usage_limit: None,
        used_count: 0,
        starts_at: None,
        expires_at: None,
        is_active: true,
    };
    let totals = CartTotals::with_coupon(&[LineAmount::new(rupees(120), 1)], &coupon);
    assert_eq!(totals.discount, rupees(120));
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn test_online_order_lifecycle() {
    let mut status = OrderStatus::PendingPayment;
    for next in [
        OrderStatus::Placed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        status = status.transition_to(next).unwrap();
    }
    assert_eq!(status, OrderStatus::Delivered);
    assert!(status.transition_to(OrderStatus::Cancelled).is_err());
    assert!(!status.is_cancellable());
}

#[test]
fn test_shipped_order_cannot_be_cancelled_or_skipped_back() {
    assert!(
        OrderStatus::Shipped
            .transition_to(OrderStatus::Cancelled)
            .is_err()
    );
    assert!(
        OrderStatus::Placed
            .transition_to(OrderStatus::Shipped)
            .is_err()
    );
    let err = OrderStatus::Delivered
        .transition_to(OrderStatus::Processing)
        .unwrap_err();
    assert!(err.to_string().contains("delivered"));
}

#[test]
fn test_blog_review_cycle() {
    let submitted = BlogPostStatus::Draft
        .transition_to(BlogPostStatus::PendingReview)
        .unwrap();
    let rejected = submitted.transition_to(BlogPostStatus::Rejected).unwrap();
    assert!(rejected.is_editable());
    let resubmitted = rejected
        .transition_to(BlogPostStatus::PendingReview)
        .unwrap();
    assert!(
        resubmitted
            .transition_to(BlogPostStatus::Published)
            .is_ok()
    );
}

#[test]
fn test_page_serializes_pager_fields() {
    let page = Page::new(vec!["a", "b"], PageRequest::new(2, 2), 5);
    assert_eq!(
        serde_json::to_value(&page).unwrap(),
        json!({"items": ["a", "b"], "page": 2, "per_page": 2, "total": 5, "total_pages": 3})
    );
}
