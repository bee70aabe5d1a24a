//! In-process tests of the assembled router.
//!
//! The pool never connects, so every request here must be answered before
//! the first query: health checks, routing, authentication, input validation and
//! webhook signatures.

#![allow(clippy::unwrap_used)]

use axum::body::to_bytes;
use axum::http::StatusCode;
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

use haat_integration_tests::{
    empty_request, json_body, json_request, test_app, test_app_with_razorpay,
};
use haat_server::services::payments::sign;

#[tokio::test]
async fn test_health_is_ok_without_database() {
    let response = test_app()
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_me_requires_login() {
    let response = test_app()
        .oneshot(empty_request("GET", "/api/auth/me"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({"error": "Login required"}));
}

#[tokio::test]
async fn test_protected_groups_reject_anonymous_requests() {
    let app = test_app();
    for (method, uri) in [
        ("GET", "/api/shopping/cart"),
        ("GET", "/api/shopping/orders"),
        ("GET", "/api/notifications"),
        ("GET", "/api/admin/dashboard"),
        ("GET", "/api/admin/users"),
        ("POST", "/api/admin/coupons"),
        ("GET", "/api/vendor-portal/profile"),
        ("GET", "/api/franchise-portal/orders"),
        ("GET", "/api/author-portal/posts"),
        ("POST", "/api/uploads"),
    ] {
        let response = app
            .clone()
            .oneshot(empty_request(method, uri))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} should need a session"
        );
    }
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let response = test_app()
        .oneshot(empty_request("GET", "/api/does-not-exist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"error": "route not found"}));
}

#[tokio::test]
async fn test_otp_send_rejects_bad_phone() {
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/auth/otp/send",
            &json!({"phone": "12345"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid phone number")
    );
}

#[tokio::test]
async fn test_staff_login_with_malformed_email_is_generic_401() {
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            &json!({"email": "not-an-email", "password": "whatever123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Invalid credentials"})
    );
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let response = test_app()
        .oneshot(empty_request("GET", "/api/auth/me"))
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["cache-control"], "no-store, max-age=0");
    assert!(
        headers["content-security-policy"]
            .to_str()
            .unwrap()
            .contains("default-src 'none'")
    );
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let mut request = empty_request("GET", "/health");
    request
        .headers_mut()
        .insert("x-request-id", "lb-4f1c9a".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "lb-4f1c9a");
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = test_app();
    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/auth/me"))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(statuses.first(), Some(&StatusCode::UNAUTHORIZED));
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_webhook_without_razorpay_is_rejected() {
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/webhooks/razorpay",
            &json!({"event": "payment.captured", "payload": {}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_signature_is_checked() {
    let app = test_app_with_razorpay("whsec_test");
    let payload = json!({"event": "payment.captured", "payload": {}}).to_string();

    let mut unsigned = json_request("POST", "/api/webhooks/razorpay", &json!({}));
    *unsigned.body_mut() = payload.clone().into();
    let response = app.clone().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut forged = json_request("POST", "/api/webhooks/razorpay", &json!({}));
    *forged.body_mut() = payload.clone().into();
    forged
        .headers_mut()
        .insert("x-razorpay-signature", "00ff".parse().unwrap());
    let response = app.clone().oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Payment verification failed"})
    );

    // No payment entity, so the event is acknowledged without a lookup
    let signature = sign(&SecretString::from("whsec_test"), payload.as_bytes()).unwrap();
    let mut signed = json_request("POST", "/api/webhooks/razorpay", &json!({}));
    *signed.body_mut() = payload.into();
    signed
        .headers_mut()
        .insert("x-razorpay-signature", signature.parse().unwrap());
    let response = app.oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}
