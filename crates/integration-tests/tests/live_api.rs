//! HTTP tests against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`haat-cli migrate`)
//! - The server running (`cargo run -p haat-server`)
//! - An admin account in `HAAT_TEST_ADMIN_EMAIL` / `HAAT_TEST_ADMIN_PASSWORD`
//!   (`haat-cli admin create`)
//!
//! Run with: `cargo test -p haat-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use haat_integration_tests::live_base_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Log in as the test admin and return the cookie-carrying client.
async fn admin_client() -> Client {
    let email = std::env::var("HAAT_TEST_ADMIN_EMAIL").expect("HAAT_TEST_ADMIN_EMAIL not set");
    let password =
        std::env::var("HAAT_TEST_ADMIN_PASSWORD").expect("HAAT_TEST_ADMIN_PASSWORD not set");
    let client = client();
    let resp = client
        .post(format!("{}/api/auth/login", live_base_url()))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_readiness_reports_database() {
    let resp = client()
        .get(format!("{}/health/ready", live_base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_storefront_catalog_is_public() {
    let base = live_base_url();
    let client = client();

    let resp = client
        .get(format!("{base}/api/shopping/categories"))
        .send()
        .await
        .expect("Failed to list categories");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.json::<Value>().await.unwrap().is_array());

    let resp = client
        .get(format!("{base}/api/shopping/products?per_page=5"))
        .send()
        .await
        .expect("Failed to list products");
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["per_page"], 5);
    assert!(page["items"].as_array().unwrap().len() <= 5);
}

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_admin_session_reaches_dashboard() {
    let base = live_base_url();
    let client = admin_client().await;

    let me: Value = client
        .get(format!("{base}/api/auth/me"))
        .send()
        .await
        .expect("Failed to fetch current user")
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"], "admin");

    let resp = client
        .get(format!("{base}/api/admin/dashboard"))
        .send()
        .await
        .expect("Failed to fetch dashboard");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base}/api/admin/dashboard"))
        .send()
        .await
        .expect("Failed to fetch dashboard");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_coupon_admin_round_trip() {
    let base = live_base_url();
    let client = admin_client().await;
    let code = format!("IT{}", std::process::id());

    let resp = client
        .post(format!("{base}/api/admin/coupons"))
        .json(&json!({"code": code, "kind": "flat", "value": "50"}))
        .send()
        .await
        .expect("Failed to create coupon");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let coupon: Value = resp.json().await.unwrap();
    assert_eq!(coupon["code"], code.to_uppercase());

    let resp = client
        .post(format!("{base}/api/admin/coupons"))
        .json(&json!({"code": code, "kind": "flat", "value": "50"}))
        .send()
        .await
        .expect("Failed to post duplicate coupon");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .delete(format!("{base}/api/admin/coupons/{}", coupon["id"]))
        .send()
        .await
        .expect("Failed to delete coupon");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
