// Rate limiting and sign-in lockout against a live Redis
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::unique_username;

async fn flush_keys(pattern: &str) {
    let redis_uri =
        std::env::var("REDIS_URI").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
    let client = redis::Client::open(redis_uri).expect("Failed to connect to Redis for cleanup");
    let mut conn = client
        .get_connection_manager()
        .await
        .expect("Failed to get Redis connection");

    let keys: Vec<String> = redis::cmd("KEYS")
        .arg(pattern)
        .query_async(&mut conn)
        .await
        .unwrap_or_default();

    if !keys.is_empty() {
        let _: () = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .expect("Failed to delete keys");
        eprintln!("Flushed {} {} keys from Redis", keys.len(), pattern);
    }
}

async fn post_with_ip(app: &axum::Router, uri: &str, body: serde_json::Value, ip: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
#[serial_test::serial]
#[ignore = "requires MongoDB and Redis"]
async fn test_signup_rate_limiting_per_ip() {
    flush_keys("ratelimit:*").await;
    std::env::set_var("RATE_LIMIT_SIGNUP_ATTEMPTS", "3");
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let ip = "192.168.2.100";

    for i in 0..3 {
        let status = post_with_ip(
            &app.router,
            "/api/users/signup",
            json!({ "username": unique_username("rl"), "password": "password123" }),
            ip,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "signup {} should be allowed", i + 1);
    }

    let status = post_with_ip(
        &app.router,
        "/api/users/signup",
        json!({ "username": unique_username("rl"), "password": "password123" }),
        ip,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let status = post_with_ip(
        &app.router,
        "/api/users/signup",
        json!({ "username": unique_username("rl"), "password": "password123" }),
        "192.168.2.101",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "other IPs keep their own budget");

    std::env::remove_var("RATE_LIMIT_SIGNUP_ATTEMPTS");
}

#[tokio::test]
#[serial_test::serial]
#[ignore = "requires MongoDB and Redis"]
async fn test_signin_rate_limiting_per_ip() {
    flush_keys("ratelimit:*").await;
    std::env::set_var("RATE_LIMIT_SIGNIN_ATTEMPTS", "4");
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let ip = "192.168.1.100";

    // Different unknown usernames so the per-account lockout never triggers
    for i in 0..4 {
        let status = post_with_ip(
            &app.router,
            "/api/users/signin",
            json!({ "username": unique_username("ghost"), "password": "wrong" }),
            ip,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "signin {} should reach the handler", i + 1);
    }

    let status = post_with_ip(
        &app.router,
        "/api/users/signin",
        json!({ "username": unique_username("ghost"), "password": "wrong" }),
        ip,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    std::env::remove_var("RATE_LIMIT_SIGNIN_ATTEMPTS");
}

#[tokio::test]
#[serial_test::serial]
#[ignore = "requires MongoDB and Redis"]
async fn test_repeated_failed_signins_lock_the_account() {
    flush_keys("ratelimit:*").await;
    flush_keys("failed_signin:*").await;
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let username = unique_username("locked");
    app.signup(&username, "password123").await;

    for i in 0..5 {
        let status = post_with_ip(
            &app.router,
            "/api/users/signin",
            json!({ "username": username, "password": "wrong" }),
            &app.client_ip,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "failed signin {}", i + 1);
    }

    // Even the right password is refused while the lockout lasts
    let status = post_with_ip(
        &app.router,
        "/api/users/signin",
        json!({ "username": username, "password": "password123" }),
        &app.client_ip,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    flush_keys("failed_signin:*").await;
}
