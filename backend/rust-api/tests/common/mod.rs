#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::{bson::doc, Database};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use kambaz_api::{
    config::Config,
    create_router,
    services::{ensure_indexes, AppState},
};

pub const CSRF_TOKEN: &str = "integration-test-csrf";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    /// Distinct per app so IP rate-limit buckets don't leak between tests
    pub client_ip: String,
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");
    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");
    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );
    ensure_indexes(&app_state.mongo)
        .await
        .expect("Failed to create indexes");

    let db = app_state.mongo.clone();
    let octets = uuid::Uuid::new_v4().into_bytes();
    TestApp {
        router: create_router(app_state),
        db,
        client_ip: format!("10.{}.{}.{}", octets[0], octets[1], octets[2]),
    }
}

pub fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    /// Sends a JSON request with a bearer token and a matching CSRF cookie/header pair
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", &self.client_ip)
            .header("cookie", format!("csrf_token={}", CSRF_TOKEN))
            .header("x-csrf-token", CSRF_TOKEN);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Signs up a student and returns (user id, access token)
    pub async fn signup(&self, username: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/users/signup",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "password": password,
                    "firstName": "Test",
                    "lastName": "User",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        (
            body["user"]["_id"].as_str().unwrap().to_string(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn signin(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/users/signin",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signin failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Signs up, promotes the account in MongoDB and signs in again so the token carries the role
    pub async fn signup_with_role(&self, prefix: &str, role: &str) -> (String, String) {
        let username = unique_username(prefix);
        let (user_id, _) = self.signup(&username, "password123").await;
        self.db
            .collection::<mongodb::bson::Document>("users")
            .update_one(doc! { "_id": user_id.as_str() }, doc! { "$set": { "role": role } })
            .await
            .unwrap();
        let token = self.signin(&username, "password123").await;
        (user_id, token)
    }
}
