//! Shared helpers for hr-server integration tests
//!
//! Every test gets its own SQLite file in a temporary directory and a router
//! built exactly as `main.rs` builds it.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use hr_server::config::{AuthConfig, HttpConfig, PasswordCost, ServerConfig};
use hr_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_http(HttpConfig::default()).await
    }

    pub async fn with_http(http: HttpConfig) -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let database_path = dir.path().join("honest_reviews.db");
        let db = hr_common::db::init_database(&database_path)
            .await
            .expect("Should initialize database");

        let mut auth = AuthConfig::new("test-jwt-secret", "test-refresh-pepper");
        auth.password_cost = PasswordCost::minimal();
        auth.recovery_code_count = 3;

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path,
            auth,
            http,
        };
        let state = AppState::new(db, config);
        Self {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(test_request(method, uri, token, body))
            .await
            .unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("DELETE", uri, token, None).await
    }

    /// Register `username` and return the registration body
    pub async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({"username": username, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, body);
        body
    }

    /// Log in and return the token body
    pub async fn login(&self, username: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                json!({"username": username, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {}: {}", username, body);
        body
    }

    /// Register and log in; returns (profile id, access token)
    pub async fn user(&self, username: &str) -> (String, String) {
        let registered = self.register(username).await;
        let tokens = self.login(username).await;
        (
            registered["id"].as_str().unwrap().to_string(),
            tokens["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Create an organization as `token`; returns its slug
    pub async fn org(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/orgs", Some(token), json!({"name": name}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create org: {}", body);
        body["slug"].as_str().unwrap().to_string()
    }

    /// Create a personality as `token`; returns its slug
    pub async fn personality(&self, token: &str, org_slug: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/orgs/{}/personalities", org_slug),
                Some(token),
                json!({"name": name}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create personality: {}", body);
        body["slug"].as_str().unwrap().to_string()
    }

    /// Post a review; returns the created review body
    pub async fn review(&self, token: &str, org_slug: &str, p_slug: &str, rating: i64) -> Value {
        let (status, body) = self
            .post(
                &reviews_uri(org_slug, p_slug),
                Some(token),
                json!({"title": format!("Rated {}", rating), "body": "Honest words.", "rating": rating}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create review: {}", body);
        body
    }
}

pub fn reviews_uri(org_slug: &str, personality_slug: &str) -> String {
    format!(
        "/api/orgs/{}/personalities/{}/reviews",
        org_slug, personality_slug
    )
}

/// Test helper: Build a request with optional bearer token and JSON body
pub fn test_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
