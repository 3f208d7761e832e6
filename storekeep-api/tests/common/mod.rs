/// Common test utilities for integration tests
///
/// Builds the real router over the in-memory credential store and the
/// recording mailer, and provides request helpers that return the status
/// and the parsed JSON envelope.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use storekeep_api::app::{build_router, AppState};
use storekeep_api::config::Config;
use storekeep_shared::mail::RecordingMailer;
use storekeep_shared::store::MemoryCredentialStore;
use tower::Service as _;

pub const PASSWORD: &str = "Str0ng!pass";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryCredentialStore>,
    pub mailer: Arc<RecordingMailer>,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgresql://unused/test"),
            ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
            ("SITE_URL", "https://shop.example"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .expect("test configuration is valid");

        let store = Arc::new(MemoryCredentialStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(config.clone(), store.clone(), mailer.clone());

        TestContext {
            app: build_router(state),
            store,
            mailer,
            config,
        }
    }

    /// Sends a JSON request
    pub async fn send(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_raw(method, uri, Some(body.to_string())).await
    }

    /// Sends a request with an optional raw JSON body
    pub async fn send_raw(&self, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    /// Token from the newest emailed link to `email`
    pub fn link_token(&self, email: &str) -> String {
        self.mailer
            .last_link_token(email)
            .expect("a link was emailed")
    }

    /// Signs up and verifies an account, returning its session token
    pub async fn verified_session(&self, email: &str) -> String {
        let (status, _) = self
            .send(
                "POST",
                "/signup",
                serde_json::json!({ "name": "Ada", "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .send("POST", "/verify", serde_json::json!({ "token": self.link_token(email) }))
            .await;
        assert_eq!(status, StatusCode::OK);

        body["success"]["token"].as_str().unwrap().to_string()
    }
}
