//! Common test utilities for integration tests
//!
//! Every context gets its own in-memory store and recording policy client,
//! so tests never share state and need no external services.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use taskorg_api::app::{build_router, AppState};
use taskorg_api::config::{ApiConfig, Config};
use taskorg_shared::policy::RecordingPolicyClient;
use taskorg_shared::store::MemoryDocumentStore;
use tower::Service as _;

/// Test context containing the app and handles on its collaborators
pub struct TestContext {
    pub store: Arc<MemoryDocumentStore>,
    pub policy: Arc<RecordingPolicyClient>,
    pub app: Router,
}

impl TestContext {
    /// Context whose policy client allows every check
    pub fn new() -> Self {
        Self::with_policy(RecordingPolicyClient::new())
    }

    pub fn with_policy(policy: RecordingPolicyClient) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let policy = Arc::new(policy);

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: None,
        };
        let state = AppState::new(store.clone(), policy.clone(), config);

        Self {
            store,
            policy,
            app: build_router(state),
        }
    }

    /// Sends a request and returns the status and raw body
    pub async fn request_raw(
        &self,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .call(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Sends a request and parses the JSON response body
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let (status, text) = self.request_raw(method, uri, body).await;
        let json = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("non-JSON response ({}): {} {}", status, e, text));
        (status, json)
    }

    /// Signs `uid` in with an `<uid>@example.com` email
    pub async fn sign_in(&self, uid: &str, name: &str) {
        let (status, _) = self
            .request(
                "POST",
                "/v1/users",
                Some(serde_json::json!({
                    "uid": uid,
                    "displayName": name,
                    "email": format!("{}@example.com", uid.to_lowercase()),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Creates an organization as `user_id` and returns its id
    pub async fn create_org(&self, name: &str, user_id: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/v1/orgs",
                Some(serde_json::json!({ "name": name, "userId": user_id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["org"]["id"].as_str().unwrap().to_string()
    }
}
