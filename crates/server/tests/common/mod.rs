//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, enabling end-to-end API tests without
//! a commerce backend or display windows.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use livedeck_core::config::DatabaseConfig;
use livedeck_core::session::SessionPersistence;
use livedeck_core::{
    testing::{MockGateway, MockWindowManager},
    Config, SqliteSessionPersistence,
};
use livedeck_server::state::{AppState, Collaborators};

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Commerce backend (MockGateway)
/// - Surface windows (MockWindowManager)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_import() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/files", json!({
///         "name": "a.csv",
///         "content": "1001\n1002\n"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for driving components directly
    pub state: Arc<AppState>,
    /// Mock gateway - mark invalid ids, queue failures, inspect calls
    pub gateway: Arc<MockGateway>,
    /// Mock window manager - inspect opened/closed surfaces
    pub windows: Arc<MockWindowManager>,
    /// Temporary directory for the session database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Create a test fixture from a base configuration. The database path is
    /// replaced with a temporary one.
    pub async fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        config.database = DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        };

        let gateway = Arc::new(MockGateway::new());
        let windows = Arc::new(MockWindowManager::new());
        let persistence: Arc<dyn SessionPersistence> = Arc::new(
            SqliteSessionPersistence::new(&config.database.path)
                .expect("Failed to create session persistence"),
        );

        let state = Arc::new(AppState::new(
            config,
            Collaborators {
                gateway: gateway.clone(),
                windows: windows.clone(),
                persistence: Some(persistence),
                generator: None,
            },
        ));
        state.hub().start().await.expect("Failed to start sync hub");

        let router = livedeck_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            gateway,
            windows,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Create session `id`, import `ids` as one file and ingest them all.
    pub async fn session_with_products(&self, id: &str, ids: &[&str]) {
        let response = self
            .post(
                "/api/v1/sessions",
                serde_json::json!({ "id": id, "title": "Test show" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);

        let response = self
            .post(
                "/api/v1/files",
                serde_json::json!({ "name": "products.csv", "content": ids.join("\n") }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);

        let response = self
            .post("/api/v1/ingest", serde_json::json!({ "target": ids.len() }))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
