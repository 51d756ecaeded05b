//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the full router around a
//! queue driven by a manual clock, so expiry can be tested without sleeping.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use peakguard_core::{
    config::{AdminConfig, AuthConfig, AuthMethod, CookieConfig, ServerConfig},
    create_authenticator, Authenticator, Config, QueueService,
};

/// Re-export testing helpers for convenience
pub use peakguard_core::testing::{fixtures, ManualClock};

pub const ADMIN_KEY: &str = "admin-secret";
pub const IDENTITY_HEADER: &str = "x-user-id";

/// Test fixture around an in-process router.
///
/// Callers identify themselves with the `x-user-id` header; admin calls use
/// `ADMIN_KEY`.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_join() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.join("20231234").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Direct handle on the queue behind the router
    pub queue: Arc<QueueService>,
    /// Clock driving every queue decision
    pub clock: Arc<ManualClock>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Raw `Set-Cookie` header, if any.
    pub set_cookie: Option<String>,
}

impl TestResponse {
    /// `queueToken` from the envelope.
    pub fn token(&self) -> String {
        self.body["data"]["queueToken"]
            .as_str()
            .expect("response carries no queueToken")
            .to_string()
    }
}

impl TestFixture {
    /// Create a new test fixture with capacity 2.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let mut queue_config = fixtures::queue_config(test_config.capacity);
        queue_config.enabled = test_config.queue_enabled;

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::Header,
                identity_header: IDENTITY_HEADER.to_string(),
                api_key: None,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            queue: queue_config,
            cookie: CookieConfig::default(),
            admin: AdminConfig {
                api_key: test_config.admin_enabled.then(|| ADMIN_KEY.to_string()),
                reset_enabled: test_config.reset_enabled,
            },
        };

        let clock = Arc::new(ManualClock::new());
        let queue = Arc::new(QueueService::with_clock(&config.queue, clock.clone()));
        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );

        let state = Arc::new(peakguard_server::state::AppState::new(
            config,
            authenticator,
            Arc::clone(&queue),
        ));
        let router = peakguard_server::api::create_router(state);

        Self {
            router,
            queue,
            clock,
        }
    }

    /// `POST /api/queue/join` as `user`.
    pub async fn join(&self, user: &str) -> TestResponse {
        self.send("POST", "/api/queue/join", &[(IDENTITY_HEADER, user)])
            .await
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send("GET", path, &[]).await
    }

    /// Send a GET request carrying the `queueToken` cookie.
    pub async fn get_with_cookie(&self, path: &str, token: &str) -> TestResponse {
        let cookie = format!("queueToken={}", token);
        self.send("GET", path, &[(header::COOKIE.as_str(), cookie.as_str())])
            .await
    }

    /// Send a POST request as `user`.
    pub async fn post_as(&self, path: &str, user: &str) -> TestResponse {
        self.send("POST", path, &[(IDENTITY_HEADER, user)]).await
    }

    /// Send an admin request with the admin key.
    pub async fn admin(&self, method: &str, path: &str) -> TestResponse {
        let bearer = format!("Bearer {}", ADMIN_KEY);
        self.send(method, path, &[(header::AUTHORIZATION.as_str(), bearer.as_str())])
            .await
    }

    /// Send a request with the given headers.
    pub async fn send(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }
        let request = request_builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
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

        TestResponse {
            status,
            body,
            set_cookie,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub capacity: usize,
    pub queue_enabled: bool,
    pub admin_enabled: bool,
    pub reset_enabled: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            queue_enabled: true,
            admin_enabled: true,
            reset_enabled: true,
        }
    }
}

impl TestConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
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

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json.pointer($path).cloned().unwrap_or(serde_json::Value::Null);
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
