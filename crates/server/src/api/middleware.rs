//! Authentication, admission and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use peakguard_core::{mask_token, AuthError, AuthRequest, Authenticator, Identity};

use super::cookie::token_from_jar;
use super::error::{request_path, ApiError};
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, GATE_REJECTIONS_TOTAL, HTTP_REQUESTS_IN_FLIGHT,
    HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Where page requests without an active ticket are sent.
pub const WAITING_PAGE: &str = "/queue/waiting";

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Resolves the caller's identity with the configured authenticator and
/// stores it in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_request = auth_request(&request);
    let identity = authenticate(state.authenticator(), &auth_request).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Guards admin endpoints with the admin key. Closed (404) when no admin key
/// is configured.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(admin) = state.admin_authenticator() else {
        return Err(ApiError::NotFound("Admin endpoints are disabled".to_string()));
    };
    authenticate(admin, &auth_request(&request)).await?;
    Ok(next.run(request).await)
}

/// Admission gate for protected routes.
///
/// Lets the request through only when its `queueToken` cookie names an active
/// ticket. API requests (`/api/...`) get an enveloped JSON error; page
/// requests are redirected to the waiting page. A no-op when the queue is
/// disabled.
pub async fn require_admission(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config().queue.enabled {
        return next.run(request).await;
    }

    let path = request_path(&request);
    let is_api = path.starts_with("/api/");
    let token = token_from_jar(&jar);

    let rejection = match &token {
        None => ApiError::MissingToken,
        Some(token) => match state.queue().validate_active(token) {
            Ok(()) => return next.run(request).await,
            Err(e) => {
                debug!(
                    "Admission denied for {} on {}: {}",
                    mask_token(token),
                    path,
                    e
                );
                ApiError::from(e)
            }
        },
    };

    GATE_REJECTIONS_TOTAL
        .with_label_values(&[rejection_reason(&rejection)])
        .inc();

    if is_api {
        rejection.into_response()
    } else {
        Redirect::to(WAITING_PAGE).into_response()
    }
}

/// Extractor for the authenticated identity's user id.
///
/// Requires `auth_middleware` on the route; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = parts
            .extensions
            .get::<Identity>()
            .map(|id| AuthUser(id.user_id.clone()))
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()));
        std::future::ready(result)
    }
}

fn auth_request(request: &Request<Body>) -> AuthRequest {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Source IP, localhost when the server was not started with connect info
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    AuthRequest { headers, source_ip }
}

async fn authenticate(
    authenticator: &dyn Authenticator,
    request: &AuthRequest,
) -> Result<Identity, ApiError> {
    match authenticator.authenticate(request).await {
        Ok(identity) => Ok(identity),
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["not_authenticated"])
                .inc();
            Err(ApiError::Unauthorized("Authentication required".to_string()))
        }
        Err(AuthError::InvalidCredentials(_)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_credentials"])
                .inc();
            Err(ApiError::Unauthorized("Invalid credentials".to_string()))
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            warn!("Authenticator failed: {}", e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

fn rejection_reason(err: &ApiError) -> &'static str {
    match err {
        ApiError::MissingToken => "missing_token",
        ApiError::TokenNotFound => "not_found",
        ApiError::Gone(_) => "expired",
        ApiError::NotAdmitted(_) => "not_active",
        _ => "internal",
    }
}
