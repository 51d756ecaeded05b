//! Maps queue and auth failures to enveloped HTTP responses.
//!
//! Every error body carries `data.code`, a stable machine-readable code, and
//! `data.path`, the request path. The path is filled in by
//! [`error_path_middleware`] since the error itself never sees the request.

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;

use peakguard_core::{QueueError, QueueStatus};

use super::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No queue token in the query or cookie.
    #[error("Queue token is missing. Please join the queue.")]
    MissingToken,

    #[error("{0}")]
    Unauthorized(String),

    /// Waiting ticket hit a protected route.
    #[error("not admitted yet")]
    NotAdmitted(QueueStatus),

    /// Unknown or purged queue token.
    #[error("Queue token not found. Please join the queue again.")]
    TokenNotFound,

    /// Endpoint switched off by configuration.
    #[error("{0}")]
    NotFound(String),

    /// Token expired; the client has to join again.
    #[error("{0}")]
    Gone(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotAdmitted(_) => StatusCode::FORBIDDEN,
            ApiError::TokenNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code clients branch on.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingToken => "QUEUE_TOKEN_INVALID",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotAdmitted(_) => "QUEUE_NOT_ACTIVE",
            ApiError::TokenNotFound => "QUEUE_TOKEN_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Gone(_) => "QUEUE_TOKEN_EXPIRED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => ApiError::TokenNotFound,
            QueueError::Expired { reason, .. } => ApiError::Gone(format!(
                "Queue token expired ({}). Please join the queue again.",
                reason
            )),
            QueueError::NotActive(status) => ApiError::NotAdmitted(status),
            QueueError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// An error envelope kept on the response so the path can be added later.
#[derive(Debug, Clone)]
struct ErrorBody {
    status: StatusCode,
    message: String,
    data: Map<String, Value>,
}

impl ErrorBody {
    fn at(mut self, path: &str) -> Self {
        self.data.insert("path".to_string(), json!(path));
        self
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response =
            ApiResponse::with_status(status, self.message.clone(), Some(self.data.clone()))
                .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Queue invariant violated: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut data = Map::new();
        data.insert("code".to_string(), json!(self.code()));
        if let ApiError::NotAdmitted(queue_status) = &self {
            data.insert("queueStatus".to_string(), json!(queue_status));
        }

        ErrorBody {
            status: self.status_code(),
            message,
            data,
        }
        .into_response()
    }
}

/// Path of the request as the client sent it, before any `nest` stripped a
/// prefix.
pub fn request_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Adds `data.path` to error envelopes produced by [`ApiError`].
pub async fn error_path_middleware(request: Request<Body>, next: Next) -> Response {
    let path = request_path(&request);
    let mut response = next.run(request).await;

    let Some(body) = response.extensions_mut().remove::<ErrorBody>() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let (_, rendered) = body.at(&path).into_response().into_parts();
    Response::from_parts(parts, rendered)
}
