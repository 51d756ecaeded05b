use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::error::error_path_middleware;
use super::middleware::{admin_middleware, auth_middleware, metrics_middleware, require_admission};
use super::{handlers, queue};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Caller routes: identity comes from the configured authenticator
    let caller_routes = Router::new()
        .route("/join", post(queue::join))
        .route("/release", post(queue::release))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Token routes: the queue token is the credential
    let token_routes = Router::new()
        .route("/status", get(queue::status))
        .merge(gated(
            Router::new().route("/admission", get(queue::admission)),
            state.clone(),
        ));

    // Admin routes
    let admin_routes = Router::new()
        .route("/reset", post(queue::reset))
        .route("/stats", get(queue::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ));

    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Queue
        .nest(
            "/queue",
            caller_routes.merge(token_routes).merge(admin_routes),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(error_path_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Put `protected` behind the admission gate: only holders of an active
/// `queueToken` get through. Gate errors carry the request path even when
/// the router is mounted outside [`create_router`].
pub fn gated(protected: Router<Arc<AppState>>, state: Arc<AppState>) -> Router<Arc<AppState>> {
    protected
        .route_layer(middleware::from_fn_with_state(state, require_admission))
        .route_layer(middleware::from_fn(error_path_middleware))
}
