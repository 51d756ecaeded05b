//! Queue API handlers.

use axum::extract::{Query, State};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use peakguard_core::{mask_token, QueueStats, QueueStatus, ReleaseOutcome};

use super::cookie::{cleared_cookie, token_cookie, token_from_jar};
use super::error::ApiError;
use super::middleware::AuthUser;
use super::response::ApiResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?token=` on status and release.
#[derive(Debug, Default, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinData {
    pub queue_token: String,
    /// Arrival order number.
    pub queue_number: u64,
    pub active: bool,
    /// Only present while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub queue_status: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct ReleaseData {
    pub outcome: ReleaseOutcome,
}

#[derive(Debug, Serialize)]
pub struct AdmissionData {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetData {
    pub expired: usize,
}

/// Query token when given and non-blank, otherwise the cookie.
fn resolve_token(params: &TokenParams, jar: &CookieJar) -> Option<String> {
    params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| token_from_jar(jar))
}

// ============================================================================
// Handlers
// ============================================================================

/// Join the queue as the authenticated identity.
pub async fn join(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<JoinData>), ApiError> {
    let outcome = state.queue().join(&identity)?;

    if outcome.created {
        info!(
            "Queue join: ticket {} (#{}) {}",
            mask_token(&outcome.token),
            outcome.sequence,
            if outcome.status.active {
                "admitted".to_string()
            } else {
                format!("waiting at {}", outcome.status.position)
            }
        );
    }

    let jar = jar.add(token_cookie(&state.config().cookie, outcome.token.clone()));
    let data = JoinData {
        queue_token: outcome.token,
        queue_number: outcome.sequence,
        active: outcome.status.active,
        position: (!outcome.status.active).then_some(outcome.status.position),
    };
    Ok((jar, ApiResponse::ok("Joined the queue", data)))
}

/// Poll a ticket.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
    jar: CookieJar,
) -> Result<ApiResponse<StatusData>, ApiError> {
    let token = resolve_token(&params, &jar).ok_or(ApiError::MissingToken)?;
    let queue_status = state.queue().status(&token)?;
    Ok(ApiResponse::ok("Queue status", StatusData { queue_status }))
}

/// Give up a ticket, by token or by the caller's identity. Always succeeds.
pub async fn release(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Query(params): Query<TokenParams>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<ReleaseData>), ApiError> {
    let outcome = match resolve_token(&params, &jar) {
        Some(token) => state.queue().release(&token)?,
        None => state.queue().release_identity(&identity)?,
    };

    let jar = jar.add(cleared_cookie(&state.config().cookie));
    Ok((jar, ApiResponse::ok("Released", ReleaseData { outcome })))
}

/// Forward-auth check. Only reached once `require_admission` let the request
/// through.
pub async fn admission() -> ApiResponse<AdmissionData> {
    ApiResponse::ok("Admitted", AdmissionData { active: true })
}

/// Expire every live ticket (admin).
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<ApiResponse<ResetData>, ApiError> {
    if !state.config().admin.reset_enabled {
        return Err(ApiError::NotFound("Queue reset is disabled".to_string()));
    }
    let expired = state.queue().reset()?;
    warn!("Queue reset through admin API ({} tickets expired)", expired);
    Ok(ApiResponse::ok("Queue reset", ResetData { expired }))
}

/// Queue snapshot (admin).
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResponse<QueueStats> {
    ApiResponse::ok("Queue stats", state.queue().stats())
}
