//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::state::AppState;

/// The user id resolved by [`require_auth`], available to handlers as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Header carrying the shared admin secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Returns the non-empty value of cookie `name`.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix(name)?.strip_prefix('='))
        .filter(|value| !value.is_empty())
}

/// Extracts the auth session id from the `session` cookie.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    read_cookie(headers, "session")
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts an [`AuthUser`] into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let auth_session_id = session_cookie(req.headers())
        .ok_or_else(|| HttpError::unauthorized("Not logged in"))?
        .to_string();

    let session = state
        .accounts
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {}", e);
            HttpError::unauthorized("Session expired or invalid")
        })?;

    req.extensions_mut().insert(AuthUser(session.user_id));
    Ok(next.run(req).await)
}

/// Middleware guarding rule administration and catalog jobs.
///
/// Requires `x-admin-token` to equal the configured `ADMIN_TOKEN`. With no
/// token configured every request is rejected.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        warn!("Admin request rejected: ADMIN_TOKEN is not configured");
        return Err(HttpError::unauthorized("Admin access is disabled"));
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(HttpError::unauthorized("Invalid admin token"));
    }

    Ok(next.run(req).await)
}
