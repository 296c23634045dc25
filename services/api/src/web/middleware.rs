//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use course_market_core::domain::Role;
use course_market_core::ports::PortError;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::{decode_token, TOKEN_COOKIE};
use crate::web::state::AppState;

/// The authenticated caller, decoded from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
}

impl AuthUser {
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role != role {
            return Err(PortError::Unauthorized(format!(
                "This action requires the {} role",
                role
            ))
            .into());
        }
        Ok(())
    }
}

/// Finds the session token in the `token` cookie, falling back to a bearer header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(TOKEN_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        });
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Middleware that validates the session token and extracts the caller.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, responds 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| PortError::Unauthenticated("Not authenticated".to_string()))?;

    let user = decode_token(&state.config.jwt_secret, &token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        e
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
