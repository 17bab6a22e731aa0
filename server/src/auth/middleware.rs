//! Axum middleware extracting the authenticated principal

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

use super::jwt;

/// Middleware for routes usable anonymously: a valid bearer token attaches
/// `Some(Principal)`, a malformed or expired one is rejected outright, and
/// no header at all attaches `None` (guest access is resolved later against
/// the capability token). The `Option<Principal>` extension is always
/// present on routes behind this middleware.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let principal = match request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        Some(auth_header) => {
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::Unauthorized.into_response())?;

            let principal = jwt::verify_token(token, &state.config.jwt_secret)
                .ok_or_else(|| AppError::Unauthorized.into_response())?;
            Some(principal)
        }
        None => None,
    };

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Middleware for routes that require a verified principal
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized.into_response())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized.into_response())?;

    let principal = jwt::verify_token(token, &state.config.jwt_secret).ok_or_else(|| {
        tracing::debug!("JWT validation failed");
        AppError::Unauthorized.into_response()
    })?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
