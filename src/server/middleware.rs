use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request},
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::error::AppError;

/// Bearer-token authorization for the queue API.
///
/// Reads need any valid token; every other method needs one of the
/// configured operator roles. Without a configured secret all requests pass
/// (development mode). The validated claims are added to the request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(validator) = state.jwt_validator.as_ref() else {
        return Ok(next.run(req).await);
    };

    let token = extract_bearer_token(&req)
        .or_else(|| extract_query_token(&req))
        .ok_or_else(|| {
            tracing::warn!(path = %req.uri().path(), "Missing bearer token");
            AppError::Auth("Missing bearer token".to_string())
        })?;

    let claims = if req.method() == Method::GET {
        validator.validate(&token)?
    } else {
        validator.authorize_operator(&token)?
    };

    tracing::debug!(user_id = %claims.user_id(), method = %req.method(), "Request authorized");
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// `?token=` fallback for EventSource clients, which cannot set headers
fn extract_query_token(req: &Request<Body>) -> Option<String> {
    req.uri().query()?.split('&').find_map(|pair| {
        pair.strip_prefix("token=")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}
