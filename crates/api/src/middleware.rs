use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use warden_auth::{AuthError, TokenService, extract_bearer};

use crate::app::errors::auth_error_response;
use crate::context::Identity;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Reject the request unless it carries a valid bearer token.
///
/// Expired tokens are rejected too; renewal goes through `/auth/refresh`.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let identity = authenticate(&state, req.headers()).map_err(|e| {
        tracing::debug!(error = %e, "request rejected by auth middleware");
        auth_error_response(e)
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Attach an [`Identity`] when a valid bearer token is present; otherwise let
/// the request through anonymously.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Ok(identity) = authenticate(&state, req.headers()) {
        req.extensions_mut().insert(identity);
    }
    next.run(req).await
}

fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<Identity, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    let header = header.to_str().map_err(|_| AuthError::MalformedBearer)?;
    let token = extract_bearer(header).ok_or(AuthError::MalformedBearer)?;

    let claims = state.tokens.validate_token(token)?;
    Ok(Identity::from_claims(claims))
}
