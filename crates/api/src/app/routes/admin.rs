//! Directory inspection endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use warden_auth::AuthError;
use warden_core::UserId;

use crate::app::errors::auth_error_response;
use crate::app::services::AppServices;
use crate::authz::{enforce_gate, require_permission};
use crate::middleware::{AuthState, auth_middleware};

pub fn router(services: &AppServices) -> Router {
    let auth_state = AuthState {
        tokens: services.tokens.clone(),
    };
    let can_read_users = require_permission(services.policy.clone(), "users", "read");

    // Layers run outside-in: authenticate first, then gate.
    Router::new()
        .route("/users/:id/permissions", get(effective_permissions))
        .route_layer(from_fn_with_state(can_read_users, enforce_gate))
        .route_layer(from_fn_with_state(auth_state, auth_middleware))
}

/// GET /admin/users/:id/permissions
pub async fn effective_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse() {
        Ok(id) => id,
        Err(e) => return auth_error_response(AuthError::from(e)),
    };

    match services.admin.effective_permissions(user_id).await {
        Ok(effective) => (StatusCode::OK, Json(effective)).into_response(),
        Err(e) => auth_error_response(e),
    }
}
