//! `/auth` endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::app::dto::{ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest};
use crate::app::errors::auth_error_response;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::Identity;
use crate::middleware::{AuthState, auth_middleware};

pub fn router(services: &AppServices) -> Router {
    let auth_state = AuthState {
        tokens: services.tokens.clone(),
    };

    let protected = Router::new()
        .route("/change-password", post(change_password))
        .route("/me", get(me))
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .merge(protected)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> axum::response::Response {
    match services.auth.login(&body.email, &body.password).await {
        Ok(res) => (StatusCode::OK, Json(res)).into_response(),
        Err(e) => auth_error_response(e),
    }
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> axum::response::Response {
    match services
        .auth
        .register(&body.email, &body.password, &body.first_name, &body.last_name)
        .await
    {
        Ok(res) => (StatusCode::CREATED, Json(res)).into_response(),
        Err(e) => auth_error_response(e),
    }
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> axum::response::Response {
    match services.auth.refresh_token(&body.token).await {
        Ok(res) => (StatusCode::OK, Json(res)).into_response(),
        Err(e) => auth_error_response(e),
    }
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<Identity>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> axum::response::Response {
    match services
        .auth
        .change_password(identity.user_id(), &body.current_password, &body.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => auth_error_response(e),
    }
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<Identity>,
) -> axum::response::Response {
    match services.auth.get_profile(identity.user_id()).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => auth_error_response(e),
    }
}
