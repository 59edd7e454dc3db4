use axum::Router;

use crate::app::services::AppServices;

pub mod admin;
pub mod auth;
pub mod system;

/// Router for the `/auth` and `/admin` trees.
pub fn router(services: &AppServices) -> Router {
    Router::new()
        .nest("/auth", auth::router(services))
        .nest("/admin", admin::router(services))
}
