//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory, policy engine and token service wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request bodies
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: body extractors

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use warden_infra::AuthConfig;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router from already constructed services.
pub fn router(services: AppServices) -> Router {
    let api = routes::router(&services);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(api)
        .layer(ServiceBuilder::new().layer(Extension(Arc::new(services))))
}

/// Build services from configuration and return the router (entrypoint used by `main.rs`).
pub async fn build_app(config: &AuthConfig) -> anyhow::Result<Router> {
    let services = build_services(config).await?;
    Ok(router(services))
}
