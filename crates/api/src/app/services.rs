//! Service wiring: directory, policy engine, token service.

use std::sync::Arc;

use anyhow::Context;

use warden_auth::TokenService;
use warden_infra::policy::PolicyEnforcer;
use warden_infra::store::InMemoryDirectory;
use warden_infra::{AuthConfig, AuthenticationService, DirectoryAdmin, PolicyManager};

/// Everything the handlers and gates need, shared across requests.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthenticationService>,
    pub admin: Arc<DirectoryAdmin>,
    pub policy: Arc<PolicyManager>,
    pub tokens: Arc<TokenService>,
}

/// Build the services from configuration.
///
/// Fails if the policy engine cannot be constructed; the process has no mode
/// of operation without it. The default roles and permissions are seeded and
/// the policy projection is rebuilt before this returns.
pub async fn build_services(config: &AuthConfig) -> anyhow::Result<AppServices> {
    let enforcer = PolicyEnforcer::new(config.model_path.as_deref(), config.policy_storage())
        .await
        .context("failed to initialize policy enforcer")?;
    let policy = Arc::new(PolicyManager::new(Arc::new(enforcer)));
    let tokens = Arc::new(config.token_service());

    let directory = Arc::new(InMemoryDirectory::new());
    let admin = Arc::new(DirectoryAdmin::new(
        directory.clone(),
        directory.clone(),
        directory.clone(),
        policy.clone(),
    ));
    let auth = Arc::new(AuthenticationService::new(
        directory.clone(),
        directory,
        tokens.clone(),
        policy.clone(),
        config.sync_failure,
    ));

    let snapshot = admin
        .seed_defaults()
        .await
        .context("failed to seed default roles")?;
    tracing::info!(
        rules = snapshot.rules.len(),
        groupings = snapshot.groupings.len(),
        "services ready"
    );

    Ok(AppServices {
        auth,
        admin,
        policy,
        tokens,
    })
}
