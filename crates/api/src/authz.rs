//! Route-level authorization gates.
//!
//! Role gates and permission gates both ask the policy engine, using the
//! roles carried by the caller's [`Identity`]. Gates must sit behind
//! [`auth_middleware`](crate::middleware::auth_middleware).

use std::sync::Arc;

use axum::{
    extract::State,
    middleware::Next,
    response::Response,
};

use warden_auth::{AuthError, Requirement};
use warden_infra::PolicyManager;

use crate::app::errors::auth_error_response;
use crate::context::Identity;

#[derive(Clone)]
pub struct Gate {
    pub policy: Arc<PolicyManager>,
    pub requirement: Requirement,
}

impl Gate {
    pub fn new(policy: Arc<PolicyManager>, requirement: Requirement) -> Self {
        Self {
            policy,
            requirement,
        }
    }

    /// Check the gate for an already authenticated caller.
    pub async fn check(&self, identity: &Identity) -> Result<(), AuthError> {
        let allowed = self
            .policy
            .authorize(identity.roles(), &self.requirement)
            .await?;
        if allowed {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermission(self.requirement.to_string()))
        }
    }
}

pub fn require_permission(
    policy: Arc<PolicyManager>,
    resource: impl Into<String>,
    action: impl Into<String>,
) -> Gate {
    Gate::new(policy, Requirement::permission(resource, action))
}

pub fn require_any_permission<I, R, A>(policy: Arc<PolicyManager>, pairs: I) -> Gate
where
    I: IntoIterator<Item = (R, A)>,
    R: Into<String>,
    A: Into<String>,
{
    Gate::new(policy, Requirement::any_permission(pairs))
}

pub fn require_role(policy: Arc<PolicyManager>, role: impl Into<String>) -> Gate {
    Gate::new(policy, Requirement::role(role))
}

pub fn require_any_role<I, S>(policy: Arc<PolicyManager>, roles: I) -> Gate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Gate::new(policy, Requirement::any_role(roles))
}

pub fn admin_only(policy: Arc<PolicyManager>) -> Gate {
    Gate::new(policy, Requirement::admin())
}

pub fn super_admin_only(policy: Arc<PolicyManager>) -> Gate {
    Gate::new(policy, Requirement::super_admin())
}

pub fn hr_only(policy: Arc<PolicyManager>) -> Gate {
    Gate::new(policy, Requirement::hr())
}

/// Middleware form of [`Gate::check`], installed with
/// `axum::middleware::from_fn_with_state(gate, enforce_gate)`.
pub async fn enforce_gate(
    State(gate): State<Gate>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        return Err(auth_error_response(AuthError::MissingAuthorization));
    };

    if let Err(e) = gate.check(&identity).await {
        tracing::info!(
            user_id = %identity.user_id(),
            requirement = %gate.requirement,
            "request denied"
        );
        return Err(auth_error_response(e));
    }

    Ok(next.run(req).await)
}
