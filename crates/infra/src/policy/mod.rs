//! Policy engine projection of the directory.
//!
//! The casbin engine answers `(subject, object, action)` questions with role
//! inheritance through `g(user, role)` grouping tuples. Its rule set is derived
//! from the directory and can be regenerated from it at any time.

pub mod defaults;
pub mod enforcer;
pub mod manager;
pub mod projection;

use thiserror::Error;

use warden_auth::AuthError;

pub use enforcer::{PolicyEnforcer, PolicyStorage};
pub use manager::PolicyManager;
pub use projection::{GroupingRule, PolicyRule, PolicySnapshot, user_subject};

// Embed the casbin model so deployments don't need a separate config file.
pub const MODEL_CONF: &str = include_str!("model.conf");

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy already exists: {0}")]
    AlreadyExists(String),

    #[error("policy does not exist: {0}")]
    NotFound(String),

    #[error("role assignment conflict: {0}")]
    RoleAssignmentConflict(String),

    #[error("policy engine error: {0}")]
    Engine(#[from] casbin::Error),

    #[error("policy storage error: {0}")]
    Storage(String),
}

impl From<PolicyError> for AuthError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::AlreadyExists(rule) => AuthError::PolicyAlreadyExists(rule),
            PolicyError::NotFound(rule) => AuthError::PolicyNotFound(rule),
            PolicyError::RoleAssignmentConflict(msg) => AuthError::RoleAssignmentConflict(msg),
            PolicyError::Engine(e) => AuthError::Internal(e.to_string()),
            PolicyError::Storage(msg) => AuthError::Internal(msg),
        }
    }
}
