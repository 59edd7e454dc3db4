//! User accounts as loaded from the directory.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, UserId};

use crate::password::{self, PasswordError};
use crate::{PermissionKey, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user with roles (and their permissions) hydrated.
///
/// # Invariants
/// - `email` is unique across the directory and stored lower-cased.
/// - A soft-deleted user (`deleted_at` set) never authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active and not soft-deleted.
    pub fn can_authenticate(&self) -> bool {
        self.active && !self.is_deleted()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn check_password(&self, candidate: &str) -> bool {
        password::verify_password(candidate, &self.password_hash)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Names of the active permissions granted through the user's active roles.
    ///
    /// First occurrence wins; duplicates across roles are dropped.
    pub fn permission_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.roles
            .iter()
            .filter(|r| r.active)
            .flat_map(|r| r.active_permissions())
            .filter(|p| seen.insert(p.name.as_str()))
            .map(|p| p.name.clone())
            .collect()
    }

    /// `(resource, action)` grants of the user's active roles.
    pub fn permission_keys(&self) -> Vec<PermissionKey> {
        let mut seen = HashSet::new();
        self.roles
            .iter()
            .filter(|r| r.active)
            .flat_map(|r| r.active_permissions())
            .map(|p| p.key())
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// New user
// ─────────────────────────────────────────────────────────────────────────────

/// Validated registration input, password already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NewUserError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl NewUser {
    pub fn new(
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Self, NewUserError> {
        let email = normalize_email(email)?;
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(DomainError::validation("first and last name are required").into());
        }
        password::validate_password(password)?;

        Ok(Self {
            email,
            password_hash: password::hash_password(password)?,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }
}

/// Trim and lower-case an email, rejecting obviously malformed input.
pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(DomainError::validation("invalid email format")),
    }
}
