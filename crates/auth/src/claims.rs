use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::roles::{ADMIN, SUPER_ADMIN};
use crate::User;

/// Session token payload.
///
/// A point-in-time snapshot of the user's roles and permissions; later role
/// changes only show up once the token is reissued from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,

    /// Issuer.
    pub iss: String,
    /// Subject (the user's email).
    pub sub: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Not-before, seconds since epoch.
    pub nbf: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

impl TokenClaims {
    /// Snapshot `user` into fresh claims valid for `ttl` from `now`.
    pub fn for_user(user: &User, issuer: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.role_names(),
            permissions: user.permission_names(),
            iss: issuer.to_string(),
            sub: user.email.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::now_v7().to_string(),
        }
    }

    /// Same identity and snapshot, new validity window starting at `now`.
    pub fn reissue(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::now_v7().to_string(),
            ..self.clone()
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN)
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&[ADMIN, SUPER_ADMIN])
    }
}
