use warden_auth::TokenClaims;
use warden_core::UserId;

/// Authenticated caller of the current request.
///
/// Built from validated token claims by the auth middleware and stored in the
/// request extensions; it never outlives the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: UserId,
    email: String,
    roles: Vec<String>,
    permissions: Vec<String>,
    claims: TokenClaims,
}

impl Identity {
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email.clone(),
            roles: claims.roles.clone(),
            permissions: claims.permissions.clone(),
            claims,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}
