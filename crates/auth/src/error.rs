//! Authentication / authorization error taxonomy.

use thiserror::Error;

use warden_core::DomainError;

use crate::password::PasswordError;
use crate::token::TokenError;
use crate::user::NewUserError;

/// Coarse outcome class, mapped 1:1 onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("user account is inactive")]
    UserInactive,

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("authorization header is required")]
    MissingAuthorization,

    #[error("authorization header format must be Bearer {{token}}")]
    MalformedBearer,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("policy already exists: {0}")]
    PolicyAlreadyExists(String),

    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    #[error("insufficient permissions: requires {0}")]
    InsufficientPermission(String),

    #[error("role assignment conflict: {0}")]
    RoleAssignmentConflict(String),

    #[error("default role '{0}' does not exist")]
    DefaultRoleMissing(String),

    #[error("policy synchronization failed: {0}")]
    PolicySync(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::InvalidCredentials
            | AuthError::UserInactive
            | AuthError::MissingAuthorization
            | AuthError::MalformedBearer => ErrorClass::Unauthenticated,
            AuthError::Token(TokenError::NotEligibleForRefresh) => ErrorClass::BadRequest,
            AuthError::Token(TokenError::Signing(_)) => ErrorClass::Internal,
            AuthError::Token(_) => ErrorClass::Unauthenticated,
            AuthError::InsufficientPermission(_) => ErrorClass::Forbidden,
            AuthError::EmailAlreadyExists
            | AuthError::RoleAssignmentConflict(_)
            | AuthError::PolicyAlreadyExists(_)
            | AuthError::Conflict(_) => ErrorClass::Conflict,
            AuthError::UserNotFound | AuthError::PolicyNotFound(_) | AuthError::NotFound(_) => {
                ErrorClass::NotFound
            }
            AuthError::Validation(_) => ErrorClass::BadRequest,
            AuthError::DefaultRoleMissing(_) | AuthError::PolicySync(_) | AuthError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Stable machine-readable code for the `error` field of responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserInactive => "user_inactive",
            AuthError::EmailAlreadyExists => "email_already_exists",
            AuthError::MissingAuthorization => "missing_header",
            AuthError::MalformedBearer => "malformed_bearer",
            AuthError::Token(TokenError::Expired) => "expired_token",
            AuthError::Token(TokenError::Claims) => "token_claims_error",
            AuthError::Token(TokenError::NotEligibleForRefresh) => "refresh_not_eligible",
            AuthError::Token(TokenError::Signing(_)) => "internal_error",
            AuthError::Token(TokenError::Invalid) => "invalid_token",
            AuthError::PolicyAlreadyExists(_) => "policy_already_exists",
            AuthError::PolicyNotFound(_) => "policy_not_found",
            AuthError::InsufficientPermission(_) => "insufficient_permission",
            AuthError::RoleAssignmentConflict(_) => "role_assignment_conflict",
            AuthError::Validation(_) => "validation_error",
            AuthError::NotFound(_) => "not_found",
            AuthError::Conflict(_) => "conflict",
            AuthError::DefaultRoleMissing(_) | AuthError::PolicySync(_) | AuthError::Internal(_) => {
                "internal_error"
            }
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AuthError::Validation(msg),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => AuthError::Validation(err.to_string()),
            PasswordError::Hashing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<NewUserError> for AuthError {
    fn from(err: NewUserError) -> Self {
        match err {
            NewUserError::Domain(e) => e.into(),
            NewUserError::Password(e) => e.into(),
        }
    }
}
