//! `warden-auth`: pure authentication/authorization boundary.
//!
//! Users, roles and permissions, password hashing, session token claims and
//! signing, and authorization requirements. This crate is intentionally
//! decoupled from HTTP, storage and the policy engine.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{MEMBERSHIP_ACTION, ROLE_OBJECT_PREFIX, Requirement, role_object};
pub use claims::TokenClaims;
pub use error::{AuthError, ErrorClass};
pub use password::PasswordError;
pub use permissions::{Permission, PermissionKey, permission_name};
pub use roles::Role;
pub use token::{TokenError, TokenService, TokenState, extract_bearer};
pub use user::{NewUser, NewUserError, User, normalize_email};
