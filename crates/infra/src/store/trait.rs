use thiserror::Error;

use warden_auth::{AuthError, NewUser, Permission, Role, User};
use warden_core::{PermissionId, RoleId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Unique-name/email or membership conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            StoreError::Unavailable(msg) => AuthError::Internal(msg),
        }
    }
}

/// User rows. Every returned [`User`] has its roles and their permissions
/// hydrated eagerly.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user holding `role_ids`. Fails with `Conflict` on a taken email.
    async fn insert_user(&self, user: NewUser, role_ids: &[RoleId]) -> Result<User, StoreError>;

    /// Look up by id, soft-deleted users included.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Look up a live (not soft-deleted) user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Live users.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<(), StoreError>;

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<(), StoreError>;

    async fn soft_delete_user(&self, id: UserId) -> Result<(), StoreError>;

    /// Fails with `Conflict` if the user already holds the role.
    async fn add_user_role(&self, id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    /// Fails with `Conflict` if the user does not hold the role.
    async fn remove_user_role(&self, id: UserId, role_id: RoleId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    /// Fails with `Conflict` on a taken name.
    async fn insert_role(
        &self,
        name: &str,
        description: &str,
        active: bool,
    ) -> Result<Role, StoreError>;

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError>;

    /// Ids of live users holding the role.
    async fn role_holders(&self, id: RoleId) -> Result<Vec<UserId>, StoreError>;

    /// Idempotent.
    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError>;

    /// Idempotent.
    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait PermissionStore: Send + Sync {
    /// Fails with `Conflict` on a taken name.
    async fn insert_permission(
        &self,
        resource: &str,
        action: &str,
        description: &str,
    ) -> Result<Permission, StoreError>;

    async fn find_permission_by_id(
        &self,
        id: PermissionId,
    ) -> Result<Option<Permission>, StoreError>;

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>, StoreError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
}
