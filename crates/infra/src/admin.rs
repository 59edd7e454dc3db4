//! Role, permission and user administration.
//!
//! Every mutation writes the directory first and then regenerates the whole
//! policy projection from it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_auth::{AuthError, Permission, Role, permission_name};
use warden_core::{PermissionId, RoleId, UserId};

use crate::policy::defaults::{DEFAULT_ROLES, default_role_permissions, permission_catalog};
use crate::policy::{PolicyManager, PolicySnapshot};
use crate::store::{PermissionStore, RoleStore, StoreError, UserStore};

/// Roles held by a user and the union of their permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    pub user_id: UserId,
    pub roles: Vec<String>,
    /// Sorted, deduplicated permission names.
    pub permissions: Vec<String>,
}

pub struct DirectoryAdmin {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    policy: Arc<PolicyManager>,
}

impl DirectoryAdmin {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        permissions: Arc<dyn PermissionStore>,
        policy: Arc<PolicyManager>,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
            policy,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the canonical roles, the permission catalog and the default
    /// grants where missing. Safe to call on every start.
    pub async fn seed_defaults(&self) -> Result<PolicySnapshot, AuthError> {
        for key in permission_catalog() {
            let name = permission_name(&key.resource, &key.action);
            if self.permissions.find_permission_by_name(&name).await?.is_none() {
                self.permissions
                    .insert_permission(&key.resource, &key.action, "")
                    .await?;
            }
        }

        for (name, description) in DEFAULT_ROLES {
            let role = match self.roles.find_role_by_name(name).await? {
                Some(role) => role,
                None => self.roles.insert_role(name, description, true).await?,
            };
            for key in default_role_permissions(name) {
                let pname = permission_name(&key.resource, &key.action);
                let permission = self
                    .permissions
                    .find_permission_by_name(&pname)
                    .await?
                    .ok_or_else(|| AuthError::NotFound(format!("permission {pname}")))?;
                self.roles.grant_permission(role.id, permission.id).await?;
            }
        }

        tracing::info!(roles = DEFAULT_ROLES.len(), "default directory seeded");
        self.rebuild().await
    }

    /// Regenerate the policy projection from the directory.
    pub async fn rebuild(&self) -> Result<PolicySnapshot, AuthError> {
        let snapshot = self
            .policy
            .rebuild_from(self.users.as_ref(), self.roles.as_ref())
            .await?;
        Ok(snapshot)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles and permissions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        active: bool,
    ) -> Result<Role, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("role name must not be empty".to_string()));
        }
        let role = self.roles.insert_role(name, description, active).await?;
        self.rebuild().await?;

        tracing::info!(role = %role.name, "role created");
        Ok(role)
    }

    /// Refused while any user, in the directory or in the engine, still
    /// references the role.
    pub async fn delete_role(&self, role_id: RoleId) -> Result<(), AuthError> {
        let role = self.role(role_id).await?;

        let holders = self.roles.role_holders(role_id).await?;
        if !holders.is_empty() {
            return Err(AuthError::Conflict(format!(
                "role {} is assigned to {} user(s)",
                role.name,
                holders.len()
            )));
        }
        let engine_holders = self.policy.get_role_users(&role.name).await;
        if !engine_holders.is_empty() {
            return Err(AuthError::Conflict(format!(
                "role {} is still referenced by policy groupings",
                role.name
            )));
        }

        self.roles.delete_role(role_id).await?;
        self.rebuild().await?;

        tracing::info!(role = %role.name, "role deleted");
        Ok(())
    }

    pub async fn find_role(&self, name: &str) -> Result<Role, AuthError> {
        self.roles
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role {name}")))
    }

    pub async fn create_permission(
        &self,
        resource: &str,
        action: &str,
        description: &str,
    ) -> Result<Permission, AuthError> {
        let (resource, action) = (resource.trim(), action.trim());
        if resource.is_empty() || action.is_empty() {
            return Err(AuthError::Validation(
                "permission resource and action must not be empty".to_string(),
            ));
        }
        let permission = self
            .permissions
            .insert_permission(resource, action, description)
            .await?;

        tracing::info!(permission = %permission.name, "permission created");
        Ok(permission)
    }

    pub async fn assign_permission_to_role(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), AuthError> {
        self.roles.grant_permission(role_id, permission_id).await?;
        self.rebuild().await?;

        tracing::info!(role_id = %role_id, permission_id = %permission_id, "permission granted");
        Ok(())
    }

    pub async fn remove_permission_from_role(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), AuthError> {
        self.roles.revoke_permission(role_id, permission_id).await?;
        self.rebuild().await?;

        tracing::info!(role_id = %role_id, permission_id = %permission_id, "permission revoked");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), AuthError> {
        let role = self.role(role_id).await?;
        self.users
            .add_user_role(user_id, role_id)
            .await
            .map_err(|e| membership_error(e, || format!("user {user_id} already holds {}", role.name)))?;
        self.rebuild().await?;

        tracing::info!(user_id = %user_id, role = %role.name, "role assigned");
        Ok(())
    }

    pub async fn remove_role_from_user(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), AuthError> {
        let role = self.role(role_id).await?;
        self.users
            .remove_user_role(user_id, role_id)
            .await
            .map_err(|e| membership_error(e, || format!("user {user_id} does not hold {}", role.name)))?;
        self.rebuild().await?;

        tracing::info!(user_id = %user_id, role = %role.name, "role removed");
        Ok(())
    }

    pub async fn activate_user(&self, user_id: UserId) -> Result<(), AuthError> {
        self.set_active(user_id, true).await
    }

    pub async fn deactivate_user(&self, user_id: UserId) -> Result<(), AuthError> {
        self.set_active(user_id, false).await
    }

    /// Soft delete; the row is kept but can no longer authenticate.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.soft_delete_user(user_id).await?;
        self.rebuild().await?;

        tracing::info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    pub async fn effective_permissions(
        &self,
        user_id: UserId,
    ) -> Result<EffectivePermissions, AuthError> {
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or(AuthError::UserNotFound)?;

        let mut permissions = user.permission_names();
        permissions.sort();

        Ok(EffectivePermissions {
            user_id,
            roles: user.role_names(),
            permissions,
        })
    }

    async fn set_active(&self, user_id: UserId, active: bool) -> Result<(), AuthError> {
        self.users.set_user_active(user_id, active).await?;
        self.rebuild().await?;

        tracing::info!(user_id = %user_id, active, "user activation changed");
        Ok(())
    }

    async fn role(&self, role_id: RoleId) -> Result<Role, AuthError> {
        self.roles
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role {role_id}")))
    }
}

fn membership_error(err: StoreError, msg: impl FnOnce() -> String) -> AuthError {
    match err {
        StoreError::Conflict(_) => AuthError::RoleAssignmentConflict(msg()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyEnforcer, user_subject};
    use crate::store::InMemoryDirectory;
    use warden_auth::{NewUser, Requirement};

    struct Fixture {
        dir: Arc<InMemoryDirectory>,
        policy: Arc<PolicyManager>,
        admin: DirectoryAdmin,
    }

    async fn fixture() -> Fixture {
        let dir = Arc::new(InMemoryDirectory::new());
        let policy = Arc::new(PolicyManager::new(Arc::new(
            PolicyEnforcer::in_memory().await.unwrap(),
        )));
        let admin = DirectoryAdmin::new(dir.clone(), dir.clone(), dir.clone(), policy.clone());
        Fixture { dir, policy, admin }
    }

    async fn bob(f: &Fixture) -> UserId {
        let new = NewUser::new("bob@example.com", "secret1", "Bob", "Jones").unwrap();
        f.dir.insert_user(new, &[]).await.unwrap().id
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn seeding_is_idempotent_and_projects_the_hierarchy() {
        let f = fixture().await;
        let first = f.admin.seed_defaults().await.unwrap();
        let second = f.admin.seed_defaults().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.dir.list_roles().await.unwrap().len(), 5);
        assert_eq!(f.dir.list_permissions().await.unwrap().len(), 14);

        let hr = roles(&["hr_manager"]);
        let read = Requirement::permission("users", "read");
        let delete = Requirement::permission("users", "delete");
        assert!(f.policy.authorize(&hr, &read).await.unwrap());
        assert!(!f.policy.authorize(&hr, &delete).await.unwrap());
        assert!(f.policy.authorize(&roles(&["admin"]), &Requirement::admin()).await.unwrap());
    }

    #[tokio::test]
    async fn role_assignment_is_projected_and_conflicts_on_repeat() {
        let f = fixture().await;
        f.admin.seed_defaults().await.unwrap();
        let user = bob(&f).await;
        let admin_role = f.dir.find_role_by_name("admin").await.unwrap().unwrap();

        f.admin.assign_role_to_user(user, admin_role.id).await.unwrap();
        let subject = user_subject(user);
        assert_eq!(f.policy.get_user_roles(&subject).await, vec!["admin"]);

        let again = f.admin.assign_role_to_user(user, admin_role.id).await.unwrap_err();
        assert!(matches!(again, AuthError::RoleAssignmentConflict(_)));

        f.admin.remove_role_from_user(user, admin_role.id).await.unwrap();
        assert!(f.policy.get_user_roles(&subject).await.is_empty());
        let gone = f.admin.remove_role_from_user(user, admin_role.id).await.unwrap_err();
        assert!(matches!(gone, AuthError::RoleAssignmentConflict(_)));
    }

    #[tokio::test]
    async fn deleting_a_held_role_is_refused() {
        let f = fixture().await;
        let user = bob(&f).await;
        let role = f.admin.create_role("auditor", "read-only", true).await.unwrap();
        f.admin.assign_role_to_user(user, role.id).await.unwrap();

        let err = f.admin.delete_role(role.id).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        f.admin.remove_role_from_user(user, role.id).await.unwrap();
        f.admin.delete_role(role.id).await.unwrap();
        assert!(f.dir.find_role_by_id(role.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_role_still_grouped_in_the_engine_is_refused() {
        let f = fixture().await;
        let role = f.admin.create_role("auditor", "", true).await.unwrap();
        f.policy.assign_role_to_user("user:99", "auditor").await.unwrap();

        let err = f.admin.delete_role(role.id).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let f = fixture().await;
        f.admin.create_role("auditor", "", true).await.unwrap();
        let role = f.admin.create_role("auditor", "", true).await.unwrap_err();
        assert!(matches!(role, AuthError::Conflict(_)));

        f.admin.create_permission("reports", "read", "").await.unwrap();
        let perm = f.admin.create_permission("reports", "read", "").await.unwrap_err();
        assert!(matches!(perm, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn permission_grants_flow_into_the_engine() {
        let f = fixture().await;
        let role = f.admin.create_role("auditor", "", true).await.unwrap();
        let perm = f.admin.create_permission("reports", "read", "").await.unwrap();
        let auditor = roles(&["auditor"]);
        let read = Requirement::permission("reports", "read");

        f.admin.assign_permission_to_role(role.id, perm.id).await.unwrap();
        assert!(f.policy.authorize(&auditor, &read).await.unwrap());

        f.admin.remove_permission_from_role(role.id, perm.id).await.unwrap();
        assert!(!f.policy.authorize(&auditor, &read).await.unwrap());
    }

    #[tokio::test]
    async fn deactivation_and_deletion_drop_groupings() {
        let f = fixture().await;
        f.admin.seed_defaults().await.unwrap();
        let user = bob(&f).await;
        let employee = f.dir.find_role_by_name("employee").await.unwrap().unwrap();
        f.admin.assign_role_to_user(user, employee.id).await.unwrap();
        let subject = user_subject(user);

        f.admin.deactivate_user(user).await.unwrap();
        assert!(f.policy.get_user_roles(&subject).await.is_empty());

        f.admin.activate_user(user).await.unwrap();
        assert_eq!(f.policy.get_user_roles(&subject).await, vec!["employee"]);

        f.admin.delete_user(user).await.unwrap();
        assert!(f.policy.get_user_roles(&subject).await.is_empty());
        assert_eq!(
            f.admin.effective_permissions(user).await.unwrap_err(),
            AuthError::UserNotFound
        );
    }

    #[tokio::test]
    async fn effective_permissions_union_roles() {
        let f = fixture().await;
        f.admin.seed_defaults().await.unwrap();
        let user = bob(&f).await;
        for name in ["employee", "hr_specialist"] {
            let role = f.dir.find_role_by_name(name).await.unwrap().unwrap();
            f.admin.assign_role_to_user(user, role.id).await.unwrap();
        }

        let effective = f.admin.effective_permissions(user).await.unwrap();
        assert_eq!(effective.roles, vec!["employee", "hr_specialist"]);
        assert_eq!(
            effective.permissions,
            vec![
                "employees.create",
                "employees.delete",
                "employees.read",
                "employees.update"
            ]
        );
    }
}
