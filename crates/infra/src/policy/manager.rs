//! Keeps the engine aligned with the directory.

use std::sync::Arc;

use warden_auth::{MEMBERSHIP_ACTION, Requirement, User, role_object};

use super::defaults::{DEFAULT_ROLES, default_role_permissions};
use super::enforcer::PolicyEnforcer;
use super::projection::{PolicySnapshot, user_subject};
use super::PolicyError;
use crate::store::{RoleStore, UserStore};

/// Policy façade used by the services and the HTTP gates.
#[derive(Debug, Clone)]
pub struct PolicyManager {
    enforcer: Arc<PolicyEnforcer>,
}

impl PolicyManager {
    pub fn new(enforcer: Arc<PolicyEnforcer>) -> Self {
        Self { enforcer }
    }

    pub fn enforcer(&self) -> &Arc<PolicyEnforcer> {
        &self.enforcer
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronization
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the user's grouping tuples with the roles it currently holds.
    ///
    /// Delete-then-add under the engine's write guard; a user that cannot
    /// authenticate ends up with no groupings.
    pub async fn sync_user_policies(&self, user: &User) -> Result<(), PolicyError> {
        let subject = user_subject(user.id);
        let roles = if user.can_authenticate() {
            user.role_names()
        } else {
            Vec::new()
        };

        self.enforcer.replace_roles_for_user(&subject, &roles).await?;
        self.enforcer.save_policy().await?;

        tracing::debug!(subject = %subject, roles = ?roles, "synchronized user policies");
        Ok(())
    }

    /// Seed the canonical hierarchy into the engine. Safe to call repeatedly.
    pub async fn initialize_default_policies(&self) -> Result<(), PolicyError> {
        let mut added = 0usize;
        for (role, _) in DEFAULT_ROLES {
            let membership = role_object(role);
            let grants = default_role_permissions(role);
            let rules = std::iter::once((membership.as_str(), MEMBERSHIP_ACTION)).chain(
                grants
                    .iter()
                    .map(|k| (k.resource.as_str(), k.action.as_str())),
            );
            for (object, action) in rules {
                match self.enforcer.add_policy(role, object, action).await {
                    Ok(()) => added += 1,
                    Err(PolicyError::AlreadyExists(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.enforcer.save_policy().await?;

        tracing::info!(added, "default policies initialized");
        Ok(())
    }

    /// Regenerate the whole engine from a directory projection.
    pub async fn rebuild(&self, snapshot: &PolicySnapshot) -> Result<(), PolicyError> {
        self.enforcer.replace_all(snapshot).await?;
        tracing::info!(
            rules = snapshot.rules.len(),
            groupings = snapshot.groupings.len(),
            "policy projection rebuilt"
        );
        Ok(())
    }

    /// Read every user and role from the directory and [`rebuild`](Self::rebuild).
    pub async fn rebuild_from(
        &self,
        users: &dyn UserStore,
        roles: &dyn RoleStore,
    ) -> Result<PolicySnapshot, PolicyError> {
        let users = users
            .list_users()
            .await
            .map_err(|e| PolicyError::Storage(e.to_string()))?;
        let roles = roles
            .list_roles()
            .await
            .map_err(|e| PolicyError::Storage(e.to_string()))?;

        let snapshot = PolicySnapshot::project(&users, &roles);
        self.rebuild(&snapshot).await?;
        Ok(snapshot)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn check_permission(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        self.enforcer.enforce(subject, resource, action).await
    }

    pub async fn check_permission_with_roles(
        &self,
        roles: &[String],
        resource: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        self.enforcer.enforce_with_roles(roles, resource, action).await
    }

    /// Role gate, answered by the engine's membership rules.
    pub async fn check_role_with_roles(
        &self,
        roles: &[String],
        role: &str,
    ) -> Result<bool, PolicyError> {
        self.enforcer
            .enforce_with_roles(roles, &role_object(role), MEMBERSHIP_ACTION)
            .await
    }

    /// Does any of `roles` satisfy `requirement`?
    pub async fn authorize(
        &self,
        roles: &[String],
        requirement: &Requirement,
    ) -> Result<bool, PolicyError> {
        for (object, action) in requirement.checks() {
            if self.enforcer.enforce_with_roles(roles, &object, &action).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Direct pass-throughs
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn assign_role_to_user(
        &self,
        subject: &str,
        role: &str,
    ) -> Result<(), PolicyError> {
        self.enforcer.add_role_for_user(subject, role).await?;
        self.enforcer.save_policy().await
    }

    pub async fn remove_role_from_user(
        &self,
        subject: &str,
        role: &str,
    ) -> Result<(), PolicyError> {
        self.enforcer.delete_role_for_user(subject, role).await?;
        self.enforcer.save_policy().await
    }

    pub async fn grant_permission_to_role(
        &self,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        self.enforcer.add_policy(role, resource, action).await?;
        self.enforcer.save_policy().await
    }

    pub async fn revoke_permission_from_role(
        &self,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        self.enforcer.remove_policy(role, resource, action).await?;
        self.enforcer.save_policy().await
    }

    pub async fn get_user_roles(&self, subject: &str) -> Vec<String> {
        self.enforcer.get_roles_for_user(subject).await
    }

    pub async fn get_role_users(&self, role: &str) -> Vec<String> {
        self.enforcer.get_users_for_role(role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_auth::{Permission, Role};
    use warden_core::{PermissionId, RoleId, UserId};

    async fn manager() -> PolicyManager {
        PolicyManager::new(Arc::new(PolicyEnforcer::in_memory().await.unwrap()))
    }

    fn user(roles: &[&str]) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(42),
            email: "bob@example.com".into(),
            password_hash: String::new(),
            first_name: "Bob".into(),
            last_name: "Jones".into(),
            active: true,
            roles: roles
                .iter()
                .enumerate()
                .map(|(i, r)| Role::new(RoleId::new(i as u64 + 1), *r, ""))
                .collect(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn sync_replaces_groupings_and_is_idempotent() {
        let pm = manager().await;
        pm.assign_role_to_user("user:42", "stale").await.unwrap();

        let bob = user(&["admin", "employee"]);
        pm.sync_user_policies(&bob).await.unwrap();
        let once = pm.get_user_roles("user:42").await;
        pm.sync_user_policies(&bob).await.unwrap();
        let twice = pm.get_user_roles("user:42").await;

        assert_eq!(once, twice);
        let mut sorted = twice.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["admin", "employee"]);
    }

    #[tokio::test]
    async fn concurrent_syncs_never_interleave() {
        let pm = manager().await;
        let a = user(&["admin"]);
        let b = user(&["employee", "hr_manager"]);

        for _ in 0..20 {
            let (ra, rb) = tokio::join!(pm.sync_user_policies(&a), pm.sync_user_policies(&b));
            ra.unwrap();
            rb.unwrap();
            let mut got = pm.get_user_roles("user:42").await;
            got.sort();
            assert!(got == vec!["admin"] || got == vec!["employee", "hr_manager"], "{got:?}");
        }
    }

    #[tokio::test]
    async fn inactive_users_sync_to_no_roles() {
        let pm = manager().await;
        let mut bob = user(&["admin"]);
        pm.sync_user_policies(&bob).await.unwrap();
        bob.active = false;
        pm.sync_user_policies(&bob).await.unwrap();

        assert!(pm.get_user_roles("user:42").await.is_empty());
    }

    #[tokio::test]
    async fn default_hierarchy_is_seeded_idempotently() {
        let pm = manager().await;
        pm.initialize_default_policies().await.unwrap();
        pm.initialize_default_policies().await.unwrap();

        let hr = roles(&["hr_manager"]);
        assert!(pm.check_permission_with_roles(&hr, "employees", "delete").await.unwrap());
        assert!(pm.check_permission_with_roles(&hr, "users", "update").await.unwrap());
        assert!(!pm.check_permission_with_roles(&hr, "users", "delete").await.unwrap());

        let emp = roles(&["employee"]);
        assert!(pm.check_permission_with_roles(&emp, "employees", "read").await.unwrap());
        assert!(!pm.check_permission_with_roles(&emp, "employees", "update").await.unwrap());

        let sa = roles(&["super_admin"]);
        assert!(pm.check_permission_with_roles(&sa, "roles", "delete").await.unwrap());
        let admin = roles(&["admin"]);
        assert!(!pm.check_permission_with_roles(&admin, "roles", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn role_gates_go_through_the_engine() {
        let pm = manager().await;
        pm.initialize_default_policies().await.unwrap();

        let hr = roles(&["hr_manager"]);
        assert!(pm.check_role_with_roles(&hr, "hr_manager").await.unwrap());
        assert!(!pm.check_role_with_roles(&hr, "admin").await.unwrap());
        assert!(pm.authorize(&hr, &Requirement::hr()).await.unwrap());
        assert!(!pm.authorize(&hr, &Requirement::admin()).await.unwrap());
        assert!(!pm.authorize(&[], &Requirement::hr()).await.unwrap());

        // A role name the engine has never seen grants nothing.
        let forged = roles(&["root"]);
        assert!(!pm.check_role_with_roles(&forged, "root").await.unwrap());
    }

    #[tokio::test]
    async fn rebuild_matches_directory_projection() {
        let pm = manager().await;
        pm.grant_permission_to_role("ghost", "employees", "delete").await.unwrap();

        let mut hr = Role::new(RoleId::new(1), "hr_manager", "");
        hr.permissions = vec![Permission::new(PermissionId::new(1), "employees", "read", "")];
        let mut alice = user(&[]);
        alice.roles = vec![hr.clone()];

        let snapshot = PolicySnapshot::project(&[alice], &[hr]);
        pm.rebuild(&snapshot).await.unwrap();

        assert_eq!(pm.enforcer().snapshot().await, snapshot);
        assert!(pm.check_permission("user:42", "employees", "read").await.unwrap());
        let ghost = roles(&["ghost"]);
        assert!(!pm.check_permission_with_roles(&ghost, "employees", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn pass_throughs_surface_engine_conflicts() {
        let pm = manager().await;
        pm.grant_permission_to_role("admin", "users", "read").await.unwrap();
        assert!(matches!(
            pm.grant_permission_to_role("admin", "users", "read").await,
            Err(PolicyError::AlreadyExists(_))
        ));
        pm.revoke_permission_from_role("admin", "users", "read").await.unwrap();
        assert!(matches!(
            pm.revoke_permission_from_role("admin", "users", "read").await,
            Err(PolicyError::NotFound(_))
        ));

        pm.assign_role_to_user("user:1", "admin").await.unwrap();
        assert_eq!(pm.get_role_users("admin").await, vec!["user:1"]);
        pm.remove_role_from_user("user:1", "admin").await.unwrap();
        assert!(matches!(
            pm.remove_role_from_user("user:1", "admin").await,
            Err(PolicyError::RoleAssignmentConflict(_))
        ));
    }
}
