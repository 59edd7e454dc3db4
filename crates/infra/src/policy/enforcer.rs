//! Process-wide casbin engine behind a single writer lock.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use casbin::{CoreApi, DefaultModel, Enforcer, FileAdapter, MemoryAdapter, MgmtApi};
use tokio::sync::RwLock;

use super::projection::{GroupingRule, PolicyRule, PolicySnapshot};
use super::{MODEL_CONF, PolicyError};
use warden_auth::ROLE_OBJECT_PREFIX;

/// Where the engine persists its rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyStorage {
    /// Process memory only; the directory rebuilds it on startup.
    Memory,
    /// casbin CSV policy file, created empty if missing.
    File(PathBuf),
}

/// Thin wrapper over the casbin enforcer.
///
/// Reads share the lock; every mutation (and every multi-step replace) holds
/// the write half for its whole duration, so compound updates never
/// interleave.
pub struct PolicyEnforcer {
    engine: RwLock<Enforcer>,
}

impl core::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PolicyEnforcer").finish_non_exhaustive()
    }
}

impl PolicyEnforcer {
    /// Build the engine from a model file (or the embedded model) and storage.
    pub async fn new(
        model_path: Option<&Path>,
        storage: PolicyStorage,
    ) -> Result<Self, PolicyError> {
        let model = match model_path {
            Some(path) => DefaultModel::from_file(path).await?,
            None => DefaultModel::from_str(MODEL_CONF).await?,
        };

        let engine = match storage {
            PolicyStorage::Memory => Enforcer::new(model, MemoryAdapter::default()).await?,
            PolicyStorage::File(path) => {
                ensure_file(&path).await?;
                Enforcer::new(model, FileAdapter::new(path)).await?
            }
        };

        Ok(Self {
            engine: RwLock::new(engine),
        })
    }

    /// Embedded model, in-memory rules.
    pub async fn in_memory() -> Result<Self, PolicyError> {
        Self::new(None, PolicyStorage::Memory).await
    }

    pub async fn enforce(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        let engine = self.engine.read().await;
        Ok(engine.enforce((subject, object, action))?)
    }

    /// One evaluation per role, short-circuiting on the first allow.
    ///
    /// An empty role list is always denied.
    pub async fn enforce_with_roles(
        &self,
        roles: &[String],
        object: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        let engine = self.engine.read().await;
        for role in roles {
            if engine.enforce((role.as_str(), object, action))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fails with `AlreadyExists` if the rule is present.
    pub async fn add_policy(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        let rule = PolicyRule::new(subject, object, action);
        let added = self.engine.write().await.add_policy(rule.to_vec()).await?;
        if !added {
            return Err(PolicyError::AlreadyExists(rule.to_string()));
        }
        Ok(())
    }

    /// Fails with `NotFound` if the rule is absent.
    pub async fn remove_policy(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        let rule = PolicyRule::new(subject, object, action);
        let removed = self.engine.write().await.remove_policy(rule.to_vec()).await?;
        if !removed {
            return Err(PolicyError::NotFound(rule.to_string()));
        }
        Ok(())
    }

    /// Fails with `RoleAssignmentConflict` if the user already holds the role.
    pub async fn add_role_for_user(&self, user: &str, role: &str) -> Result<(), PolicyError> {
        let grouping = GroupingRule::new(user, role);
        let added = self
            .engine
            .write()
            .await
            .add_grouping_policy(grouping.to_vec())
            .await?;
        if !added {
            return Err(PolicyError::RoleAssignmentConflict(format!(
                "{user} already holds {role}"
            )));
        }
        Ok(())
    }

    /// Fails with `RoleAssignmentConflict` if the user does not hold the role.
    pub async fn delete_role_for_user(&self, user: &str, role: &str) -> Result<(), PolicyError> {
        let grouping = GroupingRule::new(user, role);
        let removed = self
            .engine
            .write()
            .await
            .remove_grouping_policy(grouping.to_vec())
            .await?;
        if !removed {
            return Err(PolicyError::RoleAssignmentConflict(format!(
                "{user} does not hold {role}"
            )));
        }
        Ok(())
    }

    pub async fn has_role_for_user(&self, user: &str, role: &str) -> bool {
        self.get_roles_for_user(user).await.iter().any(|r| r == role)
    }

    /// Roles directly granted to `user`.
    pub async fn get_roles_for_user(&self, user: &str) -> Vec<String> {
        let engine = self.engine.read().await;
        roles_of(&engine, user)
    }

    pub async fn get_users_for_role(&self, role: &str) -> Vec<String> {
        let engine = self.engine.read().await;
        engine
            .get_filtered_grouping_policy(1, vec![role.to_string()])
            .iter()
            .filter_map(|g| GroupingRule::from_vec(g))
            .map(|g| g.user)
            .collect()
    }

    /// Permission rules reachable by `subject`, directly or through its roles.
    pub async fn get_permissions_for_user(&self, subject: &str) -> Vec<PolicyRule> {
        let engine = self.engine.read().await;
        let mut rules: BTreeSet<PolicyRule> =
            permission_rules(&engine, subject).into_iter().collect();
        for role in roles_of(&engine, subject) {
            rules.extend(permission_rules(&engine, &role));
        }
        rules.into_iter().collect()
    }

    /// Permission rules held by `role` itself.
    pub async fn get_permissions_for_role(&self, role: &str) -> Vec<PolicyRule> {
        let engine = self.engine.read().await;
        permission_rules(&engine, role)
    }

    /// Drop every grouping tuple of `user`. Returns whether anything was removed.
    pub async fn delete_user(&self, user: &str) -> Result<bool, PolicyError> {
        let mut engine = self.engine.write().await;
        let groupings = engine.get_filtered_grouping_policy(0, vec![user.to_string()]);
        let mut removed = false;
        for grouping in groupings {
            removed |= engine.remove_grouping_policy(grouping).await?;
        }
        Ok(removed)
    }

    /// Drop every rule and grouping that names `role`.
    pub async fn delete_role(&self, role: &str) -> Result<bool, PolicyError> {
        let mut engine = self.engine.write().await;
        let mut removed = false;
        for grouping in engine.get_filtered_grouping_policy(1, vec![role.to_string()]) {
            removed |= engine.remove_grouping_policy(grouping).await?;
        }
        for rule in engine.get_filtered_policy(0, vec![role.to_string()]) {
            removed |= engine.remove_policy(rule).await?;
        }
        Ok(removed)
    }

    /// Replace the role set of `user` with exactly `roles`.
    ///
    /// Deletes every existing grouping for the user, then adds one per role,
    /// all under one write guard.
    pub async fn replace_roles_for_user(
        &self,
        user: &str,
        roles: &[String],
    ) -> Result<(), PolicyError> {
        let mut engine = self.engine.write().await;
        for grouping in engine.get_filtered_grouping_policy(0, vec![user.to_string()]) {
            engine.remove_grouping_policy(grouping).await?;
        }
        for role in roles {
            engine
                .add_grouping_policy(GroupingRule::new(user, role).to_vec())
                .await?;
        }
        Ok(())
    }

    /// Make the engine hold exactly `snapshot`, then persist.
    pub async fn replace_all(&self, snapshot: &PolicySnapshot) -> Result<(), PolicyError> {
        let mut engine = self.engine.write().await;

        let target_rules: BTreeSet<&PolicyRule> = snapshot.rules.iter().collect();
        let current_rules: Vec<PolicyRule> = engine
            .get_policy()
            .iter()
            .filter_map(|r| PolicyRule::from_vec(r))
            .collect();
        for rule in current_rules.iter().filter(|r| !target_rules.contains(r)) {
            engine.remove_policy(rule.to_vec()).await?;
        }
        let current_rules: BTreeSet<&PolicyRule> = current_rules.iter().collect();
        for rule in snapshot.rules.iter().filter(|r| !current_rules.contains(r)) {
            engine.add_policy(rule.to_vec()).await?;
        }

        let target_groupings: BTreeSet<&GroupingRule> = snapshot.groupings.iter().collect();
        let current_groupings: Vec<GroupingRule> = engine
            .get_grouping_policy()
            .iter()
            .filter_map(|g| GroupingRule::from_vec(g))
            .collect();
        for grouping in current_groupings.iter().filter(|g| !target_groupings.contains(g)) {
            engine.remove_grouping_policy(grouping.to_vec()).await?;
        }
        let current_groupings: BTreeSet<&GroupingRule> = current_groupings.iter().collect();
        for grouping in snapshot.groupings.iter().filter(|g| !current_groupings.contains(g)) {
            engine.add_grouping_policy(grouping.to_vec()).await?;
        }

        engine.save_policy().await?;
        Ok(())
    }

    /// Current rule set, sorted.
    pub async fn snapshot(&self) -> PolicySnapshot {
        let engine = self.engine.read().await;
        let rules: BTreeSet<PolicyRule> = engine
            .get_policy()
            .iter()
            .filter_map(|r| PolicyRule::from_vec(r))
            .collect();
        let groupings: BTreeSet<GroupingRule> = engine
            .get_grouping_policy()
            .iter()
            .filter_map(|g| GroupingRule::from_vec(g))
            .collect();
        PolicySnapshot {
            rules: rules.into_iter().collect(),
            groupings: groupings.into_iter().collect(),
        }
    }

    /// Reload rules from the adapter, discarding in-memory state.
    pub async fn load_policy(&self) -> Result<(), PolicyError> {
        self.engine.write().await.load_policy().await?;
        Ok(())
    }

    /// Flush rules to the adapter.
    pub async fn save_policy(&self) -> Result<(), PolicyError> {
        self.engine.write().await.save_policy().await?;
        Ok(())
    }
}

fn roles_of(engine: &Enforcer, user: &str) -> Vec<String> {
    engine
        .get_filtered_grouping_policy(0, vec![user.to_string()])
        .iter()
        .filter_map(|g| GroupingRule::from_vec(g))
        .map(|g| g.role)
        .collect()
}

/// Non-membership rules whose subject is `subject`.
fn permission_rules(engine: &Enforcer, subject: &str) -> Vec<PolicyRule> {
    engine
        .get_filtered_policy(0, vec![subject.to_string()])
        .iter()
        .filter_map(|r| PolicyRule::from_vec(r))
        .filter(|r| !r.object.starts_with(ROLE_OBJECT_PREFIX))
        .collect()
}

async fn ensure_file(path: &Path) -> Result<(), PolicyError> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map(|_| ())
        .map_err(|e| PolicyError::Storage(format!("{}: {e}", path.display())))
}
