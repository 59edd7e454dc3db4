use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use warden_auth::{NewUser, Permission, Role, User, permission_name};
use warden_core::{PermissionId, RoleId, UserId};

use super::r#trait::{PermissionStore, RoleStore, StoreError, UserStore};

#[derive(Debug, Clone)]
struct UserRow {
    id: UserId,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    active: bool,
    role_ids: Vec<RoleId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct RoleRow {
    id: RoleId,
    name: String,
    description: String,
    active: bool,
    permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRow>,
    roles: BTreeMap<RoleId, RoleRow>,
    permissions: BTreeMap<PermissionId, Permission>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate_role(&self, row: &RoleRow) -> Role {
        Role {
            id: row.id,
            name: row.name.clone(),
            description: row.description.clone(),
            active: row.active,
            permissions: row
                .permission_ids
                .iter()
                .filter_map(|id| self.permissions.get(id).cloned())
                .collect(),
        }
    }

    fn hydrate_user(&self, row: &UserRow) -> User {
        User {
            id: row.id,
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            active: row.active,
            roles: row
                .role_ids
                .iter()
                .filter_map(|id| self.roles.get(id))
                .map(|r| self.hydrate_role(r))
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }

    fn live_user_mut(&mut self, id: UserId) -> Result<&mut UserRow, StoreError> {
        self.users
            .get_mut(&id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .values()
            .any(|u| u.deleted_at.is_none() && u.email == email)
    }
}

/// In-memory relational directory for tests/dev.
///
/// One lock guards all three tables so multi-table writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Tables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("directory lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("directory lock poisoned".to_string()))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait::async_trait]
impl UserStore for InMemoryDirectory {
    async fn insert_user(&self, user: NewUser, role_ids: &[RoleId]) -> Result<User, StoreError> {
        let mut t = self.write()?;
        let email = normalize(&user.email);
        if t.email_taken(&email) {
            return Err(StoreError::conflict(format!("email {email} already registered")));
        }
        if let Some(missing) = role_ids.iter().find(|id| !t.roles.contains_key(id)) {
            return Err(StoreError::not_found(format!("role {missing}")));
        }

        let now = Utc::now();
        let id = UserId::new(t.next_id());
        let row = UserRow {
            id,
            email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            active: true,
            role_ids: role_ids.to_vec(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let hydrated = t.hydrate_user(&row);
        t.users.insert(id, row);
        Ok(hydrated)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let t = self.read()?;
        Ok(t.users.get(&id).map(|row| t.hydrate_user(row)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.read()?;
        let email = normalize(email);
        Ok(t
            .users
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
            .map(|row| t.hydrate_user(row)))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.email_taken(&normalize(email)))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let t = self.read()?;
        Ok(t.users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .map(|row| t.hydrate_user(row))
            .collect())
    }

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let row = t.live_user_mut(id)?;
        row.password_hash = password_hash;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let row = t.live_user_mut(id)?;
        row.active = active;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let row = t.live_user_mut(id)?;
        let now = Utc::now();
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(())
    }

    async fn add_user_role(&self, id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&role_id) {
            return Err(StoreError::not_found(format!("role {role_id}")));
        }
        let row = t.live_user_mut(id)?;
        if row.role_ids.contains(&role_id) {
            return Err(StoreError::conflict(format!("user {id} already holds role {role_id}")));
        }
        row.role_ids.push(role_id);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_user_role(&self, id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let row = t.live_user_mut(id)?;
        let before = row.role_ids.len();
        row.role_ids.retain(|r| *r != role_id);
        if row.role_ids.len() == before {
            return Err(StoreError::conflict(format!("user {id} does not hold role {role_id}")));
        }
        row.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait::async_trait]
impl RoleStore for InMemoryDirectory {
    async fn insert_role(
        &self,
        name: &str,
        description: &str,
        active: bool,
    ) -> Result<Role, StoreError> {
        let mut t = self.write()?;
        if t.roles.values().any(|r| r.name == name) {
            return Err(StoreError::conflict(format!("role {name} already exists")));
        }
        let row = RoleRow {
            id: RoleId::new(t.next_id()),
            name: name.to_string(),
            description: description.to_string(),
            active,
            permission_ids: Vec::new(),
        };
        let hydrated = t.hydrate_role(&row);
        t.roles.insert(row.id, row);
        Ok(hydrated)
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.roles.get(&id).map(|row| t.hydrate_role(row)))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.roles
            .values()
            .find(|r| r.name == name)
            .map(|row| t.hydrate_role(row)))
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.roles.values().map(|row| t.hydrate_role(row)).collect())
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t.roles.remove(&id).is_none() {
            return Err(StoreError::not_found(format!("role {id}")));
        }
        for user in t.users.values_mut() {
            user.role_ids.retain(|r| *r != id);
        }
        Ok(())
    }

    async fn role_holders(&self, id: RoleId) -> Result<Vec<UserId>, StoreError> {
        let t = self.read()?;
        Ok(t.users
            .values()
            .filter(|u| u.deleted_at.is_none() && u.role_ids.contains(&id))
            .map(|u| u.id)
            .collect())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.permissions.contains_key(&permission_id) {
            return Err(StoreError::not_found(format!("permission {permission_id}")));
        }
        let role = t
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| StoreError::not_found(format!("role {role_id}")))?;
        if !role.permission_ids.contains(&permission_id) {
            role.permission_ids.push(permission_id);
        }
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let role = t
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| StoreError::not_found(format!("role {role_id}")))?;
        role.permission_ids.retain(|p| *p != permission_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PermissionStore for InMemoryDirectory {
    async fn insert_permission(
        &self,
        resource: &str,
        action: &str,
        description: &str,
    ) -> Result<Permission, StoreError> {
        let mut t = self.write()?;
        let name = permission_name(resource, action);
        if t.permissions.values().any(|p| p.name == name) {
            return Err(StoreError::conflict(format!("permission {name} already exists")));
        }
        let permission = Permission::new(
            PermissionId::new(t.next_id()),
            resource,
            action,
            description,
        );
        t.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn find_permission_by_id(
        &self,
        id: PermissionId,
    ) -> Result<Option<Permission>, StoreError> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>, StoreError> {
        Ok(self
            .read()?
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }
}
