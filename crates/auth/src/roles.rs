use serde::{Deserialize, Serialize};

use warden_core::RoleId;

use crate::Permission;

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const HR_MANAGER: &str = "hr_manager";
pub const HR_SPECIALIST: &str = "hr_specialist";
pub const EMPLOYEE: &str = "employee";

/// Role assigned to every newly registered user.
pub const DEFAULT_ROLE: &str = EMPLOYEE;

/// Named bundle of permissions.
///
/// `permissions` is hydrated by the store; roles are matched by `name`
/// everywhere outside the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            active: true,
            permissions: Vec::new(),
        }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.name == name)
    }

    /// Permissions that currently grant anything (active only).
    pub fn active_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter().filter(|p| p.active)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
