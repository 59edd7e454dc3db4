use serde::{Deserialize, Serialize};

use warden_core::PermissionId;

/// A named capability over a `(resource, action)` pair.
///
/// Permission names follow the `resource.action` convention
/// (e.g. `"employees.read"`), but the policy engine only ever reasons about
/// the [`PermissionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub active: bool,
}

impl Permission {
    pub fn new(
        id: PermissionId,
        resource: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        let action = action.into();
        Self {
            id,
            name: permission_name(&resource, &action),
            description: description.into(),
            resource,
            action,
            active: true,
        }
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(self.resource.clone(), self.action.clone())
    }
}

/// Conventional permission name for a `(resource, action)` pair.
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{resource}.{action}")
}

/// The `(resource, action)` pair a permission grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub resource: String,
    pub action: String,
}

impl PermissionKey {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}
