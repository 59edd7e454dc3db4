use crate::PermissionKey;
use crate::roles::{ADMIN, HR_MANAGER, HR_SPECIALIST, SUPER_ADMIN};

/// Object prefix of the membership rules that back role gates.
pub const ROLE_OBJECT_PREFIX: &str = "role:";

/// Action of the membership rules that back role gates.
pub const MEMBERSHIP_ACTION: &str = "member";

/// Policy object standing for "holds role `role`".
///
/// Each active role `R` is projected with a rule `(R, role:R, member)`, so a
/// role gate is just another `(object, action)` lookup.
pub fn role_object(role: &str) -> String {
    format!("{ROLE_OBJECT_PREFIX}{role}")
}

/// What a protected operation demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Permission(PermissionKey),
    AnyPermission(Vec<PermissionKey>),
    Role(String),
    AnyRole(Vec<String>),
}

impl Requirement {
    pub fn permission(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Permission(PermissionKey::new(resource, action))
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::Role(role.into())
    }

    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    pub fn any_permission<I, R, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, A)>,
        R: Into<String>,
        A: Into<String>,
    {
        Self::AnyPermission(
            pairs
                .into_iter()
                .map(|(r, a)| PermissionKey::new(r, a))
                .collect(),
        )
    }

    /// `admin` or `super_admin`.
    pub fn admin() -> Self {
        Self::any_role([ADMIN, SUPER_ADMIN])
    }

    pub fn super_admin() -> Self {
        Self::role(SUPER_ADMIN)
    }

    /// Any role allowed into HR operations.
    pub fn hr() -> Self {
        Self::any_role([ADMIN, SUPER_ADMIN, HR_MANAGER, HR_SPECIALIST])
    }

    /// `(object, action)` pairs of which at least one must be allowed.
    pub fn checks(&self) -> Vec<(String, String)> {
        match self {
            Requirement::Permission(key) => vec![(key.resource.clone(), key.action.clone())],
            Requirement::AnyPermission(keys) => keys
                .iter()
                .map(|k| (k.resource.clone(), k.action.clone()))
                .collect(),
            Requirement::Role(role) => vec![(role_object(role), MEMBERSHIP_ACTION.to_string())],
            Requirement::AnyRole(roles) => roles
                .iter()
                .map(|r| (role_object(r), MEMBERSHIP_ACTION.to_string()))
                .collect(),
        }
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::Permission(key) => write!(f, "permission {key}"),
            Requirement::AnyPermission(keys) => {
                let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
                write!(f, "any permission of [{}]", keys.join(", "))
            }
            Requirement::Role(role) => write!(f, "role {role}"),
            Requirement::AnyRole(roles) => write!(f, "any role of [{}]", roles.join(", ")),
        }
    }
}
