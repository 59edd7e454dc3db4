//! Canonical roles and their default grants.

use warden_auth::PermissionKey;
use warden_auth::roles::{ADMIN, EMPLOYEE, HR_MANAGER, HR_SPECIALIST, SUPER_ADMIN};

const EMPLOYEES: [&str; 4] = ["read", "create", "update", "delete"];
const USERS: [&str; 6] = ["read", "create", "update", "delete", "assign_role", "remove_role"];
const ROLES: [&str; 4] = ["read", "create", "update", "delete"];

/// `(name, description)` of every canonical role, most privileged first.
pub const DEFAULT_ROLES: [(&str, &str); 5] = [
    (SUPER_ADMIN, "Super Administrator with full access"),
    (ADMIN, "Administrator with management access"),
    (HR_MANAGER, "HR Manager with employee management access"),
    (HR_SPECIALIST, "HR Specialist with limited employee access"),
    (EMPLOYEE, "Regular employee with read-only access"),
];

fn keys(resource: &str, actions: &[&str]) -> Vec<PermissionKey> {
    actions
        .iter()
        .map(|action| PermissionKey::new(resource, *action))
        .collect()
}

/// Every permission the default hierarchy knows about.
pub fn permission_catalog() -> Vec<PermissionKey> {
    let mut all = keys("employees", &EMPLOYEES);
    all.extend(keys("users", &USERS));
    all.extend(keys("roles", &ROLES));
    all
}

/// Default grants of a canonical role; unknown roles get none.
pub fn default_role_permissions(role: &str) -> Vec<PermissionKey> {
    match role {
        SUPER_ADMIN => permission_catalog(),
        ADMIN => {
            // No role assignment changes, no role deletion.
            let mut grants = keys("employees", &EMPLOYEES);
            grants.extend(keys("users", &USERS[..4]));
            grants.extend(keys("roles", &ROLES[..3]));
            grants
        }
        HR_MANAGER => {
            // No user deletion.
            let mut grants = keys("employees", &EMPLOYEES);
            grants.extend(keys("users", &USERS[..3]));
            grants.push(PermissionKey::new("roles", "read"));
            grants
        }
        HR_SPECIALIST => keys("employees", &EMPLOYEES),
        EMPLOYEE => vec![PermissionKey::new("employees", "read")],
        _ => vec![],
    }
}
