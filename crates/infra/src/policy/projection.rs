//! Pure derivation of engine rules from directory rows.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_auth::{MEMBERSHIP_ACTION, Role, User, role_object};
use warden_core::UserId;

/// Allow tuple `(subject, object, action)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }

    pub(crate) fn to_vec(&self) -> Vec<String> {
        vec![self.subject.clone(), self.object.clone(), self.action.clone()]
    }

    pub(crate) fn from_vec(rule: &[String]) -> Option<Self> {
        match rule {
            [subject, object, action, ..] => Some(Self::new(subject, object, action)),
            _ => None,
        }
    }
}

impl core::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.object, self.action)
    }
}

/// Grouping tuple `g(user, role)`: `user` inherits everything `role` may do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupingRule {
    pub user: String,
    pub role: String,
}

impl GroupingRule {
    pub fn new(user: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
        }
    }

    pub(crate) fn to_vec(&self) -> Vec<String> {
        vec![self.user.clone(), self.role.clone()]
    }

    pub(crate) fn from_vec(rule: &[String]) -> Option<Self> {
        match rule {
            [user, role, ..] => Some(Self::new(user, role)),
            _ => None,
        }
    }
}

impl core::fmt::Display for GroupingRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "g({}, {})", self.user, self.role)
    }
}

/// Engine subject for a user.
pub fn user_subject(id: UserId) -> String {
    format!("user:{id}")
}

/// Full engine rule set derived from the directory.
///
/// Sorted and deduplicated, so two projections of the same rows compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub rules: Vec<PolicyRule>,
    pub groupings: Vec<GroupingRule>,
}

impl PolicySnapshot {
    /// Project users and roles into engine rules.
    ///
    /// - every active role `R` gets `(R, role:R, member)` plus one rule per
    ///   active permission it holds;
    /// - every active, live user gets `g(user:<id>, R)` for each role it holds.
    pub fn project(users: &[User], roles: &[Role]) -> Self {
        let mut rules = BTreeSet::new();
        for role in roles.iter().filter(|r| r.active) {
            rules.insert(PolicyRule::new(
                &role.name,
                role_object(&role.name),
                MEMBERSHIP_ACTION,
            ));
            for permission in role.active_permissions() {
                rules.insert(PolicyRule::new(
                    &role.name,
                    &permission.resource,
                    &permission.action,
                ));
            }
        }

        let groupings: BTreeSet<GroupingRule> = users
            .iter()
            .filter(|u| u.can_authenticate())
            .flat_map(|u| {
                let subject = user_subject(u.id);
                u.roles
                    .iter()
                    .map(move |r| GroupingRule::new(subject.clone(), &r.name))
            })
            .collect();

        Self {
            rules: rules.into_iter().collect(),
            groupings: groupings.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groupings.is_empty()
    }
}
