//! Relational directory boundary (users, roles, permissions).
//!
//! The directory is the single source of truth for who holds which role and
//! which permissions a role grants. The policy engine is derived from it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDirectory;
pub use r#trait::{PermissionStore, RoleStore, StoreError, UserStore};
