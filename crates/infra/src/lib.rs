//! Infrastructure layer: directory storage, policy engine, services, config.

pub mod admin;
pub mod authn;
pub mod config;
pub mod policy;
pub mod store;

pub use admin::{DirectoryAdmin, EffectivePermissions};
pub use authn::{AuthenticationService, LoginResponse, UserInfo};
pub use config::{AuthConfig, ConfigError, SyncFailurePolicy};
pub use policy::{PolicyEnforcer, PolicyError, PolicyManager, PolicyStorage};
