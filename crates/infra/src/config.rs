//! Configuration loading and representation.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use warden_auth::TokenService;

use crate::policy::PolicyStorage;

const DEV_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("refresh window ({window}m) must be shorter than the token lifetime ({ttl}m)")]
    RefreshWindowTooLong { window: i64, ttl: i64 },

    #[error("unknown policy sync failure mode '{0}' (expected best_effort or strict)")]
    UnknownSyncMode(String),
}

/// What login/register do when policy synchronization fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncFailurePolicy {
    /// Log at warn and still succeed.
    #[default]
    BestEffort,
    /// Fail the request.
    Strict,
}

impl FromStr for SyncFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::UnknownSyncMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl_minutes: i64,
    pub refresh_window_minutes: i64,
    pub model_path: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
    pub sync_failure: SyncFailurePolicy,
    pub bind_addr: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_SECRET.to_string(),
            jwt_issuer: "warden".to_string(),
            token_ttl_minutes: 60,
            refresh_window_minutes: 10,
            model_path: None,
            policy_path: None,
            sync_failure: SyncFailurePolicy::BestEffort,
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AuthConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source; unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret.clone()
        });

        let config = Self {
            jwt_secret,
            jwt_issuer: var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            token_ttl_minutes: minutes(&var, "JWT_EXPIRATION_MINUTES", defaults.token_ttl_minutes)?,
            refresh_window_minutes: minutes(
                &var,
                "JWT_REFRESH_WINDOW_MINUTES",
                defaults.refresh_window_minutes,
            )?,
            model_path: var("CASBIN_MODEL_PATH").map(PathBuf::from),
            policy_path: var("CASBIN_POLICY_PATH").map(PathBuf::from),
            sync_failure: var("POLICY_SYNC_FAILURE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Empty("JWT_SECRET"));
        }
        if self.jwt_issuer.is_empty() {
            return Err(ConfigError::Empty("JWT_ISSUER"));
        }
        if self.refresh_window_minutes >= self.token_ttl_minutes {
            return Err(ConfigError::RefreshWindowTooLong {
                window: self.refresh_window_minutes,
                ttl: self.token_ttl_minutes,
            });
        }
        Ok(())
    }

    pub fn policy_storage(&self) -> PolicyStorage {
        match &self.policy_path {
            Some(path) => PolicyStorage::File(path.clone()),
            None => PolicyStorage::Memory,
        }
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            self.jwt_secret.as_bytes(),
            self.jwt_issuer.clone(),
            Duration::minutes(self.token_ttl_minutes),
            Duration::minutes(self.refresh_window_minutes),
        )
    }
}

fn minutes<V>(var: &V, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}
