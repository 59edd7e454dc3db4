//! Credential verification, token issuance and policy synchronization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_auth::password::{self, dummy_hash};
use warden_auth::roles::DEFAULT_ROLE;
use warden_auth::{AuthError, NewUser, TokenService, User};
use warden_core::UserId;

use crate::config::SyncFailurePolicy;
use crate::policy::PolicyManager;
use crate::store::{RoleStore, UserStore};

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            active: user.active,
            roles: user.role_names(),
            permissions: user.permission_names(),
        }
    }
}

/// Successful login/register/refresh result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub user: UserInfo,
}

pub struct AuthenticationService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    tokens: Arc<TokenService>,
    policy: Arc<PolicyManager>,
    sync_failure: SyncFailurePolicy,
}

impl AuthenticationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        tokens: Arc<TokenService>,
        policy: Arc<PolicyManager>,
        sync_failure: SyncFailurePolicy,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
            policy,
            sync_failure,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Verify credentials and issue a token.
    ///
    /// The password is always checked (against a dummy hash for unknown
    /// emails) before the active flag is looked at.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self.users.find_user_by_email(email).await?;

        let hash = user.as_ref().map_or(dummy_hash(), |u| u.password_hash.as_str());
        let password_ok = password::verify_password(password, hash);

        let user = match user {
            Some(user) if password_ok => user,
            _ => {
                tracing::info!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !user.active {
            tracing::info!(user_id = %user.id, "login rejected: user inactive");
            return Err(AuthError::UserInactive);
        }

        let response = self.issue(&user)?;
        self.sync(&user).await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(response)
    }

    /// Create an account holding the default role and issue a token.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<LoginResponse, AuthError> {
        let new_user = NewUser::new(email, password, first_name, last_name)?;
        if self.users.email_exists(&new_user.email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let default_role = self
            .roles
            .find_role_by_name(DEFAULT_ROLE)
            .await?
            .ok_or_else(|| AuthError::DefaultRoleMissing(DEFAULT_ROLE.to_string()))?;

        let created = match self.users.insert_user(new_user, &[default_role.id]).await {
            Ok(user) => user,
            // Lost a race with a concurrent registration for the same email.
            Err(crate::store::StoreError::Conflict(_)) => return Err(AuthError::EmailAlreadyExists),
            Err(e) => return Err(e.into()),
        };
        let user = self
            .users
            .find_user_by_id(created.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let response = self.issue(&user)?;
        self.sync(&user).await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(response)
    }

    /// Exchange a token inside its refresh window (shortly before or just
    /// after expiry) for a fresh one.
    ///
    /// Roles and permissions are re-read from the directory, unlike
    /// [`TokenService::refresh_token`].
    pub async fn refresh_token(&self, token: &str) -> Result<LoginResponse, AuthError> {
        let claims = self.tokens.validate_for_refresh(token)?;

        let user = self
            .users
            .find_user_by_id(claims.user_id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or(AuthError::UserNotFound)?;
        if !user.active {
            return Err(AuthError::UserInactive);
        }

        let response = self.issue(&user)?;
        tracing::debug!(user_id = %user.id, "token refreshed");
        Ok(response)
    }

    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.live_user(user_id).await?;
        if !user.check_password(current_password) {
            return Err(AuthError::InvalidCredentials);
        }
        self.store_password(user_id, new_password).await?;

        tracing::info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Administrative reset; no knowledge of the current password needed.
    pub async fn reset_password(&self, user_id: UserId, new_password: &str) -> Result<(), AuthError> {
        self.live_user(user_id).await?;
        self.store_password(user_id, new_password).await?;

        tracing::info!(user_id = %user_id, "password reset");
        Ok(())
    }

    pub async fn get_profile(&self, user_id: UserId) -> Result<UserInfo, AuthError> {
        let user = self.live_user(user_id).await?;
        Ok(UserInfo::from(&user))
    }

    async fn live_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or(AuthError::UserNotFound)
    }

    async fn store_password(&self, user_id: UserId, new_password: &str) -> Result<(), AuthError> {
        password::validate_password(new_password)?;
        let hash = password::hash_password(new_password)?;
        self.users.update_password(user_id, hash).await?;
        Ok(())
    }

    fn issue(&self, user: &User) -> Result<LoginResponse, AuthError> {
        Ok(LoginResponse {
            access_token: self.tokens.generate_token(user)?,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl().num_seconds(),
            user: UserInfo::from(user),
        })
    }

    async fn sync(&self, user: &User) -> Result<(), AuthError> {
        match self.policy.sync_user_policies(user).await {
            Ok(()) => Ok(()),
            Err(e) => match self.sync_failure {
                SyncFailurePolicy::BestEffort => {
                    tracing::warn!(user_id = %user.id, error = %e, "policy sync failed; continuing");
                    Ok(())
                }
                SyncFailurePolicy::Strict => {
                    tracing::error!(user_id = %user.id, error = %e, "policy sync failed");
                    Err(AuthError::PolicySync(e.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyEnforcer, PolicyStorage};
    use crate::store::{InMemoryDirectory, PermissionStore};
    use std::path::PathBuf;
    use chrono::Duration;
    use warden_auth::{TokenClaims, TokenError};

    struct Fixture {
        dir: Arc<InMemoryDirectory>,
        policy: Arc<PolicyManager>,
        auth: AuthenticationService,
    }

    async fn fixture() -> Fixture {
        let enforcer = PolicyEnforcer::in_memory().await.unwrap();
        fixture_with(enforcer, SyncFailurePolicy::BestEffort)
    }

    fn fixture_with(enforcer: PolicyEnforcer, sync_failure: SyncFailurePolicy) -> Fixture {
        let dir = Arc::new(InMemoryDirectory::new());
        let policy = Arc::new(PolicyManager::new(Arc::new(enforcer)));
        let tokens = Arc::new(TokenService::new(
            b"authn-test-secret",
            "warden",
            Duration::minutes(60),
            Duration::minutes(10),
        ));
        let auth = AuthenticationService::new(
            dir.clone(),
            dir.clone(),
            tokens,
            policy.clone(),
            sync_failure,
        );
        Fixture { dir, policy, auth }
    }

    /// Alice seeded against a file-backed engine whose directory is then
    /// removed, so every later save fails.
    async fn unwritable_policy_fixture(sync_failure: SyncFailurePolicy) -> Fixture {
        let root: PathBuf =
            std::env::temp_dir().join(format!("warden-authn-{}", uuid::Uuid::now_v7()));
        tokio::fs::create_dir_all(&root).await.unwrap();
        let storage = PolicyStorage::File(root.join("policy.csv"));
        let enforcer = PolicyEnforcer::new(None, storage).await.unwrap();

        let f = fixture_with(enforcer, sync_failure);
        seed_alice(&f).await;
        tokio::fs::remove_dir_all(&root).await.unwrap();
        f
    }

    /// alice@example.com, active, holding `hr_manager` with only `employees.read`.
    async fn seed_alice(f: &Fixture) -> User {
        let read = f.dir.insert_permission("employees", "read", "").await.unwrap();
        let hr = f.dir.insert_role("hr_manager", "", true).await.unwrap();
        f.dir.grant_permission(hr.id, read.id).await.unwrap();
        let new = NewUser::new("alice@example.com", "correct-pass", "Alice", "Smith").unwrap();
        let alice = f.dir.insert_user(new, &[hr.id]).await.unwrap();
        f.policy
            .rebuild_from(f.dir.as_ref(), f.dir.as_ref())
            .await
            .unwrap();
        alice
    }

    #[tokio::test]
    async fn alice_logs_in_and_is_gated_by_permission() {
        let f = fixture().await;
        seed_alice(&f).await;

        let res = f.auth.login("alice@example.com", "correct-pass").await.unwrap();
        assert_eq!(res.token_type, "Bearer");
        assert_eq!(res.expires_in, 3600);

        let claims = f.auth.tokens().validate_token(&res.access_token).unwrap();
        assert!(claims.has_role("hr_manager"));
        assert!(claims.has_permission("employees.read"));

        let read = warden_auth::Requirement::permission("employees", "read");
        let delete = warden_auth::Requirement::permission("employees", "delete");
        assert!(f.policy.authorize(&claims.roles, &read).await.unwrap());
        assert!(!f.policy.authorize(&claims.roles, &delete).await.unwrap());
    }

    #[tokio::test]
    async fn failed_sync_is_logged_and_login_still_succeeds() {
        let f = unwritable_policy_fixture(SyncFailurePolicy::BestEffort).await;
        assert!(f.policy.enforcer().save_policy().await.is_err());

        let res = f.auth.login("alice@example.com", "correct-pass").await.unwrap();
        let claims = f.auth.tokens().validate_token(&res.access_token).unwrap();
        assert!(claims.has_role("hr_manager"));
    }

    #[tokio::test]
    async fn failed_sync_fails_login_when_strict() {
        let f = unwritable_policy_fixture(SyncFailurePolicy::Strict).await;

        let err = f.auth.login("alice@example.com", "correct-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::PolicySync(_)), "{err:?}");
        assert_eq!(err.code(), "internal_error");
    }

    #[tokio::test]
    async fn failed_sync_fails_register_only_when_strict() {
        for (mode, succeeds) in [
            (SyncFailurePolicy::BestEffort, true),
            (SyncFailurePolicy::Strict, false),
        ] {
            let f = unwritable_policy_fixture(mode).await;
            f.dir.insert_role("employee", "", true).await.unwrap();

            let res = f.auth.register("new@example.com", "secret1", "New", "Hire").await;
            assert_eq!(res.is_ok(), succeeds, "{mode:?}: {res:?}");
        }
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let f = fixture().await;
        seed_alice(&f).await;

        let wrong = f.auth.login("alice@example.com", "nope-nope").await.unwrap_err();
        let unknown = f.auth.login("mallory@example.com", "nope-nope").await.unwrap_err();
        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn inactive_user_with_correct_password_gets_no_token() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;
        f.dir.set_user_active(alice.id, false).await.unwrap();

        let err = f.auth.login("alice@example.com", "correct-pass").await.unwrap_err();
        assert_eq!(err, AuthError::UserInactive);
    }

    #[tokio::test]
    async fn inactive_user_with_wrong_password_is_invalid_credentials() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;
        f.dir.set_user_active(alice.id, false).await.unwrap();

        let err = f.auth.login("alice@example.com", "wrong-pass").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn registering_twice_inserts_one_row() {
        let f = fixture().await;
        f.dir.insert_role("employee", "", true).await.unwrap();

        let first = f.auth.register("new@example.com", "secret1", "New", "Hire").await.unwrap();
        assert_eq!(first.user.roles, vec!["employee"]);

        let second = f.auth.register("NEW@example.com", "secret2", "New", "Hire").await;
        assert_eq!(second.unwrap_err(), AuthError::EmailAlreadyExists);
        assert_eq!(f.dir.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_requires_the_default_role() {
        let f = fixture().await;
        let err = f.auth.register("new@example.com", "secret1", "New", "Hire").await.unwrap_err();
        assert_eq!(err, AuthError::DefaultRoleMissing("employee".into()));
        assert!(f.dir.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_syncs_the_engine_groupings() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;
        f.policy
            .enforcer()
            .delete_user(&crate::policy::user_subject(alice.id))
            .await
            .unwrap();

        f.auth.login("alice@example.com", "correct-pass").await.unwrap();
        let subject = crate::policy::user_subject(alice.id);
        assert_eq!(f.policy.get_user_roles(&subject).await, vec!["hr_manager"]);
    }

    /// A token for `user` issued 55 minutes ago: five minutes left, inside the window.
    fn ageing_token(tokens: &TokenService, user: &User) -> String {
        let issued = chrono::Utc::now() - Duration::minutes(55);
        tokens.generate_token_at(user, issued).unwrap()
    }

    #[tokio::test]
    async fn refresh_rereads_the_directory() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;
        let admin = f.dir.insert_role("admin", "", true).await.unwrap();

        let token = ageing_token(f.auth.tokens(), &alice);
        f.dir.add_user_role(alice.id, admin.id).await.unwrap();

        let refreshed = f.auth.refresh_token(&token).await.unwrap();
        assert_eq!(refreshed.user.roles, vec!["hr_manager", "admin"]);
        let claims = f.auth.tokens().validate_token(&refreshed.access_token).unwrap();
        assert!(claims.has_role("admin"));
    }

    #[tokio::test]
    async fn fresh_token_is_not_refreshable() {
        let f = fixture().await;
        seed_alice(&f).await;

        let res = f.auth.login("alice@example.com", "correct-pass").await.unwrap();
        assert_eq!(
            f.auth.refresh_token(&res.access_token).await.unwrap_err(),
            AuthError::Token(TokenError::NotEligibleForRefresh)
        );
    }

    #[tokio::test]
    async fn refresh_rejects_long_expired_and_inactive() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;
        let tokens = f.auth.tokens();

        let now = chrono::Utc::now();
        let stale = TokenClaims::for_user(&alice, "warden", now - Duration::hours(3), tokens.ttl());
        let stale = tokens.sign(&stale).unwrap();
        assert_eq!(
            f.auth.refresh_token(&stale).await.unwrap_err(),
            AuthError::Token(TokenError::Expired)
        );

        let ageing = ageing_token(tokens, &alice);
        f.dir.set_user_active(alice.id, false).await.unwrap();
        assert_eq!(f.auth.refresh_token(&ageing).await.unwrap_err(), AuthError::UserInactive);
    }

    #[tokio::test]
    async fn change_password_verifies_the_current_one() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;

        let err = f.auth.change_password(alice.id, "bad", "new-secret").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        f.auth
            .change_password(alice.id, "correct-pass", "new-secret")
            .await
            .unwrap();
        assert!(f.auth.login("alice@example.com", "new-secret").await.is_ok());
        assert!(f.auth.login("alice@example.com", "correct-pass").await.is_err());
    }

    #[tokio::test]
    async fn reset_password_skips_verification() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;

        f.auth.reset_password(alice.id, "reset-secret").await.unwrap();
        assert!(f.auth.login("alice@example.com", "reset-secret").await.is_ok());

        let err = f.auth.reset_password(alice.id, "123").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn profile_lists_roles_and_permissions() {
        let f = fixture().await;
        let alice = seed_alice(&f).await;

        let profile = f.auth.get_profile(alice.id).await.unwrap();
        assert_eq!(profile.roles, vec!["hr_manager"]);
        assert_eq!(profile.permissions, vec!["employees.read"]);
        assert_eq!(
            f.auth.get_profile(UserId::new(999)).await.unwrap_err(),
            AuthError::UserNotFound
        );
    }
}
