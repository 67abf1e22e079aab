//! Registration, login and logout.
//!
//! This module emits tracing events for security monitoring:
//! - `auth.register` - Account created
//! - `auth.login.success` - Credentials accepted, session opened
//! - `auth.login.failed` - Unknown email or wrong password
//! - `auth.logout` - One or all sessions ended

use crate::auth::jwt_issuer::TokenIssuer;
use crate::auth::models::{Role, User, UserSummary};
use crate::auth::owner::{OwnerDirectory, StaticOwnerDirectory};
use crate::auth::password::{PasswordHasher, PasswordPolicy};
use crate::auth::storage::{SharedCredentialStore, StoreError};
use crate::error::{AuthError, Result};
use std::sync::Arc;

use super::rotation::SessionRotator;
use super::types::{LoginOutcome, RegisterRequest};

/// Device label used when the client doesn't send one.
pub const UNKNOWN_DEVICE: &str = "unknown";

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Handles register, login and logout.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    store: SharedCredentialStore,
    issuer: Arc<TokenIssuer>,
    sessions: SessionRotator,
    owners: Arc<dyn OwnerDirectory>,
    password_hasher: PasswordHasher,
    password_policy: PasswordPolicy,
}

impl CredentialAuthenticator {
    pub fn new(
        store: SharedCredentialStore,
        issuer: Arc<TokenIssuer>,
        sessions: SessionRotator,
    ) -> Self {
        Self {
            store,
            issuer,
            sessions,
            owners: Arc::new(StaticOwnerDirectory::default()),
            password_hasher: PasswordHasher::default(),
            password_policy: PasswordPolicy::default(),
        }
    }

    /// Emails that register as [`Role::Admin`].
    pub fn with_owners(mut self, owners: Arc<dyn OwnerDirectory>) -> Self {
        self.owners = owners;
        self
    }

    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.password_hasher = hasher;
        self
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Create an account.
    ///
    /// Checks run in order: well-formed input, uniqueness (`Conflict` naming
    /// the taken field), then the password policy.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserSummary> {
        let username = req.username.trim().to_string();
        let email = normalize_email(&req.email);

        if username.is_empty() {
            return Err(AuthError::bad_request("Username is required"));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::bad_request("Invalid email format"));
        }

        if let Some(existing) = self
            .store
            .find_user_by_email_or_username(&email, &username)
            .await?
        {
            let field = if existing.email == email {
                "email"
            } else {
                "username"
            };
            return Err(AuthError::conflict(
                field,
                format!("{} is already registered", field),
            ));
        }

        self.password_policy.check(&req.password)?;

        let hash = self.password_hasher.hash(&req.password)?;
        let role = if self.owners.is_owner(&email).await {
            Role::Admin
        } else {
            Role::Basic
        };

        let user = User::new(username, email, hash, role, self.issuer.clock().now());
        let summary = user.summary();
        self.store.insert_user(user).await?;

        tracing::info!(
            target: "auth.register",
            user_id = %summary.id,
            role = %summary.role,
            "User registered"
        );

        Ok(summary)
    }

    /// Verify credentials and open a session.
    ///
    /// An unknown email and a wrong password fail identically.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: &str,
        device: &str,
    ) -> Result<LoginOutcome> {
        let email = normalize_email(email);

        let mut user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.password_hasher.dummy_verify(password);
                tracing::info!(
                    target: "auth.login.failed",
                    reason = "unknown_email",
                    "Login failed"
                );
                return Err(AuthError::bad_request(INVALID_CREDENTIALS));
            }
        };

        if !self.password_hasher.verify(password, &user.password_hash)? {
            tracing::info!(
                target: "auth.login.failed",
                user_id = %user.id,
                reason = "wrong_password",
                "Login failed"
            );
            return Err(AuthError::bad_request(INVALID_CREDENTIALS));
        }

        let rehashed = match self.password_hasher.needs_rehash(&user.password_hash) {
            Ok(true) => match self.password_hasher.hash(password) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Password rehash failed");
                    None
                }
            },
            _ => None,
        };

        let tokens = self.issuer.issue_pair(&user.id)?;
        let device = if device.trim().is_empty() {
            UNKNOWN_DEVICE
        } else {
            device.trim()
        };

        match self
            .sessions
            .open_session(&user, &tokens, device, user_agent, rehashed)
            .await
        {
            Ok(()) => {}
            // The password changed after it was verified.
            Err(StoreError::NotFound) => {
                tracing::info!(
                    target: "auth.login.failed",
                    user_id = %user.id,
                    reason = "password_changed",
                    "Login failed"
                );
                return Err(AuthError::bad_request(INVALID_CREDENTIALS));
            }
            Err(e) => return Err(e.into()),
        }
        user.last_login_at = Some(self.issuer.clock().now());

        tracing::info!(
            target: "auth.login.success",
            user_id = %user.id,
            device = %device,
            "User logged in"
        );

        Ok(LoginOutcome {
            user: user.summary(),
            tokens,
        })
    }

    /// End one session, or every session when `refresh_token` is `None`.
    pub async fn logout(&self, user_id: &str, refresh_token: Option<&str>) -> Result<()> {
        let removed = match self
            .store
            .revoke_refresh_tokens(user_id, refresh_token, self.issuer.clock().now())
            .await
        {
            Ok(removed) => removed,
            Err(StoreError::NotFound) => return Err(AuthError::unauthorized("unknown user")),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            target: "auth.logout",
            user_id = %user_id,
            scope = if refresh_token.is_some() { "device" } else { "all" },
            removed,
            "User logged out"
        );

        Ok(())
    }

    /// The account behind an authenticated request.
    pub async fn current_user(&self, user_id: &str) -> Result<UserSummary> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|u| u.summary())
            .ok_or_else(|| AuthError::unauthorized("unknown user"))
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::jwt_issuer::TokenIssuerConfig;
    use crate::auth::password::PasswordConfig;
    use crate::auth::storage::{CredentialStore, InMemoryCredentialStore};
    use chrono::Duration;

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        auth: CredentialAuthenticator,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::default();
        let issuer = Arc::new(
            TokenIssuer::with_clock(
                TokenIssuerConfig::with_secret("test-secret-key-32-bytes-long!!!"),
                Arc::new(clock.clone()),
            )
            .unwrap(),
        );
        let store = Arc::new(InMemoryCredentialStore::new());
        let sessions = SessionRotator::new(store.clone(), issuer.clone());
        let auth = CredentialAuthenticator::new(store.clone(), issuer, sessions)
            .with_hasher(PasswordHasher::new(PasswordConfig::fast()))
            .with_owners(Arc::new(StaticOwnerDirectory::new(["owner@estate.test"])));
        Fixture { store, auth, clock }
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_register_defaults_to_basic_role() {
        let f = fixture();
        let user = f
            .auth
            .register(register_req("alice", " Alice@X.com ", "Passw0rd1"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, Role::Basic);
        assert_eq!(f.store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_owner_is_admin() {
        let f = fixture();
        let user = f
            .auth
            .register(register_req("owner", "owner@estate.test", "Passw0rd1"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_register_conflict_names_field() {
        let f = fixture();
        f.auth
            .register(register_req("alice", "alice@x.com", "Passw0rd1"))
            .await
            .unwrap();

        match f.auth.register(register_req("alice2", "alice@x.com", "Passw0rd1")).await {
            Err(AuthError::Conflict { field, .. }) => assert_eq!(field, "email"),
            other => panic!("expected conflict, got {:?}", other),
        }
        match f.auth.register(register_req("alice", "other@x.com", "Passw0rd1")).await {
            Err(AuthError::Conflict { field, .. }) => assert_eq!(field, "username"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_weak_password_lists_rules() {
        let f = fixture();
        match f.auth.register(register_req("bob", "bob@x.com", "short")).await {
            Err(AuthError::Validation(rules)) => assert_eq!(rules.len(), 3),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(f.store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_input() {
        let f = fixture();
        assert!(matches!(
            f.auth.register(register_req("bob", "not-an-email", "Passw0rd1")).await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            f.auth.register(register_req("  ", "bob@x.com", "Passw0rd1")).await,
            Err(AuthError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let f = fixture();
        f.auth
            .register(register_req("alice", "alice@x.com", "Passw0rd1"))
            .await
            .unwrap();

        let wrong = f.auth.login("alice@x.com", "wrong", "ua", "web").await.unwrap_err();
        let unknown = f.auth.login("nobody@x.com", "Passw0rd1", "ua", "web").await.unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.kind(), "bad_request");
        assert!(wrong.to_string().contains("invalid email or password"));
    }

    #[tokio::test]
    async fn test_login_opens_session() {
        let f = fixture();
        let registered = f
            .auth
            .register(register_req("alice", "alice@x.com", "Passw0rd1"))
            .await
            .unwrap();

        let outcome = f
            .auth
            .login("ALICE@x.com", "Passw0rd1", "Mozilla/5.0", "laptop")
            .await
            .unwrap();
        assert_eq!(outcome.user.id, registered.id);
        assert_eq!(outcome.user.last_login_at, Some(f.clock.now()));

        let user = f.store.find_user_by_id(&registered.id).await.unwrap().unwrap();
        assert_eq!(user.refresh_tokens.len(), 1);
        assert_eq!(user.refresh_tokens[0].token, outcome.tokens.refresh_token);
        assert_eq!(user.refresh_tokens[0].device, "laptop");
        assert_eq!(user.refresh_tokens[0].user_agent, "Mozilla/5.0");
    }

    #[tokio::test]
    async fn test_fourth_login_evicts_oldest() {
        let f = fixture();
        f.auth
            .register(register_req("alice", "alice@x.com", "Passw0rd1"))
            .await
            .unwrap();

        let mut refresh_tokens = Vec::new();
        for device in ["a", "b", "c", "d"] {
            let outcome = f.auth.login("alice@x.com", "Passw0rd1", "ua", device).await.unwrap();
            refresh_tokens.push(outcome.tokens.refresh_token);
            f.clock.advance(Duration::seconds(1));
        }

        let user = f.store.find_user_by_email("alice@x.com").await.unwrap().unwrap();
        let devices: Vec<_> = user.refresh_tokens.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(devices, vec!["b", "c", "d"]);
        assert!(user.active_session_index(&refresh_tokens[0], f.clock.now()).is_none());
    }

    #[tokio::test]
    async fn test_login_rehashes_outdated_hash() {
        let f = fixture();
        let legacy = PasswordHasher::new(PasswordConfig::new(2048, 1, 1));
        let user = User::new(
            "legacy",
            "legacy@x.com",
            legacy.hash("Passw0rd1").unwrap(),
            Role::Broker,
            f.clock.now(),
        );
        let old_hash = user.password_hash.clone();
        f.store.insert_user(user).await.unwrap();

        f.auth.login("legacy@x.com", "Passw0rd1", "ua", "").await.unwrap();

        let user = f.store.find_user_by_email("legacy@x.com").await.unwrap().unwrap();
        assert_ne!(user.password_hash, old_hash);
        assert_eq!(user.refresh_tokens[0].device, UNKNOWN_DEVICE);
        assert!(f.auth.login("legacy@x.com", "Passw0rd1", "ua", "").await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_single_device_and_everywhere() {
        let f = fixture();
        let user = f
            .auth
            .register(register_req("alice", "alice@x.com", "Passw0rd1"))
            .await
            .unwrap();

        let first = f.auth.login("alice@x.com", "Passw0rd1", "ua", "a").await.unwrap();
        f.auth.login("alice@x.com", "Passw0rd1", "ua", "b").await.unwrap();
        f.auth.login("alice@x.com", "Passw0rd1", "ua", "c").await.unwrap();

        f.auth
            .logout(&user.id, Some(&first.tokens.refresh_token))
            .await
            .unwrap();
        let stored = f.store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_tokens.len(), 2);

        f.auth.logout(&user.id, None).await.unwrap();
        let stored = f.store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.refresh_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_logout_unknown_user() {
        let f = fixture();
        assert!(matches!(
            f.auth.logout("missing", None).await,
            Err(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("a@b@c.com"));
    }
}
