//! Password reset racing with refresh and login.
//!
//! The store below parks a lookup until the test releases it, so a reset
//! can complete between the moment a flow reads the user and the moment it
//! writes its session change.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use estate_auth::auth::flows::RegisterRequest;
use estate_auth::auth::{
    CredentialStore, InMemoryCredentialStore, LoginRecord, ManualClock, PasswordConfig,
    PasswordResetEmail, PasswordResetToken, RefreshTokenRecord, ResetNotifier,
    SharedCredentialStore, StoreResult, User,
};
use estate_auth::{AuthConfigBuilder, AuthError, AuthServices, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, mpsc};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    RefreshLookup,
    EmailLookup,
}

/// Delegates to the in-memory store, holding one armed lookup open.
#[derive(Default)]
struct PausingStore {
    inner: InMemoryCredentialStore,
    armed: std::sync::Mutex<Option<Checkpoint>>,
    reached: Notify,
    release: Notify,
}

impl PausingStore {
    fn arm(&self, at: Checkpoint) {
        *self.armed.lock().unwrap() = Some(at);
    }

    async fn checkpoint(&self, at: Checkpoint) {
        let hit = {
            let mut armed = self.armed.lock().unwrap();
            if *armed == Some(at) {
                armed.take();
                true
            } else {
                false
            }
        };
        if hit {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl CredentialStore for PausingStore {
    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email_or_username(email, username).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = self.inner.find_user_by_email(email).await?;
        self.checkpoint(Checkpoint::EmailLookup).await;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let user = self.inner.find_user_by_refresh_token(token, now).await?;
        self.checkpoint(Checkpoint::RefreshLookup).await;
        Ok(user)
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn record_login(
        &self,
        user_id: &str,
        login: LoginRecord,
    ) -> StoreResult<Vec<RefreshTokenRecord>> {
        self.inner.record_login(user_id, login).await
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner
            .rotate_refresh_token(user_id, old_token, record, now)
            .await
    }

    async fn revoke_refresh_tokens(
        &self,
        user_id: &str,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.inner.revoke_refresh_tokens(user_id, token, now).await
    }

    async fn find_active_reset_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PasswordResetToken>> {
        self.inner.find_active_reset_token(user_id, now).await
    }

    async fn save_reset_token(&self, token: PasswordResetToken) -> StoreResult<()> {
        self.inner.save_reset_token(token).await
    }

    async fn mark_reset_token_used(&self, token_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_reset_token_used(token_id, now).await
    }

    async fn find_reset_token_by_value(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>> {
        self.inner.find_reset_token_by_value(token_hash).await
    }

    async fn complete_password_reset(
        &self,
        token_id: &str,
        user_id: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner
            .complete_password_reset(token_id, user_id, password_hash, now)
            .await
    }

    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.inner.purge_reset_tokens(now).await
    }
}

struct RecordingNotifier {
    tx: mpsc::UnboundedSender<PasswordResetEmail>,
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn send_password_reset_email(&self, email: PasswordResetEmail) -> Result<()> {
        let _ = self.tx.send(email);
        Ok(())
    }
}

struct Harness {
    services: AuthServices,
    store: Arc<PausingStore>,
    outbox: Mutex<mpsc::UnboundedReceiver<PasswordResetEmail>>,
}

impl Harness {
    async fn with_alice() -> Self {
        let store = Arc::new(PausingStore::default());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();

        let config = AuthConfigBuilder::new()
            .with_jwt_secret("integration-secret-32-bytes-long!")
            .with_app_base_url("https://estate.test")
            .build()
            .unwrap();

        let shared: SharedCredentialStore = store.clone();
        let services = AuthServices::builder(config)
            .with_store(shared)
            .with_notifier(Arc::new(RecordingNotifier { tx }))
            .with_clock(Arc::new(clock))
            .with_password_config(PasswordConfig::fast())
            .build()
            .unwrap();

        services
            .authenticator
            .register(RegisterRequest {
                username: "alice".into(),
                email: "alice@x.com".into(),
                password: "Passw0rd1".into(),
            })
            .await
            .unwrap();

        Self {
            services,
            store,
            outbox: Mutex::new(rx),
        }
    }

    async fn request_reset(&self) -> String {
        self.services
            .password_reset
            .initiate("alice@x.com")
            .await
            .unwrap();
        let email = self.outbox.lock().await.recv().await.unwrap();
        email.reset_link.rsplit('/').next().unwrap().to_string()
    }

    async fn alice(&self) -> User {
        self.store
            .inner
            .find_user_by_email("alice@x.com")
            .await
            .unwrap()
            .unwrap()
    }

    async fn assert_only_new_password_works(&self) {
        let auth = &self.services.authenticator;
        assert!(matches!(
            auth.login("alice@x.com", "Passw0rd1", "test-agent", "").await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(
            auth.login("alice@x.com", "NewPassw0rd2", "test-agent", "")
                .await
                .is_ok()
        );
    }
}

#[tokio::test]
async fn test_reset_during_refresh_revokes_the_session() {
    let h = Harness::with_alice().await;
    let session = h
        .services
        .authenticator
        .login("alice@x.com", "Passw0rd1", "test-agent", "laptop")
        .await
        .unwrap();
    let reset_token = h.request_reset().await;

    h.store.arm(Checkpoint::RefreshLookup);
    let sessions = h.services.sessions.clone();
    let refresh_token = session.tokens.refresh_token.clone();
    let refresh = tokio::spawn(async move { sessions.refresh(&refresh_token).await });

    // The refresh has read alice with her old session and hash.
    h.store.reached.notified().await;
    h.services
        .password_reset
        .consume(&reset_token, "NewPassw0rd2")
        .await
        .unwrap();
    h.store.release.notify_one();

    match refresh.await.unwrap() {
        Err(AuthError::Unauthorized(msg)) => assert_eq!(msg, "invalid refresh token"),
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert!(h.alice().await.refresh_tokens.is_empty());
    assert!(
        h.services
            .sessions
            .refresh(&session.tokens.refresh_token)
            .await
            .is_err()
    );
    h.assert_only_new_password_works().await;
}

#[tokio::test]
async fn test_reset_during_login_rejects_the_old_password() {
    let h = Harness::with_alice().await;
    let reset_token = h.request_reset().await;

    h.store.arm(Checkpoint::EmailLookup);
    let auth = h.services.authenticator.clone();
    let login =
        tokio::spawn(async move { auth.login("alice@x.com", "Passw0rd1", "test-agent", "").await });

    // The login has read alice with the old hash.
    h.store.reached.notified().await;
    h.services
        .password_reset
        .consume(&reset_token, "NewPassw0rd2")
        .await
        .unwrap();
    h.store.release.notify_one();

    match login.await.unwrap() {
        Err(AuthError::BadRequest(msg)) => assert_eq!(msg, "invalid email or password"),
        other => panic!("expected bad request, got {other:?}"),
    }
    assert!(h.alice().await.refresh_tokens.is_empty());
    h.assert_only_new_password_works().await;
}
