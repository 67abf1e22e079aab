//! Password reset flow.
//!
//! This module emits tracing events for security monitoring:
//! - `auth.password.reset_requested` - Password reset requested
//! - `auth.password.reset_completed` - Password successfully reset
//! - `auth.password.reset_failed` - Password reset failed (invalid token, weak password)
//! - `auth.email.failed` - Reset email could not be delivered
//! - `auth.password.purge` - Stale reset tokens deleted

use crate::auth::clock::SharedClock;
use crate::auth::models::PasswordResetToken;
use crate::auth::notify::{PasswordResetEmail, ResetNotifier};
use crate::auth::password::{PasswordHasher, PasswordPolicy};
use crate::auth::storage::{SharedCredentialStore, StoreError};
use crate::error::{AuthError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::authenticator::normalize_email;
use super::types::ResetTokenStatus;

const INVALID_RESET_TOKEN: &str = "invalid or expired reset token";

/// Settings for [`PasswordResetFlow`].
#[derive(Clone, Debug)]
pub struct ResetFlowConfig {
    /// Token lifetime (default: 15 minutes).
    pub token_ttl: Duration,
    /// A new request within this long of the last one is ignored (default: 2 minutes).
    pub resend_cooldown: Duration,
    /// Base URL for the emailed link, e.g. `https://estate.example`.
    pub app_base_url: String,
}

impl Default for ResetFlowConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::minutes(15),
            resend_cooldown: Duration::minutes(2),
            app_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl ResetFlowConfig {
    pub fn reset_link(&self, raw_token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.app_base_url.trim_end_matches('/'),
            raw_token
        )
    }
}

/// Handles password reset initiation, validation and completion.
#[derive(Clone)]
pub struct PasswordResetFlow {
    store: SharedCredentialStore,
    notifier: Arc<dyn ResetNotifier>,
    clock: SharedClock,
    password_hasher: PasswordHasher,
    password_policy: PasswordPolicy,
    config: ResetFlowConfig,
}

impl PasswordResetFlow {
    pub fn new(
        store: SharedCredentialStore,
        notifier: Arc<dyn ResetNotifier>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            password_hasher: PasswordHasher::default(),
            password_policy: PasswordPolicy::default(),
            config: ResetFlowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResetFlowConfig) -> Self {
        self.config = config;
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

    /// Request a password reset.
    ///
    /// Always returns success to prevent email enumeration. The email is
    /// sent on a background task; delivery failures are only logged.
    pub async fn initiate(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let now = self.clock.now();

        // Generate a token on both paths so they cost the same.
        let token = generate_reset_token();
        let token_hash = hash_token(&token);

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::info!(
                    target: "auth.password.reset_requested",
                    user_found = false,
                    "Password reset requested for unknown email"
                );
                return Ok(());
            }
        };

        if let Some(active) = self.store.find_active_reset_token(&user.id, now).await? {
            if now - active.created_at < self.config.resend_cooldown {
                tracing::info!(
                    target: "auth.password.reset_requested",
                    user_id = %user.id,
                    user_found = true,
                    cooldown = true,
                    "Password reset already requested recently"
                );
                return Ok(());
            }
            self.store.mark_reset_token_used(&active.id, now).await?;
        }

        let record = PasswordResetToken::new(&user.id, token_hash, now, self.config.token_ttl);
        self.store.save_reset_token(record).await?;

        let message = PasswordResetEmail {
            to_email: user.email.clone(),
            to_name: user.username.clone(),
            reset_link: self.config.reset_link(&token),
            valid_for: self.config.token_ttl,
        };
        let notifier = self.notifier.clone();
        let user_id = user.id.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_password_reset_email(message).await {
                tracing::error!(
                    target: "auth.email.failed",
                    user_id = %user_id,
                    error = %e,
                    "Failed to send password reset email"
                );
            }
        });

        tracing::info!(
            target: "auth.password.reset_requested",
            user_id = %user.id,
            user_found = true,
            expires_in_secs = self.config.token_ttl.num_seconds(),
            "Password reset token issued"
        );

        Ok(())
    }

    /// Whether `token` can still be used. Never fails.
    pub async fn validate(&self, token: &str) -> ResetTokenStatus {
        let now = self.clock.now();

        let record = match self.find_active(token, now).await {
            Ok(Some(record)) => record,
            Ok(None) => return ResetTokenStatus::invalid(),
            Err(e) => {
                tracing::warn!(error = %e, "Reset token lookup failed");
                return ResetTokenStatus::invalid();
            }
        };

        match self.store.find_user_by_id(&record.user_id).await {
            Ok(Some(user)) => ResetTokenStatus::valid(user.email),
            Ok(None) => ResetTokenStatus::invalid(),
            Err(e) => {
                tracing::warn!(error = %e, "Reset token owner lookup failed");
                ResetTokenStatus::invalid()
            }
        }
    }

    /// Set a new password with a reset token.
    ///
    /// On success every refresh session of the user is cleared and the
    /// token is spent, in one store operation.
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<()> {
        let now = self.clock.now();

        let Some(record) = self.find_active(token, now).await? else {
            tracing::warn!(
                target: "auth.password.reset_failed",
                reason = "invalid_token",
                "Password reset failed: invalid or expired token"
            );
            return Err(AuthError::bad_request(INVALID_RESET_TOKEN));
        };

        if let Err(e) = self.password_policy.check(new_password) {
            tracing::info!(
                target: "auth.password.reset_failed",
                user_id = %record.user_id,
                reason = "weak_password",
                "Password reset failed: password policy violation"
            );
            return Err(e);
        }

        let password_hash = self.password_hasher.hash(new_password)?;

        match self
            .store
            .complete_password_reset(&record.id, &record.user_id, &password_hash, now)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::warn!(
                    target: "auth.password.reset_failed",
                    user_id = %record.user_id,
                    reason = "token_consumed",
                    "Password reset failed: token consumed concurrently"
                );
                return Err(AuthError::bad_request(INVALID_RESET_TOKEN));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            target: "auth.password.reset_completed",
            user_id = %record.user_id,
            "Password reset completed successfully"
        );

        Ok(())
    }

    /// Delete expired tokens and tokens used more than a day ago.
    pub async fn purge_stale(&self) -> Result<usize> {
        let purged = self.store.purge_reset_tokens(self.clock.now()).await?;
        if purged > 0 {
            tracing::debug!(target: "auth.password.purge", purged, "Stale reset tokens purged");
        }
        Ok(purged)
    }

    /// Run [`purge_stale`](Self::purge_stale) every `interval` on the tokio runtime.
    ///
    /// A failed pass is logged and retried on the next tick.
    pub fn spawn_purger(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let flow = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = flow.purge_stale().await {
                    tracing::warn!(
                        target: "auth.password.purge",
                        error = %e,
                        "Reset token purge failed"
                    );
                }
            }
        })
    }

    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>> {
        if token.is_empty() {
            return Ok(None);
        }
        let record = self.store.find_reset_token_by_value(&hash_token(token)).await?;
        Ok(record.filter(|r| r.is_active(now)))
    }
}

/// 32 random bytes, URL-safe base64.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest stored in place of the raw token.
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
