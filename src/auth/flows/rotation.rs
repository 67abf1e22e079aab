//! Refresh-token rotation and bounded session storage.
//!
//! This module emits tracing events for security monitoring:
//! - `auth.token.refresh` - Refresh token rotated
//! - `auth.token.invalid` - Unknown or expired refresh token presented
//! - `auth.session.evicted` - Oldest session dropped to stay under the cap

use crate::auth::jwt_issuer::{TokenIssuer, TokenPair};
use crate::auth::models::{DEFAULT_MAX_SESSIONS, RefreshTokenRecord, User};
use crate::auth::storage::{LoginRecord, SharedCredentialStore, StoreError, StoreResult};
use crate::error::{AuthError, Result};
use std::sync::Arc;

/// Validates, rotates and stores refresh tokens.
///
/// Every session change is a targeted store update keyed on the current
/// state: rotation only replaces a token that is still active, so of two
/// concurrent refreshes with the same token exactly one succeeds, and a
/// password reset that cleared the sessions is never undone.
#[derive(Clone)]
pub struct SessionRotator {
    store: SharedCredentialStore,
    issuer: Arc<TokenIssuer>,
    max_sessions: usize,
}

impl SessionRotator {
    pub fn new(store: SharedCredentialStore, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            issuer,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Cap on concurrent sessions per user (minimum 1).
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The matched record is replaced in place, keeping its device and user
    /// agent. A token revoked between lookup and replacement is rejected as
    /// invalid. Store failures are reported as `Unauthorized("token refresh failed")`.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair> {
        let now = self.issuer.clock().now();

        if raw_refresh_token.is_empty() {
            return Err(invalid_refresh_token());
        }

        let user = self
            .store
            .find_user_by_refresh_token(raw_refresh_token, now)
            .await
            .map_err(|e| refresh_failed("lookup", e))?
            .ok_or_else(|| {
                tracing::info!(
                    target: "auth.token.invalid",
                    kind = "refresh",
                    "Unknown or expired refresh token presented"
                );
                invalid_refresh_token()
            })?;

        let index = user
            .active_session_index(raw_refresh_token, now)
            .ok_or_else(invalid_refresh_token)?;

        let pair = self
            .issuer
            .issue_pair(&user.id)
            .map_err(|e| refresh_failed("issue", e))?;

        let rotated =
            user.refresh_tokens[index].rotated(pair.refresh_token.clone(), pair.refresh_expires_at, now);
        let device = rotated.device.clone();

        match self
            .store
            .rotate_refresh_token(&user.id, raw_refresh_token, rotated, now)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::info!(
                    target: "auth.token.invalid",
                    kind = "refresh",
                    user_id = %user.id,
                    "Refresh token revoked before rotation"
                );
                return Err(invalid_refresh_token());
            }
            Err(e) => return Err(refresh_failed("save", e)),
        }

        tracing::info!(
            target: "auth.token.refresh",
            user_id = %user.id,
            device = %device,
            "Refresh token rotated"
        );

        Ok(pair)
    }

    /// Store a session for `pair` on `user`, evicting the oldest beyond the cap.
    ///
    /// `user` is the snapshot whose password was verified. The store rejects
    /// the session with [`StoreError::NotFound`] if that hash has changed
    /// since, and applies `rehashed` in the same update otherwise.
    pub async fn open_session(
        &self,
        user: &User,
        pair: &TokenPair,
        device: &str,
        user_agent: &str,
        rehashed: Option<String>,
    ) -> StoreResult<()> {
        let now = self.issuer.clock().now();
        let login = LoginRecord {
            verified_hash: user.password_hash.clone(),
            rehashed,
            session: RefreshTokenRecord {
                token: pair.refresh_token.clone(),
                expires_at: pair.refresh_expires_at,
                device: device.to_string(),
                user_agent: user_agent.to_string(),
                created_at: now,
            },
            max_sessions: self.max_sessions,
            at: now,
        };

        for evicted in self.store.record_login(&user.id, login).await? {
            tracing::info!(
                target: "auth.session.evicted",
                user_id = %user.id,
                device = %evicted.device,
                created_at = %evicted.created_at,
                max_sessions = self.max_sessions,
                "Oldest session evicted"
            );
        }
        Ok(())
    }
}

fn invalid_refresh_token() -> AuthError {
    AuthError::unauthorized("invalid refresh token")
}

fn refresh_failed(stage: &'static str, err: impl std::fmt::Display) -> AuthError {
    tracing::error!(
        target: "auth.token.refresh",
        stage,
        error = %err,
        "Refresh token rotation failed"
    );
    AuthError::unauthorized("token refresh failed")
}
