//! In-memory credential store.
//!
//! Suitable for tests and single-process demos. Data is lost on restart.

use super::{CredentialStore, LoginRecord, StoreError, StoreResult};
use crate::auth::models::{PasswordResetToken, RefreshTokenRecord, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`CredentialStore`] backed by hash maps.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
    reset_tokens: RwLock<HashMap<String, PasswordResetToken>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Every reset token stored for `user_id`, oldest first.
    pub async fn reset_tokens_for(&self, user_id: &str) -> Vec<PasswordResetToken> {
        let tokens = self.reset_tokens.read().await;
        let mut found: Vec<_> = tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        found
    }

    pub async fn reset_token_count(&self) -> usize {
        self.reset_tokens.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_user_by_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.active_session_index(token, now).is_some())
            .cloned())
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }

        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn record_login(
        &self,
        user_id: &str,
        login: LoginRecord,
    ) -> StoreResult<Vec<RefreshTokenRecord>> {
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        if user.password_hash != login.verified_hash {
            return Err(StoreError::NotFound);
        }

        user.prune_expired_sessions(login.at);
        let evicted = user.push_refresh_token(login.session, login.max_sessions);
        user.last_login_at = Some(login.at);
        if let Some(hash) = login.rehashed {
            user.password_hash = hash;
        }
        Ok(evicted)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        let index = user
            .active_session_index(old_token, now)
            .ok_or(StoreError::NotFound)?;

        user.refresh_tokens[index] = record;
        user.prune_expired_sessions(now);
        Ok(())
    }

    async fn revoke_refresh_tokens(
        &self,
        user_id: &str,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;

        let revoked = match token {
            Some(token) => usize::from(user.remove_refresh_token(token)),
            None => {
                let count = user.refresh_tokens.len();
                user.clear_refresh_tokens();
                count
            }
        };
        user.prune_expired_sessions(now);
        Ok(revoked)
    }

    async fn find_active_reset_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PasswordResetToken>> {
        let tokens = self.reset_tokens.read().await;
        Ok(tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_active(now))
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn save_reset_token(&self, token: PasswordResetToken) -> StoreResult<()> {
        let mut tokens = self.reset_tokens.write().await;
        if tokens
            .values()
            .any(|t| t.id != token.id && t.token_hash == token.token_hash)
        {
            return Err(StoreError::Duplicate { field: "token" });
        }
        tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn mark_reset_token_used(&self, token_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut tokens = self.reset_tokens.write().await;
        let token = tokens.get_mut(token_id).ok_or(StoreError::NotFound)?;
        token.mark_used(now);
        Ok(())
    }

    async fn find_reset_token_by_value(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>> {
        let tokens = self.reset_tokens.read().await;
        Ok(tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn complete_password_reset(
        &self,
        token_id: &str,
        user_id: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        // Both locks are held for the whole update, always in this order.
        let mut users = self.users.write().await;
        let mut tokens = self.reset_tokens.write().await;

        let token = tokens.get_mut(token_id).ok_or(StoreError::NotFound)?;
        if token.user_id != user_id || !token.is_active(now) {
            return Err(StoreError::NotFound);
        }
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;

        user.password_hash = password_hash.to_string();
        user.clear_refresh_tokens();
        token.mark_used(now);
        Ok(())
    }

    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut tokens = self.reset_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_stale(now));
        Ok(before - tokens.len())
    }
}
