//! Persistence interface for authentication.
//!
//! The flows talk to a [`CredentialStore`]; implement it for your database
//! layer. [`InMemoryCredentialStore`] backs tests and the demo server.

pub mod memory;

pub use memory::InMemoryCredentialStore;

use crate::auth::models::{PasswordResetToken, RefreshTokenRecord, User};
use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Failures reported by a [`CredentialStore`].
///
/// A closed set, so callers match on the variant instead of inspecting
/// backend error text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique field is already taken.
    #[error("duplicate value for {field}")]
    Duplicate { field: &'static str },

    /// The record to update does not exist (or no longer matches).
    #[error("record not found")]
    NotFound,

    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => {
                AuthError::conflict(field, format!("{} is already registered", field))
            }
            StoreError::NotFound => AuthError::internal("record not found"),
            StoreError::Unavailable(msg) => {
                AuthError::internal(format!("credential store unavailable: {}", msg))
            }
            StoreError::Backend(msg) => AuthError::internal(format!("credential store: {}", msg)),
        }
    }
}

/// Storage for users and password reset tokens.
///
/// Emails are stored and queried in normalized (trimmed, lowercase) form.
///
/// # Example
///
/// ```rust,ignore
/// use estate_auth::auth::storage::{CredentialStore, StoreResult};
/// use async_trait::async_trait;
///
/// struct PgCredentialStore {
///     pool: PgPool,
/// }
///
/// #[async_trait]
/// impl CredentialStore for PgCredentialStore {
///     async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
///         // Query your database
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user whose email equals `email` or whose username equals `username`.
    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// Find the user holding `token` as an unexpired refresh session.
    async fn find_user_by_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Insert a new user, failing with [`StoreError::Duplicate`] if the
    /// email or username is taken.
    async fn insert_user(&self, user: User) -> StoreResult<()>;

    /// Record a successful login as one update: drop expired sessions, add
    /// `login.session` within the cap, stamp `last_login_at` and apply any
    /// upgraded hash.
    ///
    /// Fails with [`StoreError::NotFound`] and changes nothing if the user is
    /// gone or its password hash is no longer `login.verified_hash`.
    /// Returns the sessions evicted to make room.
    async fn record_login(
        &self,
        user_id: &str,
        login: LoginRecord,
    ) -> StoreResult<Vec<RefreshTokenRecord>>;

    /// Replace the active session `old_token` with `record` in the same slot.
    ///
    /// Fails with [`StoreError::NotFound`] if `old_token` is not an unexpired
    /// session of the user at `now`.
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Remove the session `token`, or every session when `None`, then drop
    /// expired ones. Returns how many sessions were revoked.
    async fn revoke_refresh_tokens(
        &self,
        user_id: &str,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Most recent active (unused, unexpired) reset token for a user.
    async fn find_active_reset_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PasswordResetToken>>;

    async fn save_reset_token(&self, token: PasswordResetToken) -> StoreResult<()>;

    async fn mark_reset_token_used(&self, token_id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Look up a reset token by the digest of its raw value.
    async fn find_reset_token_by_value(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>>;

    /// Apply a password reset as one unit: set the new hash, clear every
    /// refresh session and mark the token used.
    ///
    /// Fails with [`StoreError::NotFound`] and changes nothing if the token
    /// is no longer active or the user is gone.
    async fn complete_password_reset(
        &self,
        token_id: &str,
        user_id: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete stale reset tokens. Returns how many were removed.
    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

/// The session and account changes a login applies.
#[derive(Debug, Clone)]
pub struct LoginRecord {
    /// Hash the password was checked against.
    pub verified_hash: String,
    /// Replacement hash when the stored one used outdated parameters.
    pub rehashed: Option<String>,
    pub session: RefreshTokenRecord,
    pub max_sessions: usize,
    pub at: DateTime<Utc>,
}

/// Shared handle to a credential store.
pub type SharedCredentialStore = Arc<dyn CredentialStore>;
