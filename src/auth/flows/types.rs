//! Request and response types for authentication flows.

use crate::auth::jwt_issuer::TokenPair;
use crate::auth::models::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request from client.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Label for the session, e.g. "iPhone". Defaults to "unknown".
    #[serde(default)]
    pub device: Option<String>,
}

/// Result of a successful login.
///
/// The refresh token travels in a cookie, so only [`LoginResponse`] is
/// serialized to the body.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

/// Body returned after login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// Always "Bearer".
    pub token_type: &'static str,
}

impl From<&LoginOutcome> for LoginResponse {
    fn from(outcome: &LoginOutcome) -> Self {
        Self {
            user: outcome.user.clone(),
            access_token: outcome.tokens.access_token.clone(),
            expires_at: outcome.tokens.access_expires_at,
            token_type: "Bearer",
        }
    }
}

/// Body returned after a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: &'static str,
}

impl From<&TokenPair> for RefreshResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            expires_at: pair.access_expires_at,
            token_type: "Bearer",
        }
    }
}

/// Logout options. Ends every session when `all_devices` is set or no
/// refresh cookie is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub all_devices: bool,
}

/// Password reset request.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Password reset completion.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetComplete {
    pub token: String,
    pub new_password: String,
}

/// Whether a reset token can still be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetTokenStatus {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ResetTokenStatus {
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            email: None,
        }
    }

    pub fn valid(email: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            email: Some(email.into()),
        }
    }
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}
