//! Access and refresh token issuance.
//!
//! Access tokens are HS256 JWTs carrying `{sub, token_type, exp}` and are
//! validated purely by signature and embedded expiry. Refresh tokens are
//! opaque random values validated only against the credential store.
//!
//! # Example
//!
//! ```rust,ignore
//! use estate_auth::auth::{TokenIssuer, TokenIssuerConfig};
//!
//! let issuer = TokenIssuer::new(TokenIssuerConfig::with_secret("a-32-byte-or-longer-secret-value"))?;
//! let pair = issuer.issue_pair("user-123")?;
//! let claims = issuer.verify_access_token(&pair.access_token)?;
//! assert_eq!(claims.sub, "user-123");
//! ```

use crate::auth::clock::{SharedClock, SystemClock};
use crate::auth::duration::parse_duration;
use crate::error::{AuthError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Production access token lifetime.
pub const DEFAULT_ACCESS_TOKEN_TTL: &str = "15m";

/// Refresh token lifetime, also used as the refresh cookie max-age.
pub const DEFAULT_REFRESH_TOKEN_TTL: &str = "30d";

/// Refresh tokens carry 64 bytes of entropy.
const REFRESH_TOKEN_BYTES: usize = 64;

/// Configuration for token issuance.
#[derive(Clone)]
pub struct TokenIssuerConfig {
    secret: Vec<u8>,
    /// Access token lifetime specifier.
    pub access_token_ttl: String,
    /// Refresh token lifetime specifier.
    pub refresh_token_ttl: String,
}

impl TokenIssuerConfig {
    /// Create config with an HS256 symmetric key.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL.to_string(),
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL.to_string(),
        }
    }

    /// Set access token TTL.
    pub fn access_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.access_token_ttl = ttl.into();
        self
    }

    /// Set refresh token TTL.
    pub fn refresh_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.refresh_token_ttl = ttl.into();
        self
    }
}

impl std::fmt::Debug for TokenIssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuerConfig")
            .field("secret", &"[redacted]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

/// Token type for distinguishing access tokens from anything else signed
/// with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
}

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub token_type: TokenType,
    /// Expiration time (unix timestamp, seconds)
    pub exp: i64,
    /// Issued at (unix timestamp, seconds)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// A signed access token and its absolute expiry.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues and verifies tokens.
///
/// Construct once at startup and share; the signing key is process-wide.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: String,
    refresh_token_ttl: String,
    clock: SharedClock,
}

impl TokenIssuer {
    /// Create a new issuer using the system clock.
    pub fn new(config: TokenIssuerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new issuer reading time from `clock`.
    pub fn with_clock(config: TokenIssuerConfig, clock: SharedClock) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::internal("Token signing secret must not be empty"));
        }

        // Fail at startup rather than on the first request.
        parse_duration(&config.access_token_ttl)?;
        parse_duration(&config.refresh_token_ttl)?;

        // Expiry is checked against the injected clock below, not the
        // library's wall-clock check.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            clock,
        })
    }

    /// Issue a signed access token for `subject` living for `ttl` (e.g. `"15m"`).
    pub fn issue_access_token(&self, subject: &str, ttl: &str) -> Result<AccessToken> {
        let ttl = parse_duration(ttl)?;
        let iat = self.clock.now().timestamp();
        let exp = iat + ttl.num_seconds();

        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            token_type: TokenType::Access,
            exp,
            iat,
            jti: generate_jti(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("Failed to encode access token: {}", e)))?;

        Ok(AccessToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Verify an access token and return its claims.
    ///
    /// A bad signature, a malformed token and an expired token all yield
    /// [`AuthError::InvalidToken`].
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(target: "auth.token.invalid", error = %e, "Access token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken);
        }

        if self.clock.now().timestamp() >= claims.exp {
            tracing::debug!(target: "auth.token.invalid", sub = %claims.sub, "Access token expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Generate an opaque refresh token: 64 random bytes, hex encoded.
    pub fn issue_refresh_token(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Absolute timestamp `duration` from now.
    pub fn expiry_from_now(&self, duration: &str) -> Result<DateTime<Utc>> {
        Ok(self.clock.now() + parse_duration(duration)?)
    }

    /// Mint an access/refresh pair using the configured lifetimes.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair> {
        let access = self.issue_access_token(subject, &self.access_token_ttl)?;
        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: self.issue_refresh_token(),
            refresh_expires_at: self.expiry_from_now(&self.refresh_token_ttl)?,
        })
    }

    /// Configured refresh token lifetime specifier.
    pub fn refresh_token_ttl(&self) -> &str {
        &self.refresh_token_ttl
    }

    /// The clock this issuer reads.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

fn generate_jti() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
