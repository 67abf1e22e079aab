//! Credential authentication and session lifecycle.
//!
//! - [`jwt_issuer`]: short-lived signed access tokens and opaque refresh tokens
//! - [`flows`]: registration, login, refresh rotation, logout and password reset
//! - [`storage`]: the persistence seam the flows depend on
//! - [`rate_limit`]: fixed-window throttling of the unauthenticated endpoints

pub mod clock;
pub mod duration;
pub mod extractors;
pub mod flows;
pub mod jwt_issuer;
pub mod models;
pub mod notify;
pub mod owner;
pub mod password;
pub mod rate_limit;
pub mod storage;
pub mod token;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use duration::parse_duration;
pub use extractors::AuthUser;
pub use flows::{CredentialAuthenticator, PasswordResetFlow, ResetFlowConfig, SessionRotator};
pub use jwt_issuer::{AccessTokenClaims, TokenIssuer, TokenIssuerConfig, TokenPair};
pub use models::{PasswordResetToken, RefreshTokenRecord, Role, User, UserSummary};
pub use notify::{ConsoleNotifier, PasswordResetEmail, ResetNotifier};
pub use owner::{OwnerDirectory, StaticOwnerDirectory};
pub use password::{PasswordConfig, PasswordHasher, PasswordPolicy};
pub use rate_limit::{RateLimitGate, RateLimitRule, RateLimiter};
pub use storage::{
    CredentialStore, InMemoryCredentialStore, LoginRecord, SharedCredentialStore, StoreError,
    StoreResult,
};
pub use token::TokenExtractor;
