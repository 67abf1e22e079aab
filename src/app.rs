use std::sync::Arc;

use crate::auth::clock::{SharedClock, SystemClock};
use crate::auth::flows::{CredentialAuthenticator, PasswordResetFlow, SessionRotator};
use crate::auth::jwt_issuer::TokenIssuer;
use crate::auth::notify::{ConsoleNotifier, ResetNotifier};
use crate::auth::owner::OwnerDirectory;
use crate::auth::password::{PasswordConfig, PasswordHasher};
use crate::auth::rate_limit::RateLimiter;
use crate::auth::storage::{InMemoryCredentialStore, SharedCredentialStore};
use crate::config::AuthConfig;
use crate::error::Result;

/// How the web layer moves credentials and errors.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Set `Secure` on the refresh cookie.
    pub secure_cookies: bool,
    /// Refresh cookie max-age in seconds.
    pub refresh_cookie_max_age: i64,
    /// Read the client IP from proxy headers.
    pub trust_proxy: bool,
    /// Show internal error detail in responses.
    pub dev_mode: bool,
}

/// Every auth service, constructed once at startup and shared by handlers.
#[derive(Clone)]
pub struct AuthServices {
    pub store: SharedCredentialStore,
    pub issuer: Arc<TokenIssuer>,
    pub rate_limiter: RateLimiter,
    pub authenticator: CredentialAuthenticator,
    pub sessions: SessionRotator,
    pub password_reset: PasswordResetFlow,
    pub transport: TransportSettings,
}

impl AuthServices {
    /// Builder pattern for constructing AuthServices
    pub fn builder(config: AuthConfig) -> AuthServicesBuilder {
        AuthServicesBuilder::new(config)
    }
}

/// Builder for [`AuthServices`].
///
/// Defaults: in-memory store, console notifier, system clock, production
/// Argon2 parameters, owners from the config.
#[must_use = "builder does nothing until you call build()"]
pub struct AuthServicesBuilder {
    config: AuthConfig,
    store: Option<SharedCredentialStore>,
    notifier: Option<Arc<dyn ResetNotifier>>,
    owners: Option<Arc<dyn OwnerDirectory>>,
    clock: SharedClock,
    password_config: PasswordConfig,
}

impl AuthServicesBuilder {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            store: None,
            notifier: None,
            owners: None,
            clock: Arc::new(SystemClock),
            password_config: PasswordConfig::default(),
        }
    }

    pub fn with_store(mut self, store: SharedCredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_owners(mut self, owners: Arc<dyn OwnerDirectory>) -> Self {
        self.owners = Some(owners);
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.password_config = config;
        self
    }

    pub fn build(self) -> Result<AuthServices> {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(ConsoleNotifier::new()));
        let owners = self
            .owners
            .unwrap_or_else(|| Arc::new(config.owner_directory()));

        let issuer = Arc::new(TokenIssuer::with_clock(
            config.token_issuer_config(),
            self.clock.clone(),
        )?);
        let hasher = PasswordHasher::new(self.password_config);

        let sessions = SessionRotator::new(store.clone(), issuer.clone())
            .with_max_sessions(config.max_sessions);

        let authenticator =
            CredentialAuthenticator::new(store.clone(), issuer.clone(), sessions.clone())
                .with_owners(owners)
                .with_hasher(hasher.clone());

        let password_reset = PasswordResetFlow::new(store.clone(), notifier, self.clock.clone())
            .with_config(config.reset_flow_config()?)
            .with_hasher(hasher);

        let transport = TransportSettings {
            secure_cookies: config.is_production(),
            refresh_cookie_max_age: config.refresh_cookie_max_age()?,
            trust_proxy: config.trust_proxy,
            dev_mode: !config.is_production(),
        };

        tracing::debug!(
            environment = ?config.environment,
            max_sessions = config.max_sessions,
            "Auth services constructed"
        );

        Ok(AuthServices {
            store,
            issuer,
            rate_limiter: RateLimiter::with_clock(self.clock),
            authenticator,
            sessions,
            password_reset,
            transport,
        })
    }
}
