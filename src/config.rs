use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::auth::duration::parse_duration;
use crate::auth::flows::ResetFlowConfig;
use crate::auth::jwt_issuer::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL, TokenIssuerConfig};
use crate::auth::models::DEFAULT_MAX_SESSIONS;
use crate::auth::owner::StaticOwnerDirectory;
use crate::error::{AuthError, Result};
use crate::utils::{get_env_with_prefix, split_list};

/// Minimum signing secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(AuthError::bad_request(format!(
                "Invalid environment: {}. Must be one of: development, production",
                other
            ))),
        }
    }
}

/// Configuration for the auth service.
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// HS256 signing secret for access tokens.
    #[serde(default, skip_serializing)]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: String,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: String,
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl: String,
    #[serde(default = "default_reset_resend_cooldown")]
    pub reset_resend_cooldown: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Emails that register as admins.
    #[serde(default)]
    pub owner_emails: Vec<String>,
    /// Base of the link in reset emails.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
    #[serde(default)]
    pub environment: Environment,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    #[serde(default)]
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            jwt_secret: String::new(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            reset_token_ttl: default_reset_token_ttl(),
            reset_resend_cooldown: default_reset_resend_cooldown(),
            max_sessions: default_max_sessions(),
            owner_emails: Vec::new(),
            app_base_url: default_app_base_url(),
            environment: Environment::default(),
            trust_proxy: false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("server", &self.server)
            .field("logging", &self.logging)
            .field("jwt_secret", &"[redacted]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("reset_resend_cooldown", &self.reset_resend_cooldown)
            .field("max_sessions", &self.max_sessions)
            .field("owner_emails", &self.owner_emails.len())
            .field("app_base_url", &self.app_base_url)
            .field("environment", &self.environment)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_access_token_ttl() -> String {
    DEFAULT_ACCESS_TOKEN_TTL.to_string()
}

fn default_refresh_token_ttl() -> String {
    DEFAULT_REFRESH_TOKEN_TTL.to_string()
}

fn default_reset_token_ttl() -> String {
    "15m".to_string()
}

fn default_reset_resend_cooldown() -> String {
    "2m".to_string()
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl AuthConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn token_issuer_config(&self) -> TokenIssuerConfig {
        TokenIssuerConfig::with_secret(self.jwt_secret.clone())
            .access_token_ttl(self.access_token_ttl.clone())
            .refresh_token_ttl(self.refresh_token_ttl.clone())
    }

    pub fn reset_flow_config(&self) -> Result<ResetFlowConfig> {
        Ok(ResetFlowConfig {
            token_ttl: parse_duration(&self.reset_token_ttl)?,
            resend_cooldown: parse_duration(&self.reset_resend_cooldown)?,
            app_base_url: self.app_base_url.clone(),
        })
    }

    pub fn owner_directory(&self) -> StaticOwnerDirectory {
        StaticOwnerDirectory::new(&self.owner_emails)
    }

    /// Refresh cookie max-age in seconds.
    pub fn refresh_cookie_max_age(&self) -> Result<i64> {
        Ok(parse_duration(&self.refresh_token_ttl)?.num_seconds())
    }
}

/// Builder for [`AuthConfig`] with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AuthConfig::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.config.access_token_ttl = ttl.into();
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.config.refresh_token_ttl = ttl.into();
        self
    }

    pub fn with_reset_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.config.reset_token_ttl = ttl.into();
        self
    }

    pub fn with_reset_resend_cooldown(mut self, cooldown: impl Into<String>) -> Self {
        self.config.reset_resend_cooldown = cooldown.into();
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.config.max_sessions = max_sessions;
        self
    }

    pub fn with_owner_emails(mut self, emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.owner_emails = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_app_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.app_base_url = url.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.config.trust_proxy = trust;
        self
    }

    /// Load overrides from `ESTATE_*` variables (unprefixed names as fallback).
    ///
    /// Unparseable numeric and boolean values are ignored; string values are
    /// checked by [`build`](Self::build).
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(secret) = get_env_with_prefix("JWT_SECRET") {
            self.config.jwt_secret = secret;
        }
        if let Some(ttl) = get_env_with_prefix("ACCESS_TOKEN_TTL") {
            self.config.access_token_ttl = ttl;
        }
        if let Some(ttl) = get_env_with_prefix("REFRESH_TOKEN_TTL") {
            self.config.refresh_token_ttl = ttl;
        }
        if let Some(ttl) = get_env_with_prefix("RESET_TOKEN_TTL") {
            self.config.reset_token_ttl = ttl;
        }
        if let Some(cooldown) = get_env_with_prefix("RESET_RESEND_COOLDOWN") {
            self.config.reset_resend_cooldown = cooldown;
        }
        if let Some(max) = get_env_with_prefix("MAX_SESSIONS") {
            if let Ok(n) = max.parse() {
                self.config.max_sessions = n;
            }
        }
        if let Some(owners) = get_env_with_prefix("OWNER_EMAILS") {
            self.config.owner_emails = split_list(&owners);
        }
        if let Some(url) = get_env_with_prefix("APP_BASE_URL") {
            self.config.app_base_url = url;
        }
        if let Some(env) = get_env_with_prefix("ENVIRONMENT") {
            if let Ok(env) = env.parse() {
                self.config.environment = env;
            }
        }
        if let Some(trust) = get_env_with_prefix("TRUST_PROXY") {
            self.config.trust_proxy = trust.parse().unwrap_or(false);
        }

        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadRequest`] if:
    /// - the server address is invalid
    /// - the log level is unknown
    /// - the signing secret is missing, or shorter than 32 bytes in production
    /// - a duration is not of the form `<digits><s|m|h|d>`
    /// - `max_sessions` is 0
    pub fn build(self) -> Result<AuthConfig> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            AuthError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        if config.server.port == 0 {
            return Err(AuthError::bad_request("Server port must be greater than 0"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(AuthError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if config.jwt_secret.is_empty() {
            return Err(AuthError::bad_request("JWT secret is required"));
        }
        if config.environment == Environment::Production
            && config.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN
        {
            return Err(AuthError::bad_request(format!(
                "JWT secret must be at least {} bytes in production",
                MIN_PRODUCTION_SECRET_LEN
            )));
        }

        for ttl in [
            &config.access_token_ttl,
            &config.refresh_token_ttl,
            &config.reset_token_ttl,
            &config.reset_resend_cooldown,
        ] {
            parse_duration(ttl)?;
        }

        if config.max_sessions == 0 {
            return Err(AuthError::bad_request("max_sessions must be greater than 0"));
        }

        if config.app_base_url.trim().is_empty() {
            return Err(AuthError::bad_request("App base URL must not be empty"));
        }

        Ok(config)
    }
}

impl Default for AuthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
