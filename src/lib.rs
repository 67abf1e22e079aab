//! estate-auth - credential authentication for the estate listing site
//!
//! Built on Axum and Tokio. Users register with a username, email and
//! password, log in to receive a short-lived access token plus a rotating
//! refresh token held in an HttpOnly cookie, and reset forgotten passwords
//! through an emailed single-use link.
//!
//! # Features
//!
//! - **Tokens**: HS256 access tokens and opaque refresh tokens rotated on every use
//! - **Sessions**: at most three live refresh tokens per account, oldest evicted
//! - **Password reset**: hashed single-use tokens with a resend cooldown
//! - **Rate limiting**: fixed windows per client fingerprint on public endpoints
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use estate_auth::{AuthConfigBuilder, AuthServices};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     estate_auth::init_tracing();
//!
//!     let config = AuthConfigBuilder::new().from_env().build()?;
//!     let services = AuthServices::builder(config).build()?;
//!     let app = estate_auth::http::router(services);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     // Client IPs key the rate limiter, so serve with connect info.
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
mod utils;

pub use app::{AuthServices, AuthServicesBuilder, TransportSettings};
pub use config::{AuthConfig, AuthConfigBuilder, Environment, LoggingConfig, ServerConfig};
pub use error::{AuthError, ErrorResponse, Result};
pub use http::{AuthRoutes, ClientInfo, RouteModule, router};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "auth=debug")
/// - `ESTATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("ESTATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from the logging section of an [`AuthConfig`].
///
/// `RUST_LOG` still wins when set.
pub fn init_tracing_with_config(config: &AuthConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install_subscriber(env_filter, config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
