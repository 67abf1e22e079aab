//! Web adapter for the auth flows.
//!
//! Routes, refresh-cookie transport, client fingerprinting and error
//! rendering. Mount [`router`] into your application.

pub mod client;
pub mod cookies;
mod handlers;
pub mod routes;

pub use client::ClientInfo;
pub use routes::{AuthRoutes, RouteModule, router};

use crate::app::TransportSettings;
use crate::error::AuthError;
use axum::response::{IntoResponse, Response};

/// An [`AuthError`] rendered for the configured environment.
#[derive(Debug)]
pub struct ApiError {
    error: AuthError,
    dev_mode: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.error.into_response_with_mode(self.dev_mode)
    }
}

/// Attach the response mode to a flow result.
pub trait ResultExt<T> {
    fn in_mode(self, transport: &TransportSettings) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T, AuthError> {
    fn in_mode(self, transport: &TransportSettings) -> Result<T, ApiError> {
        self.map_err(|error| ApiError {
            error,
            dev_mode: transport.dev_mode,
        })
    }
}
