//! Client identification for rate limiting and session metadata.

use crate::app::AuthServices;
use crate::auth::rate_limit::fingerprint;
use crate::auth::token::TokenExtractor;
use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Placeholder when the peer address is unavailable.
pub const UNKNOWN_IP: &str = "unknown";

/// Who is calling: IP address and user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// Rate limit key for this client.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.ip, &self.user_agent)
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    AuthServices: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust_proxy = AuthServices::from_ref(state).transport.trust_proxy;
        Ok(ClientInfo {
            ip: client_ip(&parts.headers, &parts.extensions, trust_proxy),
            user_agent: TokenExtractor::user_agent(&parts.headers),
        })
    }
}

/// Resolve the client IP.
///
/// Proxy headers are only honoured with `trust_proxy`; otherwise anyone
/// could pick their own rate limit key.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    let peer = || {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    let ip = if trust_proxy {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            // "client, proxy1, proxy2": the leftmost entry is the client
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .or_else(peer)
    } else {
        peer()
    };

    ip.unwrap_or_else(|| UNKNOWN_IP.to_string())
}
