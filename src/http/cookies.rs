//! Refresh token cookie transport.

use crate::app::TransportSettings;
use crate::auth::token::TokenExtractor;
use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, SameSite, time::Duration};

/// Name of the refresh token cookie.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// `HttpOnly; SameSite=Strict; Path=/` cookie carrying `token`, `Secure`
/// outside development.
pub fn refresh_cookie(token: &str, transport: &TransportSettings) -> Cookie<'static> {
    build(token.to_string(), transport, transport.refresh_cookie_max_age)
}

/// Same cookie with an empty value and `Max-Age=0`.
pub fn cleared_refresh_cookie(transport: &TransportSettings) -> Cookie<'static> {
    build(String::new(), transport, 0)
}

/// The refresh token sent by the client.
pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    TokenExtractor::cookie(headers, REFRESH_COOKIE)
}

/// `Set-Cookie` header pair for `cookie`.
pub fn set_cookie(cookie: &Cookie<'_>) -> Option<(header::HeaderName, HeaderValue)> {
    HeaderValue::from_str(&cookie.to_string())
        .ok()
        .map(|value| (header::SET_COOKIE, value))
}

fn build(value: String, transport: &TransportSettings, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(transport.secure_cookies)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}
