use crate::error::AuthError;
use axum::http::{HeaderMap, header};

/// Pulls credentials out of request headers.
pub struct TokenExtractor;

impl TokenExtractor {
    /// Extract a bearer token from the Authorization header.
    pub fn bearer(headers: &HeaderMap) -> Result<String, AuthError> {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AuthError::unauthorized("Missing authorization header"))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AuthError::unauthorized("Invalid authorization header format. Expected: Bearer <token>")
        })?;

        if token.trim().is_empty() {
            return Err(AuthError::unauthorized("Empty bearer token"));
        }

        Ok(token.trim().to_string())
    }

    /// Value of the cookie `name`, if present and non-empty.
    pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    /// The `User-Agent` header, or an empty string.
    pub fn user_agent(headers: &HeaderMap) -> String {
        headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_from_valid_bearer_header() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer test_token_123")]);
        assert_eq!(TokenExtractor::bearer(&map).unwrap(), "test_token_123");
    }

    #[test]
    fn test_bearer_missing_or_malformed() {
        assert!(TokenExtractor::bearer(&HeaderMap::new()).is_err());
        assert!(TokenExtractor::bearer(&headers(&[(header::AUTHORIZATION, "Basic abc")])).is_err());
        assert!(TokenExtractor::bearer(&headers(&[(header::AUTHORIZATION, "Bearer ")])).is_err());
    }

    #[test]
    fn test_cookie_lookup() {
        let map = headers(&[
            (header::COOKIE, "theme=dark; refresh_token=abc123"),
            (header::COOKIE, "other=1"),
        ]);
        assert_eq!(TokenExtractor::cookie(&map, "refresh_token").as_deref(), Some("abc123"));
        assert_eq!(TokenExtractor::cookie(&map, "other").as_deref(), Some("1"));
        assert_eq!(TokenExtractor::cookie(&map, "missing"), None);

        let cleared = headers(&[(header::COOKIE, "refresh_token=")]);
        assert_eq!(TokenExtractor::cookie(&cleared, "refresh_token"), None);
    }

    #[test]
    fn test_user_agent_defaults_to_empty() {
        assert_eq!(TokenExtractor::user_agent(&HeaderMap::new()), "");
        let map = headers(&[(header::USER_AGENT, "curl/8.0")]);
        assert_eq!(TokenExtractor::user_agent(&map), "curl/8.0");
    }
}
