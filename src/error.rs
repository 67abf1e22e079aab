use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The error type for every authentication operation.
///
/// Each variant maps to a stable [`kind`](AuthError::kind) and HTTP status,
/// so callers can branch on the failure without inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Access token failed signature or expiry checks. The two causes are
    /// deliberately indistinguishable.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict on {field}: {message}")]
    Conflict { field: &'static str, message: String },

    /// Every violated rule is listed, not just the first.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Too many requests: {message}")]
    TooManyRequests { message: String, retry_after_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON body returned for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    pub error_id: String,
}

impl AuthError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn conflict(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Conflict {
            field,
            message: msg.into(),
        }
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self::TooManyRequests {
            message: format!(
                "Too many requests. Please try again in {} seconds.",
                retry_after_secs
            ),
            retry_after_secs,
        }
    }

    /// Stable machine-checkable identifier for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidToken => "invalid_token",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict { .. } => "conflict",
            Self::Validation(_) => "validation_error",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Internal(_) => "internal_server",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for clients outside development mode.
    ///
    /// Client errors keep their message; server errors are redacted (CWE-209).
    fn safe_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert to a response, exposing internal detail only when `dev_mode` is set.
    pub fn into_response_with_mode(self, dev_mode: bool) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        let error = if dev_mode {
            self.to_string()
        } else {
            self.safe_message()
        };

        let (details, retry_after) = match &self {
            Self::Validation(rules) => (Some(rules.clone()), None),
            Self::TooManyRequests {
                retry_after_secs, ..
            } => (None, Some(*retry_after_secs)),
            _ => (None, None),
        };

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                kind = self.kind(),
                "Request rejected"
            );
        }

        let body = Json(ErrorResponse {
            error,
            kind: self.kind(),
            details,
            retry_after,
            error_id,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_with_mode(false)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AuthError::BadRequest(format!("JSON error: {}", err))
        } else {
            AuthError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_kinds_and_statuses() {
        let cases = [
            (AuthError::bad_request("x"), "bad_request", StatusCode::BAD_REQUEST),
            (AuthError::unauthorized("x"), "unauthorized", StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, "invalid_token", StatusCode::UNAUTHORIZED),
            (AuthError::forbidden("x"), "forbidden", StatusCode::FORBIDDEN),
            (AuthError::conflict("email", "taken"), "conflict", StatusCode::CONFLICT),
            (
                AuthError::Validation(vec!["a".into()]),
                "validation_error",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AuthError::too_many_requests(5), "too_many_requests", StatusCode::TOO_MANY_REQUESTS),
            (AuthError::internal("x"), "internal_server", StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn test_validation_lists_every_rule() {
        let err = AuthError::Validation(vec![
            "must be at least 8 characters".into(),
            "must contain a digit".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: must be at least 8 characters, must contain a digit"
        );
    }

    #[tokio::test]
    async fn test_internal_message_redacted_in_production() {
        let response = AuthError::internal("db password leaked").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["kind"], "internal_server");
        assert!(body["error_id"].is_string());
    }

    #[tokio::test]
    async fn test_internal_message_visible_in_dev_mode() {
        let response = AuthError::internal("db down").into_response_with_mode(true);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("db down"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after_header() {
        let response = AuthError::too_many_requests(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: AuthError = json_err.into();
        assert!(matches!(err, AuthError::BadRequest(_)));
    }
}
