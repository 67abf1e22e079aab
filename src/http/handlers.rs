use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use cookie::Cookie;

use super::client::ClientInfo;
use super::cookies::{cleared_refresh_cookie, read_refresh_cookie, refresh_cookie, set_cookie};
use super::{ApiError, ResultExt};
use crate::app::AuthServices;
use crate::auth::extractors::AuthUser;
use crate::auth::flows::{
    LoginRequest, LoginResponse, LogoutRequest, MessageResponse, PasswordResetComplete,
    PasswordResetRequest, RefreshResponse, RegisterRequest, ResetTokenStatus,
};
use crate::auth::models::UserSummary;
use crate::auth::rate_limit;
use crate::error::{AuthError, Result};

type HandlerResult<T> = std::result::Result<T, ApiError>;

pub(super) async fn register(
    State(services): State<AuthServices>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> HandlerResult<(StatusCode, Json<UserSummary>)> {
    let transport = &services.transport;
    services
        .rate_limiter
        .check(&rate_limit::REGISTER, &client.fingerprint())
        .in_mode(transport)?;

    let user = services.authenticator.register(req).await.in_mode(transport)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn login(
    State(services): State<AuthServices>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> HandlerResult<Response> {
    let transport = &services.transport;
    services
        .rate_limiter
        .check(&rate_limit::LOGIN, &client.fingerprint())
        .in_mode(transport)?;

    let outcome = services
        .authenticator
        .login(
            &req.email,
            &req.password,
            &client.user_agent,
            req.device.as_deref().unwrap_or_default(),
        )
        .await
        .in_mode(transport)?;

    with_cookie(
        Json(LoginResponse::from(&outcome)),
        refresh_cookie(&outcome.tokens.refresh_token, transport),
    )
    .in_mode(transport)
}

pub(super) async fn refresh(
    State(services): State<AuthServices>,
    headers: HeaderMap,
) -> HandlerResult<Response> {
    let transport = &services.transport;
    let token = read_refresh_cookie(&headers)
        .ok_or_else(|| AuthError::unauthorized("missing refresh token"))
        .in_mode(transport)?;

    let pair = services.sessions.refresh(&token).await.in_mode(transport)?;

    with_cookie(
        Json(RefreshResponse::from(&pair)),
        refresh_cookie(&pair.refresh_token, transport),
    )
    .in_mode(transport)
}

pub(super) async fn logout(
    State(services): State<AuthServices>,
    user: AuthUser,
    Query(options): Query<LogoutRequest>,
    headers: HeaderMap,
) -> HandlerResult<Response> {
    let transport = &services.transport;
    let token = if options.all_devices {
        None
    } else {
        read_refresh_cookie(&headers)
    };

    services
        .authenticator
        .logout(user.id(), token.as_deref())
        .await
        .in_mode(transport)?;

    with_cookie(
        Json(MessageResponse::new("Logged out")),
        cleared_refresh_cookie(transport),
    )
    .in_mode(transport)
}

pub(super) async fn me(user: AuthUser) -> Json<UserSummary> {
    Json(user.user)
}

pub(super) async fn forgot_password(
    State(services): State<AuthServices>,
    client: ClientInfo,
    Json(req): Json<PasswordResetRequest>,
) -> HandlerResult<Json<MessageResponse>> {
    let transport = &services.transport;
    services
        .rate_limiter
        .check(&rate_limit::PASSWORD_RESET_REQUEST, &client.fingerprint())
        .in_mode(transport)?;

    services
        .password_reset
        .initiate(&req.email)
        .await
        .in_mode(transport)?;

    Ok(Json(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    )))
}

pub(super) async fn reset_password(
    State(services): State<AuthServices>,
    client: ClientInfo,
    Json(req): Json<PasswordResetComplete>,
) -> HandlerResult<Json<MessageResponse>> {
    let transport = &services.transport;
    services
        .rate_limiter
        .check(&rate_limit::PASSWORD_RESET, &client.fingerprint())
        .in_mode(transport)?;

    services
        .password_reset
        .consume(&req.token, &req.new_password)
        .await
        .in_mode(transport)?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}

pub(super) async fn validate_reset_token(
    State(services): State<AuthServices>,
    Path(token): Path<String>,
) -> Json<ResetTokenStatus> {
    Json(services.password_reset.validate(&token).await)
}

fn with_cookie(body: impl IntoResponse, cookie: Cookie<'_>) -> Result<Response> {
    let (name, value) =
        set_cookie(&cookie).ok_or_else(|| AuthError::internal("invalid cookie value"))?;
    let mut response = body.into_response();
    response.headers_mut().append(name, value);
    Ok(response)
}
