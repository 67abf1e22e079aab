use crate::app::AuthServices;
use crate::auth::jwt_issuer::AccessTokenClaims;
use crate::auth::models::{Role, UserSummary};
use crate::auth::token::TokenExtractor;
use crate::error::AuthError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

/// Axum extractor for authenticated users.
///
/// Verifies the `Authorization: Bearer` access token and loads the account
/// it names. Rejects with 401 when either step fails.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_only(user: AuthUser) -> Result<Json<UserSummary>> {
///     user.require_role(&[Role::Admin])?;
///     Ok(Json(user.user))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserSummary,
    pub claims: AccessTokenClaims,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Fail with [`AuthError::Forbidden`] unless the user holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AuthError> {
        if roles.contains(&self.user.role) {
            Ok(())
        } else {
            tracing::info!(
                user_id = %self.user.id,
                role = %self.user.role,
                "Insufficient role"
            );
            Err(AuthError::forbidden("insufficient role"))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthServices: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let services = AuthServices::from_ref(state);

        let token = TokenExtractor::bearer(&parts.headers)?;
        let claims = services.issuer.verify_access_token(&token)?;
        let user = services.authenticator.current_user(&claims.sub).await?;

        Ok(AuthUser { user, claims })
    }
}
