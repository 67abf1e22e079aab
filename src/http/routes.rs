use axum::{
    Router,
    routing::{get, post},
};

use super::handlers;
use crate::app::AuthServices;

/// Trait for composable route modules
///
/// Each module registers its own routes and is merged into the main router.
/// Handlers take `State<AuthServices>`.
pub trait RouteModule {
    fn routes(&self) -> Router<AuthServices>
    where
        Self: Sized;

    /// Optional: specify a path prefix for all routes in this module
    fn prefix(&self) -> Option<&str> {
        None
    }

    fn register(self, router: Router<AuthServices>) -> Router<AuthServices>
    where
        Self: Sized,
    {
        let routes = self.routes();

        if let Some(prefix) = self.prefix() {
            router.nest(prefix, routes)
        } else {
            router.merge(routes)
        }
    }
}

/// Registration, login, token refresh, logout and password reset under `/auth`.
pub struct AuthRoutes;

impl RouteModule for AuthRoutes {
    fn routes(&self) -> Router<AuthServices> {
        Router::new()
            .route("/register", post(handlers::register))
            .route("/login", post(handlers::login))
            .route("/refresh", post(handlers::refresh))
            .route("/logout", post(handlers::logout))
            .route("/me", get(handlers::me))
            .route("/password/forgot", post(handlers::forgot_password))
            .route("/password/reset", post(handlers::reset_password))
            .route("/password/reset/{token}", get(handlers::validate_reset_token))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/auth")
    }
}

/// The complete auth router with state applied.
pub fn router(services: AuthServices) -> Router {
    AuthRoutes
        .register(Router::new())
        .with_state(services)
}
