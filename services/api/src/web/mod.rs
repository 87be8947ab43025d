pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::require_auth;
pub use state::AppState;

/// Builds the API router: public auth routes plus the token-protected
/// user, loan and payment routes.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/user", post(auth::register_handler))
        .route("/user/login", get(auth::login_handler))
        .route("/health", get(rest::health_handler));

    let protected_routes = Router::new()
        .route("/user/logout", get(auth::logout_handler))
        .route(
            "/user/{id}",
            get(rest::get_user_handler).delete(rest::delete_user_handler),
        )
        .route("/user/{id}/loans", get(rest::list_user_loans_handler))
        .route("/loan", post(rest::create_loan_handler))
        .route("/loan/{id}", get(rest::get_loan_handler))
        .route(
            "/pay/{id}",
            post(rest::pay_loan_handler).get(rest::list_payments_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
