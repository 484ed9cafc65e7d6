//! HTTP routes.

pub mod auth;
pub mod balance;
pub mod health;
pub mod orders;

use std::time::Duration;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::state::AppState;

/// Upper bound on request handling, store calls included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    // Registration and login issue the tokens everything else requires.
    let public = Router::new()
        .route("/api/user/register", post(auth::register))
        .route("/api/user/login", post(auth::login));

    let user = Router::new()
        .route("/api/user/logout", post(auth::logout))
        .route("/api/user/orders", post(orders::submit).get(orders::list))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_session,
        ));

    let balance = Router::new()
        .route("/api/user/balance", get(balance::current))
        .route("/api/user/balance/withdraw", post(balance::withdraw))
        .route("/api/user/balance/withdrawals", get(balance::list))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_session_with_balance,
        ));

    Router::new()
        .route("/ping", get(health::ping))
        .merge(public)
        .merge(user)
        .merge(balance)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// The order endpoints are strict about what they accept.
pub(crate) fn content_type_is(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(expected))
}
