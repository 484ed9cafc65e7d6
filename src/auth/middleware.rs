//! Auth middleware.
//!
//! The `Authorization` header carries the raw session token. The plain
//! variant resolves the session; the with-balance variant additionally
//! computes the user's effective balance in the same store transaction, for
//! the endpoints that need it. Every failure mode is a bare 401.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::core::error::{AppError, AppResult};
use crate::core::state::AppState;
use crate::db;

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = header_token(&request)?;
    let session = db::sessions::find(&state.pool, &token)
        .await
        .map_err(unauthorized)?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

pub async fn require_session_with_balance(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = header_token(&request)?;
    let session = db::sessions::find_with_balance(&state.pool, &token)
        .await
        .map_err(unauthorized)?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn header_token(request: &Request) -> AppResult<String> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AppError::NotAuthenticated)
}

/// Store trouble during auth must not leak details; everything is a 401.
fn unauthorized(err: AppError) -> AppError {
    if !matches!(err, AppError::NotAuthenticated) {
        tracing::error!(error = %err, "session lookup failed");
    }
    AppError::NotAuthenticated
}
