//! Balance, withdrawal and withdrawal history.
//!
//! These routes sit behind the with-balance auth variant, so the session
//! already carries a transactionally consistent balance snapshot.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::error::{AppError, AppResult};
use crate::core::state::AppState;
use crate::db;
use crate::model::{AuthSession, Balance, Withdrawal};
use crate::util;

/// GET /api/user/balance
pub async fn current(Extension(session): Extension<AuthSession>) -> AppResult<Json<Balance>> {
    let balance = session
        .balance
        .ok_or_else(|| AppError::Internal("balance missing from session".into()))?;
    Ok(Json(balance))
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    order: String,
    #[serde(with = "rust_decimal::serde::float")]
    sum: Decimal,
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    headers: HeaderMap,
    body: String,
) -> AppResult<StatusCode> {
    if !super::content_type_is(&headers, "application/json") {
        return Err(AppError::InvalidRequest);
    }

    let request: WithdrawRequest =
        serde_json::from_str(&body).map_err(|_| AppError::InvalidNumber)?;
    let order_number: i64 = request.order.parse().map_err(|_| AppError::InvalidNumber)?;
    if !util::luhn_valid(order_number) {
        return Err(AppError::InvalidNumber);
    }

    db::withdrawals::create(&state.pool, session.user.id, order_number, request.sum).await?;

    tracing::debug!(
        order = order_number,
        user = session.user.id,
        "withdrawal recorded"
    );
    Ok(StatusCode::OK)
}

/// GET /api/user/balance/withdrawals
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Json<Vec<Withdrawal>>> {
    let withdrawals = db::withdrawals::for_user(&state.pool, session.user.id).await?;
    Ok(Json(withdrawals))
}
