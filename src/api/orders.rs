//! Order submission and listing.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::core::error::{AppError, AppResult};
use crate::core::state::AppState;
use crate::db;
use crate::model::{AuthSession, Order, QueueOrder};
use crate::util;

/// POST /api/user/orders
///
/// Body is the bare decimal order number as `text/plain`. The order is
/// persisted in NEW before it becomes visible to the pipeline, so a crash
/// between the two steps is recovered by the restore scan.
pub async fn submit(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    headers: HeaderMap,
    body: String,
) -> AppResult<StatusCode> {
    if !super::content_type_is(&headers, "text/plain") {
        return Err(AppError::InvalidRequest);
    }

    let number: i64 = body.trim().parse().map_err(|_| AppError::InvalidRequest)?;
    if !util::luhn_valid(number) {
        return Err(AppError::InvalidNumber);
    }

    db::orders::create(&state.pool, session.user.id, number).await?;
    state.pipeline.push(QueueOrder::new(number)).await;

    tracing::debug!(order = number, user = session.user.id, "order accepted");
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/user/orders
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = db::orders::for_user(&state.pool, session.user.id).await?;
    Ok(Json(orders))
}
