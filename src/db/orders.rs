//! Order rows: user submissions plus the pipeline's batched update and
//! restore surface.

use sqlx::PgPool;

use crate::core::error::{AppError, AppResult};
use crate::model::{Order, OrderStatus, QueueOrder};

/// Accept a user's order submission in NEW.
///
/// A number already owned by the same user is a no-op conflict (200 at the
/// API), by another user a hard conflict (409). The ownership check and the
/// insert share one transaction.
pub async fn create(pool: &PgPool, user_id: i64, number: i64) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM orders WHERE number = $1")
        .bind(number)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(owner) = owner {
        return Err(if owner == user_id {
            AppError::AlreadyUploaded
        } else {
            AppError::NumberConflict
        });
    }

    sqlx::query("INSERT INTO orders (number, user_id, status) VALUES ($1, $2, $3)")
        .bind(number)
        .bind(user_id)
        .bind(OrderStatus::New)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, AppError::NumberConflict))?;

    tx.commit().await?;
    Ok(())
}

/// A user's orders, oldest first.
pub async fn for_user(pool: &PgPool, user_id: i64) -> AppResult<Vec<Order>> {
    let orders: Vec<Order> = sqlx::query_as(
        "SELECT number, status, accrual, uploaded_at FROM orders \
         WHERE user_id = $1 ORDER BY uploaded_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    if orders.is_empty() {
        return Err(AppError::NoItems);
    }
    Ok(orders)
}

/// Apply a batch of pipeline status updates in one transaction.
///
/// The status guard keeps terminal rows untouched and forbids regressions,
/// so a stale envelope (a restore re-post racing a terminal poll) cannot
/// rewind an order.
pub async fn update_batch(pool: &PgPool, batch: &[QueueOrder]) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    for order in batch {
        sqlx::query(
            "UPDATE orders SET status = $1, accrual = $2 \
             WHERE number = $3 AND status <= $1 AND status < 3",
        )
        .bind(order.status)
        .bind(order.accrual)
        .bind(order.number)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All orders that have not reached a terminal state, for startup re-seeding
/// of the pipeline.
pub async fn restore(pool: &PgPool) -> AppResult<Vec<QueueOrder>> {
    let orders: Vec<QueueOrder> = sqlx::query_as(
        "SELECT number, status, accrual FROM orders \
         WHERE status = $1 OR status = $2 ORDER BY uploaded_at",
    )
    .bind(OrderStatus::New)
    .bind(OrderStatus::Processing)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}
