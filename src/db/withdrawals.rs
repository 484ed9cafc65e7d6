//! Withdrawal rows.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::core::error::{AppError, AppResult};
use crate::model::{OrderStatus, Withdrawal};

/// Record a withdrawal, verifying the effective balance atomically with the
/// insert.
///
/// The user row is locked first, so concurrent withdrawals by the same user
/// serialize and cannot jointly overdraw. A duplicate order number trips the
/// unique constraint and surfaces as invalid-number.
pub async fn create(pool: &PgPool, user_id: i64, order_number: i64, sum: Decimal) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let accrued: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(accrual), 0) FROM orders WHERE user_id = $1 AND status = $2",
    )
    .bind(user_id)
    .bind(OrderStatus::Processed)
    .fetch_one(&mut *tx)
    .await?;

    let withdrawn: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(sum), 0) FROM withdrawals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    if accrued - withdrawn < sum {
        return Err(AppError::NotEnoughBalance);
    }

    sqlx::query("INSERT INTO withdrawals (order_number, user_id, sum) VALUES ($1, $2, $3)")
        .bind(order_number)
        .bind(user_id)
        .bind(sum)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, AppError::InvalidNumber))?;

    tx.commit().await?;
    Ok(())
}

/// A user's withdrawals, oldest first.
pub async fn for_user(pool: &PgPool, user_id: i64) -> AppResult<Vec<Withdrawal>> {
    let withdrawals: Vec<Withdrawal> = sqlx::query_as(
        "SELECT order_number, sum, uploaded_at FROM withdrawals \
         WHERE user_id = $1 ORDER BY uploaded_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    if withdrawals.is_empty() {
        return Err(AppError::NoItems);
    }
    Ok(withdrawals)
}
