//! Session lookup for the auth middleware.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::core::error::{AppError, AppResult};
use crate::model::{AuthSession, Balance, OrderStatus, User};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    login: String,
    last_login_at: chrono::DateTime<chrono::Utc>,
}

const SESSION_QUERY: &str = "SELECT u.id, u.login, u.last_login_at \
     FROM sessions s JOIN users u ON u.id = s.user_id \
     WHERE s.token = $1 AND s.expires_at > now()";

/// Resolve a token to its user. Unknown and expired tokens are equivalent.
pub async fn find(pool: &PgPool, token: &str) -> AppResult<AuthSession> {
    let row: Option<SessionRow> = sqlx::query_as(SESSION_QUERY)
        .bind(token)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotAuthenticated);
    };

    Ok(AuthSession {
        user: User {
            id: row.id,
            login: row.login,
            last_login_at: row.last_login_at,
        },
        token: token.to_string(),
        balance: None,
    })
}

/// Like [`find`], but also computes the user's effective balance in the same
/// transaction, so balance reads are consistent with concurrent withdrawals.
pub async fn find_with_balance(pool: &PgPool, token: &str) -> AppResult<AuthSession> {
    let mut tx = pool.begin().await?;

    let row: Option<SessionRow> = sqlx::query_as(SESSION_QUERY)
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotAuthenticated);
    };

    let accrued: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(accrual), 0) FROM orders WHERE user_id = $1 AND status = $2",
    )
    .bind(row.id)
    .bind(OrderStatus::Processed)
    .fetch_one(&mut *tx)
    .await?;

    let withdrawn: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(sum), 0) FROM withdrawals WHERE user_id = $1")
            .bind(row.id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    Ok(AuthSession {
        user: User {
            id: row.id,
            login: row.login,
            last_login_at: row.last_login_at,
        },
        token: token.to_string(),
        balance: Some(Balance {
            current: accrued - withdrawn,
            withdrawn,
        }),
    })
}

/// Logout: drop the session row.
pub async fn kill(pool: &PgPool, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}
