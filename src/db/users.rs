//! User registration and login.

use sqlx::{PgPool, Postgres, Transaction};

use crate::core::error::{AppError, AppResult};
use crate::util;

/// Create a user and open their first session in one transaction.
/// Returns the session token.
pub async fn register(pool: &PgPool, login: &str, password: &str) -> AppResult<String> {
    let hash = util::hash_password(password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let mut tx = pool.begin().await?;
    let user_id: i64 =
        sqlx::query_scalar("INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING id")
            .bind(login)
            .bind(&hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::on_unique_violation(e, AppError::LoginTaken))?;
    let token = open_session(&mut tx, user_id).await?;
    tx.commit().await?;

    Ok(token)
}

/// Verify credentials, refresh `last_login_at` and replace the session.
/// Returns the new session token.
pub async fn login(pool: &PgPool, login: &str, password: &str) -> AppResult<String> {
    let mut tx = pool.begin().await?;
    let row: Option<(i64, String)> = sqlx::query_as(
        "UPDATE users SET last_login_at = now() WHERE login = $1 RETURNING id, password_hash",
    )
    .bind(login)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((user_id, hash)) = row else {
        return Err(AppError::WrongPair);
    };
    if !util::verify_password(password, &hash) {
        return Err(AppError::WrongPair);
    }

    let token = open_session(&mut tx, user_id).await?;
    tx.commit().await?;

    Ok(token)
}

/// Insert or replace the user's session; one active session per user.
async fn open_session(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> AppResult<String> {
    let token = util::generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at) \
         VALUES ($1, $2, now() + interval '30 minutes') \
         ON CONFLICT (user_id) DO UPDATE \
         SET token = $1, expires_at = now() + interval '30 minutes'",
    )
    .bind(&token)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(token)
}
