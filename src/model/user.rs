//! Users, sessions and balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub last_login_at: DateTime<Utc>,
}

/// Response body of `GET /api/user/balance`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Balance {
    /// Effective balance: accrued over PROCESSED orders minus withdrawals.
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

/// Authenticated identity inserted into request extensions by the auth
/// middleware. `balance` is populated only by the with-balance variant.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
    pub balance: Option<Balance>,
}
