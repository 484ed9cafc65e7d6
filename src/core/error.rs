//! Service error type.
//!
//! One enum carries the whole API-visible taxonomy; [`IntoResponse`] maps
//! each variant to its HTTP status with a JSON message body, so handlers
//! propagate with `?` and never build responses by hand. Infrastructure
//! failures collapse into `Database`/`Internal` and are logged at the
//! boundary instead of leaking details to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed login/password payload.
    #[error("bad format: {0}")]
    BadFormat(String),
    /// Unknown login or wrong password.
    #[error("wrong login or password")]
    WrongPair,
    /// Missing, unknown or expired session token.
    #[error("not authenticated")]
    NotAuthenticated,
    /// Login is already registered.
    #[error("login already exists")]
    LoginTaken,
    /// Unparseable request body or wrong content type.
    #[error("invalid request")]
    InvalidRequest,
    /// Order number failed the Luhn check (or duplicated a withdrawal).
    #[error("invalid order number")]
    InvalidNumber,
    /// The same user re-submitted an order they already own.
    #[error("order already uploaded")]
    AlreadyUploaded,
    /// The order number belongs to a different user.
    #[error("order belongs to another user")]
    NumberConflict,
    /// Listing query matched nothing.
    #[error("nothing found")]
    NoItems,
    /// Withdrawal would drive the effective balance negative.
    #[error("not enough balance")]
    NotEnoughBalance,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

/// SQLSTATE for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::BadFormat(_) | AppError::InvalidRequest => StatusCode::BAD_REQUEST,
            AppError::WrongPair | AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::LoginTaken | AppError::NumberConflict => StatusCode::CONFLICT,
            AppError::InvalidNumber => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AlreadyUploaded => StatusCode::OK,
            AppError::NoItems => StatusCode::NO_CONTENT,
            AppError::NotEnoughBalance => StatusCode::PAYMENT_REQUIRED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translate a unique-key violation into the given domain error; any
    /// other failure passes through as a database error.
    pub fn on_unique_violation(err: sqlx::Error, mapped: AppError) -> AppError {
        if let sqlx::Error::Database(ref db) = err
            && db.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            return mapped;
        }
        err.into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                status.into_response()
            }
            // 204 and middleware 401 carry no body.
            StatusCode::NO_CONTENT => status.into_response(),
            StatusCode::UNAUTHORIZED if matches!(self, AppError::NotAuthenticated) => {
                status.into_response()
            }
            _ => (status, Json(self.to_string())).into_response(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
