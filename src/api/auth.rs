//! Registration, login and logout.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::core::error::{AppError, AppResult};
use crate::core::state::AppState;
use crate::db;
use crate::model::AuthSession;

const MIN_CREDENTIAL_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    fn parse(body: &str) -> AppResult<Self> {
        let credentials: Credentials = serde_json::from_str(body)
            .map_err(|_| AppError::BadFormat("login and password required".into()))?;

        if credentials.login.trim().len() < MIN_CREDENTIAL_LEN {
            return Err(AppError::BadFormat(format!(
                "login must be at least {MIN_CREDENTIAL_LEN} characters"
            )));
        }
        if credentials.password.trim().len() < MIN_CREDENTIAL_LEN {
            return Err(AppError::BadFormat(format!(
                "password must be at least {MIN_CREDENTIAL_LEN} characters"
            )));
        }
        Ok(credentials)
    }
}

/// POST /api/user/register
pub async fn register(State(state): State<AppState>, body: String) -> AppResult<impl IntoResponse> {
    let credentials = Credentials::parse(&body)?;
    let token = db::users::register(
        &state.pool,
        credentials.login.trim(),
        &credentials.password,
    )
    .await?;

    tracing::info!(login = %credentials.login.trim(), "user registered");
    Ok(authorized(token))
}

/// POST /api/user/login
pub async fn login(State(state): State<AppState>, body: String) -> AppResult<impl IntoResponse> {
    let credentials = Credentials::parse(&body)?;
    let token = db::users::login(
        &state.pool,
        credentials.login.trim(),
        &credentials.password,
    )
    .await?;

    Ok(authorized(token))
}

/// POST /api/user/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<StatusCode> {
    db::sessions::kill(&state.pool, &session.token).await?;
    Ok(StatusCode::OK)
}

/// 200 with the token both as the `Authorization` header and the body.
fn authorized(token: String) -> impl IntoResponse {
    ([(header::AUTHORIZATION, token.clone())], Json(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_credentials() {
        let credentials =
            Credentials::parse(r#"{"login":"gopher","password":"qwerty"}"#).unwrap();
        assert_eq!(credentials.login, "gopher");
        assert_eq!(credentials.password, "qwerty");
    }

    #[test]
    fn parse_rejects_malformed_and_short() {
        assert!(matches!(
            Credentials::parse("not json"),
            Err(AppError::BadFormat(_))
        ));
        assert!(matches!(
            Credentials::parse(r#"{"login":"abc","password":"qwerty"}"#),
            Err(AppError::BadFormat(_))
        ));
        assert!(matches!(
            Credentials::parse(r#"{"login":"gopher","password":"abc"}"#),
            Err(AppError::BadFormat(_))
        ));
        // Surrounding whitespace doesn't count towards the minimum.
        assert!(matches!(
            Credentials::parse(r#"{"login":"abc   ","password":"qwerty"}"#),
            Err(AppError::BadFormat(_))
        ));
    }
}
