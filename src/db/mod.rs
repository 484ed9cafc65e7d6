//! Postgres store: connection pool setup plus one module per table.
//!
//! Every multi-step operation runs inside a single transaction; conflicts
//! surface as domain errors via SQLSTATE matching, never by string-sniffing
//! driver messages.

pub mod orders;
pub mod sessions;
pub mod users;
pub mod withdrawals;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::core::Config;

/// Open the pool and bring the schema up to date.
///
/// With `db_refresh` set the whole schema is dropped first, so a fresh run
/// starts from empty tables (development convenience).
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(30)
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(120))
        .connect(&config.database_uri)
        .await?;

    if config.db_refresh {
        tracing::warn!("DB_REFRESH set, dropping schema");
        sqlx::raw_sql("DROP SCHEMA public CASCADE; CREATE SCHEMA public;")
            .execute(&pool)
            .await?;
    }

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

    tracing::info!("database ready");
    Ok(pool)
}
