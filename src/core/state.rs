//! Shared application state.

use sqlx::PgPool;

use crate::accrual::PipelineHandle;

/// State cloned into every router and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Postgres connection pool, the single source of durable truth.
    pub pool: PgPool,
    /// Push side of the accrual pipeline's post queue.
    pub pipeline: PipelineHandle,
}
