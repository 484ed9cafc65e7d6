//! The slice of the store the pipeline depends on.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::error::AppError;
use crate::db;
use crate::model::QueueOrder;

/// Durable operations the pipeline needs: batched status updates and the
/// restore scan. Everything else about the store is invisible from here.
#[async_trait]
pub trait AccrualStore: Send + Sync {
    /// Apply a batch of status updates in one transaction.
    async fn orders_update(&self, batch: &[QueueOrder]) -> Result<(), AppError>;

    /// All orders still in a non-terminal state, for startup re-seeding.
    async fn orders_restore(&self) -> Result<Vec<QueueOrder>, AppError>;
}

/// Postgres-backed implementation used by the running service.
pub struct PgAccrualStore {
    pool: PgPool,
}

impl PgAccrualStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccrualStore for PgAccrualStore {
    async fn orders_update(&self, batch: &[QueueOrder]) -> Result<(), AppError> {
        db::orders::update_batch(&self.pool, batch).await
    }

    async fn orders_restore(&self) -> Result<Vec<QueueOrder>, AppError> {
        db::orders::restore(&self.pool).await
    }
}
