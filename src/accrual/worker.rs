//! Pipeline workers.
//!
//! Each worker is a cooperative select loop over four sources: post
//! deliveries, check deliveries, sleep directives and shutdown. Exactly one
//! message is handled per iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::{OrderStatus, QueueOrder};

use super::client::{AccrualClient, UpstreamError};
use super::queue::{OrderQueue, SharedReceiver};

/// Channel endpoints handed to every worker.
#[derive(Clone)]
pub(crate) struct WorkerChannels {
    /// Deliveries of orders awaiting their first upstream post.
    pub post: SharedReceiver<QueueOrder>,
    /// Deliveries of PROCESSING orders awaiting a terminal poll.
    pub check: SharedReceiver<QueueOrder>,
    /// Nap directives from the coordinator after someone saw a 429.
    pub sleep: SharedReceiver<Duration>,
    /// Throttled posts go back to the poster for requeueing.
    pub repost: mpsc::Sender<QueueOrder>,
    /// Throttled checks go straight back onto the check queue.
    pub check_queue: Arc<dyn OrderQueue>,
    /// Status updates towards the checker's batch.
    pub write: mpsc::Sender<QueueOrder>,
    /// Throttle reports towards the coordinator.
    pub rate_limit: mpsc::Sender<Duration>,
}

pub(crate) struct Worker {
    id: usize,
    client: Arc<AccrualClient>,
    chs: WorkerChannels,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        id: usize,
        client: Arc<AccrualClient>,
        chs: WorkerChannels,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            chs,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::debug!(worker = self.id, "worker running");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                directive = recv(&self.chs.sleep) => {
                    let Some(nap) = directive else { break };
                    tracing::debug!(worker = self.id, secs = nap.as_secs(), "sleeping on throttle directive");
                    tokio::time::sleep(nap).await;
                }

                envelope = recv(&self.chs.post) => {
                    let Some(order) = envelope else { break };
                    self.post(order).await;
                }

                envelope = recv(&self.chs.check) => {
                    let Some(order) = envelope else { break };
                    self.check(order).await;
                }
            }
        }

        tracing::debug!(worker = self.id, "worker stopped");
    }

    async fn post(&self, mut order: QueueOrder) {
        match self.client.post_order(order.number).await {
            Ok(()) => {
                order.status = OrderStatus::Processing;
                let _ = self.chs.write.send(order).await;
            }
            Err(UpstreamError::Throttled(wait)) => {
                tracing::debug!(worker = self.id, order = order.number, "post throttled");
                // Report once, requeue, and keep going: the coordinator puts
                // the rest of the pool to sleep, not this worker.
                let _ = self.chs.rate_limit.send(wait).await;
                let _ = self.chs.repost.send(order).await;
            }
            Err(UpstreamError::Transient(reason)) => {
                tracing::warn!(
                    worker = self.id,
                    order = order.number,
                    %reason,
                    "dropping post, restore will reseed"
                );
            }
        }
    }

    async fn check(&self, mut order: QueueOrder) {
        match self.client.order_status(order.number).await {
            Ok(report) => {
                order.status = report.status.encode();
                order.accrual = report.accrual;
                let _ = self.chs.write.send(order).await;
            }
            Err(UpstreamError::Throttled(wait)) => {
                tracing::debug!(worker = self.id, order = order.number, "check throttled");
                let _ = self.chs.rate_limit.send(wait).await;
                self.chs.check_queue.push(order).await;
            }
            Err(UpstreamError::Transient(reason)) => {
                tracing::warn!(worker = self.id, order = order.number, %reason, "dropping check");
            }
        }
    }
}

async fn recv<T>(shared: &SharedReceiver<T>) -> Option<T> {
    shared.lock().await.recv().await
}
