//! Post-side controller.
//!
//! Owns the post queue. New orders enter it through the coordinator's
//! handle; this loop's only job is to return throttled posts from the
//! repost channel back onto the queue so another attempt happens after the
//! pool wakes up.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::QueueOrder;

use super::queue::OrderQueue;

pub(crate) struct Poster {
    queue: Arc<dyn OrderQueue>,
    repost_rx: mpsc::Receiver<QueueOrder>,
    shutdown: CancellationToken,
}

impl Poster {
    pub fn new(
        queue: Arc<dyn OrderQueue>,
        repost_rx: mpsc::Receiver<QueueOrder>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            repost_rx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!("poster running");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                requeued = self.repost_rx.recv() => {
                    let Some(order) = requeued else { break };
                    tracing::debug!(order = order.number, "requeueing throttled post");
                    self.queue.push(order).await;
                }
            }
        }

        self.queue.close();
        tracing::debug!("poster stopped");
    }
}
