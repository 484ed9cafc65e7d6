//! Check-side controller.
//!
//! Owns the check queue and the write batch. Status updates from workers
//! accumulate in the batch and reach the store once per tick (or sooner at
//! capacity), so an order that moves PROCESSING → terminal within one tick
//! costs a single row write instead of two. Envelopes still in PROCESSING
//! additionally go back onto the check queue for the next poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::QueueOrder;

use super::queue::OrderQueue;
use super::store::AccrualStore;

const BATCH_CAPACITY: usize = 1000;
const FLUSH_INTERVAL: Duration = Duration::from_secs(3);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);
const FLUSH_RETRIES: u32 = 3;
const FLUSH_BACKOFF: Duration = Duration::from_secs(30);

pub(crate) struct Checker {
    queue: Arc<dyn OrderQueue>,
    write_rx: mpsc::Receiver<QueueOrder>,
    store: Arc<dyn AccrualStore>,
    batch: Vec<QueueOrder>,
    shutdown: CancellationToken,
}

impl Checker {
    pub fn new(
        queue: Arc<dyn OrderQueue>,
        write_rx: mpsc::Receiver<QueueOrder>,
        store: Arc<dyn AccrualStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            write_rx,
            store,
            batch: Vec::with_capacity(BATCH_CAPACITY),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!("checker running");

        let mut tick = tokio::time::interval(FLUSH_INTERVAL);
        tick.tick().await; // skip the immediate tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                _ = tick.tick() => {
                    if !self.batch.is_empty() {
                        self.flush().await;
                    }
                }

                update = self.write_rx.recv() => {
                    let Some(order) = update else { break };
                    self.accept(order).await;
                }
            }
        }

        // One final flush so in-flight transitions reach the store.
        if !self.batch.is_empty() {
            self.flush().await;
        }
        self.queue.close();
        tracing::debug!("checker stopped");
    }

    async fn accept(&mut self, order: QueueOrder) {
        if !order.status.is_terminal() {
            // Still awaiting a verdict: schedule the next poll.
            self.queue.push(order.clone()).await;
        }

        self.batch.push(order);
        if self.batch.len() >= BATCH_CAPACITY {
            self.flush().await;
        }
    }

    /// Write the batch to the store. The batch is cleared only after the
    /// store confirms; on persistent failure it stays queued for the next
    /// flush.
    async fn flush(&mut self) {
        for attempt in 0..=FLUSH_RETRIES {
            if attempt > 0 {
                tracing::warn!(attempt, "retrying order batch write");
                tokio::time::sleep(FLUSH_BACKOFF).await;
            }

            match tokio::time::timeout(FLUSH_TIMEOUT, self.store.orders_update(&self.batch)).await {
                Ok(Ok(())) => {
                    tracing::debug!(count = self.batch.len(), "order batch written");
                    self.batch.clear();
                    return;
                }
                Ok(Err(e)) => tracing::error!(error = %e, "order batch write failed"),
                Err(_) => tracing::error!("order batch write timed out"),
            }
        }

        tracing::error!(
            count = self.batch.len(),
            "order batch write kept after {FLUSH_RETRIES} failed retries"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex;

    use super::super::queue::{MemoryQueue, QUEUE_CAPACITY};
    use super::*;
    use crate::core::error::AppError;
    use crate::model::OrderStatus;

    /// Fails the first `failures` update calls, then records writes.
    struct FlakyStore {
        failures: AtomicUsize,
        written: Mutex<Vec<QueueOrder>>,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl AccrualStore for FlakyStore {
        async fn orders_update(&self, batch: &[QueueOrder]) -> Result<(), AppError> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AppError::Internal("store unavailable".into()));
            }
            self.written.lock().await.extend_from_slice(batch);
            Ok(())
        }

        async fn orders_restore(&self) -> Result<Vec<QueueOrder>, AppError> {
            Ok(Vec::new())
        }
    }

    fn checker_with(
        store: Arc<FlakyStore>,
    ) -> (Checker, mpsc::Receiver<QueueOrder>, mpsc::Sender<QueueOrder>) {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = MemoryQueue::open(queue_tx);
        let (write_tx, write_rx) = mpsc::channel(8);
        (
            Checker::new(queue, write_rx, store, CancellationToken::new()),
            queue_rx,
            write_tx,
        )
    }

    #[tokio::test]
    async fn accept_reschedules_only_non_terminal_envelopes() {
        let store = Arc::new(FlakyStore::new(0));
        let (mut checker, mut queue_rx, _write_tx) = checker_with(store);

        checker
            .accept(QueueOrder {
                number: 2377225624,
                status: OrderStatus::Processing,
                accrual: None,
            })
            .await;
        checker
            .accept(QueueOrder {
                number: 5512703182881200,
                status: OrderStatus::Processed,
                accrual: None,
            })
            .await;

        assert_eq!(checker.batch.len(), 2);

        // Only the PROCESSING envelope circulates back for another poll.
        let rescheduled = queue_rx.recv().await.unwrap();
        assert_eq!(rescheduled.number, 2377225624);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), queue_rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flush_keeps_batch_until_the_store_confirms() {
        let store = Arc::new(FlakyStore::new(2));
        let (mut checker, _queue_rx, _write_tx) = checker_with(Arc::clone(&store));

        checker.batch.push(QueueOrder::new(2377225624));
        checker.flush().await;

        assert!(checker.batch.is_empty());
        assert_eq!(store.written.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_gives_up_after_bounded_retries_but_keeps_envelopes() {
        let store = Arc::new(FlakyStore::new(FLUSH_RETRIES as usize + 1));
        let (mut checker, _queue_rx, _write_tx) = checker_with(Arc::clone(&store));

        checker.batch.push(QueueOrder::new(2377225624));
        checker.flush().await;

        // Every attempt failed; the batch survives for the next flush.
        assert_eq!(checker.batch.len(), 1);
        assert!(store.written.lock().await.is_empty());

        checker.flush().await;
        assert!(checker.batch.is_empty());
        assert_eq!(store.written.lock().await.len(), 1);
    }
}
