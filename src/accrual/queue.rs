//! In-flight order queues.
//!
//! A queue accepts envelopes via [`OrderQueue::push`] and delivers them FIFO
//! onto a bounded output channel handed over at construction. The receiver
//! side is shared between workers; each envelope reaches exactly one of
//! them. Two implementations satisfy the contract: [`MemoryQueue`] here and
//! the broker-backed variant in [`super::broker`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;

use crate::model::QueueOrder;

/// Capacity of the internal buffer and of the delivery channel.
pub const QUEUE_CAPACITY: usize = 1000;

/// Delivery side shared by concurrent consumers; locking to receive keeps
/// every envelope exclusive to one worker.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

#[async_trait]
pub trait OrderQueue: Send + Sync {
    /// Enqueue an envelope. Blocks once the queue is at capacity
    /// (backpressure towards the caller).
    async fn push(&self, order: QueueOrder);

    /// Stop delivering. Buffered envelopes are handed to the output channel
    /// as far as it has room; the rest are dropped and re-seeded by restore
    /// on the next start.
    fn close(&self);
}

/// Mutex-protected FIFO with a dedicated delivery task.
pub struct MemoryQueue {
    pool: Mutex<VecDeque<QueueOrder>>,
    arrived: Notify,
    space: Notify,
    closed: CancellationToken,
}

impl MemoryQueue {
    /// Open the queue and start delivering onto `output`.
    pub fn open(output: mpsc::Sender<QueueOrder>) -> Arc<Self> {
        let queue = Arc::new(Self {
            pool: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            arrived: Notify::new(),
            space: Notify::new(),
            closed: CancellationToken::new(),
        });

        let consumer = Arc::clone(&queue);
        tokio::spawn(async move { consumer.deliver(output).await });

        queue
    }

    async fn deliver(&self, output: mpsc::Sender<QueueOrder>) {
        loop {
            let next = self.pool.lock().await.pop_front();
            match next {
                Some(order) => {
                    self.space.notify_one();
                    if output.send(order).await.is_err() {
                        return;
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.arrived.notified() => {}
                        _ = self.closed.cancelled() => break,
                    }
                }
            }
        }

        // Closed: drain what still fits into the output channel.
        let mut pool = self.pool.lock().await;
        while let Some(order) = pool.pop_front() {
            if output.try_send(order).is_err() {
                break;
            }
        }
    }
}

#[async_trait]
impl OrderQueue for MemoryQueue {
    async fn push(&self, order: QueueOrder) {
        loop {
            {
                let mut pool = self.pool.lock().await;
                if pool.len() < QUEUE_CAPACITY {
                    pool.push_back(order);
                    self.arrived.notify_one();
                    return;
                }
            }
            self.space.notified().await;
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = MemoryQueue::open(tx);

        for number in [2377225624, 5512703182881200, 79927398713] {
            queue.push(QueueOrder::new(number)).await;
        }

        assert_eq!(rx.recv().await.unwrap().number, 2377225624);
        assert_eq!(rx.recv().await.unwrap().number, 5512703182881200);
        assert_eq!(rx.recv().await.unwrap().number, 79927398713);
    }

    #[tokio::test]
    async fn concurrent_consumers_receive_distinct_envelopes() {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = MemoryQueue::open(tx);
        let rx: SharedReceiver<QueueOrder> = Arc::new(Mutex::new(rx));

        for number in 0..100 {
            queue.push(QueueOrder::new(number)).await;
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let rx = Arc::clone(&rx);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        match tokio::time::timeout(
                            std::time::Duration::from_millis(200),
                            rx.recv(),
                        )
                        .await
                        {
                            Ok(Some(order)) => Some(order),
                            _ => None,
                        }
                    };
                    match next {
                        Some(order) => seen.push(order.number),
                        None => break,
                    }
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = MemoryQueue::open(tx);

        queue.push(QueueOrder::new(2377225624)).await;
        assert!(rx.recv().await.is_some());

        queue.close();
        // The delivery task exits and drops its sender.
        assert!(rx.recv().await.is_none());
    }
}
