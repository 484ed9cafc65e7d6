//! Pipeline lifecycle.
//!
//! The coordinator wires queues, channels and workers together, re-seeds
//! unfinished orders from the store at startup, and turns a single throttle
//! report into sleep directives for the rest of the pool. Shutdown is one
//! cancellation token observed by every loop; `run` joins all of them
//! before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::error::AppError;
use crate::core::Config;
use crate::model::QueueOrder;

use super::broker::BrokerQueue;
use super::checker::Checker;
use super::client::AccrualClient;
use super::poster::Poster;
use super::queue::{MemoryQueue, OrderQueue, QUEUE_CAPACITY};
use super::store::AccrualStore;
use super::worker::{Worker, WorkerChannels};

/// Broker queue names, when the broker variant is selected.
const POST_QUEUE: &str = "orders.post";
const CHECK_QUEUE: &str = "orders.check";

const RESTORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Push side of the pipeline, cloned into the HTTP state.
#[derive(Clone)]
pub struct PipelineHandle {
    queue: Arc<dyn OrderQueue>,
}

impl PipelineHandle {
    /// Enqueue a newly accepted order for its first upstream post. Applies
    /// queue backpressure to the caller once the pipeline is saturated.
    pub async fn push(&self, order: QueueOrder) {
        self.queue.push(order).await;
    }
}

pub struct AccrualPipeline {
    post_queue: Arc<dyn OrderQueue>,
    workers: Vec<Worker>,
    poster: Poster,
    checker: Checker,
    store: Arc<dyn AccrualStore>,
    client: Arc<AccrualClient>,
    rate_limit_rx: mpsc::Receiver<Duration>,
    sleep_tx: mpsc::Sender<Duration>,
    workers_count: usize,
    setup_rewards: bool,
    shutdown: CancellationToken,
}

impl AccrualPipeline {
    /// Build the pipeline: open both queues (in-process, or broker-backed
    /// when a broker URL is configured), wire the channels and prepare N
    /// workers. Nothing runs until [`run`](Self::run).
    pub async fn open(config: &Config, store: Arc<dyn AccrualStore>) -> Result<Self, AppError> {
        let client = Arc::new(
            AccrualClient::new(&config.accrual_address)
                .map_err(|e| AppError::Internal(format!("accrual client init: {e}")))?,
        );

        let (post_tx, post_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (check_tx, check_rx) = mpsc::channel(QUEUE_CAPACITY);
        let post_queue = open_queue(config, POST_QUEUE, post_tx).await?;
        let check_queue = open_queue(config, CHECK_QUEUE, check_tx).await?;

        let (repost_tx, repost_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (write_tx, write_rx) = mpsc::channel(QUEUE_CAPACITY);
        // Capacity 1: throttle reports serialize, naps hand over one by one.
        let (rate_limit_tx, rate_limit_rx) = mpsc::channel(1);
        let (sleep_tx, sleep_rx) = mpsc::channel(1);

        let shutdown = CancellationToken::new();

        let chs = WorkerChannels {
            post: Arc::new(Mutex::new(post_rx)),
            check: Arc::new(Mutex::new(check_rx)),
            sleep: Arc::new(Mutex::new(sleep_rx)),
            repost: repost_tx,
            check_queue: Arc::clone(&check_queue),
            write: write_tx,
            rate_limit: rate_limit_tx,
        };

        let workers = (0..config.workers_count)
            .map(|i| Worker::new(i + 1, Arc::clone(&client), chs.clone(), shutdown.clone()))
            .collect();

        let poster = Poster::new(Arc::clone(&post_queue), repost_rx, shutdown.clone());
        let checker = Checker::new(check_queue, write_rx, Arc::clone(&store), shutdown.clone());

        Ok(Self {
            post_queue,
            workers,
            poster,
            checker,
            store,
            client,
            rate_limit_rx,
            sleep_tx,
            workers_count: config.workers_count,
            setup_rewards: config.setup_rewards,
            shutdown,
        })
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            queue: Arc::clone(&self.post_queue),
        }
    }

    /// Token that stops the whole pipeline when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until shutdown: spawn workers and controllers, re-seed unfinished
    /// orders, then relay throttle reports. Joins every task before
    /// returning, so after this resolves no store call is in flight.
    pub async fn run(self) {
        let AccrualPipeline {
            post_queue,
            workers,
            poster,
            checker,
            store,
            client,
            mut rate_limit_rx,
            sleep_tx,
            workers_count,
            setup_rewards,
            shutdown,
        } = self;

        if setup_rewards
            && let Err(e) = client.push_reward_config().await
        {
            tracing::warn!("reward setup failed: {e}");
        }

        let mut tasks = Vec::with_capacity(workers_count + 2);
        for worker in workers {
            tasks.push(tokio::spawn(worker.run()));
        }
        tasks.push(tokio::spawn(poster.run()));
        tasks.push(tokio::spawn(checker.run()));

        restore(store.as_ref(), post_queue.as_ref()).await;
        tracing::info!(workers = workers_count, "accrual pipeline listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                throttle = rate_limit_rx.recv() => {
                    let Some(wait) = throttle else { break };
                    tracing::info!(secs = wait.as_secs(), "upstream throttled, pausing workers");
                    // The reporting worker is already stalled by its own
                    // requeue; everyone else gets one nap directive.
                    for _ in 1..workers_count {
                        if sleep_tx.send(wait).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        post_queue.close();
        for task in tasks {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                tracing::error!(error = ?e, "pipeline task panicked");
            }
        }
        tracing::info!("accrual pipeline stopped");
    }
}

/// Push every stored NEW/PROCESSING order back onto the post queue.
/// Re-posting is idempotent at the upstream, which answers with either an
/// acceptance or the current state.
async fn restore(store: &dyn AccrualStore, queue: &dyn OrderQueue) {
    let scan = tokio::time::timeout(RESTORE_TIMEOUT, store.orders_restore());
    match scan.await {
        Ok(Ok(orders)) if orders.is_empty() => {}
        Ok(Ok(orders)) => {
            tracing::info!(count = orders.len(), "re-seeding unfinished orders");
            for order in orders {
                queue.push(order).await;
            }
        }
        Ok(Err(e)) => tracing::error!(error = %e, "restore scan failed"),
        Err(_) => tracing::error!("restore scan timed out"),
    }
}

async fn open_queue(
    config: &Config,
    name: &str,
    output: mpsc::Sender<QueueOrder>,
) -> Result<Arc<dyn OrderQueue>, AppError> {
    if config.broker_url.is_empty() {
        let queue: Arc<dyn OrderQueue> = MemoryQueue::open(output);
        return Ok(queue);
    }

    let queue = BrokerQueue::open(&config.broker_url, name, output)
        .await
        .map_err(|e| AppError::Internal(format!("broker queue {name}: {e}")))?;
    Ok(queue)
}
