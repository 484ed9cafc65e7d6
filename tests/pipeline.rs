//! End-to-end pipeline tests against a stub accrual calculator and an
//! in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Response, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use loyalty_server::accrual::{AccrualPipeline, AccrualStore};
use loyalty_server::core::{AppError, Config};
use loyalty_server::model::{OrderStatus, QueueOrder};

// ── Stub accrual calculator ─────────────────────────────────────────

#[derive(Clone)]
struct StubUpstream {
    posts: Arc<AtomicUsize>,
    /// Remaining posts to answer with 429 + Retry-After: 1.
    throttle_remaining: Arc<AtomicUsize>,
    /// Every post answers 500.
    fail_all_posts: bool,
    /// Status polls report PROCESSED with accrual 500; otherwise they report
    /// PROCESSING forever.
    terminal: bool,
}

impl StubUpstream {
    fn accepting() -> Self {
        Self {
            posts: Arc::new(AtomicUsize::new(0)),
            throttle_remaining: Arc::new(AtomicUsize::new(0)),
            fail_all_posts: false,
            terminal: true,
        }
    }

    fn throttling(first_posts: usize) -> Self {
        Self {
            throttle_remaining: Arc::new(AtomicUsize::new(first_posts)),
            ..Self::accepting()
        }
    }

    fn failing() -> Self {
        Self {
            fail_all_posts: true,
            ..Self::accepting()
        }
    }

    fn stuck() -> Self {
        Self {
            terminal: false,
            ..Self::accepting()
        }
    }
}

async fn post_order(State(stub): State<StubUpstream>) -> Response<Body> {
    stub.posts.fetch_add(1, Ordering::SeqCst);

    if stub.fail_all_posts {
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .unwrap();
    }

    let throttled = stub
        .throttle_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if throttled {
        return Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header("Retry-After", "1")
            .body(Body::empty())
            .unwrap();
    }

    Response::builder()
        .status(StatusCode::ACCEPTED)
        .body(Body::empty())
        .unwrap()
}

async fn order_status(
    State(stub): State<StubUpstream>,
    Path(_number): Path<i64>,
) -> Json<serde_json::Value> {
    if stub.terminal {
        Json(serde_json::json!({ "status": "PROCESSED", "accrual": 500.0 }))
    } else {
        Json(serde_json::json!({ "status": "PROCESSING" }))
    }
}

/// Serve the stub on an ephemeral port, returning its address.
async fn spawn_upstream(stub: StubUpstream) -> String {
    let app = Router::new()
        .route("/api/orders", post(post_order))
        .route("/api/orders/{number}", get(order_status))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("127.0.0.1:{}", addr.port())
}

// ── In-memory store ─────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<HashMap<i64, QueueOrder>>,
    row_writes: Mutex<HashMap<i64, usize>>,
    flushes: AtomicUsize,
    seed: Mutex<Vec<QueueOrder>>,
}

#[async_trait]
impl AccrualStore for MemoryStore {
    async fn orders_update(&self, batch: &[QueueOrder]) -> Result<(), AppError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().await;
        let mut writes = self.row_writes.lock().await;
        for order in batch {
            rows.insert(order.number, order.clone());
            *writes.entry(order.number).or_default() += 1;
        }
        Ok(())
    }

    async fn orders_restore(&self) -> Result<Vec<QueueOrder>, AppError> {
        Ok(self.seed.lock().await.clone())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn test_config(upstream: String, workers: usize) -> Config {
    Config {
        run_address: "127.0.0.1:0".into(),
        accrual_address: upstream,
        database_uri: String::new(),
        db_refresh: false,
        debug: false,
        broker_url: String::new(),
        workers_count: workers,
        setup_rewards: false,
    }
}

async fn wait_for_status(
    store: &MemoryStore,
    number: i64,
    status: OrderStatus,
    timeout: Duration,
) -> QueueOrder {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(row) = store.rows.lock().await.get(&number)
            && row.status == status
        {
            return row.clone();
        }
        if tokio::time::Instant::now() > deadline {
            let rows = store.rows.lock().await;
            panic!("order {number} never reached {status:?}; store rows: {rows:?}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submitted_order_reaches_processed_with_reported_accrual() {
    let stub = StubUpstream::accepting();
    let upstream = spawn_upstream(stub.clone()).await;
    let store = Arc::new(MemoryStore::default());

    let pipeline = AccrualPipeline::open(&test_config(upstream, 2), store.clone())
        .await
        .unwrap();
    let handle = pipeline.handle();
    let shutdown = pipeline.shutdown_token();
    let run = tokio::spawn(pipeline.run());

    handle.push(QueueOrder::new(5512703182881200)).await;

    let row = wait_for_status(
        &store,
        5512703182881200,
        OrderStatus::Processed,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(row.accrual, Some(dec!(500)));

    // The PROCESSING and terminal updates may coalesce into one flush, but a
    // processed order never costs more than two row writes.
    let writes = *store
        .row_writes
        .lock()
        .await
        .get(&5512703182881200)
        .unwrap();
    assert!((1..=2).contains(&writes), "unexpected write count {writes}");

    shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn throttled_post_is_requeued_and_retried() {
    let stub = StubUpstream::throttling(1);
    let upstream = spawn_upstream(stub.clone()).await;
    let store = Arc::new(MemoryStore::default());

    let pipeline = AccrualPipeline::open(&test_config(upstream, 2), store.clone())
        .await
        .unwrap();
    let handle = pipeline.handle();
    let shutdown = pipeline.shutdown_token();
    let run = tokio::spawn(pipeline.run());

    handle.push(QueueOrder::new(2377225624)).await;

    wait_for_status(
        &store,
        2377225624,
        OrderStatus::Processed,
        Duration::from_secs(15),
    )
    .await;

    // First attempt hit the limit, the requeued envelope was posted again.
    assert!(stub.posts.load(Ordering::SeqCst) >= 2);

    shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restore_reseeds_unfinished_orders_exactly_once() {
    let stub = StubUpstream::accepting();
    let upstream = spawn_upstream(stub.clone()).await;
    let store = Arc::new(MemoryStore {
        seed: Mutex::new(vec![
            QueueOrder::new(5512703182881200),
            QueueOrder {
                number: 2377225624,
                status: OrderStatus::Processing,
                accrual: None,
            },
        ]),
        ..Default::default()
    });

    let pipeline = AccrualPipeline::open(&test_config(upstream, 2), store.clone())
        .await
        .unwrap();
    let shutdown = pipeline.shutdown_token();
    let run = tokio::spawn(pipeline.run());

    wait_for_status(
        &store,
        5512703182881200,
        OrderStatus::Processed,
        Duration::from_secs(10),
    )
    .await;
    wait_for_status(
        &store,
        2377225624,
        OrderStatus::Processed,
        Duration::from_secs(10),
    )
    .await;

    // Each re-seeded order was posted exactly once.
    assert_eq!(stub.posts.load(Ordering::SeqCst), 2);

    shutdown.cancel();
    run.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_flushes_pending_updates_then_stops_store_calls() {
    let stub = StubUpstream::stuck();
    let upstream = spawn_upstream(stub).await;
    let store = Arc::new(MemoryStore::default());

    let pipeline = AccrualPipeline::open(&test_config(upstream, 2), store.clone())
        .await
        .unwrap();
    let handle = pipeline.handle();
    let shutdown = pipeline.shutdown_token();
    let run = tokio::spawn(pipeline.run());

    handle.push(QueueOrder::new(79927398713)).await;

    // Let the post land in the batch; the first tick has not fired yet.
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.cancel();
    run.await.unwrap();

    // The final flush persisted the in-flight PROCESSING state.
    let row = store.rows.lock().await.get(&79927398713).cloned().unwrap();
    assert_eq!(row.status, OrderStatus::Processing);

    // And nothing touches the store after the pipeline has stopped.
    let flushes = store.flushes.load(Ordering::SeqCst);
    assert!(flushes >= 1);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.flushes.load(Ordering::SeqCst), flushes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_posts_are_dropped_without_store_writes() {
    let stub = StubUpstream::failing();
    let upstream = spawn_upstream(stub.clone()).await;
    let store = Arc::new(MemoryStore::default());

    let pipeline = AccrualPipeline::open(&test_config(upstream, 2), store.clone())
        .await
        .unwrap();
    let handle = pipeline.handle();
    let shutdown = pipeline.shutdown_token();
    let run = tokio::spawn(pipeline.run());

    handle.push(QueueOrder::new(2377225624)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(stub.posts.load(Ordering::SeqCst) >= 1);
    assert!(store.rows.lock().await.is_empty());

    shutdown.cancel();
    run.await.unwrap();

    // The dropped envelope never reached the batch, so not even the shutdown
    // flush wrote anything.
    assert_eq!(store.flushes.load(Ordering::SeqCst), 0);
}
