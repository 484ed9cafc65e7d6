use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use loyalty_server::accrual::{AccrualPipeline, PgAccrualStore};
use loyalty_server::core::{AppState, Config};
use loyalty_server::{api, db};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    let default_filter = if config.debug {
        "loyalty_server=debug,tower_http=debug"
    } else {
        "loyalty_server=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!("starting loyalty-server");

    let pool = db::connect(&config).await?;

    let store = Arc::new(PgAccrualStore::new(pool.clone()));
    let pipeline = AccrualPipeline::open(&config, store).await?;
    let shutdown = pipeline.shutdown_token();

    let state = AppState {
        pool: pool.clone(),
        pipeline: pipeline.handle(),
    };

    let pipeline_task = tokio::spawn(pipeline.run());

    let listener = tokio::net::TcpListener::bind(&config.run_address).await?;
    tracing::info!("listening on {}", config.run_address);

    let app = api::create_router(state);
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = server_shutdown.cancelled() => {},
            }
        })
        .await?;

    tracing::info!("shutting down");
    shutdown.cancel();
    let _ = pipeline_task.await;
    pool.close().await;

    Ok(())
}
