//! Raceday ingestion core — process entry point.
//!
//! Wires the process-wide singletons (DB pool, upstream HTTP client,
//! worker pool, observability sink), starts the partition scheduler,
//! runs the daily baseline loader once, and serves the HTTP read surface
//! until shutdown. Modeled on the teacher's `main` (health server spawned
//! alongside the service, `tokio::select!` against `ctrl_c`).

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use raceday_ingest::config::Config;
use raceday_ingest::loader::BaselineLoader;
use raceday_ingest::observability::{EventSink, TracingEventSink};
use raceday_ingest::processor::RaceProcessor;
use raceday_ingest::read_surface::{self, AppState};
use raceday_ingest::scheduler;
use raceday_ingest::upstream::UpstreamClient;
use raceday_ingest::worker_pool::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raceday_ingest=info".parse().unwrap()),
        )
        .init();

    info!("raceday-ingest starting");

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let upstream = Arc::new(UpstreamClient::new(config.upstream_base_url.clone(), config.fetch_timeout)?);
    let worker_pool = WorkerPool::new(config.worker_pool_size);
    let sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    let processor = Arc::new(RaceProcessor::new(
        Arc::clone(&upstream),
        Arc::clone(&worker_pool),
        db.clone(),
        config.pipeline_budget_ms,
        Arc::clone(&sink),
    ));

    let scheduler_handle = scheduler::start(
        db.clone(),
        config.partition_timezone,
        config.partition_cron_hour,
        config.partition_cron_minute,
        config.partition_run_on_startup,
        Arc::clone(&sink),
    )
    .await;

    let app_state = AppState { db: db.clone() };
    let app = Router::new()
        .route("/health", get(health_handler))
        .merge(read_surface::router(app_state));

    let health_addr = format!("0.0.0.0:{}", config.health_port);
    info!("read surface listening on {health_addr}");
    let listener = tokio::net::TcpListener::bind(&health_addr).await?;

    let server = tokio::spawn(async move {
        axum::serve(listener, app).await
    });

    let loader = BaselineLoader::new(Arc::clone(&upstream), db.clone(), Arc::clone(&processor), Arc::clone(&sink));
    let loader_result = loader.run(Some("startup")).await;
    info!(
        success = loader_result.success,
        meetings = loader_result.stats.meetings_fetched,
        races = loader_result.stats.races_fetched,
        failed = loader_result.stats.failed_races.len(),
        "baseline load complete"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = server => {
            match result {
                Ok(Err(e)) => error!("read surface server error: {e:?}"),
                Err(e) => error!("read surface task panicked: {e:?}"),
                Ok(Ok(())) => {}
            }
        }
        _ = ctrl_c => {
            info!("shutting down...");
        }
    }

    scheduler_handle.stop().await;
    Arc::clone(&worker_pool).shutdown().await;

    Ok(())
}

async fn health_handler() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "service": "raceday-ingest", "status": "ok" })))
}
