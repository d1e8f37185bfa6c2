//! Transit route-search service entry point.
//!
//! Wires configuration, the dataset cache, providers, the graph manager,
//! and the periodic sync worker, then serves the HTTP surface (spec §6)
//! plus a separate metrics listener, mirroring the teacher's split of
//! the public API port from the scrape port.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use transit_router::cache::DatasetCache;
use transit_router::config::Config;
use transit_router::db::InMemoryDatasetRepository;
use transit_router::http;
use transit_router::manager::GraphManager;
use transit_router::observability::{init_logging, Metrics};
use transit_router::providers::{FallbackProvider, Provider, PrimaryProvider};
use transit_router::sync_worker::SyncWorker;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("starting transit route-search service");

    let config = Arc::new(Config::from_env()?);
    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(DatasetCache::connect(&config.dragonfly_url, config.cache_enabled, config.cache_op_timeout_secs).await);

    let primary: Arc<dyn Provider> = match &config.primary_catalog_url {
        Some(url) => Arc::new(PrimaryProvider::new(url.clone(), config.catalog_fetch_timeout_secs)),
        None => Arc::new(FallbackProvider::new(config.fallback_data_dir.clone())),
    };
    let fallback: Arc<dyn Provider> = Arc::new(FallbackProvider::new(config.fallback_data_dir.clone()));

    let manager = Arc::new(GraphManager::new(
        config.clone(),
        cache.clone(),
        primary.clone(),
        fallback.clone(),
        metrics.clone(),
    ));

    if let Err(e) = manager.initialize().await {
        warn!(error = %e, "initial graph build failed, will retry lazily on first request");
    }

    spawn_sync_worker(config.clone(), primary.clone(), manager.clone(), metrics.clone());
    spawn_metrics_server(config.metrics_port, metrics.clone());

    let state = Arc::new(http::AppState {
        manager: manager.clone(),
        metrics: metrics.clone(),
        search_k_alternatives: config.search_k_alternatives,
    });
    let app = http::router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs the sync worker on its own interval loop (spec §5 "the sync worker
/// runs on its own scheduler"), signaling the graph manager to rebuild
/// edges whenever the primary catalog's content hash changes.
fn spawn_sync_worker(
    config: Arc<Config>,
    primary: Arc<dyn Provider>,
    manager: Arc<GraphManager>,
    metrics: Arc<Metrics>,
) {
    tokio::spawn(async move {
        let repository = InMemoryDatasetRepository::new();
        let worker = SyncWorker::new(
            "transport-dataset",
            primary.as_ref(),
            &repository,
            metrics.as_ref(),
            config.sync_worker_interval_seconds,
        );
        let mut changes = worker.subscribe();

        let manager_for_signal = manager.clone();
        tokio::spawn(async move {
            while changes.recv().await.is_ok() {
                if let Err(e) = manager_for_signal.update_graph().await {
                    warn!(error = %e, "graph update after sync signal failed");
                }
            }
        });

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(config.sync_worker_interval_seconds));
        loop {
            interval.tick().await;
            let outcome = worker.run().await;
            info!(?outcome, "sync worker tick");
        }
    });
}

fn spawn_metrics_server(port: u16, metrics: Arc<Metrics>) {
    tokio::spawn(async move {
        let app = axum::Router::new().route(
            "/metrics",
            axum::routing::get(move || {
                let metrics = metrics.clone();
                async move { metrics.encode_prometheus_text() }
            }),
        );

        let addr = format!("0.0.0.0:{port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!(%addr, "metrics server listening");
                if let Err(e) = axum::serve(listener, app).await {
                    warn!(error = %e, "metrics server stopped");
                }
            }
            Err(e) => warn!(error = %e, %addr, "failed to bind metrics server"),
        }
    });
}
