// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchwatch Ingest API entry point.

use anyhow::Context;
use benchwatch_collector::IngestionCoordinator;
use benchwatch_core::AppConfig;
use benchwatch_storage::{FileBackend, HistoryStore};
use ingest_api::{app, init_tracing, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let history = &config.storage.history_path;
    let store = HistoryStore::open(Arc::new(FileBackend::new(history)))
        .await
        .with_context(|| format!("failed to open history at {}", history.display()))?;

    let coordinator = IngestionCoordinator::new(store.clone(), config.detection.clone());
    let state = Arc::new(AppState::new(coordinator).with_metrics(metrics));

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(
        bind = %config.server.bind,
        history = %history.display(),
        series = store.len(),
        "Ingest API listening"
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.shutdown().await.context("failed to flush history")?;
    info!("Ingest API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
