// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP ingestion service for Benchwatch.
//!
//! | Method | Path | Body / query | Response |
//! |--------|------|--------------|----------|
//! | `POST` | `/api/v1/runs` | run payload | per-benchmark outcomes and failures |
//! | `POST` | `/api/v1/measurements` | single-benchmark payload | outcome export |
//! | `GET` | `/api/v1/series` | `tool`, `benchmark` | series entries and trend |
//! | `GET` | `/health` | | store status |
//! | `GET` | `/metrics` | | Prometheus text |

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{middleware::from_fn, Router};
use benchwatch_core::LoggingConfig;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use error::ApiError;
pub use state::AppState;

/// Build the service router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::ingest::routes())
        .merge(routes::series::routes())
        .merge(routes::health::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::request_context_middleware)),
        )
        .with_state(state)
}

/// Initialise the tracing subscriber. `RUST_LOG` wins over the configured
/// level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
