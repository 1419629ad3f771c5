//! Shared application state.

use benchwatch_collector::IngestionCoordinator;
use benchwatch_storage::HistoryStore;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

/// State shared by every handler.
pub struct AppState {
    /// Ingestion coordinator owning the history store.
    pub coordinator: IngestionCoordinator,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the service started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around `coordinator`.
    pub fn new(coordinator: IngestionCoordinator) -> Self {
        Self {
            coordinator,
            metrics: None,
            started_at: Utc::now(),
        }
    }

    /// Attach the Prometheus handle served on `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// The history store.
    pub fn store(&self) -> &HistoryStore {
        self.coordinator.store()
    }
}
