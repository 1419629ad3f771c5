// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The ingestion coordinator.
//!
//! One call to [`IngestionCoordinator::ingest`] is one ingestion cycle:
//! validate the payload, append the measurement to the history store,
//! compute the baseline from the entries before it, and classify it.
//! Exactly one measurement is appended per successful cycle and none on
//! any rejection.
//!
//! Per-series ordering is enforced by the store, so the coordinator can be
//! shared freely (`Arc<IngestionCoordinator>`) between concurrent callers.

use crate::error::{IngestError, Result};
use crate::state::{IngestState, IngestionCycle};
use benchwatch_analysis::{Outcome, RegressionDetector, TrendAnalyzer};
use benchwatch_core::{BenchmarkPayload, DetectionConfig, Measurement, RunPayload, SeriesKey};
use benchwatch_storage::HistoryStore;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// A benchmark of a run that did not complete its cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkFailure {
    /// Benchmark name.
    pub benchmark: String,
    /// Terminal state of the cycle.
    pub state: IngestState,
    /// Machine-readable reason.
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of ingesting a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Tool of the run.
    pub tool: String,
    /// Commit of the run.
    pub commit_id: String,
    /// Outcomes of completed cycles, in payload order.
    pub outcomes: Vec<Outcome>,
    /// Cycles that were rejected or faulted.
    pub failures: Vec<BenchmarkFailure>,
}

impl RunReport {
    /// Outcomes classified as regressions.
    pub fn regressions(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.should_alert())
    }

    /// Whether any benchmark regressed.
    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }

    /// Whether every benchmark completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether any cycle faulted (and should be retried).
    pub fn has_faults(&self) -> bool {
        self.failures.iter().any(|f| f.state == IngestState::Faulted)
    }
}

/// Orchestrates ingestion cycles over an owned history store.
#[derive(Debug, Clone)]
pub struct IngestionCoordinator {
    store: HistoryStore,
    analyzer: TrendAnalyzer,
    detector: RegressionDetector,
    config: DetectionConfig,
}

impl IngestionCoordinator {
    /// Create a coordinator over `store` using `config`.
    pub fn new(store: HistoryStore, config: DetectionConfig) -> Self {
        Self {
            analyzer: TrendAnalyzer::from_config(&config),
            detector: RegressionDetector::from_config(&config),
            store,
            config,
        }
    }

    /// Replace the detector, e.g. to tune the gates programmatically.
    pub fn with_detector(mut self, detector: RegressionDetector) -> Self {
        self.detector = detector;
        self
    }

    /// The history store.
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// The trend analyzer.
    pub fn analyzer(&self) -> &TrendAnalyzer {
        &self.analyzer
    }

    /// Detection settings.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run one ingestion cycle for a single benchmark payload.
    pub async fn ingest(&self, payload: &BenchmarkPayload) -> Result<Outcome> {
        let started = Instant::now();
        let mut cycle = IngestionCycle::new();

        let result = match payload.validate(Utc::now()) {
            Ok(measurement) => self.process(&mut cycle, measurement).await,
            Err(e) => Err(IngestError::Validation(e)),
        };

        self.finish(&mut cycle, payload.name(), started, result)
    }

    /// Run one ingestion cycle for an already validated measurement.
    pub async fn ingest_measurement(&self, measurement: Measurement) -> Result<Outcome> {
        let started = Instant::now();
        let mut cycle = IngestionCycle::new();
        let name = measurement.benchmark_name.clone();
        let result = self.process(&mut cycle, measurement).await;
        self.finish(&mut cycle, &name, started, result)
    }

    /// Ingest every benchmark of a run.
    ///
    /// The whole run is validated first; an invalid run is rejected with no
    /// appends. Cycles for the run's benchmarks then proceed concurrently
    /// (they target distinct series) and are reported individually.
    pub async fn ingest_run(&self, run: &RunPayload) -> Result<RunReport> {
        let measurements = match run.validate(Utc::now()) {
            Ok(m) => m,
            Err(e) => {
                let err = IngestError::Validation(e);
                warn!(
                    tool = run.tool.as_deref().unwrap_or("<none>"),
                    reason = %err,
                    "Run rejected"
                );
                metrics::counter!("benchwatch_ingestions_rejected_total", "reason" => err.code())
                    .increment(1);
                return Err(err);
            }
        };

        let tool = measurements[0].tool_name.clone();
        let commit_id = measurements[0].commit.id.clone();
        let names: Vec<String> = measurements
            .iter()
            .map(|m| m.benchmark_name.clone())
            .collect();

        let results = join_all(measurements.into_iter().map(|m| self.ingest_measurement(m))).await;

        let mut report = RunReport {
            tool,
            commit_id,
            outcomes: Vec::new(),
            failures: Vec::new(),
        };
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => report.failures.push(BenchmarkFailure {
                    benchmark: name,
                    state: e.state(),
                    code: e.code().to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            tool = %report.tool,
            commit = %report.commit_id,
            completed = report.outcomes.len(),
            failed = report.failures.len(),
            regressions = report.regressions().count(),
            "Run ingested"
        );
        Ok(report)
    }

    async fn process(&self, cycle: &mut IngestionCycle, measurement: Measurement) -> Result<Outcome> {
        cycle.transition(IngestState::Validated)?;
        let key = measurement.key();

        let view = self.store.append(measurement).await?;
        cycle.transition(IngestState::Merged)?;

        let summary = self.analyzer.baseline(&view)?;
        cycle.transition(IngestState::Analyzed)?;

        let candidate = view.tail().ok_or(IngestError::IllegalTransition {
            from: IngestState::Merged,
            to: IngestState::Analyzed,
        })?;
        let outcome = self
            .detector
            .classify(candidate, &summary, self.polarity_for(&key));
        cycle.transition(IngestState::Completed)?;

        Ok(outcome)
    }

    fn polarity_for(&self, key: &SeriesKey) -> benchwatch_core::Polarity {
        self.config.polarity_for(key)
    }

    fn finish(
        &self,
        cycle: &mut IngestionCycle,
        benchmark: &str,
        started: Instant,
        result: Result<Outcome>,
    ) -> Result<Outcome> {
        metrics::histogram!("benchwatch_ingestion_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                metrics::counter!(
                    "benchwatch_ingestions_total",
                    "classification" => outcome.classification.as_str()
                )
                .increment(1);

                if outcome.should_alert() {
                    warn!(
                        cycle_id = %cycle.id,
                        series = %outcome.key(),
                        value = outcome.measurement.value,
                        delta_ratio = ?outcome.delta_ratio,
                        "Regression detected"
                    );
                } else {
                    info!(
                        cycle_id = %cycle.id,
                        series = %outcome.key(),
                        classification = %outcome.classification,
                        delta_ratio = ?outcome.delta_ratio,
                        "Ingestion completed"
                    );
                }
            }
            Err(e) => {
                cycle.fail(e);
                if e.is_rejection() {
                    metrics::counter!("benchwatch_ingestions_rejected_total", "reason" => e.code())
                        .increment(1);
                    warn!(cycle_id = %cycle.id, benchmark, reason = %e, "Ingestion rejected");
                } else {
                    metrics::counter!("benchwatch_ingestions_faulted_total").increment(1);
                    error!(cycle_id = %cycle.id, benchmark, error = %e, "Ingestion faulted");
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use benchwatch_analysis::Classification;
    use benchwatch_core::{BenchmarkEntry, CommitPayload, Polarity, PolarityRule};
    use benchwatch_storage::{SnapshotBackend, StoreError};
    use chrono::{DateTime, Duration, TimeZone};
    use std::sync::Arc;

    fn t(offset_s: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 24, 19, 0, 0).unwrap() + Duration::seconds(offset_s)
    }

    fn commit(id: &str) -> CommitPayload {
        CommitPayload {
            id: Some(id.to_string()),
            timestamp: Some(t(-60)),
            author_name: Some("Jane Doe".to_string()),
            author_email: Some("jane@example.com".to_string()),
            message: Some("perf: tweak".to_string()),
            ..Default::default()
        }
    }

    fn payload(name: &str, value: f64, offset_s: i64) -> BenchmarkPayload {
        BenchmarkPayload {
            commit: Some(commit(&format!("c{offset_s}"))),
            tool: Some("cargo".to_string()),
            recorded_at: Some(t(offset_s)),
            benchmark: BenchmarkEntry::new(name, value, 1.0, "ns/iter"),
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            window_size: 5,
            min_samples: 3,
            noise_factor: 1.0,
            ..Default::default()
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl SnapshotBackend for FailingBackend {
        async fn read(&self) -> benchwatch_storage::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn write(&self, _bytes: &[u8]) -> benchwatch_storage::Result<()> {
            Err(StoreError::Persistence("read-only filesystem".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[tokio::test]
    async fn test_fresh_series_is_normal_until_min_samples() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        for (i, value) in [100.0, 500.0, 1.0].into_iter().enumerate() {
            let outcome = coordinator
                .ingest(&payload("BlockImport", value, i as i64))
                .await
                .unwrap();
            assert_eq!(outcome.classification, Classification::Normal);
            assert!(outcome.baseline.is_none());
        }
    }

    #[tokio::test]
    async fn test_regression_after_stable_history() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        for i in 0..4 {
            coordinator
                .ingest(&payload("BlockImport", 100.0 + i as f64 * 0.1, i))
                .await
                .unwrap();
        }
        let outcome = coordinator
            .ingest(&payload("BlockImport", 130.0, 10))
            .await
            .unwrap();

        assert_eq!(outcome.classification, Classification::Regressed);
        assert!(outcome.should_alert());
        assert_eq!(outcome.baseline.as_ref().unwrap().sample_count, 4);
        assert_eq!(coordinator.store().series("cargo", "BlockImport").len(), 5);
    }

    #[tokio::test]
    async fn test_polarity_rule_applies() {
        let mut cfg = config();
        cfg.polarity.push(PolarityRule {
            tool: None,
            benchmark: "Throughput".to_string(),
            polarity: Polarity::HigherIsBetter,
        });
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), cfg);
        for i in 0..3 {
            coordinator.ingest(&payload("Throughput", 100.0, i)).await.unwrap();
        }
        let outcome = coordinator.ingest(&payload("Throughput", 130.0, 3)).await.unwrap();
        assert_eq!(outcome.classification, Classification::Improved);
        assert_eq!(outcome.polarity, Polarity::HigherIsBetter);
    }

    #[tokio::test]
    async fn test_validation_rejection_appends_nothing() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        let mut bad = payload("BlockImport", 1.0, 0);
        bad.benchmark.unit = Some(String::new());

        let err = coordinator.ingest(&bad).await.unwrap_err();
        assert_eq!(err.state(), IngestState::Rejected);
        assert_eq!(err.code(), "validation");
        assert!(err.to_string().contains("unit"));
        assert!(coordinator.store().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_rejected() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        coordinator.ingest(&payload("BlockImport", 1.0, 10)).await.unwrap();
        let err = coordinator
            .ingest(&payload("BlockImport", 1.0, 5))
            .await
            .unwrap_err();
        assert!(err.is_out_of_order());
        assert_eq!(err.state(), IngestState::Rejected);
        assert_eq!(coordinator.store().measurement_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_faults_without_mutation() {
        let store = HistoryStore::with_backend(Arc::new(FailingBackend));
        let coordinator = IngestionCoordinator::new(store, config());
        let err = coordinator
            .ingest(&payload("BlockImport", 1.0, 0))
            .await
            .unwrap_err();
        assert_eq!(err.state(), IngestState::Faulted);
        assert_eq!(err.code(), "persistence");
        assert!(coordinator.store().series("cargo", "BlockImport").is_empty());
    }

    #[tokio::test]
    async fn test_ingest_run_rejects_whole_run_on_invalid_entry() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        let run = RunPayload {
            commit: Some(commit("abc")),
            tool: Some("cargo".to_string()),
            recorded_at: Some(t(0)),
            benchmarks: vec![
                BenchmarkEntry::new("A", 1.0, 0.0, "ns/iter"),
                BenchmarkEntry {
                    name: Some("B".to_string()),
                    value: None,
                    error_margin: Some(0.0),
                    unit: Some("ns/iter".to_string()),
                },
            ],
        };

        let err = coordinator.ingest_run(&run).await.unwrap_err();
        assert!(err.to_string().contains("benchmarks[1].value"));
        assert!(coordinator.store().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_run_reports_per_benchmark() {
        let coordinator = IngestionCoordinator::new(HistoryStore::new(), config());
        coordinator.ingest(&payload("B", 1.0, 100)).await.unwrap();

        let run = RunPayload {
            commit: Some(commit("abc")),
            tool: Some("cargo".to_string()),
            recorded_at: Some(t(50)),
            benchmarks: vec![
                BenchmarkEntry::new("A", 1.0, 0.0, "ns/iter"),
                BenchmarkEntry::new("B", 1.0, 0.0, "ns/iter"),
            ],
        };

        let report = coordinator.ingest_run(&run).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].benchmark, "B");
        assert_eq!(report.failures[0].code, "out_of_order");
        assert!(!report.is_complete());
        assert!(!report.has_faults());
    }
}
