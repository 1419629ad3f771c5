//! Command implementations.

use crate::OutputFormat;
use anyhow::{bail, Context, Result};
use benchwatch_analysis::{Classification, Outcome, TrendAnalyzer, TrendPoint};
use benchwatch_collector::{IngestionCoordinator, RunReport};
use benchwatch_core::{AppConfig, RunPayload, SeriesKey};
use benchwatch_report::{io, markdown, DashboardData};
use benchwatch_storage::{FileBackend, HistoryStore};
use chrono::Utc;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Open the configured history file.
pub async fn open_store(config: &AppConfig) -> Result<HistoryStore> {
    let path = &config.storage.history_path;
    HistoryStore::open(Arc::new(FileBackend::new(path)))
        .await
        .with_context(|| format!("failed to open history at {}", path.display()))
}

async fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))
}

/// Parse a run payload.
pub fn parse_run(text: &str) -> Result<RunPayload> {
    serde_json::from_str(text).context("failed to parse run payload JSON")
}

/// Ingest a run and print one line per benchmark.
pub async fn ingest(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    summary: Option<&Path>,
) -> Result<RunReport> {
    let run = parse_run(&read_input(input).await?)?;
    let store = open_store(config).await?;
    let coordinator = IngestionCoordinator::new(store.clone(), config.detection.clone());

    let report = coordinator.ingest_run(&run).await?;

    for outcome in &report.outcomes {
        println!("{}", format_outcome(outcome));
    }
    for failure in &report.failures {
        println!(
            "  {:>10}  {}  {}",
            failure.state.to_string().red().bold(),
            failure.benchmark,
            failure.reason
        );
    }

    if let Some(path) = output {
        io::write_outcomes_json(&benchwatch_report::export_all(&report.outcomes), path)?;
        info!(path = %path.display(), "Outcomes written");
    }
    if let Some(path) = summary {
        io::write_markdown(&markdown::run_summary(&report, Utc::now()), path)?;
        info!(path = %path.display(), "Summary written");
    }

    store.shutdown().await?;

    let regressions = report.regressions().count();
    if regressions > 0 {
        println!(
            "\n{} {} regression(s) in {} benchmark(s)",
            "!".red().bold(),
            regressions,
            report.outcomes.len()
        );
    } else {
        println!(
            "\n{} {} benchmark(s), no regressions",
            "ok".green().bold(),
            report.outcomes.len()
        );
    }
    Ok(report)
}

/// One colored line per outcome.
pub fn format_outcome(outcome: &Outcome) -> String {
    let label = format!("{:>10}", outcome.classification.to_string());
    let label = match outcome.classification {
        Classification::Regressed => label.red().bold(),
        Classification::Improved => label.green().bold(),
        Classification::Normal => label.normal(),
    };
    let change = match (&outcome.baseline, outcome.delta_ratio) {
        (None, _) => "insufficient history".dimmed().to_string(),
        (Some(_), Some(ratio)) => format!("{:+.2}%", ratio * 100.0),
        (Some(_), None) => format!("{:+}", outcome.delta.unwrap_or_default()),
    };
    format!(
        "  {}  {}  {} {}  ({})",
        label,
        outcome.key(),
        outcome.measurement.value,
        outcome.measurement.unit,
        change
    )
}

/// Print a series and its trend.
pub async fn series(
    config: &AppConfig,
    tool: &str,
    benchmark: &str,
    format: OutputFormat,
) -> Result<()> {
    let store = open_store(config).await?;
    let view = store.series(tool, benchmark);
    if view.is_empty() {
        bail!("no series {}", SeriesKey::new(tool, benchmark));
    }

    let points = TrendAnalyzer::from_config(&config.detection).trend(&view)?;
    let unit = view.tail().map(|m| m.unit.as_str()).unwrap_or_default();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&points)?),
        OutputFormat::Markdown => print!("{}", markdown::series_report(view.key(), unit, &points)),
        OutputFormat::Text => {
            println!("{} ({})", view.key().to_string().bold(), unit);
            for point in &points {
                println!("{}", format_point(point));
            }
        }
    }
    Ok(())
}

fn format_point(point: &TrendPoint) -> String {
    let change = point
        .delta_ratio
        .map(|r| format!("{:+.2}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "  {}  {:<8} {:>20}  {}",
        point.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        point.commit_id.chars().take(7).collect::<String>(),
        point.value,
        change
    )
}

/// Counts of an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Measurements appended.
    pub imported: usize,
    /// Measurements already present or older than their series tail.
    pub skipped: usize,
}

/// Append every measurement of a dashboard document to `store`.
///
/// Rejected measurements are skipped so that importing the same document
/// twice is harmless; persistence failures abort.
pub async fn import_into(store: &HistoryStore, data: &DashboardData) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for measurement in data.measurements()? {
        let key = measurement.key();
        match store.append(measurement).await {
            Ok(_) => summary.imported += 1,
            Err(e) if e.is_rejection() => {
                warn!(series = %key, reason = %e, "Skipping measurement");
                summary.skipped += 1;
            }
            Err(e) => return Err(e).context("failed to persist imported history"),
        }
    }
    Ok(summary)
}

/// Import a dashboard `data.js` file.
pub async fn import(config: &AppConfig, input: &Path) -> Result<ImportSummary> {
    let data = io::read_dashboard(input)
        .with_context(|| format!("failed to read dashboard data from {}", input.display()))?;
    let store = open_store(config).await?;

    let summary = import_into(&store, &data).await?;
    store.shutdown().await?;

    println!(
        "Imported {} measurement(s), skipped {}",
        summary.imported, summary.skipped
    );
    Ok(summary)
}

/// Export the history as a dashboard `data.js` file.
pub async fn export(
    config: &AppConfig,
    output: &Path,
    repo_url: Option<String>,
    suite: Option<String>,
) -> Result<()> {
    let store = open_store(config).await?;
    let series = store.export();
    let data = DashboardData::from_series(
        series.values(),
        repo_url.unwrap_or_else(|| config.dashboard.repo_url.clone()),
        suite.unwrap_or_else(|| config.dashboard.suite.clone()),
        Utc::now(),
    );
    io::write_dashboard(&data, output)?;

    println!(
        "Exported {} measurement(s) in {} series to {}",
        data.bench_count(),
        series.len(),
        output.display()
    );
    Ok(())
}

/// Rewrite the history snapshot.
pub async fn checkpoint(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    store.checkpoint().await?;
    println!(
        "Checkpointed {} measurement(s) to {}",
        store.measurement_count(),
        config.storage.history_path.display()
    );
    Ok(())
}

/// Print history and configuration status.
pub async fn status(config: &AppConfig, detailed: bool) -> Result<()> {
    let store = open_store(config).await?;
    let d = &config.detection;

    println!("Benchwatch");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("History: {}", config.storage.history_path.display());
    println!(
        "Series: {}, measurements: {}",
        store.len(),
        store.measurement_count()
    );
    println!(
        "Detection: window {}, min samples {}, threshold {:.1}%, noise factor {}, default polarity {}",
        d.window_size,
        d.min_samples,
        d.regression_threshold * 100.0,
        d.noise_factor,
        d.default_polarity
    );

    if detailed {
        println!("\nSeries:");
        for (key, view) in store.export() {
            let last = view
                .tail()
                .map(|m| format!("{} {} @ {}", m.value, m.unit, m.commit.short_id()))
                .unwrap_or_default();
            println!(
                "  - {} ({} entries, {}): {}",
                key,
                view.len(),
                d.polarity_for(&key),
                last
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_report::io::write_dashboard;

    const RUN: &str = r#"{
        "commit": {
            "id": "196a17b1e734d7510cb48192b944361641ea29c3",
            "timestamp": "2025-06-24T16:46:08Z",
            "authorName": "Jane Doe",
            "authorEmail": "jane@example.com",
            "message": "perf: faster import"
        },
        "tool": "cargo",
        "recordedAt": "2025-06-24T19:26:14Z",
        "benchmarks": [
            { "name": "Block import", "value": 219844490108, "errorMargin": 361314238, "unit": "ns/iter" },
            { "name": "Parse", "value": 10.5, "errorMargin": 0.1, "unit": "ns/iter" }
        ]
    }"#;

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.history_path = dir.join("history.json");
        config
    }

    #[test]
    fn test_parse_run() {
        let run = parse_run(RUN).unwrap();
        assert_eq!(run.tool.as_deref(), Some("cargo"));
        assert_eq!(run.benchmarks.len(), 2);
        assert!(parse_run("{").is_err());
    }

    #[tokio::test]
    async fn test_ingest_writes_history_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let input = dir.path().join("run.json");
        std::fs::write(&input, RUN).unwrap();
        let outcomes = dir.path().join("out/outcomes.json");
        let summary = dir.path().join("out/summary.md");

        let report = ingest(&config, &input, Some(&outcomes), Some(&summary))
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.outcomes.len(), 2);

        let store = open_store(&config).await.unwrap();
        assert_eq!(store.measurement_count(), 2);
        assert_eq!(io::read_outcomes_json(&outcomes).unwrap().len(), 2);
        assert!(std::fs::read_to_string(&summary)
            .unwrap()
            .contains("196a17b1e734d7510cb48192b944361641ea29c3"));
    }

    #[tokio::test]
    async fn test_export_then_import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let input = dir.path().join("run.json");
        std::fs::write(&input, RUN).unwrap();
        ingest(&config, &input, None, None).await.unwrap();

        let data_js = dir.path().join("dev/bench/data.js");
        export(&config, &data_js, Some("https://example.com/repo".into()), None)
            .await
            .unwrap();

        // Re-importing into the same history skips everything.
        let summary = import(&config, &data_js).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 0, skipped: 2 });

        // Importing into a fresh history restores it.
        let fresh = HistoryStore::new();
        let data = io::read_dashboard(&data_js).unwrap();
        let summary = import_into(&fresh, &data).await.unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(fresh.series("cargo", "Block import")[0].error_margin, 361314238.0);

        write_dashboard(&data, dir.path().join("copy.js")).unwrap();
    }

    #[tokio::test]
    async fn test_series_of_unknown_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = series(&config, "cargo", "Nope", OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cargo::Nope"));
    }

    #[tokio::test]
    async fn test_corrupt_history_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.storage.history_path, "not json").unwrap();
        let err = status(&config, false).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to open history"));
    }
}
