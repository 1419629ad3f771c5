//! Markdown report generation.
//!
//! Summaries of ingestion outcomes and per-series trend reports, suitable
//! for CI job summaries and pull request comments.

use benchwatch_analysis::{Classification, Outcome, TrendPoint};
use benchwatch_collector::RunReport;
use benchwatch_core::SeriesKey;
use chrono::{DateTime, Utc};
use std::fmt::{self, Write};

fn render(f: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = f(&mut output);
    output
}

fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:+.2}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

fn marker(classification: Classification) -> &'static str {
    match classification {
        Classification::Normal => "",
        Classification::Improved => " :rocket:",
        Classification::Regressed => " :warning:",
    }
}

fn write_outcome_table(output: &mut String, outcomes: &[Outcome]) -> fmt::Result {
    writeln!(output, "| Series | Value | Baseline | Change | Result |")?;
    writeln!(output, "|--------|-------|----------|--------|--------|")?;

    for outcome in outcomes {
        let m = &outcome.measurement;
        let baseline = match &outcome.baseline {
            Some(b) => format!("{:.2} ± {:.2} (n={})", b.mean, b.stddev, b.sample_count),
            None => "insufficient history".to_string(),
        };
        writeln!(
            output,
            "| `{}` | {} {} | {} | {} | {}{} |",
            outcome.key(),
            m.value,
            m.unit,
            baseline,
            format_ratio(outcome.delta_ratio),
            outcome.classification,
            marker(outcome.classification)
        )?;
    }
    Ok(())
}

/// Generate a markdown summary of classified outcomes.
pub fn outcome_summary(outcomes: &[Outcome], generated: DateTime<Utc>) -> String {
    render(|output| {
        let regressions = outcomes.iter().filter(|o| o.should_alert()).count();

        writeln!(output, "# Benchmark Summary")?;
        writeln!(output)?;
        writeln!(output, "Generated: {}", generated.to_rfc3339())?;
        writeln!(output)?;
        writeln!(output, "## Results")?;
        writeln!(output)?;
        write_outcome_table(output, outcomes)?;
        writeln!(output)?;
        writeln!(output, "---")?;
        writeln!(
            output,
            "Total benchmarks: {}, regressions: {}",
            outcomes.len(),
            regressions
        )
    })
}

/// Generate a markdown report for one ingested run, including the
/// benchmarks that failed their cycle.
pub fn run_summary(report: &RunReport, generated: DateTime<Utc>) -> String {
    render(|output| {
        writeln!(output, "# Benchmark Run `{}`", report.commit_id)?;
        writeln!(output)?;
        writeln!(output, "Tool: {}", report.tool)?;
        writeln!(output, "Generated: {}", generated.to_rfc3339())?;
        writeln!(output)?;

        if report.has_regressions() {
            writeln!(output, "## Regressions")?;
            writeln!(output)?;
            for outcome in report.regressions() {
                writeln!(
                    output,
                    "- `{}`: {} {} ({})",
                    outcome.key(),
                    outcome.measurement.value,
                    outcome.measurement.unit,
                    format_ratio(outcome.delta_ratio)
                )?;
            }
            writeln!(output)?;
        }

        writeln!(output, "## Results")?;
        writeln!(output)?;
        write_outcome_table(output, &report.outcomes)?;

        if !report.failures.is_empty() {
            writeln!(output)?;
            writeln!(output, "## Not ingested")?;
            writeln!(output)?;
            writeln!(output, "| Benchmark | State | Reason |")?;
            writeln!(output, "|-----------|-------|--------|")?;
            for failure in &report.failures {
                writeln!(
                    output,
                    "| `{}` | {} | {} |",
                    failure.benchmark, failure.state, failure.reason
                )?;
            }
        }
        Ok(())
    })
}

/// Generate a trend report for one series.
pub fn series_report(key: &SeriesKey, unit: &str, points: &[TrendPoint]) -> String {
    render(|output| {
        writeln!(output, "# {}", key)?;
        writeln!(output)?;
        writeln!(output, "Unit: {}", unit)?;
        writeln!(output)?;
        writeln!(output, "| Recorded | Commit | Value | Baseline mean | Change |")?;
        writeln!(output, "|----------|--------|-------|---------------|--------|")?;

        for point in points {
            let mean = point
                .baseline
                .as_ref()
                .map(|b| format!("{:.2}", b.mean))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                output,
                "| {} | `{}` | {} | {} | {} |",
                point.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
                point.commit_id.chars().take(7).collect::<String>(),
                point.value,
                mean,
                format_ratio(point.delta_ratio)
            )?;
        }

        writeln!(output)?;
        writeln!(output, "---")?;
        writeln!(output, "Total entries: {}", points.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::outcome;
    use benchwatch_analysis::TrendAnalyzer;
    use benchwatch_collector::{BenchmarkFailure, IngestState};
    use chrono::TimeZone;

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 25, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_outcome_summary() {
        let outcomes = vec![
            outcome(130.0, Some(100.0), Classification::Regressed),
            outcome(100.0, None, Classification::Normal),
        ];
        let md = outcome_summary(&outcomes, generated());

        assert!(md.starts_with("# Benchmark Summary"));
        assert!(md.contains("| `cargo::BlockImport` | 130 ns/iter |"));
        assert!(md.contains("+30.00%"));
        assert!(md.contains("Regressed :warning:"));
        assert!(md.contains("insufficient history"));
        assert!(md.contains("Total benchmarks: 2, regressions: 1"));
    }

    #[test]
    fn test_run_summary_lists_failures() {
        let report = RunReport {
            tool: "cargo".to_string(),
            commit_id: "abc123".to_string(),
            outcomes: vec![outcome(130.0, Some(100.0), Classification::Regressed)],
            failures: vec![BenchmarkFailure {
                benchmark: "Parse".to_string(),
                state: IngestState::Rejected,
                code: "out_of_order".to_string(),
                reason: "rejected: out of order".to_string(),
            }],
        };
        let md = run_summary(&report, generated());

        assert!(md.contains("# Benchmark Run `abc123`"));
        assert!(md.contains("## Regressions"));
        assert!(md.contains("## Not ingested"));
        assert!(md.contains("| `Parse` | rejected |"));
    }

    #[test]
    fn test_series_report() {
        let series: Vec<_> = [10.0, 20.0, 30.0, 60.0]
            .iter()
            .map(|&v| outcome(v, None, Classification::Normal).measurement)
            .collect();
        let points = TrendAnalyzer::new(2, 2).trend(&series).unwrap();
        let md = series_report(&SeriesKey::new("cargo", "BlockImport"), "ns/iter", &points);

        assert!(md.starts_with("# cargo::BlockImport"));
        assert!(md.contains("| 25.00 | +140.00% |"));
        assert!(md.contains("Total entries: 4"));
    }
}
