//! Outcome export records.
//!
//! The flat, camelCase shape handed to external notifiers and renderers.

use benchwatch_analysis::{Baseline, Classification, Outcome};
use benchwatch_core::{Measurement, Polarity};
use serde::{Deserialize, Serialize};

/// Exported form of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeExport {
    /// Tool that produced the measurement.
    pub tool: String,
    /// Benchmark name.
    pub benchmark_name: String,
    /// Verdict.
    pub classification: Classification,
    /// Signed fractional change from the baseline mean.
    pub delta_ratio: Option<f64>,
    /// Signed absolute change from the baseline mean.
    pub delta: Option<f64>,
    /// Polarity used for the verdict.
    pub polarity: Polarity,
    /// Whether the notifier should alert.
    pub alert: bool,
    /// The appended measurement.
    pub measurement: Measurement,
    /// Baseline compared against.
    pub baseline: Option<Baseline>,
}

impl From<&Outcome> for OutcomeExport {
    fn from(outcome: &Outcome) -> Self {
        Self {
            tool: outcome.measurement.tool_name.clone(),
            benchmark_name: outcome.measurement.benchmark_name.clone(),
            classification: outcome.classification,
            delta_ratio: outcome.delta_ratio,
            delta: outcome.delta,
            polarity: outcome.polarity,
            alert: outcome.should_alert(),
            measurement: outcome.measurement.clone(),
            baseline: outcome.baseline.clone(),
        }
    }
}

impl From<Outcome> for OutcomeExport {
    fn from(outcome: Outcome) -> Self {
        Self::from(&outcome)
    }
}

/// Export a batch of outcomes.
pub fn export_all(outcomes: &[Outcome]) -> Vec<OutcomeExport> {
    outcomes.iter().map(OutcomeExport::from).collect()
}
