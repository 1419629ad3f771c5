// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rolling baselines over a series.
//!
//! The newest entry of a series is the candidate under evaluation and is
//! never part of its own baseline. The baseline window is the `window_size`
//! entries immediately before it, cut short at the first entry recorded in a
//! different unit.

use crate::error::{AnalysisError, Result};
use benchwatch_core::{DetectionConfig, Measurement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary statistics of a baseline window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    /// Arithmetic mean of the window.
    pub mean: f64,
    /// Sample (n - 1) standard deviation; zero for a single sample.
    pub stddev: f64,
    /// Number of entries in the window.
    pub sample_count: usize,
    /// Unit shared by every entry in the window.
    pub unit: String,
}

impl Baseline {
    /// Fractional change of `value` from the mean, or `None` when the mean is
    /// within `zero_epsilon` of zero.
    pub fn delta_ratio(&self, value: f64, zero_epsilon: f64) -> Option<f64> {
        if self.mean.abs() <= zero_epsilon {
            None
        } else {
            Some((value - self.mean) / self.mean)
        }
    }
}

/// Result of a baseline computation.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendSummary {
    /// Enough history: the baseline to compare against.
    Baseline(Baseline),
    /// Not enough history to classify.
    InsufficientHistory {
        /// Usable predecessors found.
        available: usize,
        /// Predecessors required.
        required: usize,
    },
}

impl TrendSummary {
    /// The baseline, if one could be computed.
    pub fn baseline(&self) -> Option<&Baseline> {
        match self {
            Self::Baseline(b) => Some(b),
            Self::InsufficientHistory { .. } => None,
        }
    }
}

/// One point of a trend line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Commit measured.
    pub commit_id: String,
    /// Measured value.
    pub value: f64,
    /// Baseline in effect when the entry was ingested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
    /// Fractional change from that baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_ratio: Option<f64>,
}

/// Computes baselines over a trailing window of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAnalyzer {
    window_size: usize,
    min_samples: usize,
    zero_epsilon: f64,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(10, 3)
    }
}

impl TrendAnalyzer {
    /// Create an analyzer. Both sizes are clamped to at least 1.
    pub fn new(window_size: usize, min_samples: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            min_samples: min_samples.max(1),
            zero_epsilon: DetectionConfig::default().zero_epsilon,
        }
    }

    /// Create an analyzer from detection settings.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.window_size, config.min_samples).with_zero_epsilon(config.zero_epsilon)
    }

    /// Baseline means within `epsilon` of zero get no trend ratio.
    pub fn with_zero_epsilon(mut self, epsilon: f64) -> Self {
        self.zero_epsilon = epsilon;
        self
    }

    /// Window size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Minimum number of samples for a baseline.
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Baseline for the newest entry of `series`, computed from the entries
    /// before it.
    pub fn baseline(&self, series: &[Measurement]) -> Result<TrendSummary> {
        match series.split_last() {
            Some((candidate, history)) => self.baseline_before(history, &candidate.unit),
            None => Ok(TrendSummary::InsufficientHistory {
                available: 0,
                required: self.min_samples,
            }),
        }
    }

    /// Baseline for a candidate in `unit` that follows `history`.
    pub fn baseline_before(&self, history: &[Measurement], unit: &str) -> Result<TrendSummary> {
        let window: Vec<f64> = history
            .iter()
            .rev()
            .take_while(|m| m.unit == unit)
            .take(self.window_size)
            .map(|m| m.value)
            .collect();

        if window.len() < self.min_samples {
            return Ok(TrendSummary::InsufficientHistory {
                available: window.len(),
                required: self.min_samples,
            });
        }

        let (mean, stddev) = mean_and_stddev(&window);
        if !mean.is_finite() || !stddev.is_finite() {
            return Err(AnalysisError::NonFinite {
                mean,
                stddev,
                samples: window.len(),
            });
        }

        Ok(TrendSummary::Baseline(Baseline {
            mean,
            stddev,
            sample_count: window.len(),
            unit: unit.to_string(),
        }))
    }

    /// Trend line of a whole series: every entry paired with the baseline
    /// that was in effect when it was ingested.
    pub fn trend(&self, series: &[Measurement]) -> Result<Vec<TrendPoint>> {
        let mut points = Vec::with_capacity(series.len());
        for (i, m) in series.iter().enumerate() {
            let baseline = self.baseline_before(&series[..i], &m.unit)?.baseline().cloned();
            let delta_ratio = baseline
                .as_ref()
                .and_then(|b| b.delta_ratio(m.value, self.zero_epsilon));
            points.push(TrendPoint {
                recorded_at: m.recorded_at,
                commit_id: m.commit.id.clone(),
                value: m.value,
                baseline,
                delta_ratio,
            });
        }
        Ok(points)
    }
}

/// Mean and sample standard deviation (Welford's method).
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, &x) in values.iter().enumerate() {
        let delta = x - mean;
        mean += delta / (i + 1) as f64;
        m2 += delta * (x - mean);
    }
    let stddev = if values.len() > 1 {
        (m2 / (values.len() - 1) as f64).sqrt()
    } else {
        0.0
    };
    (mean, stddev)
}
