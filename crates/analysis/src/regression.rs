// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regression classification.
//!
//! A measurement is classified against its baseline by two gates that must
//! both pass: the relative change must exceed `regression_threshold`, and the
//! absolute change must exceed `noise_factor` standard deviations of the
//! baseline. The direction of the change, read through the benchmark's
//! polarity, decides between `Regressed` and `Improved`.

use crate::outcome::{Classification, Outcome};
use crate::trend::TrendSummary;
use benchwatch_core::{DetectionConfig, Measurement, Polarity};

/// Classifies measurements against their baselines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionDetector {
    regression_threshold: f64,
    noise_factor: f64,
    zero_epsilon: f64,
    absolute_threshold: f64,
}

impl Default for RegressionDetector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl RegressionDetector {
    /// Create a detector from detection settings.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            regression_threshold: config.regression_threshold,
            noise_factor: config.noise_factor,
            zero_epsilon: config.zero_epsilon,
            absolute_threshold: config.absolute_threshold,
        }
    }

    /// Set the fractional change threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.regression_threshold = threshold;
        self
    }

    /// Set the noise factor.
    pub fn with_noise_factor(mut self, noise_factor: f64) -> Self {
        self.noise_factor = noise_factor;
        self
    }

    /// Set the near-zero fallback: baseline means within `epsilon` of zero
    /// are gated on an absolute change greater than `absolute_threshold`.
    pub fn with_zero_fallback(mut self, epsilon: f64, absolute_threshold: f64) -> Self {
        self.zero_epsilon = epsilon;
        self.absolute_threshold = absolute_threshold;
        self
    }

    /// Classify `measurement` against `summary`.
    ///
    /// Insufficient history always classifies as `Normal`.
    pub fn classify(
        &self,
        measurement: &Measurement,
        summary: &TrendSummary,
        polarity: Polarity,
    ) -> Outcome {
        let Some(baseline) = summary.baseline() else {
            return Outcome {
                classification: Classification::Normal,
                delta_ratio: None,
                delta: None,
                polarity,
                measurement: measurement.clone(),
                baseline: None,
            };
        };

        let delta = measurement.value - baseline.mean;
        let delta_ratio = baseline.delta_ratio(measurement.value, self.zero_epsilon);
        let beyond_threshold = match delta_ratio {
            Some(ratio) => ratio.abs() > self.regression_threshold,
            None => delta.abs() > self.absolute_threshold,
        };
        let beyond_noise = delta.abs() > self.noise_factor * baseline.stddev;

        let classification = if beyond_threshold && beyond_noise {
            if polarity.is_worse(baseline.mean, measurement.value) {
                Classification::Regressed
            } else {
                Classification::Improved
            }
        } else {
            Classification::Normal
        };

        Outcome {
            classification,
            delta_ratio,
            delta: Some(delta),
            polarity,
            measurement: measurement.clone(),
            baseline: Some(baseline.clone()),
        }
    }
}
