// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The result of classifying one measurement.

use crate::trend::Baseline;
use benchwatch_core::{Measurement, Polarity, SeriesKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a measurement compares to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Within threshold or noise, or not enough history to tell.
    Normal,
    /// Significant change in the better direction.
    Improved,
    /// Significant change in the worse direction.
    Regressed,
}

impl Classification {
    /// Lowercase label, used for metrics and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Improved => "improved",
            Self::Regressed => "regressed",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Improved => f.write_str("Improved"),
            Self::Regressed => f.write_str("Regressed"),
        }
    }
}

/// Classification of one newly appended measurement.
///
/// Transient: handed to the notifier and renderer, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Verdict.
    pub classification: Classification,
    /// Signed fractional change from the baseline mean. `None` without a
    /// baseline or when the mean is too close to zero for a ratio.
    pub delta_ratio: Option<f64>,
    /// Signed absolute change from the baseline mean.
    pub delta: Option<f64>,
    /// Polarity the verdict was computed with.
    pub polarity: Polarity,
    /// The measurement that was appended.
    pub measurement: Measurement,
    /// Baseline compared against, if there was enough history.
    pub baseline: Option<Baseline>,
}

impl Outcome {
    /// Series the measurement belongs to.
    pub fn key(&self) -> SeriesKey {
        self.measurement.key()
    }

    /// Whether the notifier should raise an alert.
    pub fn should_alert(&self) -> bool {
        self.classification == Classification::Regressed
    }
}
