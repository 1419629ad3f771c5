// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Analysis errors.

use thiserror::Error;

/// Errors that can occur while computing baselines.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The window statistics overflowed.
    #[error("baseline statistics are not finite (mean {mean}, stddev {stddev} over {samples} samples)")]
    NonFinite {
        /// Computed mean.
        mean: f64,
        /// Computed standard deviation.
        stddev: f64,
        /// Window size used.
        samples: usize,
    },
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
