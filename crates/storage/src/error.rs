// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the history store.

use benchwatch_core::SeriesKey;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during history store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The measurement is older than the series tail.
    #[error(
        "out-of-order measurement for {key}: recordedAt {recorded_at} precedes series tail {tail}"
    )]
    OutOfOrder {
        /// Series the append targeted.
        key: SeriesKey,
        /// Timestamp of the already recorded tail.
        recorded_at: DateTime<Utc>,
        /// Timestamp of the current tail.
        tail: DateTime<Utc>,
    },

    /// The measurement repeats the series tail.
    #[error("duplicate measurement for {key}: commit {commit} at {recorded_at} is already recorded")]
    Duplicate {
        /// Series the append targeted.
        key: SeriesKey,
        /// Commit id of the rejected measurement.
        commit: String,
        /// Timestamp of the already recorded tail.
        recorded_at: DateTime<Utc>,
    },

    /// Writing to or reading from the backing store failed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A persisted snapshot could not be decoded or violates a series invariant.
    #[error("corrupt history snapshot: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Whether the error rejected the measurement without touching storage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::OutOfOrder { .. } | Self::Duplicate { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
