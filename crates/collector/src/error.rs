// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingestion errors.

use crate::state::IngestState;
use benchwatch_analysis::AnalysisError;
use benchwatch_storage::StoreError;
use thiserror::Error;

/// Errors that end an ingestion cycle.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload is malformed. Nothing was appended.
    #[error("validation failed: {0}")]
    Validation(benchwatch_core::Error),

    /// The store refused the measurement (out of order or duplicate).
    /// Nothing was appended.
    #[error("rejected: {0}")]
    Rejected(StoreError),

    /// Persisting the history failed. Nothing was appended; retry the cycle.
    #[error("faulted: {0}")]
    Persistence(StoreError),

    /// Computing the baseline failed after the measurement was appended.
    #[error("faulted: {0}")]
    Analysis(#[from] AnalysisError),

    /// The cycle attempted an illegal state change.
    #[error("illegal ingestion state transition: {from} -> {to}")]
    IllegalTransition {
        /// State the cycle was in.
        from: IngestState,
        /// State it tried to enter.
        to: IngestState,
    },
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        if err.is_rejection() {
            IngestError::Rejected(err)
        } else {
            IngestError::Persistence(err)
        }
    }
}

impl From<benchwatch_core::Error> for IngestError {
    fn from(err: benchwatch_core::Error) -> Self {
        IngestError::Validation(err)
    }
}

impl IngestError {
    /// Terminal state the cycle ends in.
    pub fn state(&self) -> IngestState {
        match self {
            Self::Validation(_) | Self::Rejected(_) => IngestState::Rejected,
            Self::Persistence(_) | Self::Analysis(_) | Self::IllegalTransition { .. } => {
                IngestState::Faulted
            }
        }
    }

    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Rejected(StoreError::OutOfOrder { .. }) => "out_of_order",
            Self::Rejected(StoreError::Duplicate { .. }) => "duplicate",
            Self::Rejected(_) => "rejected",
            Self::Persistence(_) => "persistence",
            Self::Analysis(_) => "analysis",
            Self::IllegalTransition { .. } => "internal",
        }
    }

    /// Whether the payload itself was refused (as opposed to a fault).
    pub fn is_rejection(&self) -> bool {
        self.state() == IngestState::Rejected
    }

    /// Whether the measurement was older than its series tail.
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, Self::Rejected(StoreError::OutOfOrder { .. }))
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
