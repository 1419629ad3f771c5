// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the Benchwatch core crate.

use thiserror::Error;

/// Errors produced while building or validating core types.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is absent or a value failed a shape check.
    #[error("{field}: {reason}")]
    Validation {
        /// Dotted path of the offending field (e.g. `benchmarks[2].unit`).
        field: String,
        /// What the check expected.
        reason: String,
    },

    /// Generic invalid input that is not tied to a single field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be assembled from its sources.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Create a validation error for `field`.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Field name for validation errors, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
