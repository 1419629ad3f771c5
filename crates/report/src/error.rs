//! Report errors.

use thiserror::Error;

/// Errors produced while reading or writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The dashboard document is malformed.
    #[error("invalid dashboard data: {0}")]
    Dashboard(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
