// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! API error responses.
//!
//! Every error is rendered as
//! `{"error": {"code", "message"}, "meta": {"timestamp"}}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use benchwatch_analysis::AnalysisError;
use benchwatch_collector::IngestError;
use benchwatch_storage::StoreError;
use chrono::Utc;
use serde_json::json;

/// Error response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            },
            "meta": {
                "timestamp": Utc::now().to_rfc3339(),
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match &err {
            IngestError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
            IngestError::Rejected(StoreError::OutOfOrder { .. }) => {
                (StatusCode::CONFLICT, "OUT_OF_ORDER")
            }
            IngestError::Rejected(StoreError::Duplicate { .. }) => {
                (StatusCode::CONFLICT, "DUPLICATE")
            }
            IngestError::Rejected(_) => (StatusCode::CONFLICT, "REJECTED"),
            IngestError::Persistence(_) => (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_FAILED"),
            IngestError::Analysis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ANALYSIS_FAILED"),
            IngestError::IllegalTransition { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ANALYSIS_FAILED",
            err.to_string(),
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "INVALID_JSON", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("INVALID_QUERY", rejection.body_text())
    }
}
