// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request context middleware for the Ingest API.
//!
//! Takes the request id from the `x-request-id` header (or generates one),
//! runs the request inside a span carrying it, injects the
//! [`RequestContext`] into request extensions and echoes the id back on the
//! response.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::ApiError;

/// Request id header.
pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Caller-supplied or generated request id.
    pub request_id: String,
    /// When the request arrived.
    pub received_at: DateTime<Utc>,
}

fn valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}

/// Middleware establishing the [`RequestContext`].
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| valid_request_id(id))
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
        received_at: Utc::now(),
    });

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Extractor for the [`RequestContext`] set by the middleware.
#[derive(Debug, Clone)]
pub struct ReqContext(pub RequestContext);

impl std::ops::Deref for ReqContext {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ReqContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(ReqContext)
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MISSING_REQUEST_CONTEXT",
                    "Request context not found. Ensure the request context middleware is applied.",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_validation() {
        assert!(valid_request_id("ci-run-42"));
        assert!(!valid_request_id(""));
        assert!(!valid_request_id("has space"));
        assert!(!valid_request_id(&"x".repeat(129)));
    }
}
