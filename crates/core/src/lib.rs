// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for Benchwatch.
//!
//! This crate holds the data model shared by every other Benchwatch crate:
//!
//! - [`model`] - Commits, measurements, series keys and metric polarity
//! - [`payload`] - Ingestion payloads submitted by CI, and their validation
//! - [`config`] - Layered configuration (defaults, file, environment)
//! - [`error`] - The core error type

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod model;
pub mod payload;

pub use config::{
    AppConfig, DashboardConfig, DetectionConfig, LoggingConfig, PolarityRule, ServerConfig,
    StorageConfig,
};
pub use error::{Error, Result};
pub use model::{CommitRef, Committer, Measurement, MeasurementBuilder, Polarity, SeriesKey};
pub use payload::{BenchmarkEntry, BenchmarkPayload, CommitPayload, RunPayload};
