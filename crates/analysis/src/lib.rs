// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trend analysis and regression detection for Benchwatch.
//!
//! - [`trend`] - Rolling baselines over a series ([`TrendAnalyzer`])
//! - [`regression`] - Classification against a baseline ([`RegressionDetector`])
//! - [`outcome`] - The classification result handed downstream

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod outcome;
pub mod regression;
pub mod trend;

pub use error::{AnalysisError, Result};
pub use outcome::{Classification, Outcome};
pub use regression::RegressionDetector;
pub use trend::{Baseline, TrendAnalyzer, TrendPoint, TrendSummary};
