// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Benchwatch Collector
//!
//! Turns incoming benchmark payloads into classified outcomes. The
//! [`IngestionCoordinator`] owns a [`HistoryStore`](benchwatch_storage::HistoryStore)
//! and drives each payload through the ingestion cycle:
//!
//! ```text
//! Received -> Validated -> Merged -> Analyzed -> Completed
//! ```
//!
//! with `Rejected` and `Faulted` as the failure exits.
//!
//! ## Example
//!
//! ```no_run
//! use benchwatch_collector::IngestionCoordinator;
//! use benchwatch_core::{DetectionConfig, RunPayload};
//! use benchwatch_storage::HistoryStore;
//!
//! # async fn example(run: RunPayload) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = IngestionCoordinator::new(HistoryStore::new(), DetectionConfig::default());
//! let report = coordinator.ingest_run(&run).await?;
//! for outcome in report.regressions() {
//!     println!("{} regressed", outcome.key());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod coordinator;
pub mod error;
pub mod state;

pub use coordinator::{BenchmarkFailure, IngestionCoordinator, RunReport};
pub use error::{IngestError, Result};
pub use state::{IngestState, IngestionCycle, StateTransition};
