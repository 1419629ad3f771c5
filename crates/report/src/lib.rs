//! Reporting for Benchwatch.
//!
//! Everything downstream consumers need from the engine: flat outcome
//! exports for notifiers, Markdown summaries for humans, and the dashboard
//! `data.js` document for the plotting front-end.
//!
//! # Quick Start
//!
//! ```no_run
//! use benchwatch_report::{io, DashboardData};
//! use benchwatch_storage::HistoryStore;
//! use chrono::Utc;
//!
//! # fn demo(store: &HistoryStore) -> benchwatch_report::Result<()> {
//! let series = store.export();
//! let data = DashboardData::from_series(series.values(), "https://github.com/org/repo", "Benchmark", Utc::now());
//! io::write_dashboard(&data, "dev/bench/data.js")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`export`] - The `OutcomeExport` record
//! - [`markdown`] - Markdown report generation
//! - [`dashboard`] - `window.BENCHMARK_DATA` render and import
//! - [`io`] - Reading and writing report files

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod dashboard;
pub mod error;
pub mod export;
pub mod io;
pub mod markdown;

pub use dashboard::DashboardData;
pub use error::{ReportError, Result};
pub use export::{export_all, OutcomeExport};
