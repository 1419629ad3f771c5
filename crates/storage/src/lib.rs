// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark history storage for Benchwatch.
//!
//! The [`HistoryStore`] owns every series exclusively. It is mutated only
//! through [`HistoryStore::append`], which never overwrites or deletes prior
//! entries, and it round-trips losslessly through [`Snapshot`].
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> benchwatch_storage::Result<()> {
//! use benchwatch_storage::{FileBackend, HistoryStore};
//! use std::sync::Arc;
//!
//! let store = HistoryStore::open(Arc::new(FileBackend::new("history.json"))).await?;
//! let series = store.series("cargo", "Block import");
//! println!("{} entries", series.len());
//! store.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod snapshot;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, SnapshotBackend};
pub use error::{Result, StoreError};
pub use snapshot::{Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
pub use store::{HistoryStore, SeriesView};
