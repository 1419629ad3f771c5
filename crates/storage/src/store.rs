// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The append-only history store.
//!
//! # Concurrency
//!
//! Each series has its own FIFO writer lock, held across the
//! order-check-then-append sequence, so appends to one series are applied in
//! arrival order while appends to different series proceed in parallel.
//! Readers clone an `Arc` of the series under a brief read lock; appends are
//! copy-on-write, so a view handed out earlier never changes.
//!
//! # Durability
//!
//! With a backend attached, an append writes the full snapshot (including the
//! new entry) before publishing the entry in memory. A persistence failure
//! therefore leaves no visible mutation. Once the writer lock is held, the
//! commit runs in its own task and completes even if the caller is dropped.

use crate::backend::SnapshotBackend;
use crate::error::{Result, StoreError};
use crate::snapshot::Snapshot;
use benchwatch_core::{Measurement, SeriesKey};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Read-only, point-in-time view of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    key: SeriesKey,
    entries: Arc<Vec<Measurement>>,
}

impl SeriesView {
    fn new(key: SeriesKey, entries: Arc<Vec<Measurement>>) -> Self {
        Self { key, entries }
    }

    fn empty(key: SeriesKey) -> Self {
        Self::new(key, Arc::new(Vec::new()))
    }

    /// Series identity.
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Most recent entry.
    pub fn tail(&self) -> Option<&Measurement> {
        self.entries.last()
    }

    /// Entries in accepted order.
    pub fn entries(&self) -> &[Measurement] {
        &self.entries
    }
}

impl Deref for SeriesView {
    type Target = [Measurement];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

#[derive(Default)]
struct SeriesSlot {
    writer: Arc<Mutex<()>>,
    entries: RwLock<Arc<Vec<Measurement>>>,
}

impl SeriesSlot {
    fn with_entries(entries: Vec<Measurement>) -> Self {
        Self {
            writer: Arc::default(),
            entries: RwLock::new(Arc::new(entries)),
        }
    }

    fn read(&self) -> Arc<Vec<Measurement>> {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, key: SeriesKey, m: Measurement) -> SeriesView {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).push(m);
        SeriesView::new(key, Arc::clone(&guard))
    }
}

/// A resubmission of the tail: same commit with the same timestamp, or the
/// same commit with an identical result. The second form catches retries whose
/// `recorded_at` was stamped at ingestion time.
fn repeats_tail(tail: &Measurement, m: &Measurement) -> bool {
    if m.commit.id != tail.commit.id {
        return false;
    }
    m.recorded_at == tail.recorded_at
        || (m.value == tail.value && m.error_margin == tail.error_margin && m.unit == tail.unit)
}

struct StoreInner {
    series: DashMap<SeriesKey, Arc<SeriesSlot>>,
    backend: Option<Arc<dyn SnapshotBackend>>,
    persist: Mutex<()>,
}

impl StoreInner {
    fn slot(&self, key: &SeriesKey) -> Arc<SeriesSlot> {
        if let Some(slot) = self.series.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.series.entry(key.clone()).or_default().value())
    }

    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for item in self.series.iter() {
            let entries = item.value().read();
            if entries.is_empty() {
                continue;
            }
            snapshot
                .tools
                .entry(item.key().tool.clone())
                .or_default()
                .insert(
                    item.key().benchmark.clone(),
                    entries.iter().map(Into::into).collect(),
                );
        }
        snapshot.last_update = Some(Utc::now());
        snapshot
    }

    async fn commit(&self, key: SeriesKey, slot: &SeriesSlot, m: Measurement) -> Result<SeriesView> {
        if let Some(tail) = slot.read().last() {
            if m.recorded_at < tail.recorded_at {
                return Err(StoreError::OutOfOrder {
                    key,
                    recorded_at: m.recorded_at,
                    tail: tail.recorded_at,
                });
            }
            if repeats_tail(tail, &m) {
                return Err(StoreError::Duplicate {
                    key,
                    commit: m.commit.id,
                    recorded_at: tail.recorded_at,
                });
            }
        }

        let Some(backend) = &self.backend else {
            return Ok(slot.publish(key, m));
        };

        // Publishing inside the persist section keeps every later snapshot a
        // superset of what has been written.
        let _persist = self.persist.lock().await;
        let mut snapshot = self.snapshot();
        snapshot.insert(&m);
        backend.write(&snapshot.to_bytes()?).await?;
        debug!(series = %key, backend = %backend.describe(), "Snapshot persisted");

        Ok(slot.publish(key, m))
    }

    async fn checkpoint(&self) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let _persist = self.persist.lock().await;
        let snapshot = self.snapshot();
        backend.write(&snapshot.to_bytes()?).await?;
        info!(
            backend = %backend.describe(),
            measurements = snapshot.measurement_count(),
            "History checkpointed"
        );
        Ok(())
    }
}

/// Durable, append-only collection of benchmark series.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("series", &self.inner.series.len())
            .field(
                "backend",
                &self.inner.backend.as_ref().map(|b| b.describe()),
            )
            .finish()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    /// Create an empty, in-memory store without persistence.
    pub fn new() -> Self {
        Self::from_parts(BTreeMap::new(), None)
    }

    /// Create an empty store persisting to `backend`.
    pub fn with_backend(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self::from_parts(BTreeMap::new(), Some(backend))
    }

    /// Open the store persisted in `backend`.
    ///
    /// A backend that has never been written yields an empty store. A
    /// snapshot that cannot be decoded or validated is a fatal
    /// [`StoreError::Corruption`]: the store refuses to guess.
    pub async fn open(backend: Arc<dyn SnapshotBackend>) -> Result<Self> {
        let series = match backend.read().await? {
            Some(bytes) => Snapshot::from_bytes(&bytes)?.into_series()?,
            None => {
                info!(backend = %backend.describe(), "No history snapshot found, starting empty");
                BTreeMap::new()
            }
        };

        let store = Self::from_parts(series, Some(backend));
        info!(
            series = store.len(),
            measurements = store.measurement_count(),
            "History store opened"
        );
        Ok(store)
    }

    /// Load a store from serialized snapshot bytes, without persistence.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::from_snapshot(Snapshot::from_bytes(bytes)?)
    }

    /// Load a store from a decoded snapshot, without persistence.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        Ok(Self::from_parts(snapshot.into_series()?, None))
    }

    fn from_parts(
        series: BTreeMap<SeriesKey, Vec<Measurement>>,
        backend: Option<Arc<dyn SnapshotBackend>>,
    ) -> Self {
        let map = DashMap::new();
        for (key, entries) in series {
            map.insert(key, Arc::new(SeriesSlot::with_entries(entries)));
        }
        Self {
            inner: Arc::new(StoreInner {
                series: map,
                backend,
                persist: Mutex::new(()),
            }),
        }
    }

    /// Append a measurement to its series.
    ///
    /// Rejects with [`StoreError::OutOfOrder`] if the measurement is older
    /// than the series tail and with [`StoreError::Duplicate`] if it repeats
    /// the tail: same commit and timestamp, or same commit, value, error
    /// margin and unit at any later timestamp. Returns the series as of this append.
    pub async fn append(&self, measurement: Measurement) -> Result<SeriesView> {
        let key = measurement.key();
        let slot = self.inner.slot(&key);
        let guard = Arc::clone(&slot.writer).lock_owned().await;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _guard = guard;
            inner.commit(key, &slot, measurement).await
        })
        .await
        .map_err(|e| StoreError::Persistence(format!("append task failed: {e}")))?
    }

    /// Read-only view of a series; empty for unknown keys.
    pub fn series(&self, tool: &str, benchmark: &str) -> SeriesView {
        self.series_by_key(&SeriesKey::new(tool, benchmark))
    }

    /// Read-only view of the series identified by `key`.
    pub fn series_by_key(&self, key: &SeriesKey) -> SeriesView {
        match self.inner.series.get(key) {
            Some(slot) => SeriesView::new(key.clone(), slot.value().read()),
            None => SeriesView::empty(key.clone()),
        }
    }

    /// Keys of all non-empty series, sorted.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self
            .inner
            .series
            .iter()
            .filter(|item| !item.value().read().is_empty())
            .map(|item| item.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// All non-empty series, ordered by key.
    pub fn export(&self) -> BTreeMap<SeriesKey, SeriesView> {
        self.inner
            .series
            .iter()
            .map(|item| SeriesView::new(item.key().clone(), item.value().read()))
            .filter(|view| !view.is_empty())
            .map(|view| (view.key().clone(), view))
            .collect()
    }

    /// Number of non-empty series.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether the store holds no measurements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of measurements.
    pub fn measurement_count(&self) -> usize {
        self.inner.series.iter().map(|item| item.value().read().len()).sum()
    }

    /// Serializable snapshot of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }

    /// Whether appends are persisted.
    pub fn is_persistent(&self) -> bool {
        self.inner.backend.is_some()
    }

    /// Persist the full snapshot now. No-op without a backend.
    pub async fn checkpoint(&self) -> Result<()> {
        self.inner.checkpoint().await
    }

    /// Flush one final time before the store is dropped.
    pub async fn shutdown(self) -> Result<()> {
        self.inner.checkpoint().await?;
        info!("History store shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MockSnapshotBackend};
    use async_trait::async_trait;
    use benchwatch_core::CommitRef;
    use chrono::{DateTime, Duration, TimeZone};
    use std::time::Duration as StdDuration;

    /// Memory backend whose writes take a while.
    struct SlowBackend {
        inner: MemoryBackend,
        delay: StdDuration,
    }

    #[async_trait]
    impl SnapshotBackend for SlowBackend {
        async fn read(&self) -> Result<Option<Vec<u8>>> {
            self.inner.read().await
        }

        async fn write(&self, bytes: &[u8]) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(bytes).await
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    fn slow_store() -> (HistoryStore, Arc<SlowBackend>) {
        let backend = Arc::new(SlowBackend {
            inner: MemoryBackend::new(),
            delay: StdDuration::from_millis(100),
        });
        (HistoryStore::with_backend(backend.clone()), backend)
    }

    fn t(offset_s: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 24, 19, 0, 0).unwrap() + Duration::seconds(offset_s)
    }

    fn commit(id: &str) -> CommitRef {
        CommitRef {
            id: id.to_string(),
            timestamp: t(-3600),
            author_name: "Jane Doe".to_string(),
            author_email: "jane@example.com".to_string(),
            message: "perf".to_string(),
            url: None,
            tree_id: None,
            author_username: None,
            committer: None,
            distinct: None,
        }
    }

    fn measurement(bench: &str, value: f64, offset_s: i64) -> Measurement {
        Measurement::builder()
            .tool("cargo")
            .benchmark(bench)
            .value(value)
            .unit("ns/iter")
            .commit(commit(&format!("c{offset_s}")))
            .recorded_at(t(offset_s))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = HistoryStore::new();
        store.append(measurement("BlockImport", 10.0, 0)).await.unwrap();
        let view = store.append(measurement("BlockImport", 11.0, 1)).await.unwrap();

        assert_eq!(view.len(), 2);
        assert_eq!(view.tail().unwrap().value, 11.0);
        assert_eq!(store.series("cargo", "BlockImport").len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_series_is_empty() {
        let store = HistoryStore::new();
        let view = store.series("cargo", "Nope");
        assert!(view.is_empty());
        assert_eq!(view.key(), &SeriesKey::new("cargo", "Nope"));
    }

    #[tokio::test]
    async fn test_out_of_order_rejected_and_series_unchanged() {
        let store = HistoryStore::new();
        store.append(measurement("BlockImport", 10.0, 10)).await.unwrap();

        let err = store
            .append(measurement("BlockImport", 9.0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { .. }));

        let view = store.series("cargo", "BlockImport");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].value, 10.0);
    }

    #[tokio::test]
    async fn test_equal_timestamp_from_other_commit_accepted() {
        let store = HistoryStore::new();
        store.append(measurement("BlockImport", 10.0, 10)).await.unwrap();
        let mut m = measurement("BlockImport", 10.5, 10);
        m.commit.id = "other".to_string();
        assert!(store.append(m).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_tail_rejected() {
        let store = HistoryStore::new();
        store.append(measurement("BlockImport", 10.0, 10)).await.unwrap();
        let err = store
            .append(measurement("BlockImport", 10.0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert!(err.is_rejection());
        assert_eq!(store.measurement_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_later_timestamp_is_duplicate() {
        let store = HistoryStore::new();
        let first = measurement("BlockImport", 10.0, 10);
        store.append(first.clone()).await.unwrap();

        let mut retry = first.clone();
        retry.recorded_at = t(11);
        let err = store.append(retry).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { recorded_at, .. } if recorded_at == t(10)));

        let mut rerun = first;
        rerun.recorded_at = t(12);
        rerun.value = 10.5;
        store.append(rerun).await.unwrap();
        assert_eq!(store.measurement_count(), 2);
    }

    #[tokio::test]
    async fn test_views_are_point_in_time() {
        let store = HistoryStore::new();
        store.append(measurement("BlockImport", 10.0, 0)).await.unwrap();
        let before = store.series("cargo", "BlockImport");
        store.append(measurement("BlockImport", 11.0, 1)).await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.series("cargo", "BlockImport").len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_no_mutation() {
        let mut backend = MockSnapshotBackend::new();
        backend
            .expect_write()
            .returning(|_| Err(StoreError::Persistence("disk full".to_string())));
        backend.expect_describe().return_const("mock".to_string());

        let store = HistoryStore::with_backend(Arc::new(backend));
        let err = store
            .append(measurement("BlockImport", 10.0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.series("cargo", "BlockImport").is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_append_persists_before_returning() {
        let backend = Arc::new(MemoryBackend::new());
        let store = HistoryStore::with_backend(backend.clone());
        store.append(measurement("BlockImport", 10.0, 0)).await.unwrap();
        store.append(measurement("Trie", 3.0, 0)).await.unwrap();

        let bytes = backend.contents().await.unwrap();
        let reopened = HistoryStore::load(&bytes).unwrap();
        assert_eq!(reopened.export(), store.export());
    }

    #[tokio::test]
    async fn test_open_missing_snapshot_is_empty() {
        let store = HistoryStore::open(Arc::new(MemoryBackend::new())).await.unwrap();
        assert!(store.is_empty());
        assert!(store.is_persistent());
    }

    #[tokio::test]
    async fn test_open_corrupt_snapshot_fails() {
        let backend = MemoryBackend::with_contents(b"{\"version\":1,\"tools\":".to_vec());
        let err = HistoryStore::open(Arc::new(backend)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)));
    }

    #[tokio::test]
    async fn test_concurrent_appends_same_key_are_serialized() {
        let store = HistoryStore::with_backend(Arc::new(MemoryBackend::new()));
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(measurement("BlockImport", i as f64, i)).await
            }));
        }
        for handle in handles {
            // Later timestamps may land first; those leave earlier ones out of order.
            let _ = handle.await.unwrap();
        }

        let view = store.series("cargo", "BlockImport");
        assert!(!view.is_empty());
        assert!(view.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
    }

    #[tokio::test]
    async fn test_concurrent_appends_distinct_keys_all_land() {
        let backend = Arc::new(MemoryBackend::new());
        let store = HistoryStore::with_backend(backend.clone());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(measurement(&format!("bench-{i}"), 1.0, 0)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len(), 16);
        let persisted = HistoryStore::load(&backend.contents().await.unwrap()).unwrap();
        assert_eq!(persisted.len(), 16);
    }

    #[tokio::test]
    async fn test_commit_survives_caller_abort() {
        let (store, backend) = slow_store();
        let handle = {
            let store = store.clone();
            tokio::spawn(async move { store.append(measurement("BlockImport", 1.0, 0)).await })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(StdDuration::from_millis(250)).await;
        assert_eq!(store.series("cargo", "BlockImport").len(), 1);
        let persisted = HistoryStore::load(&backend.inner.contents().await.unwrap()).unwrap();
        assert_eq!(persisted.measurement_count(), 1);
    }

    #[tokio::test]
    async fn test_abort_while_waiting_for_writer_appends_nothing() {
        let (store, _backend) = slow_store();
        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.append(measurement("BlockImport", 1.0, 0)).await })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let waiting = {
            let store = store.clone();
            tokio::spawn(async move { store.append(measurement("BlockImport", 2.0, 1)).await })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        first.await.unwrap().unwrap();
        tokio::time::sleep(StdDuration::from_millis(250)).await;

        let view = store.series("cargo", "BlockImport");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_checkpoint_and_shutdown_flush() {
        let backend = Arc::new(MemoryBackend::new());
        let store = HistoryStore::with_backend(backend.clone());
        store.checkpoint().await.unwrap();
        let empty = HistoryStore::load(&backend.contents().await.unwrap()).unwrap();
        assert!(empty.is_empty());

        store.append(measurement("BlockImport", 1.0, 0)).await.unwrap();
        store.clone().shutdown().await.unwrap();
        let flushed = HistoryStore::load(&backend.contents().await.unwrap()).unwrap();
        assert_eq!(flushed.measurement_count(), 1);
    }

    #[tokio::test]
    async fn test_keys_skip_series_left_empty_by_rejection() {
        let mut backend = MockSnapshotBackend::new();
        backend
            .expect_write()
            .returning(|_| Err(StoreError::Persistence("io".to_string())));
        backend.expect_describe().return_const("mock".to_string());
        let store = HistoryStore::with_backend(Arc::new(backend));

        let _ = store.append(measurement("BlockImport", 1.0, 0)).await;
        assert!(store.keys().is_empty());
        assert!(store.snapshot().tools.is_empty());
    }
}
