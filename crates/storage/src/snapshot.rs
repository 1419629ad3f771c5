// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persisted snapshot format.
//!
//! A snapshot maps tool → benchmark name → ordered entries. It is the single
//! source of truth for history; baselines are never persisted and are
//! recomputed from the series after load.

use crate::error::{Result, StoreError};
use benchwatch_core::{CommitRef, Measurement, SeriesKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted datapoint. Tool and benchmark name are implied by its
/// position in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    /// Summary value.
    pub value: f64,
    /// Dispersion of the value.
    pub error_margin: f64,
    /// Unit tag.
    pub unit: String,
    /// Code version measured.
    pub commit: CommitRef,
    /// When the run was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl From<&Measurement> for SnapshotEntry {
    fn from(m: &Measurement) -> Self {
        Self {
            value: m.value,
            error_margin: m.error_margin,
            unit: m.unit.clone(),
            commit: m.commit.clone(),
            recorded_at: m.recorded_at,
        }
    }
}

/// Serializable form of the whole history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// tool → benchmark → entries in accepted order.
    #[serde(default)]
    pub tools: BTreeMap<String, BTreeMap<String, Vec<SnapshotEntry>>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            last_update: None,
            tools: BTreeMap::new(),
        }
    }

    /// Append a measurement to its series within the snapshot.
    pub fn insert(&mut self, m: &Measurement) {
        self.tools
            .entry(m.tool_name.clone())
            .or_default()
            .entry(m.benchmark_name.clone())
            .or_default()
            .push(SnapshotEntry::from(m));
    }

    /// Total number of entries across all series.
    pub fn measurement_count(&self) -> usize {
        self.tools
            .values()
            .flat_map(|benches| benches.values())
            .map(Vec::len)
            .sum()
    }

    /// Encode as pretty-printed JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Persistence(format!("failed to encode snapshot: {e}")))
    }

    /// Decode from JSON. Any decoding failure is a corruption error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Corruption(format!("invalid snapshot JSON: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Corruption(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Convert into validated series.
    ///
    /// Every entry must satisfy the measurement invariants and each series
    /// must be in non-decreasing `recordedAt` order; anything else means the
    /// snapshot cannot be trusted.
    pub fn into_series(self) -> Result<BTreeMap<SeriesKey, Vec<Measurement>>> {
        let mut out = BTreeMap::new();

        for (tool, benches) in self.tools {
            for (benchmark, entries) in benches {
                let key = SeriesKey::new(&tool, &benchmark);
                let mut series: Vec<Measurement> = Vec::with_capacity(entries.len());

                for (i, entry) in entries.into_iter().enumerate() {
                    let m = Measurement::builder()
                        .tool(&tool)
                        .benchmark(&benchmark)
                        .value(entry.value)
                        .error_margin(entry.error_margin)
                        .unit(entry.unit)
                        .commit(entry.commit)
                        .recorded_at(entry.recorded_at)
                        .build()
                        .map_err(|e| StoreError::Corruption(format!("{key}[{i}]: {e}")))?;

                    if let Some(prev) = series.last() {
                        if m.recorded_at < prev.recorded_at {
                            return Err(StoreError::Corruption(format!(
                                "{key}[{i}]: recordedAt {} precedes previous entry {}",
                                m.recorded_at, prev.recorded_at
                            )));
                        }
                    }
                    series.push(m);
                }

                if !series.is_empty() {
                    out.insert(key, series);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn commit(id: &str) -> CommitRef {
        CommitRef {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 24, 16, 46, 8).unwrap(),
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

    fn measurement(value: f64, offset_s: i64) -> Measurement {
        Measurement::builder()
            .tool("cargo")
            .benchmark("BlockImport")
            .value(value)
            .unit("ns/iter")
            .commit(commit("abc"))
            .recorded_at(Utc.with_ymd_and_hms(2025, 6, 25, 0, 0, 0).unwrap() + Duration::seconds(offset_s))
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_groups_by_tool_and_benchmark() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(&measurement(1.0, 0));
        snapshot.insert(&measurement(2.0, 1));
        assert_eq!(snapshot.measurement_count(), 2);
        assert_eq!(snapshot.tools["cargo"]["BlockImport"].len(), 2);
    }

    #[test]
    fn test_garbage_is_corruption() {
        let err = Snapshot::from_bytes(b"{ not json").unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)));
    }

    #[test]
    fn test_unknown_version_is_corruption() {
        let err = Snapshot::from_bytes(br#"{"version": 99, "tools": {}}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version 99"));
    }

    #[test]
    fn test_out_of_order_entries_are_corruption() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(&measurement(1.0, 10));
        snapshot.insert(&measurement(2.0, 0));
        let err = snapshot.into_series().unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)));
        assert!(err.to_string().contains("cargo::BlockImport[1]"));
    }

    #[test]
    fn test_negative_value_is_corruption() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(&measurement(1.0, 0));
        snapshot
            .tools
            .get_mut("cargo")
            .unwrap()
            .get_mut("BlockImport")
            .unwrap()[0]
            .value = -5.0;
        assert!(matches!(
            snapshot.into_series().unwrap_err(),
            StoreError::Corruption(_)
        ));
    }
}
