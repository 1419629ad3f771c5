//! Dashboard data (`data.js`).
//!
//! The plotting front-end reads a JavaScript file that assigns the whole
//! history to `window.BENCHMARK_DATA`. Entries are grouped per suite; each
//! entry is one run (one commit, one tool, one timestamp) with its benches.
//! Timestamps are milliseconds since the Unix epoch and error margins are
//! rendered as `"± <margin>"`.

use crate::error::{ReportError, Result};
use benchwatch_core::{CommitRef, Committer, Measurement, SeriesKey};
use benchwatch_storage::SeriesView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variable the front-end reads.
pub const DATA_VARIABLE: &str = "window.BENCHMARK_DATA";

/// Prefix of error margins in `range`.
const RANGE_PREFIX: char = '±';

/// The whole dashboard document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    /// Last update, in milliseconds since the epoch.
    pub last_update: i64,
    /// Repository the commits belong to.
    pub repo_url: String,
    /// Runs grouped by suite name.
    pub entries: BTreeMap<String, Vec<DashboardEntry>>,
}

/// One run: every bench measured for a commit at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEntry {
    /// Commit measured.
    pub commit: DashboardCommit,
    /// When the run was recorded, in milliseconds since the epoch.
    pub date: i64,
    /// Tool that produced the benches.
    pub tool: String,
    /// Bench results.
    pub benches: Vec<DashboardBench>,
}

/// Commit metadata as the front-end expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCommit {
    /// Commit author.
    pub author: DashboardPerson,
    /// Committer, if different from the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<DashboardPerson>,
    /// Whether the commit is distinct from its predecessor push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    /// Commit hash.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Tree hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    /// Link to the commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Commit author or committer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPerson {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Forge username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// One bench result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardBench {
    /// Benchmark name.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// Error margin, e.g. `"± 361314238"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Unit tag.
    pub unit: String,
    /// Free-form extra information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl From<&CommitRef> for DashboardCommit {
    fn from(commit: &CommitRef) -> Self {
        Self {
            author: DashboardPerson {
                email: commit.author_email.clone(),
                name: commit.author_name.clone(),
                username: commit.author_username.clone(),
            },
            committer: commit.committer.as_ref().map(|c| DashboardPerson {
                email: c.email.clone(),
                name: c.name.clone(),
                username: c.username.clone(),
            }),
            distinct: commit.distinct,
            id: commit.id.clone(),
            message: commit.message.clone(),
            timestamp: commit.timestamp,
            tree_id: commit.tree_id.clone(),
            url: commit.url.clone(),
        }
    }
}

impl From<&DashboardCommit> for CommitRef {
    fn from(commit: &DashboardCommit) -> Self {
        Self {
            id: commit.id.clone(),
            timestamp: commit.timestamp,
            author_name: commit.author.name.clone(),
            author_email: commit.author.email.clone(),
            message: commit.message.clone(),
            url: commit.url.clone(),
            tree_id: commit.tree_id.clone(),
            author_username: commit.author.username.clone(),
            committer: commit.committer.as_ref().map(|c| Committer {
                name: c.name.clone(),
                email: c.email.clone(),
                username: c.username.clone(),
            }),
            distinct: commit.distinct,
        }
    }
}

/// Render an error margin the way the front-end displays it.
pub fn format_range(margin: f64) -> String {
    format!("{RANGE_PREFIX} {margin}")
}

/// Parse a `"± <margin>"` range. A missing prefix is tolerated.
pub fn parse_range(range: &str) -> Option<f64> {
    let trimmed = range.trim();
    let number = trimmed.strip_prefix(RANGE_PREFIX).unwrap_or(trimmed).trim();
    number.parse::<f64>().ok()
}

impl DashboardData {
    /// Build the document for the given series, all under one suite.
    ///
    /// Measurements sharing tool, commit and timestamp are one entry.
    /// Entries are ordered by date.
    pub fn from_series<'a>(
        series: impl IntoIterator<Item = &'a SeriesView>,
        repo_url: impl Into<String>,
        suite: impl Into<String>,
        last_update: DateTime<Utc>,
    ) -> Self {
        let mut runs: BTreeMap<(DateTime<Utc>, String, String), DashboardEntry> = BTreeMap::new();

        for view in series {
            for m in view.iter() {
                let entry = runs
                    .entry((m.recorded_at, m.tool_name.clone(), m.commit.id.clone()))
                    .or_insert_with(|| DashboardEntry {
                        commit: DashboardCommit::from(&m.commit),
                        date: m.recorded_at.timestamp_millis(),
                        tool: m.tool_name.clone(),
                        benches: Vec::new(),
                    });
                entry.benches.push(DashboardBench {
                    name: m.benchmark_name.clone(),
                    value: m.value,
                    range: Some(format_range(m.error_margin)),
                    unit: m.unit.clone(),
                    extra: None,
                });
            }
        }

        let mut entries = BTreeMap::new();
        entries.insert(suite.into(), runs.into_values().collect());

        Self {
            last_update: last_update.timestamp_millis(),
            repo_url: repo_url.into(),
            entries,
        }
    }

    /// Render the `data.js` document.
    pub fn to_js(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(format!("{DATA_VARIABLE} = {json}\n"))
    }

    /// Parse a `data.js` document. Bare JSON is accepted too.
    pub fn from_js(text: &str) -> Result<Self> {
        let body = text.trim_start();
        let json = match body.strip_prefix(DATA_VARIABLE) {
            Some(rest) => rest
                .trim_start()
                .strip_prefix('=')
                .ok_or_else(|| {
                    ReportError::Dashboard(format!("expected '=' after {DATA_VARIABLE}"))
                })?,
            None => body,
        };
        let json = json.trim_end().trim_end_matches(';');
        Ok(serde_json::from_str(json)?)
    }

    /// Number of bench results across all suites.
    pub fn bench_count(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .map(|entry| entry.benches.len())
            .sum()
    }

    /// Convert every bench of every suite into measurements, ordered by
    /// date. Entries of the same date keep document order.
    pub fn measurements(&self) -> Result<Vec<Measurement>> {
        let mut out = Vec::with_capacity(self.bench_count());

        for (suite, entries) in &self.entries {
            for (i, entry) in entries.iter().enumerate() {
                let recorded_at = DateTime::<Utc>::from_timestamp_millis(entry.date)
                    .ok_or_else(|| {
                        ReportError::Dashboard(format!(
                            "{suite}[{i}].date: {} is out of range",
                            entry.date
                        ))
                    })?;
                let commit = CommitRef::from(&entry.commit);

                for bench in &entry.benches {
                    let error_margin = match bench.range.as_deref() {
                        Some(range) => parse_range(range).ok_or_else(|| {
                            ReportError::Dashboard(format!(
                                "{suite}[{i}] {}: unparseable range {range:?}",
                                bench.name
                            ))
                        })?,
                        None => 0.0,
                    };

                    let measurement = Measurement::builder()
                        .tool(entry.tool.clone())
                        .benchmark(bench.name.clone())
                        .value(bench.value)
                        .unit(bench.unit.clone())
                        .error_margin(error_margin)
                        .commit(commit.clone())
                        .recorded_at(recorded_at)
                        .build()
                        .map_err(|e| {
                            ReportError::Dashboard(format!("{suite}[{i}] {}: {e}", bench.name))
                        })?;
                    out.push(measurement);
                }
            }
        }

        out.sort_by_key(|m| m.recorded_at);
        Ok(out)
    }

    /// Keys of every series present in the document.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self
            .entries
            .values()
            .flatten()
            .flat_map(|entry| {
                entry
                    .benches
                    .iter()
                    .map(move |b| SeriesKey::new(entry.tool.clone(), b.name.clone()))
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_storage::HistoryStore;
    use chrono::TimeZone;

    const SAMPLE: &str = include_str!("../tests/fixtures/data.js");

    #[test]
    fn test_parse_sample_document() {
        let data = DashboardData::from_js(SAMPLE).unwrap();
        assert_eq!(data.last_update, 1750793176949);
        assert_eq!(data.repo_url, "https://github.com/example/chain");

        let entries = &data.entries["Benchmark"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tool, "cargo");
        assert_eq!(entries[0].commit.author.username.as_deref(), Some("jdoe"));

        let measurements = data.measurements().unwrap();
        assert_eq!(measurements.len(), 1);
        let m = &measurements[0];
        assert_eq!(m.benchmark_name, "Block import/Block import ERC20 transfers");
        assert_eq!(m.value, 219844490108.0);
        assert_eq!(m.error_margin, 361314238.0);
        assert_eq!(m.recorded_at.timestamp_millis(), 1750793174701);
        assert_eq!(m.commit.tree_id.as_deref(), Some("2da6943241aaa38aba591c90dbd14323dd54d0ab"));
    }

    #[test]
    fn test_range_format() {
        assert_eq!(format_range(361314238.0), "± 361314238");
        assert_eq!(parse_range("± 361314238"), Some(361314238.0));
        assert_eq!(parse_range("0.5"), Some(0.5));
        assert_eq!(parse_range("± lots"), None);
    }

    #[test]
    fn test_bare_json_and_trailing_semicolon() {
        let json = r#"{"lastUpdate": 0, "repoUrl": "", "entries": {}};"#;
        let data = DashboardData::from_js(json).unwrap();
        assert_eq!(data.bench_count(), 0);

        let err = DashboardData::from_js("window.BENCHMARK_DATA {}").unwrap_err();
        assert!(matches!(err, ReportError::Dashboard(_)));
    }

    #[test]
    fn test_invalid_bench_names_location() {
        let mut data = DashboardData::from_js(SAMPLE).unwrap();
        data.entries.get_mut("Benchmark").unwrap()[0].benches[0].unit = String::new();
        let err = data.measurements().unwrap_err().to_string();
        assert!(err.contains("Benchmark[0]"), "{err}");
        assert!(err.contains("unit"), "{err}");
    }

    #[tokio::test]
    async fn test_render_groups_runs_and_reimports() {
        let data = DashboardData::from_js(SAMPLE).unwrap();
        let store = HistoryStore::new();
        let mut imported = data.measurements().unwrap();
        let mut second = imported[0].clone();
        second.benchmark_name = "Block import/Block import ETH transfers".to_string();
        second.value = 120.5;
        imported.push(second);
        for m in imported {
            store.append(m).await.unwrap();
        }

        let export = store.export();
        let rendered = DashboardData::from_series(
            export.values(),
            "https://github.com/example/chain",
            "Benchmark",
            Utc.with_ymd_and_hms(2025, 6, 25, 0, 0, 0).unwrap(),
        );
        let entries = &rendered.entries["Benchmark"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].benches.len(), 2);
        assert_eq!(rendered.keys().len(), 2);

        let js = rendered.to_js().unwrap();
        assert!(js.starts_with("window.BENCHMARK_DATA = {"));
        let reparsed = DashboardData::from_js(&js).unwrap();
        assert_eq!(reparsed, rendered);
    }

    #[tokio::test]
    async fn test_import_then_render_keeps_commit_metadata() {
        let data = DashboardData::from_js(SAMPLE).unwrap();
        let store = HistoryStore::new();
        for m in data.measurements().unwrap() {
            store.append(m).await.unwrap();
        }

        let export = store.export();
        let rendered = DashboardData::from_series(
            export.values(),
            &data.repo_url,
            "Benchmark",
            Utc.with_ymd_and_hms(2025, 6, 25, 0, 0, 0).unwrap(),
        );
        let original = &data.entries["Benchmark"][0].commit;
        let commit = &rendered.entries["Benchmark"][0].commit;
        assert_eq!(commit, original);
        assert_eq!(commit.committer.as_ref().unwrap().username.as_deref(), Some("web-flow"));
        assert_eq!(commit.distinct, Some(true));
    }
}
