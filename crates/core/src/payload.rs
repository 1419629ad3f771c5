// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingestion payloads produced by the CI collaborator.
//!
//! Every field is optional at the deserialization layer so that a malformed
//! payload is reported by [`RunPayload::validate`] with the exact field that
//! failed, rather than by a generic decoder error.

use crate::model::{CommitRef, Committer, Measurement};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Commit metadata as submitted by the CI collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    /// Commit hash.
    #[serde(default)]
    pub id: Option<String>,
    /// Commit timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Author name.
    #[serde(default)]
    pub author_name: Option<String>,
    /// Author e-mail.
    #[serde(default)]
    pub author_email: Option<String>,
    /// Commit message.
    #[serde(default)]
    pub message: Option<String>,
    /// Commit URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Tree hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    /// Author username on the forge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    /// Committer identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Committer>,
    /// Whether the push introduced the commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
}

impl CommitPayload {
    /// Validate and convert into an immutable [`CommitRef`].
    pub fn validate(&self, prefix: &str) -> Result<CommitRef> {
        let field = |name: &str| format!("{prefix}.{name}");

        Ok(CommitRef {
            id: required_text(&self.id, &field("id"))?,
            timestamp: self
                .timestamp
                .ok_or_else(|| Error::validation(field("timestamp"), "is required"))?,
            author_name: required_text(&self.author_name, &field("authorName"))?,
            author_email: required_text(&self.author_email, &field("authorEmail"))?,
            message: self
                .message
                .clone()
                .ok_or_else(|| Error::validation(field("message"), "is required"))?,
            url: self.url.clone(),
            tree_id: self.tree_id.clone(),
            author_username: self.author_username.clone(),
            committer: self.committer.clone(),
            distinct: self.distinct,
        })
    }
}

impl From<&CommitRef> for CommitPayload {
    fn from(commit: &CommitRef) -> Self {
        Self {
            id: Some(commit.id.clone()),
            timestamp: Some(commit.timestamp),
            author_name: Some(commit.author_name.clone()),
            author_email: Some(commit.author_email.clone()),
            message: Some(commit.message.clone()),
            url: commit.url.clone(),
            tree_id: commit.tree_id.clone(),
            author_username: commit.author_username.clone(),
            committer: commit.committer.clone(),
            distinct: commit.distinct,
        }
    }
}

/// One benchmark result inside a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkEntry {
    /// Benchmark name.
    #[serde(default)]
    pub name: Option<String>,
    /// Summary value.
    #[serde(default)]
    pub value: Option<f64>,
    /// Dispersion of the value.
    #[serde(default)]
    pub error_margin: Option<f64>,
    /// Unit tag.
    #[serde(default)]
    pub unit: Option<String>,
}

impl BenchmarkEntry {
    /// Create a fully populated entry.
    pub fn new(name: impl Into<String>, value: f64, error_margin: f64, unit: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value),
            error_margin: Some(error_margin),
            unit: Some(unit.into()),
        }
    }

    fn validate(
        &self,
        prefix: &str,
        tool: &str,
        commit: &CommitRef,
        recorded_at: DateTime<Utc>,
    ) -> Result<Measurement> {
        let field = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };

        let name = required_text(&self.name, &field("name"))?;
        let value = non_negative(self.value, &field("value"))?;
        let error_margin = non_negative(self.error_margin, &field("errorMargin"))?;
        let unit = required_text(&self.unit, &field("unit"))?;

        Measurement::builder()
            .tool(tool)
            .benchmark(name)
            .value(value)
            .error_margin(error_margin)
            .unit(unit)
            .commit(commit.clone())
            .recorded_at(recorded_at)
            .build()
    }
}

/// One CI run: a commit and the benchmarks measured for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPayload {
    /// Commit the run measured.
    #[serde(default)]
    pub commit: Option<CommitPayload>,
    /// Benchmarking harness.
    #[serde(default)]
    pub tool: Option<String>,
    /// When the run was recorded. Defaults to the ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Benchmark results.
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkEntry>,
}

impl RunPayload {
    /// Validate the whole run, returning one measurement per benchmark.
    ///
    /// The first failing check is reported; on error nothing has been
    /// converted and nothing should be ingested.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<Vec<Measurement>> {
        let commit = self
            .commit
            .as_ref()
            .ok_or_else(|| Error::validation("commit", "is required"))?
            .validate("commit")?;
        let tool = required_text(&self.tool, "tool")?;
        let recorded_at = self.recorded_at.unwrap_or(now);

        if self.benchmarks.is_empty() {
            return Err(Error::validation(
                "benchmarks",
                "must contain at least one entry",
            ));
        }

        let mut seen = HashSet::new();
        let mut measurements = Vec::with_capacity(self.benchmarks.len());
        for (i, entry) in self.benchmarks.iter().enumerate() {
            let prefix = format!("benchmarks[{i}]");
            let measurement = entry.validate(&prefix, &tool, &commit, recorded_at)?;
            if !seen.insert(measurement.benchmark_name.clone()) {
                return Err(Error::validation(
                    format!("{prefix}.name"),
                    format!("duplicate benchmark '{}' in run", measurement.benchmark_name),
                ));
            }
            measurements.push(measurement);
        }

        Ok(measurements)
    }

    /// Split the run into one payload per benchmark.
    pub fn split(&self) -> Vec<BenchmarkPayload> {
        self.benchmarks
            .iter()
            .map(|entry| BenchmarkPayload {
                commit: self.commit.clone(),
                tool: self.tool.clone(),
                recorded_at: self.recorded_at,
                benchmark: entry.clone(),
            })
            .collect()
    }
}

/// A single benchmark result with its run context: the unit of one
/// ingestion cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkPayload {
    /// Commit the run measured.
    #[serde(default)]
    pub commit: Option<CommitPayload>,
    /// Benchmarking harness.
    #[serde(default)]
    pub tool: Option<String>,
    /// When the run was recorded. Defaults to the ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    /// The benchmark result.
    #[serde(flatten)]
    pub benchmark: BenchmarkEntry,
}

impl BenchmarkPayload {
    /// Validate and convert into a [`Measurement`].
    pub fn validate(&self, now: DateTime<Utc>) -> Result<Measurement> {
        let commit = self
            .commit
            .as_ref()
            .ok_or_else(|| Error::validation("commit", "is required"))?
            .validate("commit")?;
        let tool = required_text(&self.tool, "tool")?;
        self.benchmark
            .validate("", &tool, &commit, self.recorded_at.unwrap_or(now))
    }

    /// Benchmark name as submitted, for logging rejected payloads.
    pub fn name(&self) -> &str {
        self.benchmark.name.as_deref().unwrap_or("<unnamed>")
    }
}

fn required_text(value: &Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        Some(_) => Err(Error::validation(field, "must not be empty")),
        None => Err(Error::validation(field, "is required")),
    }
}

fn non_negative(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(Error::validation(
            field,
            format!("must be a finite, non-negative number (got {v})"),
        )),
        None => Err(Error::validation(field, "is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_json() -> serde_json::Value {
        json!({
            "commit": {
                "id": "196a17b1e734d7510cb48192b944361641ea29c3",
                "timestamp": "2025-06-24T16:46:08Z",
                "authorName": "Jane Doe",
                "authorEmail": "jane@example.com",
                "message": "chore: remove execution cache",
                "url": "https://example.com/commit/196a17b"
            },
            "tool": "cargo",
            "recordedAt": "2025-06-24T19:26:14Z",
            "benchmarks": [
                { "name": "Block import/ERC20 transfers", "value": 219844490108.0, "errorMargin": 361314238.0, "unit": "ns/iter" },
                { "name": "Trie/insert", "value": 1200.5, "errorMargin": 3.0, "unit": "ns/iter" }
            ]
        })
    }

    #[test]
    fn test_valid_run_converts_every_benchmark() {
        let run: RunPayload = serde_json::from_value(run_json()).unwrap();
        let measurements = run.validate(Utc::now()).unwrap();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].tool_name, "cargo");
        assert_eq!(measurements[0].benchmark_name, "Block import/ERC20 transfers");
        assert_eq!(measurements[0].error_margin, 361314238.0);
        assert_eq!(
            measurements[1].recorded_at.to_rfc3339(),
            "2025-06-24T19:26:14+00:00"
        );
    }

    #[test]
    fn test_missing_author_email_names_field() {
        let mut value = run_json();
        value["commit"].as_object_mut().unwrap().remove("authorEmail");
        let run: RunPayload = serde_json::from_value(value).unwrap();
        let err = run.validate(Utc::now()).unwrap_err();
        assert_eq!(err.field(), Some("commit.authorEmail"));
        assert!(err.to_string().contains("is required"));
    }

    #[test]
    fn test_negative_value_names_index() {
        let mut value = run_json();
        value["benchmarks"][1]["value"] = json!(-3.0);
        let run: RunPayload = serde_json::from_value(value).unwrap();
        let err = run.validate(Utc::now()).unwrap_err();
        assert_eq!(err.field(), Some("benchmarks[1].value"));
    }

    #[test]
    fn test_empty_unit_rejected() {
        let mut value = run_json();
        value["benchmarks"][0]["unit"] = json!("");
        let run: RunPayload = serde_json::from_value(value).unwrap();
        let err = run.validate(Utc::now()).unwrap_err();
        assert_eq!(err.field(), Some("benchmarks[0].unit"));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_duplicate_benchmark_in_run_rejected() {
        let mut value = run_json();
        value["benchmarks"][1]["name"] = json!("Block import/ERC20 transfers");
        let run: RunPayload = serde_json::from_value(value).unwrap();
        let err = run.validate(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("duplicate benchmark"));
    }

    #[test]
    fn test_empty_benchmarks_rejected() {
        let mut value = run_json();
        value["benchmarks"] = json!([]);
        let run: RunPayload = serde_json::from_value(value).unwrap();
        assert_eq!(
            run.validate(Utc::now()).unwrap_err().field(),
            Some("benchmarks")
        );
    }

    #[test]
    fn test_recorded_at_defaults_to_now() {
        let mut value = run_json();
        value.as_object_mut().unwrap().remove("recordedAt");
        let run: RunPayload = serde_json::from_value(value).unwrap();
        let now = Utc::now();
        let measurements = run.validate(now).unwrap();
        assert!(measurements.iter().all(|m| m.recorded_at == now));
    }

    #[test]
    fn test_split_then_validate_single_benchmark() {
        let run: RunPayload = serde_json::from_value(run_json()).unwrap();
        let parts = run.split();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].name(), "Trie/insert");
        let m = parts[1].validate(Utc::now()).unwrap();
        assert_eq!(m.value, 1200.5);
    }

    #[test]
    fn test_single_payload_missing_value() {
        let payload: BenchmarkPayload = serde_json::from_value(json!({
            "commit": run_json()["commit"],
            "tool": "cargo",
            "name": "Trie/insert",
            "errorMargin": 1.0,
            "unit": "ns/iter"
        }))
        .unwrap();
        let err = payload.validate(Utc::now()).unwrap_err();
        assert_eq!(err.field(), Some("value"));
    }
}
