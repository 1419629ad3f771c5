// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement data model.
//!
//! A [`Measurement`] is one benchmark's result for one run. Measurements that
//! share a [`SeriesKey`] form a series, ordered by `recorded_at`.
//!
//! # Identity
//!
//! Benchmark identity is an exact string match on `(tool, benchmark)`. Names
//! that differ only in case or surrounding whitespace are distinct series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Committer identity as reported by the forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: String,
    /// Forge username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The code version a measurement belongs to.
///
/// Treated as an opaque foreign key: it is produced by the source-control
/// collaborator and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    /// Content hash of the commit.
    pub id: String,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
    /// Author display name.
    pub author_name: String,
    /// Author e-mail address.
    pub author_email: String,
    /// Full commit message.
    pub message: String,
    /// Link to the commit, when the forge provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Tree hash, when the forge provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    /// Forge username of the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    /// Committer, when the forge reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Committer>,
    /// Whether the push introduced this commit for the first time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
}

impl CommitRef {
    /// Short (7 character) form of the commit id.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Identifies a series: a benchmark within a tool's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Benchmarking harness (e.g. `cargo`).
    pub tool: String,
    /// Benchmark name, unique within `tool`.
    pub benchmark: String,
}

impl SeriesKey {
    /// Create a new key.
    pub fn new(tool: impl Into<String>, benchmark: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            benchmark: benchmark.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.tool, self.benchmark)
    }
}

/// Whether lower or higher values indicate better performance.
///
/// Polarity is a configured attribute of a benchmark; it is never inferred
/// from the unit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Polarity {
    /// Latency- or time-like metrics: an increase is a regression.
    #[default]
    #[serde(alias = "lower_is_better")]
    LowerIsBetter,
    /// Throughput-like metrics: a decrease is a regression.
    #[serde(alias = "higher_is_better")]
    HigherIsBetter,
}

impl Polarity {
    /// Whether moving from `baseline` to `value` is a change for the worse.
    pub fn is_worse(self, baseline: f64, value: f64) -> bool {
        match self {
            Self::LowerIsBetter => value > baseline,
            Self::HigherIsBetter => value < baseline,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowerIsBetter => f.write_str("lowerIsBetter"),
            Self::HigherIsBetter => f.write_str("higherIsBetter"),
        }
    }
}

/// One benchmark datapoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Benchmarking harness that produced the value.
    pub tool_name: String,
    /// Benchmark name within the tool's namespace.
    pub benchmark_name: String,
    /// Summary value, in `unit`.
    pub value: f64,
    /// Unit tag, e.g. `ns/iter`.
    pub unit: String,
    /// Dispersion of `value`, non-negative, in `unit`.
    pub error_margin: f64,
    /// Code version measured.
    pub commit: CommitRef,
    /// When the run was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Measurement {
    /// Create a new builder.
    pub fn builder() -> MeasurementBuilder {
        MeasurementBuilder::default()
    }

    /// Series this measurement belongs to.
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.tool_name, &self.benchmark_name)
    }
}

/// Builder for [`Measurement`] instances.
#[derive(Default)]
pub struct MeasurementBuilder {
    tool_name: Option<String>,
    benchmark_name: Option<String>,
    value: Option<f64>,
    unit: Option<String>,
    error_margin: f64,
    commit: Option<CommitRef>,
    recorded_at: Option<DateTime<Utc>>,
}

impl MeasurementBuilder {
    /// Set the tool name (required).
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Set the benchmark name (required).
    pub fn benchmark(mut self, name: impl Into<String>) -> Self {
        self.benchmark_name = Some(name.into());
        self
    }

    /// Set the measured value (required).
    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the unit (required).
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the error margin (default: 0).
    pub fn error_margin(mut self, margin: f64) -> Self {
        self.error_margin = margin;
        self
    }

    /// Set the commit (required).
    pub fn commit(mut self, commit: CommitRef) -> Self {
        self.commit = Some(commit);
        self
    }

    /// Set the record time. Defaults to `Utc::now()` if not set.
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// Build the [`Measurement`]. Returns `Err` if required fields are missing
    /// or a numeric field is out of range.
    pub fn build(self) -> crate::Result<Measurement> {
        let tool_name = self
            .tool_name
            .filter(|t| !t.is_empty())
            .ok_or_else(|| crate::Error::validation("tool", "is required"))?;
        let benchmark_name = self
            .benchmark_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| crate::Error::validation("name", "is required"))?;
        let value = self
            .value
            .ok_or_else(|| crate::Error::validation("value", "is required"))?;
        let unit = self
            .unit
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| crate::Error::validation("unit", "must not be empty"))?;
        let commit = self
            .commit
            .ok_or_else(|| crate::Error::validation("commit", "is required"))?;

        if !value.is_finite() || value < 0.0 {
            return Err(crate::Error::validation(
                "value",
                format!("must be a finite, non-negative number (got {value})"),
            ));
        }
        if !self.error_margin.is_finite() || self.error_margin < 0.0 {
            return Err(crate::Error::validation(
                "errorMargin",
                format!(
                    "must be a finite, non-negative number (got {})",
                    self.error_margin
                ),
            ));
        }

        Ok(Measurement {
            tool_name,
            benchmark_name,
            value,
            unit,
            error_margin: self.error_margin,
            commit,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
        })
    }
}
