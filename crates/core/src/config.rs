// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration for Benchwatch.
//!
//! Settings are layered: built-in defaults, then an optional configuration
//! file (`benchwatch.toml` unless a path is given), then `BENCHWATCH__*`
//! environment variables using `__` as the section separator, e.g.
//! `BENCHWATCH__DETECTION__WINDOW_SIZE=20`.

use crate::model::{Polarity, SeriesKey};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file stem, resolved against any supported extension.
pub const DEFAULT_CONFIG_NAME: &str = "benchwatch";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BENCHWATCH";

/// Regression detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Trend lookback: how many predecessors form a baseline.
    pub window_size: usize,
    /// Fewer predecessors than this means insufficient history.
    pub min_samples: usize,
    /// Fractional change from the baseline mean needed to classify.
    pub regression_threshold: f64,
    /// Multiplier on the baseline standard deviation that a change must exceed.
    pub noise_factor: f64,
    /// Baseline means within this distance of zero use the absolute threshold.
    pub zero_epsilon: f64,
    /// Absolute change needed to classify when the mean is near zero.
    pub absolute_threshold: f64,
    /// Polarity of benchmarks without a matching rule.
    pub default_polarity: Polarity,
    /// Per-benchmark polarity rules.
    pub polarity: Vec<PolarityRule>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_samples: 3,
            regression_threshold: 0.05, // 5%
            noise_factor: 2.0,
            zero_epsilon: 1e-9,
            absolute_threshold: 0.0,
            default_polarity: Polarity::LowerIsBetter,
            polarity: Vec::new(),
        }
    }
}

impl DetectionConfig {
    /// Resolve the polarity of a series.
    ///
    /// A rule naming both the tool and the benchmark wins over a rule naming
    /// only the benchmark. Names are matched exactly.
    pub fn polarity_for(&self, key: &SeriesKey) -> Polarity {
        let mut fallback = None;
        for rule in self.polarity.iter().filter(|r| r.benchmark == key.benchmark) {
            match &rule.tool {
                Some(tool) if *tool == key.tool => return rule.polarity,
                Some(_) => {}
                None => {
                    fallback.get_or_insert(rule.polarity);
                }
            }
        }
        fallback.unwrap_or(self.default_polarity)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::validation("detection.window_size", "must be at least 1"));
        }
        if self.min_samples == 0 {
            return Err(Error::validation("detection.min_samples", "must be at least 1"));
        }
        if self.min_samples > self.window_size {
            return Err(Error::validation(
                "detection.min_samples",
                format!(
                    "must not exceed window_size ({} > {})",
                    self.min_samples, self.window_size
                ),
            ));
        }
        for (field, value) in [
            ("detection.regression_threshold", self.regression_threshold),
            ("detection.noise_factor", self.noise_factor),
            ("detection.zero_epsilon", self.zero_epsilon),
            ("detection.absolute_threshold", self.absolute_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::validation(
                    field,
                    format!("must be a finite, non-negative number (got {value})"),
                ));
            }
        }
        Ok(())
    }
}

/// Polarity assigned to a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolarityRule {
    /// Restrict the rule to one tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Exact benchmark name.
    pub benchmark: String,
    /// Configured polarity.
    pub polarity: Polarity,
}

/// History persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file holding the full history.
    pub history_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("benchmarks/history.json"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Dashboard export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Repository URL shown by the front-end.
    pub repo_url: String,
    /// Suite name the entries are grouped under.
    pub suite: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            suite: "Benchmark".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persistence.
    pub storage: StorageConfig,
    /// Regression detection.
    pub detection: DetectionConfig,
    /// Logging.
    pub logging: LoggingConfig,
    /// HTTP service.
    pub server: ServerConfig,
    /// Dashboard export.
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load configuration from the default file (if present) and the
    /// environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from `path` (or the default file when `None`) and
    /// the environment.
    ///
    /// An explicitly given path must exist; the default file is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.detection.validate()?;
        Ok(app)
    }
}
