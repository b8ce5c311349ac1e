//! Benchmark grid configuration.
//!
//! ```toml
//! ring_dimensions = [4096, 8192]
//! sample_counts = [50000, 100000]
//! modes = ["sequential", "concurrent"]
//! upper_bounds = [10.0]
//! seed = 7        # optional
//! workers = 4     # optional, concurrent runs only
//! ```
//!
//! Missing keys fall back to [`BenchmarkConfig::default`].

use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::aggregate::Benchmark;
use crate::parameter_set::ParameterSet;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Load(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Look up a named parameter set.
pub fn preset(name: &str) -> Result<ParameterSet, ConfigError> {
    ParameterSet::named(name).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "unknown preset {name} (available: {})",
            ParameterSet::PRESET_NAMES.join(", ")
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sequential,
    Concurrent,
}

impl Mode {
    pub fn is_concurrent(self) -> bool {
        self == Mode::Concurrent
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub ring_dimensions: Vec<usize>,
    pub sample_counts: Vec<usize>,
    pub modes: Vec<Mode>,
    pub upper_bounds: Vec<f64>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            ring_dimensions: vec![4096, 8192],
            sample_counts: vec![50_000, 100_000],
            modes: vec![Mode::Sequential, Mode::Concurrent],
            upper_bounds: vec![10.0],
            seed: None,
            workers: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_dimensions.is_empty()
            || self.sample_counts.is_empty()
            || self.modes.is_empty()
            || self.upper_bounds.is_empty()
        {
            return Err(ConfigError::Invalid("every grid axis needs at least one value".into()));
        }
        if let Some(&n) = self.ring_dimensions.iter().find(|n| !n.is_power_of_two()) {
            return Err(ConfigError::Invalid(format!("ring dimension {n} is not a power of two")));
        }
        if let Some(&b) = self.upper_bounds.iter().find(|b| !(b.is_finite() && **b > 0.0)) {
            return Err(ConfigError::Invalid(format!("upper bound {b} must be positive")));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// One benchmark per grid point, dimension-major.
    pub fn benchmarks(&self) -> Vec<Benchmark> {
        let mut out = Vec::new();
        for &n in &self.ring_dimensions {
            for &count in &self.sample_counts {
                for &mode in &self.modes {
                    for &bound in &self.upper_bounds {
                        let mut bench = Benchmark::new(n, count, mode.is_concurrent(), bound);
                        if let Some(seed) = self.seed {
                            bench = bench.with_seed(seed);
                        }
                        if let Some(workers) = self.workers {
                            bench = bench.with_workers(workers);
                        }
                        out.push(bench);
                    }
                }
            }
        }
        out
    }
}
