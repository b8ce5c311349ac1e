//! Pipe-delimited benchmark report.

use std::fmt;

use log::warn;

use crate::aggregate::BenchmarkRecord;
use crate::config::BenchmarkConfig;
use crate::error::Error;

pub const HEADER: &str = "ring_dimension | count | concurrent | upper_bound | error_ratio | elapsed_time";

impl fmt::Display for BenchmarkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {:e} | {:.6}",
            self.ring_dimension,
            self.sample_count,
            self.concurrent,
            self.upper_bound,
            self.error_ratio,
            self.elapsed_time.as_secs_f64()
        )
    }
}

/// Completed rows in run order.
#[derive(Debug, Default, Clone)]
pub struct Report {
    rows: Vec<BenchmarkRecord>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every benchmark of `config` in grid order. A configuration that
    /// fails is logged and left out; only an invalid config is an error.
    pub fn run(config: &BenchmarkConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut report = Self::new();
        for mut benchmark in config.benchmarks() {
            match benchmark.run() {
                Ok(record) => report.push(record),
                Err(e) => warn!(
                    "Skipping benchmark for ring dimension {}: {e}",
                    benchmark.ring_dimension()
                ),
            }
        }
        Ok(report)
    }

    pub fn push(&mut self, record: BenchmarkRecord) {
        self.rows.push(record);
    }

    pub fn rows(&self) -> &[BenchmarkRecord] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
