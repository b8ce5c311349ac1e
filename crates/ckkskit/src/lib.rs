//! ckkskit: CKKS glue for demos and benchmarks.
//!
//! Layers, leaves first:
//! - [`parameter_set`]: named points in the CKKS parameter space
//! - [`context`]: a validated scheme context plus all key material
//! - [`channel`]: encode→encrypt and decrypt→decode for single reals
//! - [`evaluator`]: traced homomorphic operations
//! - [`polynomial`] and [`demos`]: sign approximation and small demo circuits
//! - [`selectable`]: encrypted values with encrypted selection flags
//! - [`aggregate`]: the sequential/concurrent summation benchmark
//! - [`report`] and [`config`]: benchmark grid input and pipe-delimited output

pub mod aggregate;
pub mod channel;
pub mod config;
pub mod context;
pub mod demos;
pub mod error;
pub mod evaluator;
pub mod parameter_set;
pub mod polynomial;
pub mod report;
pub mod selectable;
pub mod trace;

pub use aggregate::{Benchmark, BenchmarkRecord, BenchmarkState};
pub use channel::Channel;
pub use context::SchemeContext;
pub use error::Error;
pub use evaluator::Evaluator;
pub use parameter_set::ParameterSet;
pub use polynomial::CoefficientStrategy;

pub use ckkskit_core::{Ciphertext, CkksError, Result, SecurityLevel};
