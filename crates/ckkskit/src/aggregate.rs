//! Encrypted summation benchmark.
//!
//! A [`Benchmark`] draws `sample_count` uniform reals in `[0, upper_bound)`,
//! encrypts each one and adds them up homomorphically, either on the calling
//! thread or split into contiguous chunks across a rayon pool. The decrypted
//! total is compared with the exact plaintext sum.
//!
//! Everything random is a pure function of `(seed, index)`. Sample `i` is the
//! `i`-th `f64` of a ChaCha20 stream, reached with `set_word_pos`, and it is
//! encrypted with ChaCha20 stream `i` of a second seed. The coordinator adds
//! one encryption of 0 from a stream no sample uses. Sequential and
//! concurrent runs with the same seed therefore build the same ciphertext,
//! and the plaintext sum is always taken in index order.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use ckkskit_core::{Ciphertext, CkksError, Result};

use crate::channel::Channel;
use crate::context::SchemeContext;
use crate::evaluator::Evaluator;
use crate::parameter_set::ParameterSet;

// Mixed into the seed so encryption randomness never replays the sample stream.
const ENCRYPTION_DOMAIN: u64 = 0x656e_6372_7970_7421;

// Encryption stream of the accumulator's initial 0; above any sample index.
const ZERO_STREAM: u64 = u64::MAX;

/// Lifecycle of one benchmark configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchmarkState {
    Configured,
    Running,
    Completed(BenchmarkRecord),
    Failed(CkksError),
}

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub ring_dimension: usize,
    pub sample_count: usize,
    pub concurrent: bool,
    pub upper_bound: f64,
    pub error_ratio: f64,
    /// Wall time of the whole run, context and key generation included.
    pub elapsed_time: Duration,
}

/// Exact and encrypted sums of one run's samples.
///
/// `encrypted` is `None` when nothing was encrypted; it stands for an
/// encryption of 0.
#[derive(Debug, Clone)]
pub struct SampleSum {
    pub exact: f64,
    pub encrypted: Option<Ciphertext>,
}

impl SampleSum {
    pub fn zero() -> Self {
        Self {
            exact: 0.0,
            encrypted: None,
        }
    }

    /// Add an encrypted partial sum. `None` adds nothing.
    pub fn absorb(&mut self, evaluator: &Evaluator<'_>, partial: Option<Ciphertext>) -> Result<()> {
        match partial {
            Some(ct) => evaluator.accumulate(&mut self.encrypted, ct),
            None => Ok(()),
        }
    }

    /// Decrypted value of the encrypted sum, 0 when there is none.
    pub fn decrypt(&self, channel: &Channel<'_>) -> Result<f64> {
        match &self.encrypted {
            Some(ct) => channel.decrypt_decode(ct),
            None => Ok(0.0),
        }
    }
}

/// Hardware threads available to the process, at least 1.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Split `0..count` into `workers` contiguous ranges. The last range takes
/// the remainder; no range is empty unless `count` is 0.
pub fn chunk_bounds(count: usize, workers: usize) -> Vec<Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, count);
    let chunk = count / workers;
    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == workers { count } else { start + chunk };
            start..end
        })
        .collect()
}

/// Samples `range` of the stream for `seed`, scaled to `[0, upper_bound)`.
pub fn samples(seed: u64, range: Range<usize>, upper_bound: f64) -> impl Iterator<Item = f64> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    // Each f64 consumes one u64, i.e. two 32-bit words.
    rng.set_word_pos(2 * range.start as u128);
    range.map(move |_| rng.random::<f64>() * upper_bound)
}

/// |decrypted − exact| / |exact|, or the absolute error when `exact` is 0.
pub fn error_ratio(decrypted: f64, exact: f64) -> f64 {
    let error = (decrypted - exact).abs();
    if exact == 0.0 {
        error
    } else {
        error / exact.abs()
    }
}

/// Plaintext sum of samples `0..count`, in index order.
pub fn exact_sum(seed: u64, count: usize, upper_bound: f64) -> f64 {
    samples(seed, 0..count, upper_bound).sum()
}

fn encryption_rng(seed: u64, stream: u64) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed ^ ENCRYPTION_DOMAIN);
    rng.set_stream(stream);
    rng
}

/// Encrypted sum of the samples in `range`, `None` for an empty range.
/// Sample `i` is encrypted with its own stream `i`.
fn encrypt_range(
    context: &SchemeContext,
    seed: u64,
    range: Range<usize>,
    upper_bound: f64,
) -> Result<Option<Ciphertext>> {
    let scale = context.initial_scale();
    let evaluator = Evaluator::new(context);
    let mut acc = None;
    for (index, value) in range.clone().zip(samples(seed, range, upper_bound)) {
        let mut channel = Channel::with_rng(context, encryption_rng(seed, index as u64));
        let ct = channel.encode_encrypt(value, scale)?;
        evaluator.accumulate(&mut acc, ct)?;
    }
    Ok(acc)
}

/// The coordinator's starting point: the exact sum of all `count` samples
/// and a single encryption of 0.
fn seeded_total(context: &SchemeContext, seed: u64, count: usize, upper_bound: f64) -> Result<SampleSum> {
    let mut channel = Channel::with_rng(context, encryption_rng(seed, ZERO_STREAM));
    let zero = channel.encode_encrypt(0.0, context.initial_scale())?;
    Ok(SampleSum {
        exact: exact_sum(seed, count, upper_bound),
        encrypted: Some(zero),
    })
}

/// Single-threaded sum of samples `0..count`.
pub fn sum_sequential(
    context: &SchemeContext,
    count: usize,
    upper_bound: f64,
    seed: u64,
) -> Result<SampleSum> {
    if count == 0 {
        return Ok(SampleSum::zero());
    }
    let mut total = seeded_total(context, seed, count, upper_bound)?;
    let partial = encrypt_range(context, seed, 0..count, upper_bound)?;
    total.absorb(&Evaluator::new(context), partial)?;
    Ok(total)
}

/// Sum of samples `0..count` over `workers` threads.
///
/// Each worker owns its channels and accumulator and returns its partial
/// ciphertext; the partials are merged in chunk order on the calling thread
/// after the pool joins.
pub fn sum_concurrent(
    context: &SchemeContext,
    count: usize,
    upper_bound: f64,
    seed: u64,
    workers: usize,
) -> Result<SampleSum> {
    let chunks = chunk_bounds(count, workers);
    if chunks.is_empty() {
        return Ok(SampleSum::zero());
    }
    debug!("Summing {count} samples in {} chunks: {chunks:?}", chunks.len());

    let pool = ThreadPoolBuilder::new()
        .num_threads(chunks.len())
        .build()
        .map_err(|e| CkksError::Configuration(format!("thread pool: {e}")))?;
    let partials = pool.install(|| {
        chunks
            .par_iter()
            .map(|range| encrypt_range(context, seed, range.clone(), upper_bound))
            .collect::<Result<Vec<_>>>()
    })?;

    let evaluator = Evaluator::new(context);
    let mut total = seeded_total(context, seed, count, upper_bound)?;
    for partial in partials {
        total.absorb(&evaluator, partial)?;
    }
    Ok(total)
}

/// One benchmark configuration and its current state.
#[derive(Debug, Clone)]
pub struct Benchmark {
    ring_dimension: usize,
    sample_count: usize,
    concurrent: bool,
    upper_bound: f64,
    seed: Option<u64>,
    workers: Option<usize>,
    state: BenchmarkState,
}

impl Benchmark {
    pub fn new(ring_dimension: usize, sample_count: usize, concurrent: bool, upper_bound: f64) -> Self {
        Self {
            ring_dimension,
            sample_count,
            concurrent,
            upper_bound,
            seed: None,
            workers: None,
            state: BenchmarkState::Configured,
        }
    }

    /// Fix the sample stream (and encryption randomness).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the detected worker count for concurrent runs.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn state(&self) -> &BenchmarkState {
        &self.state
    }

    pub fn ring_dimension(&self) -> usize {
        self.ring_dimension
    }

    /// Build a context from the default parameters for the ring dimension,
    /// then run. The elapsed time includes context and key generation.
    pub fn run(&mut self) -> Result<BenchmarkRecord> {
        if self.sample_count == 0 {
            return self.finish(Ok((0.0, 0.0, Duration::ZERO)));
        }
        let start = Instant::now();
        self.state = BenchmarkState::Running;
        let context = match ParameterSet::default_for(self.ring_dimension).and_then(SchemeContext::new) {
            Ok(context) => context,
            Err(e) => return self.finish(Err(e)),
        };
        let outcome = self.measure(&context, start);
        self.finish(outcome)
    }

    /// Run against an existing context. Only the summation, merge and
    /// decryption are timed.
    pub fn run_with_context(&mut self, context: &SchemeContext) -> Result<BenchmarkRecord> {
        let start = Instant::now();
        self.state = BenchmarkState::Running;
        let outcome = self.measure(context, start);
        self.finish(outcome)
    }

    fn measure(&self, context: &SchemeContext, start: Instant) -> Result<(f64, f64, Duration)> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let workers = self.workers.unwrap_or_else(available_workers);
        info!(
            "Benchmark start: N={} count={} concurrent={} upper_bound={} seed={seed}",
            self.ring_dimension, self.sample_count, self.concurrent, self.upper_bound
        );

        let sum = if self.concurrent {
            sum_concurrent(context, self.sample_count, self.upper_bound, seed, workers)?
        } else {
            sum_sequential(context, self.sample_count, self.upper_bound, seed)?
        };
        let decrypted = sum.decrypt(&Channel::with_seed(context, seed))?;
        Ok((decrypted, sum.exact, start.elapsed()))
    }

    fn finish(&mut self, outcome: Result<(f64, f64, Duration)>) -> Result<BenchmarkRecord> {
        match outcome {
            Ok((decrypted, exact, elapsed_time)) => {
                let record = BenchmarkRecord {
                    ring_dimension: self.ring_dimension,
                    sample_count: self.sample_count,
                    concurrent: self.concurrent,
                    upper_bound: self.upper_bound,
                    error_ratio: error_ratio(decrypted, exact),
                    elapsed_time,
                };
                info!(
                    "Benchmark done: N={} count={} error_ratio={:e} in {:.3?}",
                    record.ring_dimension, record.sample_count, record.error_ratio, elapsed_time
                );
                self.state = BenchmarkState::Completed(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = BenchmarkState::Failed(e.clone());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckkskit_core::SecurityLevel;

    fn context() -> SchemeContext {
        let set = ParameterSet::new(1024, &[50, 30, 30, 50], 2f64.powi(30))
            .with_security(SecurityLevel::None);
        SchemeContext::builder(set).seed(41).build().unwrap()
    }

    #[test]
    fn test_chunk_bounds() {
        assert_eq!(chunk_bounds(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(chunk_bounds(2, 8), vec![0..1, 1..2]);
        assert_eq!(chunk_bounds(5, 0), vec![0..5]);
        assert!(chunk_bounds(0, 4).is_empty());
    }

    #[test]
    fn test_samples_are_indexed() {
        let all: Vec<f64> = samples(9, 0..10, 10.0).collect();
        let tail: Vec<f64> = samples(9, 6..10, 10.0).collect();
        assert_eq!(&all[6..], &tail[..]);
        assert!(all.iter().all(|v| (0.0..10.0).contains(v)));
    }

    #[test]
    fn test_error_ratio() {
        assert_eq!(error_ratio(0.5, 0.0), 0.5);
        assert!((error_ratio(101.0, 100.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_zero_samples_skip_crypto() {
        let ctx = context();
        let sum = sum_sequential(&ctx, 0, 10.0, 1).unwrap();
        assert!(sum.encrypted.is_none());
        let sum = sum_concurrent(&ctx, 0, 10.0, 1, 4).unwrap();
        assert!(sum.encrypted.is_none());
        assert_eq!(sum.exact, 0.0);

        // No context is built for an empty run, even for an unsupported dimension.
        let mut bench = Benchmark::new(3, 0, true, 10.0);
        let record = bench.run().unwrap();
        assert_eq!(record.error_ratio, 0.0);
        assert!(matches!(bench.state(), BenchmarkState::Completed(_)));
    }

    #[test]
    fn test_exact_sum_is_in_index_order() {
        let expected = samples(4, 0..50, 3.0).fold(0.0, |acc, v| acc + v);
        assert_eq!(exact_sum(4, 50, 3.0), expected);
        assert_eq!(exact_sum(4, 0, 3.0), 0.0);
    }

    #[test]
    fn test_concurrent_agrees_with_sequential() {
        let ctx = context();
        let seq = sum_sequential(&ctx, 203, 10.0, 77).unwrap();
        let par = sum_concurrent(&ctx, 203, 10.0, 77, 4).unwrap();
        assert_eq!(seq.exact, par.exact);
        assert_eq!(
            seq.encrypted.as_ref().map(|ct| &ct.parts),
            par.encrypted.as_ref().map(|ct| &ct.parts)
        );

        let channel = Channel::with_seed(&ctx, 0);
        let seq_ratio = error_ratio(seq.decrypt(&channel).unwrap(), seq.exact);
        let par_ratio = error_ratio(par.decrypt(&channel).unwrap(), par.exact);
        assert_eq!(seq_ratio, par_ratio);
        assert!(seq_ratio < 1e-6, "error ratio {seq_ratio}");
    }

    #[test]
    fn test_worker_count_does_not_change_the_sum() {
        let ctx = context();
        let single = sum_concurrent(&ctx, 40, 10.0, 5, 1).unwrap();
        for workers in [2, 3, 7, 40, 64] {
            let split = sum_concurrent(&ctx, 40, 10.0, 5, workers).unwrap();
            assert_eq!(
                single.encrypted.as_ref().map(|ct| &ct.parts),
                split.encrypted.as_ref().map(|ct| &ct.parts),
                "{workers} workers"
            );
        }
    }

    #[test]
    fn test_benchmark_modes_report_the_same_ratio() {
        let ctx = context();
        let mut seq = Benchmark::new(1024, 60, false, 10.0).with_seed(5);
        let mut par = Benchmark::new(1024, 60, true, 10.0).with_seed(5).with_workers(4);
        let seq = seq.run_with_context(&ctx).unwrap();
        let par = par.run_with_context(&ctx).unwrap();
        assert_eq!(seq.error_ratio, par.error_ratio);
    }

    #[test]
    fn test_state_transitions() {
        let ctx = context();
        let mut bench = Benchmark::new(1024, 20, false, 5.0).with_seed(3);
        assert_eq!(bench.state(), &BenchmarkState::Configured);
        let record = bench.run_with_context(&ctx).unwrap();
        assert_eq!(bench.state(), &BenchmarkState::Completed(record.clone()));
        assert_eq!(record.sample_count, 20);
        assert!(!record.concurrent);

        let mut failing = Benchmark::new(1024, 5, true, 1e30).with_seed(3).with_workers(2);
        assert!(failing.run_with_context(&ctx).is_err());
        assert!(matches!(
            failing.state(),
            BenchmarkState::Failed(CkksError::EncodingOverflow(_))
        ));
    }

    #[test]
    fn test_run_times_context_construction() {
        let mut bench = Benchmark::new(4096, 1, false, 10.0).with_seed(6);
        let outer = Instant::now();
        let record = bench.run().unwrap();
        let wall = outer.elapsed();
        // One sample is cheap next to context and key generation.
        assert!(record.elapsed_time > wall / 2, "{:?} of {wall:?}", record.elapsed_time);
        assert!(record.elapsed_time <= wall);
    }

    #[test]
    fn test_unsupported_dimension_fails() {
        let mut bench = Benchmark::new(3000, 10, false, 10.0);
        assert!(matches!(bench.run(), Err(CkksError::Configuration(_))));
        assert!(matches!(bench.state(), BenchmarkState::Failed(_)));
    }
}
