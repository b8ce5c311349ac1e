//! Cryptographic sampling for CKKS.
//!
//! - Secret key: ternary distribution {-1, 0, 1}
//! - Error vectors: discrete Gaussian with σ = 8/√(2π) ≈ 3.19, truncated at ±19
//! - Random polynomials: uniform in Z_q
//!
//! Signed samplers return plain integers so the same value can be lifted
//! into every RNS limb consistently.

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Standard deviation for the RLWE error distribution.
pub const ERROR_STD_DEV: f64 = 3.19;

/// Gaussian samples are rejected outside ±ERROR_BOUND (≈ 6σ).
pub const ERROR_BOUND: f64 = 19.0;

/// Ternary coefficients, each of -1, 0, 1 with probability 1/3.
pub fn sample_ternary<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.random_range(-1i64..=1)).collect()
}

/// Rounded, truncated Gaussian coefficients.
pub fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R, n: usize, sigma: f64) -> Vec<i64> {
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) => normal,
        // A non-finite or negative sigma degenerates to the zero error.
        Err(_) => return vec![0; n],
    };
    (0..n)
        .map(|_| loop {
            let x = normal.sample(rng);
            if x.abs() <= ERROR_BOUND {
                break x.round() as i64;
            }
        })
        .collect()
}

/// Uniform coefficients in [0, q).
pub fn sample_uniform<R: Rng + ?Sized>(rng: &mut R, n: usize, q: u64) -> Vec<u64> {
    (0..n).map(|_| rng.random_range(0..q)).collect()
}
