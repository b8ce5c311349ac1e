//! Encrypted polynomial evaluation for sign approximation.
//!
//! Coefficients come from a [`CoefficientStrategy`] in the power basis,
//! lowest degree first. [`evaluate`] runs Horner's rule on a ciphertext and
//! returns the result together with the scale/level trace of every step.

use std::f64::consts::PI;

use ckkskit_core::{Ciphertext, CkksError, Result};

use crate::context::SchemeContext;
use crate::evaluator::Evaluator;
use crate::trace::{EvalObserver, StepRecord, TraceRecorder};

/// Odd cubic approximation of sign(x) on [-1, 1].
pub const CUBIC_SIGN: [f64; 4] = [0.0, 1.211324865405185, 0.0, -0.84529946162075];

/// Where the coefficients of the approximating polynomial come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CoefficientStrategy {
    /// Power-basis coefficients of the Chebyshev polynomial T_{terms-1}.
    Chebyshev { terms: usize },
    /// Lagrange-style basis built from truncated sine nodes.
    Lagrange { terms: usize },
    Explicit(Vec<f64>),
}

impl CoefficientStrategy {
    pub fn cubic() -> Self {
        Self::Explicit(CUBIC_SIGN.to_vec())
    }

    pub fn coefficients(&self) -> Result<Vec<f64>> {
        match self {
            Self::Chebyshev { terms } => chebyshev_coefficients(*terms),
            Self::Lagrange { terms } => lagrange_coefficients(*terms),
            Self::Explicit(coeffs) if coeffs.is_empty() => Err(CkksError::Configuration(
                "explicit coefficient list is empty".into(),
            )),
            Self::Explicit(coeffs) => Ok(coeffs.clone()),
        }
    }
}

/// T_0 = 1, T_1 = x, T_n = 2x·T_{n-1} − T_{n-2}; returns T_{terms-1}.
///
/// The recurrence runs in exact integer arithmetic. Fails when a
/// coefficient overflows `i64` or cannot be represented exactly as `f64`.
pub fn chebyshev_coefficients(terms: usize) -> Result<Vec<f64>> {
    if terms == 0 {
        return Err(CkksError::Configuration(
            "Chebyshev strategy needs at least one term".into(),
        ));
    }
    let overflow = || {
        CkksError::Configuration(format!("Chebyshev coefficients of T_{} overflow", terms - 1))
    };

    let mut prev: Vec<i64> = vec![1];
    let mut cur: Vec<i64> = vec![0, 1];
    if terms == 1 {
        cur = prev.clone();
    }
    for _ in 2..terms {
        let mut next = vec![0i64; cur.len() + 1];
        for (k, &c) in cur.iter().enumerate() {
            next[k + 1] = c.checked_mul(2).ok_or_else(overflow)?;
        }
        for (k, &p) in prev.iter().enumerate() {
            next[k] = next[k].checked_sub(p).ok_or_else(overflow)?;
        }
        prev = std::mem::replace(&mut cur, next);
    }

    cur.iter()
        .map(|&c| {
            if fits_f64(c) {
                Ok(c as f64)
            } else {
                Err(overflow())
            }
        })
        .collect()
}

// Exact when the significant bits, after dropping trailing zeros, fit the mantissa.
fn fits_f64(c: i64) -> bool {
    if c == 0 {
        return true;
    }
    let magnitude = c.unsigned_abs();
    let significant = u64::BITS - magnitude.leading_zeros() - magnitude.trailing_zeros();
    significant <= f64::MANTISSA_DIGITS
}

/// Truncated Taylor series of sin up to x^9.
pub fn sin_taylor(x: f64) -> f64 {
    let x2 = x * x;
    let x4 = x2 * x2;
    let x6 = x4 * x2;
    let x8 = x4 * x4;
    x * (1.0 - x2 / 6.0 + x4 / 120.0 - x6 / 5040.0 + x8 / 362880.0)
}

/// For i in 1..=terms, with nodes s_j = sin_taylor(jπ/(terms+3)):
///   c_{i-1} = 1 / s_i / Π_{j ≤ ⌈(terms+1)/2⌉, j ≠ i} (s_i² − s_j²)
pub fn lagrange_coefficients(terms: usize) -> Result<Vec<f64>> {
    if terms == 0 {
        return Err(CkksError::Configuration(
            "Lagrange strategy needs at least one term".into(),
        ));
    }
    let step = PI / (terms + 3) as f64;
    let half = (terms + 1).div_ceil(2);
    let coeffs = (1..=terms)
        .map(|i| {
            let den = sin_taylor(i as f64 * step);
            let prod: f64 = (1..=half)
                .filter(|&j| j != i)
                .map(|j| {
                    let node = sin_taylor(j as f64 * step);
                    den * den - node * node
                })
                .product();
            1.0 / den / prod
        })
        .collect();
    Ok(coeffs)
}

/// Rescales needed to evaluate `coeffs` with [`evaluate`].
pub fn depth(coeffs: &[f64]) -> usize {
    coeffs.len().saturating_sub(1).max(1)
}

/// Plaintext Horner evaluation, for comparison with the encrypted result.
pub fn evaluate_plain(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// An encrypted polynomial value with the steps that produced it.
#[derive(Debug, Clone)]
pub struct PolynomialEvaluation {
    pub ciphertext: Ciphertext,
    pub trace: Vec<StepRecord>,
}

/// Horner's rule on ciphertext `x`:
///
///   acc = rescale(c_d · x)
///   for i = d-1 .. 0:
///       acc = acc + c_i                      (c_i at acc's scale and level)
///       if i > 0: acc = rescale(relin(acc · x))
///
/// A constant polynomial is evaluated as 0·x + c_0. Fails with
/// `ChainExhausted` at `x`'s level, before any operation, when `x` has
/// fewer levels than [`depth`].
pub fn evaluate(context: &SchemeContext, x: &Ciphertext, coeffs: &[f64]) -> Result<PolynomialEvaluation> {
    evaluate_observed(context, x, coeffs, None)
}

/// [`evaluate`], also handing every step to `observer` as it happens.
pub fn evaluate_observed(
    context: &SchemeContext,
    x: &Ciphertext,
    coeffs: &[f64],
    observer: Option<&dyn EvalObserver>,
) -> Result<PolynomialEvaluation> {
    let (&leading, rest) = coeffs
        .split_last()
        .ok_or_else(|| CkksError::Configuration("no coefficients to evaluate".into()))?;
    // [c_0] becomes (leading 0, rest [c_0]).
    let (leading, rest) = if rest.is_empty() { (0.0, coeffs) } else { (leading, rest) };
    if depth(coeffs) > x.level {
        return Err(CkksError::ChainExhausted { level: x.level });
    }

    let recorder = TraceRecorder::forwarding(observer);
    let eval = Evaluator::with_observer(context, &recorder);

    let mut acc = eval.multiply_plain(x, leading, context.initial_scale())?;
    acc = eval.rescale(&acc)?;
    for (i, &c) in rest.iter().enumerate().rev() {
        acc = eval.add_plain(&acc, c)?;
        if i > 0 {
            let x_low = eval.mod_switch_to(x, acc.level)?;
            acc = eval.multiply_rescale(&acc, &x_low)?;
        }
    }

    Ok(PolynomialEvaluation {
        ciphertext: acc,
        trace: recorder.take(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::parameter_set::ParameterSet;
    use crate::trace::Operation;
    use ckkskit_core::SecurityLevel;

    fn assert_coeffs(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_chebyshev_known_polynomials() {
        assert_eq!(chebyshev_coefficients(1).unwrap(), vec![1.0]);
        assert_eq!(chebyshev_coefficients(2).unwrap(), vec![0.0, 1.0]);
        assert_eq!(chebyshev_coefficients(3).unwrap(), vec![-1.0, 0.0, 2.0]);
        assert_eq!(chebyshev_coefficients(4).unwrap(), vec![0.0, -3.0, 0.0, 4.0]);
        assert_eq!(
            chebyshev_coefficients(6).unwrap(),
            vec![0.0, 5.0, 0.0, -20.0, 0.0, 16.0]
        );
    }

    #[test]
    fn test_chebyshev_overflow_is_configuration_error() {
        assert!(chebyshev_coefficients(40).is_ok());
        assert!(matches!(
            chebyshev_coefficients(80),
            Err(CkksError::Configuration(_))
        ));
    }

    #[test]
    fn test_lagrange_known_values() {
        assert_coeffs(&lagrange_coefficients(1).unwrap(), &[1.4142135588724558]);
        assert_coeffs(
            &lagrange_coefficients(3).unwrap(),
            &[-3.9999994275178903, 2.3094006361552455, 5.333114439135394],
        );
    }

    #[test]
    fn test_zero_terms_rejected() {
        for strategy in [
            CoefficientStrategy::Chebyshev { terms: 0 },
            CoefficientStrategy::Lagrange { terms: 0 },
            CoefficientStrategy::Explicit(Vec::new()),
        ] {
            assert!(matches!(
                strategy.coefficients(),
                Err(CkksError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(&[3.0]), 1);
        assert_eq!(depth(&[0.0, 1.0]), 1);
        assert_eq!(depth(&CUBIC_SIGN), 3);
    }

    fn context() -> SchemeContext {
        let set = ParameterSet::new(2048, &[60, 40, 40, 40, 60], 2f64.powi(40))
            .with_security(SecurityLevel::None);
        SchemeContext::builder(set).seed(5).build().unwrap()
    }

    #[test]
    fn test_evaluate_cubic_matches_plaintext() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 17);
        let x = channel.encode_encrypt(0.5, ctx.initial_scale()).unwrap();

        let result = evaluate(&ctx, &x, &CUBIC_SIGN).unwrap();
        let value = channel.decrypt_decode(&result.ciphertext).unwrap();
        let expected = evaluate_plain(&CUBIC_SIGN, 0.5);
        assert!((value - expected).abs() < 1e-4, "decoded {value}, expected {expected}");
        assert_eq!(result.ciphertext.level, 0);

        let rescales = result
            .trace
            .iter()
            .filter(|r| r.operation == Operation::Rescale)
            .count();
        assert_eq!(rescales, 3);
        assert_eq!(result.trace[0].operation, Operation::MultiplyPlain);
    }

    #[test]
    fn test_evaluate_constant() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 18);
        let x = channel.encode_encrypt(0.75, ctx.initial_scale()).unwrap();
        let result = evaluate(&ctx, &x, &[2.5]).unwrap();
        let value = channel.decrypt_decode(&result.ciphertext).unwrap();
        assert!((value - 2.5).abs() < 1e-4, "decoded {value}");
    }

    #[test]
    fn test_evaluate_too_deep_exhausts_chain() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 19);
        let x = channel.encode_encrypt(0.5, ctx.initial_scale()).unwrap();
        let coeffs = chebyshev_coefficients(5).unwrap();
        assert_eq!(
            evaluate(&ctx, &x, &coeffs).err(),
            Some(CkksError::ChainExhausted { level: 3 })
        );

        let low = Evaluator::new(&ctx).mod_switch_to(&x, 1).unwrap();
        assert_eq!(
            evaluate(&ctx, &low, &CUBIC_SIGN).err(),
            Some(CkksError::ChainExhausted { level: 1 })
        );
    }

    #[test]
    fn test_evaluate_forwards_steps() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 20);
        let x = channel.encode_encrypt(-0.25, ctx.initial_scale()).unwrap();
        let forwarded = TraceRecorder::new();
        let result = evaluate_observed(&ctx, &x, &CUBIC_SIGN, Some(&forwarded)).unwrap();
        assert_eq!(forwarded.take(), result.trace);
    }
}
