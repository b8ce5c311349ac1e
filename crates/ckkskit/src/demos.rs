//! Small encrypted circuits driven by the CLI.
//!
//! Each demo returns the encrypted result, the plaintext value it should
//! decrypt to, and the evaluator trace. Printing is left to the caller; an
//! optional observer also sees every step as it runs.

use ckkskit_core::{Ciphertext, CkksError, Result};

use crate::channel::Channel;
use crate::evaluator::Evaluator;
use crate::parameter_set::ParameterSet;
use crate::polynomial::{self, evaluate_plain};
use crate::selectable::{Flag, SelectableCollection};
use crate::trace::{EvalObserver, StepRecord, TraceRecorder};

#[derive(Debug, Clone)]
pub struct DemoRun {
    pub ciphertext: Ciphertext,
    pub expected: f64,
    pub trace: Vec<StepRecord>,
}

/// Smallest preset with enough levels for `depth` rescales.
pub fn preset_for_depth(depth: usize) -> ParameterSet {
    if depth <= 2 {
        ParameterSet::heavy()
    } else {
        ParameterSet::deep()
    }
}

/// a·b + c·d, each product relinearized and rescaled before the sum.
pub fn product_demo(
    channel: &mut Channel<'_>,
    [a, b, c, d]: [f64; 4],
    observer: Option<&dyn EvalObserver>,
) -> Result<DemoRun> {
    let context = channel.context();
    let scale = context.initial_scale();
    let inputs = [a, b, c, d]
        .iter()
        .map(|&v| channel.encode_encrypt(v, scale))
        .collect::<Result<Vec<_>>>()?;

    let recorder = TraceRecorder::forwarding(observer);
    let eval = Evaluator::with_observer(context, &recorder);
    let ab = eval.multiply_rescale(&inputs[0], &inputs[1])?;
    let cd = eval.multiply_rescale(&inputs[2], &inputs[3])?;
    let ciphertext = eval.add(&ab, &cd)?;

    Ok(DemoRun {
        ciphertext,
        expected: a * b + c * d,
        trace: recorder.take(),
    })
}

/// Left rotations that fold `count` slots into slot 0: 1, 2, 4, ...
pub fn mean_rotation_steps(count: usize) -> Vec<i64> {
    let span = count.next_power_of_two();
    std::iter::successors(Some(1usize), |&s| Some(s * 2))
        .take_while(|&s| s < span)
        .map(|s| s as i64)
        .collect()
}

/// Mean of `values`: encrypt them into slots, rotate-and-sum into slot 0,
/// then multiply by 1/count.
///
/// The channel's context needs Galois keys for [`mean_rotation_steps`].
pub fn mean_demo(
    channel: &mut Channel<'_>,
    values: &[f64],
    observer: Option<&dyn EvalObserver>,
) -> Result<DemoRun> {
    if values.is_empty() {
        return Err(CkksError::Configuration("mean of no values".into()));
    }
    let context = channel.context();
    let scale = context.initial_scale();
    let mut acc = channel.encode_encrypt_slots(values, scale)?;

    let recorder = TraceRecorder::forwarding(observer);
    let eval = Evaluator::with_observer(context, &recorder);
    for step in mean_rotation_steps(values.len()) {
        let rotated = eval.rotate(&acc, step)?;
        eval.add_inplace(&mut acc, &rotated)?;
    }
    let count = values.len() as f64;
    let scaled = eval.multiply_plain(&acc, 1.0 / count, scale)?;
    let ciphertext = eval.rescale(&scaled)?;

    Ok(DemoRun {
        ciphertext,
        expected: values.iter().sum::<f64>() / count,
        trace: recorder.take(),
    })
}

/// Evaluate the sign-approximating polynomial `coeffs` at an encrypted `input`.
pub fn sign_demo(
    channel: &mut Channel<'_>,
    coeffs: &[f64],
    input: f64,
    observer: Option<&dyn EvalObserver>,
) -> Result<DemoRun> {
    let context = channel.context();
    let x = channel.encode_encrypt(input, context.initial_scale())?;
    let evaluation = polynomial::evaluate_observed(context, &x, coeffs, observer)?;
    Ok(DemoRun {
        ciphertext: evaluation.ciphertext,
        expected: evaluate_plain(coeffs, input),
        trace: evaluation.trace,
    })
}

/// Coefficients of p(x / bound): c_i becomes c_i / bound^i.
pub fn scale_input(coeffs: &[f64], bound: f64) -> Vec<f64> {
    coeffs
        .iter()
        .zip(std::iter::successors(Some(1.0), |p| Some(p / bound)))
        .map(|(c, p)| c * p)
        .collect()
}

/// Approximate sign(a − b) for |a − b| ≤ `bound` under encryption.
///
/// The difference is taken homomorphically and the division by `bound` is
/// folded into the coefficients, so the comparison costs exactly the
/// polynomial's depth. Positive means a > b.
pub fn compare_demo(
    channel: &mut Channel<'_>,
    a: f64,
    b: f64,
    coeffs: &[f64],
    bound: f64,
    observer: Option<&dyn EvalObserver>,
) -> Result<DemoRun> {
    if !(bound.is_finite() && bound > 0.0) {
        return Err(CkksError::Configuration(format!("comparison bound {bound} must be positive")));
    }
    let context = channel.context();
    let scale = context.initial_scale();
    let x_a = channel.encode_encrypt(a, scale)?;
    let x_b = channel.encode_encrypt(b, scale)?;

    let recorder = TraceRecorder::forwarding(observer);
    let diff = Evaluator::with_observer(context, &recorder).sub(&x_a, &x_b)?;
    let scaled = scale_input(coeffs, bound);
    let evaluation = polynomial::evaluate_observed(context, &diff, &scaled, Some(&recorder))?;

    Ok(DemoRun {
        ciphertext: evaluation.ciphertext,
        expected: evaluate_plain(coeffs, (a - b) / bound),
        trace: recorder.take(),
    })
}

/// Sum of the values whose index is in `selected`, computed as a
/// flag-masked sum over all of them.
pub fn select_demo(
    channel: &mut Channel<'_>,
    values: &[f64],
    selected: &[usize],
    observer: Option<&dyn EvalObserver>,
) -> Result<DemoRun> {
    let mut collection = SelectableCollection::new(1);
    for &value in values {
        collection.push_plain(channel, value)?;
    }
    for &index in selected {
        let item = collection
            .item_mut(index)
            .ok_or_else(|| CkksError::Configuration(format!("no value at index {index}")))?;
        item.set_flag(channel, 0, Flag::On)?;
    }

    let recorder = TraceRecorder::forwarding(observer);
    let eval = Evaluator::with_observer(channel.context(), &recorder);
    let ciphertext = collection
        .operate_many_where_flag(&eval, 0)?
        .ok_or_else(|| CkksError::Configuration("nothing to select from".into()))?;

    let expected = values
        .iter()
        .enumerate()
        .filter(|(i, _)| selected.contains(i))
        .map(|(_, v)| v)
        .sum();
    Ok(DemoRun {
        ciphertext,
        expected,
        trace: recorder.take(),
    })
}
