//! Homomorphic operations on ciphertexts of one [`SchemeContext`].
//!
//! Thin wrapper over the `ckkskit-core` evaluator that supplies key material
//! from the context, encodes plaintext constants at the right scale and
//! level, and reports each step to an optional observer.
//!
//! Nothing here relinearizes or rescales behind the caller's back: a
//! product stays at size 3 and at the product scale until
//! [`Evaluator::relinearize`] and [`Evaluator::rescale`] are called.

use ckkskit_core::{Ciphertext, Result};

use crate::context::SchemeContext;
use crate::trace::{EvalObserver, Operation, StepRecord};

pub struct Evaluator<'a> {
    context: &'a SchemeContext,
    observer: Option<&'a dyn EvalObserver>,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a SchemeContext) -> Self {
        Self {
            context,
            observer: None,
        }
    }

    pub fn with_observer(context: &'a SchemeContext, observer: &'a dyn EvalObserver) -> Self {
        Self {
            context,
            observer: Some(observer),
        }
    }

    pub fn context(&self) -> &'a SchemeContext {
        self.context
    }

    fn emit(&self, operation: Operation, operands: &[&Ciphertext], result: &Ciphertext) {
        if let Some(observer) = self.observer {
            observer.on_step(&StepRecord::new(operation, operands, result));
        }
    }

    /// a + b. Scale and level must match exactly.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().add(a, b)?;
        self.emit(Operation::Add, &[a, b], &out);
        Ok(out)
    }

    /// a += b.
    pub fn add_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        match self.observer {
            Some(_) => {
                let before = a.clone();
                self.context.ckks().add_inplace(a, b)?;
                self.emit(Operation::Add, &[&before, b], a);
            }
            None => self.context.ckks().add_inplace(a, b)?,
        }
        Ok(())
    }

    /// Fold `ct` into a running sum. An empty sum takes `ct` as it is, so
    /// no encryption of 0 is ever added implicitly.
    pub fn accumulate(&self, acc: &mut Option<Ciphertext>, ct: Ciphertext) -> Result<()> {
        match acc {
            Some(sum) => self.add_inplace(sum, &ct),
            None => {
                *acc = Some(ct);
                Ok(())
            }
        }
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().sub(a, b)?;
        self.emit(Operation::Sub, &[a, b], &out);
        Ok(out)
    }

    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().negate(ct)?;
        self.emit(Operation::Negate, &[ct], &out);
        Ok(out)
    }

    /// Tensor product. The result has size 3 and scale `a.scale * b.scale`.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().multiply(a, b)?;
        self.emit(Operation::Multiply, &[a, b], &out);
        Ok(out)
    }

    pub fn relinearize(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().relinearize(ct, self.context.relin_keys())?;
        self.emit(Operation::Relinearize, &[ct], &out);
        Ok(out)
    }

    /// Drop the last modulus and divide the scale by it.
    ///
    /// Fails with `ChainExhausted` at level 0.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let out = self.context.ckks().rescale(ct)?;
        self.emit(Operation::Rescale, &[ct], &out);
        Ok(out)
    }

    pub fn mod_switch_to(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext> {
        if level == ct.level {
            return Ok(ct.clone());
        }
        let out = self.context.ckks().mod_switch_to(ct, level)?;
        self.emit(Operation::ModSwitch, &[ct], &out);
        Ok(out)
    }

    /// ct · value, with `value` encoded at `plain_scale` on the ciphertext's level.
    pub fn multiply_plain(&self, ct: &Ciphertext, value: f64, plain_scale: f64) -> Result<Ciphertext> {
        let pt = self.context.ckks().encode_scalar(value, plain_scale, ct.level)?;
        let out = self.context.ckks().multiply_plain(ct, &pt)?;
        self.emit(Operation::MultiplyPlain, &[ct], &out);
        Ok(out)
    }

    /// ct + value, with `value` encoded at the ciphertext's exact scale and level.
    pub fn add_plain(&self, ct: &Ciphertext, value: f64) -> Result<Ciphertext> {
        let pt = self.context.ckks().encode_scalar(value, ct.scale, ct.level)?;
        let out = self.context.ckks().add_plain(ct, &pt)?;
        self.emit(Operation::AddPlain, &[ct], &out);
        Ok(out)
    }

    /// Rotate slots left by `steps`. Needs a Galois key for `steps`.
    pub fn rotate(&self, ct: &Ciphertext, steps: i64) -> Result<Ciphertext> {
        let out = self.context.ckks().rotate(ct, steps, self.context.galois_keys())?;
        self.emit(Operation::Rotate(steps), &[ct], &out);
        Ok(out)
    }

    /// multiply, relinearize, rescale.
    pub fn multiply_rescale(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let product = self.multiply(a, b)?;
        let relinearized = self.relinearize(&product)?;
        self.rescale(&relinearized)
    }
}
