//! Encode→encrypt and decrypt→decode for real values.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use ckkskit_core::{Ciphertext, CkksError, Result};

use crate::context::SchemeContext;
use crate::evaluator::Evaluator;

/// Moves reals in and out of the encrypted domain of one context.
///
/// The channel owns the randomness used for encryption, so two channels
/// with the same seed over the same context produce identical ciphertexts.
pub struct Channel<'ctx> {
    context: &'ctx SchemeContext,
    rng: ChaCha20Rng,
}

impl<'ctx> Channel<'ctx> {
    pub fn new(context: &'ctx SchemeContext) -> Self {
        Self::with_rng(context, ChaCha20Rng::from_rng(&mut rand::rng()))
    }

    pub fn with_seed(context: &'ctx SchemeContext, seed: u64) -> Self {
        Self::with_rng(context, ChaCha20Rng::seed_from_u64(seed))
    }

    pub fn with_rng(context: &'ctx SchemeContext, rng: ChaCha20Rng) -> Self {
        Self { context, rng }
    }

    pub fn context(&self) -> &'ctx SchemeContext {
        self.context
    }

    /// Encode `value` at `scale` and encrypt it under the public key, at the
    /// top data level.
    ///
    /// Fails with `EncodingOverflow` when `value * scale` does not fit the
    /// modulus chain.
    pub fn encode_encrypt(&mut self, value: f64, scale: f64) -> Result<Ciphertext> {
        let ckks = self.context.ckks();
        let pt = ckks.encode_scalar(value, scale, self.context.max_level())?;
        ckks.encrypt(&pt, self.context.public_key(), &mut self.rng)
    }

    /// Encode up to N/2 values into the slots and encrypt them.
    pub fn encode_encrypt_slots(&mut self, values: &[f64], scale: f64) -> Result<Ciphertext> {
        let ckks = self.context.ckks();
        let pt = ckks.encode_slots(values, scale, self.context.max_level())?;
        ckks.encrypt(&pt, self.context.public_key(), &mut self.rng)
    }

    /// Decrypt and return the first slot.
    ///
    /// Fails with `Decryption` for a ciphertext that this context did not
    /// produce or whose shape does not match its level.
    pub fn decrypt_decode(&self, ct: &Ciphertext) -> Result<f64> {
        self.decrypt_decode_slots(ct)?
            .first()
            .copied()
            .ok_or_else(|| CkksError::Decryption("decoded no slots".into()))
    }

    pub fn decrypt_decode_slots(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        let ckks = self.context.ckks();
        let pt = ckks.decrypt(ct, self.context.secret_key())?;
        ckks.decode(&pt).map_err(|e| CkksError::Decryption(e.to_string()))
    }

    /// Encrypt then decrypt at the parameter set's initial scale.
    pub fn round_trip(&mut self, value: f64) -> Result<f64> {
        let ct = self.encode_encrypt(value, self.context.initial_scale())?;
        self.decrypt_decode(&ct)
    }

    /// Encrypt every value at the initial scale and add them up in place.
    ///
    /// Returns `None` for an empty slice without touching the scheme; such
    /// a sum decodes to 0. Otherwise the first ciphertext is the accumulator.
    pub fn sum(&mut self, values: &[f64]) -> Result<Option<Ciphertext>> {
        let scale = self.context.initial_scale();
        let evaluator = Evaluator::new(self.context);
        let mut acc = None;
        for &value in values {
            let ct = self.encode_encrypt(value, scale)?;
            evaluator.accumulate(&mut acc, ct)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_set::ParameterSet;
    use ckkskit_core::SecurityLevel;

    fn context(scale: f64) -> SchemeContext {
        let set = ParameterSet::new(1024, &[50, 30, 30, 50], scale).with_security(SecurityLevel::None);
        SchemeContext::builder(set).seed(21).build().unwrap()
    }

    fn mean_abs_error(ctx: &SchemeContext, values: &[f64]) -> f64 {
        let mut channel = Channel::with_seed(ctx, 99);
        let total: f64 = values
            .iter()
            .map(|&v| (channel.round_trip(v).unwrap() - v).abs())
            .sum();
        total / values.len() as f64
    }

    #[test]
    fn test_round_trip_error_shrinks_with_scale() {
        let values = [0.0, 1.0, -3.5, 7.25, 42.0];
        let coarse = mean_abs_error(&context(2f64.powi(12)), &values);
        let fine = mean_abs_error(&context(2f64.powi(30)), &values);
        assert!(fine < coarse, "coarse={coarse} fine={fine}");
        assert!(fine < 1e-5, "fine={fine}");
    }

    #[test]
    fn test_additive_homomorphism() {
        let ctx = context(2f64.powi(30));
        let mut channel = Channel::with_seed(&ctx, 1);
        let eval = Evaluator::new(&ctx);
        let a = channel.encode_encrypt(3.25, ctx.initial_scale()).unwrap();
        let b = channel.encode_encrypt(-1.5, ctx.initial_scale()).unwrap();
        let sum = channel.decrypt_decode(&eval.add(&a, &b).unwrap()).unwrap();
        assert!((sum - 1.75).abs() < 1e-4, "decoded {sum}");
    }

    #[test]
    fn test_encoding_overflow() {
        let ctx = context(2f64.powi(30));
        let mut channel = Channel::with_seed(&ctx, 2);
        assert!(matches!(
            channel.encode_encrypt(1e30, 2f64.powi(40)),
            Err(CkksError::EncodingOverflow(_))
        ));
        assert!(matches!(
            channel.encode_encrypt(f64::NAN, ctx.initial_scale()),
            Err(CkksError::EncodingOverflow(_))
        ));
    }

    #[test]
    fn test_decrypt_with_foreign_context_fails() {
        let ours = context(2f64.powi(30));
        let theirs = context(2f64.powi(30));
        let mut sender = Channel::with_seed(&ours, 3);
        let receiver = Channel::with_seed(&theirs, 3);
        let ct = sender.encode_encrypt(1.0, ours.initial_scale()).unwrap();
        assert!(matches!(receiver.decrypt_decode(&ct), Err(CkksError::Decryption(_))));
    }

    #[test]
    fn test_decrypt_malformed_ciphertext_fails() {
        let ctx = context(2f64.powi(30));
        let mut channel = Channel::with_seed(&ctx, 4);
        let mut ct = channel.encode_encrypt(1.0, ctx.initial_scale()).unwrap();
        ct.level = 7;
        assert!(matches!(channel.decrypt_decode(&ct), Err(CkksError::Decryption(_))));
    }

    #[test]
    fn test_sum() {
        let ctx = context(2f64.powi(30));
        let mut channel = Channel::with_seed(&ctx, 5);
        assert!(channel.sum(&[]).unwrap().is_none());

        let ct = channel.sum(&[1.0, 2.5, -0.5, 4.0]).unwrap().unwrap();
        let total = channel.decrypt_decode(&ct).unwrap();
        assert!((total - 7.0).abs() < 1e-4, "decoded {total}");
    }

    #[test]
    fn test_same_seed_same_ciphertext() {
        let ctx = context(2f64.powi(30));
        let a = Channel::with_seed(&ctx, 8).encode_encrypt(1.0, 2f64.powi(30)).unwrap();
        let b = Channel::with_seed(&ctx, 8).encode_encrypt(1.0, 2f64.powi(30)).unwrap();
        assert_eq!(a.parts, b.parts);
    }
}
