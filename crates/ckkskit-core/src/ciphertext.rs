//! CKKS ciphertexts, plaintexts and the scheme context.
//!
//! A ciphertext at level ℓ is a list of RNS polynomials (c_0, c_1, ..., c_k)
//! over q_0..q_ℓ, kept in the NTT domain. It decrypts to
//!   m ≈ c_0 + c_1·s + c_2·s² + ...
//! Fresh ciphertexts have two parts; an unrelinearized product has three.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use rand::Rng;

use crate::encoding::CkksEncoder;
use crate::error::{CkksError, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::ntt::{forward_poly, inverse_poly, NttTables};
use crate::params::{CkksParams, Modulus};
use crate::rns::{CrtComposer, RnsPoly};
use crate::sampling::{sample_gaussian, sample_ternary, ERROR_STD_DEV};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An encoded message in the NTT domain.
#[derive(Debug, Clone)]
pub struct Plaintext {
    pub poly: RnsPoly,
    pub scale: f64,
    pub level: usize,
}

/// A CKKS ciphertext.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    /// Components c_0, c_1, ... (NTT domain, level + 1 limbs each).
    pub parts: Vec<RnsPoly>,
    /// Current scale Δ.
    pub scale: f64,
    /// Index of the last data modulus still present.
    pub level: usize,
    /// Id of the context that produced this ciphertext.
    pub context_id: u64,
}

impl Ciphertext {
    /// Number of polynomial components.
    pub fn size(&self) -> usize {
        self.parts.len()
    }
}

/// Pre-computed tables for one parameter set.
#[derive(Debug, Clone)]
pub struct CkksContext {
    id: u64,
    pub params: CkksParams,
    /// NTT tables, one per modulus (special prime last).
    pub ntt_tables: Vec<NttTables>,
    pub encoder: CkksEncoder,
    /// CRT reconstruction for q_0..q_ℓ, indexed by level ℓ.
    crt: Vec<CrtComposer>,
}

impl CkksContext {
    pub fn new(params: CkksParams) -> Result<Self> {
        let ntt_tables = NttTables::for_moduli(params.poly_degree, &params.moduli)?;
        let encoder = CkksEncoder::new(params.poly_degree);
        let data = params.data_moduli();
        let crt = (0..data.len())
            .map(|level| CrtComposer::new(&data[..=level]))
            .collect();
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);

        debug!(
            "CKKS context {id}: N={}, moduli={:?}",
            params.poly_degree,
            params.moduli.iter().map(|m| m.bits).collect::<Vec<_>>()
        );

        Ok(Self {
            id,
            params,
            ntt_tables,
            encoder,
            crt,
        })
    }

    /// Process-unique identifier stamped on everything this context creates.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Moduli q_0..q_level.
    pub fn level_moduli(&self, level: usize) -> &[Modulus] {
        &self.params.moduli[..=level]
    }

    /// Encode one value as a constant polynomial at `level`.
    pub fn encode_scalar(&self, value: f64, scale: f64, level: usize) -> Result<Plaintext> {
        self.check_level(level)?;
        let poly = self.encoder.encode_scalar(value, scale, self.level_moduli(level))?;
        Ok(self.plaintext_from_coeffs(poly, scale, level))
    }

    /// Encode a slot vector at `level`.
    pub fn encode_slots(&self, values: &[f64], scale: f64, level: usize) -> Result<Plaintext> {
        self.check_level(level)?;
        let poly = self.encoder.encode_slots(values, scale, self.level_moduli(level))?;
        Ok(self.plaintext_from_coeffs(poly, scale, level))
    }

    /// Slot values of a plaintext.
    pub fn decode(&self, pt: &Plaintext) -> Result<Vec<f64>> {
        self.check_level(pt.level)?;
        let mut coeffs = pt.poly.clone();
        inverse_poly(&mut coeffs, &self.ntt_tables);
        let centered = self.crt[pt.level].compose_poly(&coeffs);
        Ok(self.encoder.decode(&centered, pt.scale))
    }

    /// Public-key encryption at the plaintext's level.
    ///
    ///   u ← ternary, e_0, e_1 ← Gaussian
    ///   c_0 = b·u + e_0 + m,  c_1 = a·u + e_1
    pub fn encrypt<R: Rng + ?Sized>(&self, pt: &Plaintext, pk: &PublicKey, rng: &mut R) -> Result<Ciphertext> {
        if pk.context_id != self.id {
            return Err(CkksError::ParameterMismatch(
                "public key belongs to another context".into(),
            ));
        }
        self.check_level(pt.level)?;
        let level = pt.level;
        let moduli = self.level_moduli(level);
        let n = self.params.poly_degree;

        let mut u = RnsPoly::from_signed(&sample_ternary(rng, n), moduli);
        forward_poly(&mut u, &self.ntt_tables);
        let e0 = self.error_ntt(rng, moduli);
        let e1 = self.error_ntt(rng, moduli);

        let mut b = pk.b.clone();
        let mut a = pk.a.clone();
        b.truncate(level + 1);
        a.truncate(level + 1);

        let mut c0 = b.hadamard_mul(&u, moduli);
        c0.add_assign(&e0, moduli);
        c0.add_assign(&pt.poly, moduli);
        let mut c1 = a.hadamard_mul(&u, moduli);
        c1.add_assign(&e1, moduli);

        Ok(Ciphertext {
            parts: vec![c0, c1],
            scale: pt.scale,
            level,
            context_id: self.id,
        })
    }

    /// Decrypt a ciphertext of any size.
    ///
    /// Fails with [`CkksError::Decryption`] when the ciphertext was produced
    /// under another context or its shape does not match its level.
    pub fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext> {
        if ct.context_id != self.id || sk.context_id != self.id {
            return Err(CkksError::Decryption(format!(
                "ciphertext from context {} cannot be decrypted by context {}",
                ct.context_id, self.id
            )));
        }
        self.validate_shape(ct).map_err(|e| CkksError::Decryption(e.to_string()))?;

        let moduli = self.level_moduli(ct.level);
        let mut s = sk.s.clone();
        s.truncate(ct.level + 1);

        // Horner in s: m = (...(c_k·s + c_{k-1})·s + ...)·s + c_0
        let mut parts = ct.parts.iter().rev();
        let mut m = match parts.next() {
            Some(last) => last.clone(),
            None => return Err(CkksError::Decryption("empty ciphertext".into())),
        };
        for part in parts {
            m = m.hadamard_mul(&s, moduli);
            m.add_assign(part, moduli);
        }

        Ok(Plaintext {
            poly: m,
            scale: ct.scale,
            level: ct.level,
        })
    }

    /// Ciphertext shape must agree with this context: size ≥ 2, level in
    /// range, level + 1 limbs of N coefficients per part.
    pub fn validate_shape(&self, ct: &Ciphertext) -> Result<()> {
        self.check_level(ct.level)?;
        if ct.size() < 2 {
            return Err(CkksError::UnsupportedSize { size: ct.size() });
        }
        let expected = ct.level + 1;
        for part in &ct.parts {
            if part.num_limbs() != expected || part.n != self.params.poly_degree {
                return Err(CkksError::ParameterMismatch(format!(
                    "component has {} limbs of {} coefficients, level {} needs {expected} of {}",
                    part.num_limbs(),
                    part.n,
                    ct.level,
                    self.params.poly_degree
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_level(&self, level: usize) -> Result<()> {
        if level > self.params.max_level() {
            return Err(CkksError::ParameterMismatch(format!(
                "level {level} above the top data level {}",
                self.params.max_level()
            )));
        }
        Ok(())
    }

    fn plaintext_from_coeffs(&self, mut poly: RnsPoly, scale: f64, level: usize) -> Plaintext {
        forward_poly(&mut poly, &self.ntt_tables);
        Plaintext { poly, scale, level }
    }

    fn error_ntt<R: Rng + ?Sized>(&self, rng: &mut R, moduli: &[Modulus]) -> RnsPoly {
        let coeffs = sample_gaussian(rng, self.params.poly_degree, ERROR_STD_DEV);
        let mut e = RnsPoly::from_signed(&coeffs, moduli);
        forward_poly(&mut e, &self.ntt_tables);
        e
    }
}
