//! Homomorphic operations on ciphertexts.
//!
//! Everything runs in the NTT domain except the steps that need coefficient
//! form: rescaling (centering the dropped limb), key switching (digit lifting)
//! and Galois automorphisms.
//!
//! No operation relinearizes or rescales on its own; callers compose
//! `multiply → relinearize → rescale` explicitly.

use crate::ciphertext::{Ciphertext, CkksContext, Plaintext};
use crate::error::{CkksError, Result};
use crate::keys::{apply_galois, galois_element, GaloisKeys, RelinKeys};
use crate::ntt::{forward_poly, inverse_poly, negacyclic_ntt_forward, negacyclic_ntt_inverse};
use crate::rns::{center, mod_inv, mod_mul, mod_sub, reduce_i64, RnsPoly};

impl CkksContext {
    /// a + b. Scale, level and context must match exactly.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut result = a.clone();
        self.add_inplace(&mut result, b)?;
        Ok(result)
    }

    /// a += b.
    pub fn add_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        self.check_owned(a)?;
        self.check_owned(b)?;
        check_compatible(a, b)?;
        let moduli = self.level_moduli(a.level);
        if b.size() > a.size() {
            let n = self.params.poly_degree;
            a.parts.resize(b.size(), RnsPoly::zero(n, a.level + 1));
        }
        for (x, y) in a.parts.iter_mut().zip(&b.parts) {
            x.add_assign(y, moduli);
        }
        Ok(())
    }

    /// a - b under the same rules as [`CkksContext::add`].
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let negated = self.negate(b)?;
        self.add(a, &negated)
    }

    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        let moduli = self.level_moduli(ct.level);
        Ok(Ciphertext {
            parts: ct.parts.iter().map(|p| p.negate(moduli)).collect(),
            ..ct.clone()
        })
    }

    /// Tensor product. The result has size |a| + |b| - 1 and scale Δ_a·Δ_b.
    ///
    /// Levels must match; the product scale must fit the modulus at that level.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_owned(a)?;
        self.check_owned(b)?;
        if a.level != b.level {
            return Err(CkksError::ParameterMismatch(format!(
                "operand levels differ: {} vs {}",
                a.level, b.level
            )));
        }
        let scale = a.scale * b.scale;
        self.check_scale_fits(scale, a.level)?;

        let moduli = self.level_moduli(a.level);
        let n = self.params.poly_degree;
        let mut parts = vec![RnsPoly::zero(n, a.level + 1); a.size() + b.size() - 1];
        for (i, x) in a.parts.iter().enumerate() {
            for (j, y) in b.parts.iter().enumerate() {
                parts[i + j].mul_acc(x, y, moduli);
            }
        }

        Ok(Ciphertext {
            parts,
            scale,
            level: a.level,
            context_id: a.context_id,
        })
    }

    /// Reduce a size-3 ciphertext back to size 2.
    pub fn relinearize(&self, ct: &Ciphertext, keys: &RelinKeys) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if keys.context_id != ct.context_id {
            return Err(CkksError::ParameterMismatch(
                "relinearization keys belong to another context".into(),
            ));
        }
        match ct.size() {
            2 => return Ok(ct.clone()),
            3 => {}
            size => return Err(CkksError::UnsupportedSize { size }),
        }

        let moduli = self.level_moduli(ct.level);
        let (k0, k1) = keys.key.switch(self, &ct.parts[2], ct.level);
        let c0 = ct.parts[0].add(&k0, moduli);
        let c1 = ct.parts[1].add(&k1, moduli);
        Ok(Ciphertext {
            parts: vec![c0, c1],
            ..ct.clone()
        })
    }

    /// Drop q_ℓ, divide by it and decrement the level.
    ///
    /// Each limb becomes (c_i - [c]_{q_ℓ}) · q_ℓ^{-1} mod q_i, where [c]_{q_ℓ}
    /// is the centered residue of the dropped limb.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if ct.level == 0 {
            return Err(CkksError::ChainExhausted { level: 0 });
        }
        let last = ct.level;
        let q_last = self.params.moduli[last].value;

        let parts = ct
            .parts
            .iter()
            .map(|part| {
                let mut dropped = part.limbs[last].clone();
                negacyclic_ntt_inverse(&mut dropped, &self.ntt_tables[last]);
                let centered: Vec<i64> = dropped.iter().map(|&x| center(x, q_last)).collect();

                let mut out = part.clone();
                out.truncate(last);
                for (i, limb) in out.limbs.iter_mut().enumerate() {
                    let q = self.params.moduli[i].value;
                    let inv = mod_inv(q_last % q, q);
                    let mut r: Vec<u64> = centered.iter().map(|&x| reduce_i64(x, q)).collect();
                    negacyclic_ntt_forward(&mut r, &self.ntt_tables[i]);
                    for (x, &y) in limb.iter_mut().zip(&r) {
                        *x = mod_mul(mod_sub(*x, y, q), inv, q);
                    }
                }
                out
            })
            .collect();

        Ok(Ciphertext {
            parts,
            scale: ct.scale / q_last as f64,
            level: last - 1,
            context_id: ct.context_id,
        })
    }

    /// Drop moduli down to `level` without touching the scale.
    pub fn mod_switch_to(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if level > ct.level {
            return Err(CkksError::ParameterMismatch(format!(
                "cannot switch from level {} up to level {level}",
                ct.level
            )));
        }
        let mut out = ct.clone();
        for part in &mut out.parts {
            part.truncate(level + 1);
        }
        out.level = level;
        Ok(out)
    }

    /// ct ⊙ pt. The plaintext must sit at the ciphertext's level.
    pub fn multiply_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if pt.level != ct.level {
            return Err(CkksError::ParameterMismatch(format!(
                "plaintext level {} differs from ciphertext level {}",
                pt.level, ct.level
            )));
        }
        let scale = ct.scale * pt.scale;
        self.check_scale_fits(scale, ct.level)?;
        let moduli = self.level_moduli(ct.level);
        Ok(Ciphertext {
            parts: ct.parts.iter().map(|p| p.hadamard_mul(&pt.poly, moduli)).collect(),
            scale,
            ..ct.clone()
        })
    }

    /// ct + pt. Scale and level must match exactly.
    pub fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if pt.level != ct.level || pt.scale != ct.scale {
            return Err(CkksError::ParameterMismatch(format!(
                "plaintext (scale {}, level {}) does not match ciphertext (scale {}, level {})",
                pt.scale, pt.level, ct.scale, ct.level
            )));
        }
        let moduli = self.level_moduli(ct.level);
        let mut out = ct.clone();
        out.parts[0].add_assign(&pt.poly, moduli);
        Ok(out)
    }

    /// Rotate slots left by `steps` (negative rotates right).
    pub fn rotate(&self, ct: &Ciphertext, steps: i64, keys: &GaloisKeys) -> Result<Ciphertext> {
        self.check_owned(ct)?;
        if keys.context_id != ct.context_id {
            return Err(CkksError::ParameterMismatch(
                "Galois keys belong to another context".into(),
            ));
        }
        if ct.size() != 2 {
            return Err(CkksError::UnsupportedSize { size: ct.size() });
        }
        let g = galois_element(steps, self.params.poly_degree);
        if g == 1 {
            return Ok(ct.clone());
        }
        let key = keys
            .keys
            .get(&g)
            .ok_or(CkksError::MissingKey { step: steps })?;

        let moduli = self.level_moduli(ct.level);
        let tables = &self.ntt_tables[..=ct.level];
        let permute = |poly: &RnsPoly| {
            let mut coeffs = poly.clone();
            inverse_poly(&mut coeffs, tables);
            let mut out = apply_galois(&coeffs, g, moduli);
            forward_poly(&mut out, tables);
            out
        };

        let c0 = permute(&ct.parts[0]);
        let c1 = permute(&ct.parts[1]);
        let (k0, k1) = key.switch(self, &c1, ct.level);
        Ok(Ciphertext {
            parts: vec![c0.add(&k0, moduli), k1],
            ..ct.clone()
        })
    }

    /// The ciphertext was produced under this context and has a shape it can
    /// index. Runs before any limb is touched.
    fn check_owned(&self, ct: &Ciphertext) -> Result<()> {
        if ct.context_id != self.id() {
            return Err(CkksError::ParameterMismatch(format!(
                "ciphertext from context {} used with context {}",
                ct.context_id,
                self.id()
            )));
        }
        self.validate_shape(ct)
    }

    fn check_scale_fits(&self, scale: f64, level: usize) -> Result<()> {
        let modulus_bits = self.params.data_bits_at(level);
        let scale_bits = scale.log2();
        if !scale.is_finite() || scale_bits.floor() + 1.0 >= modulus_bits as f64 {
            return Err(CkksError::ScaleOutOfBounds {
                scale_bits,
                modulus_bits,
            });
        }
        Ok(())
    }
}

fn check_compatible(a: &Ciphertext, b: &Ciphertext) -> Result<()> {
    if a.level != b.level {
        return Err(CkksError::ParameterMismatch(format!(
            "operand levels differ: {} vs {}",
            a.level, b.level
        )));
    }
    if a.scale != b.scale {
        return Err(CkksError::ParameterMismatch(format!(
            "operand scales differ: {} vs {}",
            a.scale, b.scale
        )));
    }
    Ok(())
}
