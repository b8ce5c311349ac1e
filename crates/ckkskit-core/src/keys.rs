//! Key material and key generation.
//!
//! All keys are stored in the NTT domain.
//!
//! - Secret key s: ternary, over every modulus (special prime included).
//! - Public key (b, a) = (-a·s + e, a) over the data moduli.
//! - Key-switching key from s' to s: one pair per data modulus q_j,
//!     b_j = -a_j·s + e_j + P·s'·[j == i]   (limb i),   a_j uniform,
//!   over Q·P where P is the special prime. Relinearization uses s' = s²,
//!   rotation by r uses s' = σ_g(s) with g = 5^r mod 2N.

use std::collections::BTreeMap;

use rand::Rng;

use crate::ciphertext::CkksContext;
use crate::error::{CkksError, Result};
use crate::ntt::{forward_poly, inverse_poly, negacyclic_ntt_forward, negacyclic_ntt_inverse};
use crate::params::Modulus;
use crate::rns::{center, mod_add, mod_inv, mod_mul, mod_pow, mod_sub, reduce_i64, RnsPoly};
use crate::sampling::{sample_gaussian, sample_ternary, sample_uniform, ERROR_STD_DEV};

/// Ternary secret key, NTT domain, every modulus of the chain.
#[derive(Debug, Clone)]
pub struct SecretKey {
    pub(crate) s: RnsPoly,
    pub(crate) context_id: u64,
}

/// Encryption key over the data moduli.
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub(crate) b: RnsPoly,
    pub(crate) a: RnsPoly,
    pub(crate) context_id: u64,
}

/// Hybrid key-switching key, one (b_j, a_j) pair per data modulus.
#[derive(Debug, Clone)]
pub struct KeySwitchKey {
    pub(crate) parts: Vec<(RnsPoly, RnsPoly)>,
}

/// Switches s² back to s after a ciphertext product.
#[derive(Debug, Clone)]
pub struct RelinKeys {
    pub(crate) key: KeySwitchKey,
    pub(crate) context_id: u64,
}

/// Rotation keys indexed by Galois element.
#[derive(Debug, Clone)]
pub struct GaloisKeys {
    pub(crate) keys: BTreeMap<u64, KeySwitchKey>,
    pub(crate) context_id: u64,
}

impl GaloisKeys {
    pub fn contains(&self, galois_element: u64) -> bool {
        self.keys.contains_key(&galois_element)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Galois element g = 5^r mod 2N for a left rotation by `step` slots.
pub fn galois_element(step: i64, poly_degree: usize) -> u64 {
    let slots = (poly_degree / 2) as i64;
    let r = step.rem_euclid(slots) as u64;
    mod_pow(5, r, 2 * poly_degree as u64)
}

/// σ_g on a coefficient-domain polynomial: X^i → X^{i·g mod 2N}, with X^N = -1.
pub(crate) fn apply_galois(poly: &RnsPoly, g: u64, moduli: &[Modulus]) -> RnsPoly {
    let n = poly.n;
    let two_n = 2 * n as u64;
    let mut out = RnsPoly::zero(n, poly.num_limbs());
    for ((src, dst), m) in poly.limbs.iter().zip(out.limbs.iter_mut()).zip(moduli) {
        for (i, &c) in src.iter().enumerate() {
            let idx = (i as u64 * g % two_n) as usize;
            if idx < n {
                dst[idx] = c;
            } else {
                dst[idx - n] = mod_sub(0, c, m.value);
            }
        }
    }
    out
}

/// Generates every kind of key from one secret.
pub struct KeyGenerator<'a> {
    ctx: &'a CkksContext,
    secret: SecretKey,
}

impl<'a> KeyGenerator<'a> {
    /// Sample a fresh ternary secret for `ctx`.
    pub fn new<R: Rng + ?Sized>(ctx: &'a CkksContext, rng: &mut R) -> Self {
        let params = &ctx.params;
        let coeffs = sample_ternary(rng, params.poly_degree);
        let mut s = RnsPoly::from_signed(&coeffs, &params.moduli);
        forward_poly(&mut s, &ctx.ntt_tables);
        Self {
            ctx,
            secret: SecretKey {
                s,
                context_id: ctx.id(),
            },
        }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn create_public_key<R: Rng + ?Sized>(&self, rng: &mut R) -> PublicKey {
        let data_limbs = self.ctx.params.data_moduli().len();
        let moduli = &self.ctx.params.moduli[..data_limbs];

        let a = self.sample_uniform_ntt(rng, moduli);
        let e = self.sample_error_ntt(rng, moduli);
        let mut s = self.secret.s.clone();
        s.truncate(data_limbs);

        let b = e.sub(&a.hadamard_mul(&s, moduli), moduli);
        PublicKey {
            b,
            a,
            context_id: self.ctx.id(),
        }
    }

    /// Relinearization key. Needs a special prime.
    pub fn create_relin_keys<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RelinKeys> {
        let moduli = &self.ctx.params.moduli;
        let s_squared = self.secret.s.hadamard_mul(&self.secret.s, moduli);
        Ok(RelinKeys {
            key: self.create_switch_key(&s_squared, rng)?,
            context_id: self.ctx.id(),
        })
    }

    /// Rotation keys for each step in `steps`. Steps equivalent to 0 are skipped.
    pub fn create_galois_keys<R: Rng + ?Sized>(&self, steps: &[i64], rng: &mut R) -> Result<GaloisKeys> {
        let params = &self.ctx.params;
        let mut s_coeff = self.secret.s.clone();
        inverse_poly(&mut s_coeff, &self.ctx.ntt_tables);

        let mut keys = BTreeMap::new();
        for &step in steps {
            let g = galois_element(step, params.poly_degree);
            if g == 1 || keys.contains_key(&g) {
                continue;
            }
            let mut rotated = apply_galois(&s_coeff, g, &params.moduli);
            forward_poly(&mut rotated, &self.ctx.ntt_tables);
            keys.insert(g, self.create_switch_key(&rotated, rng)?);
        }
        Ok(GaloisKeys {
            keys,
            context_id: self.ctx.id(),
        })
    }

    /// Key switching from `target` (NTT, every modulus) to the secret.
    fn create_switch_key<R: Rng + ?Sized>(&self, target: &RnsPoly, rng: &mut R) -> Result<KeySwitchKey> {
        let params = &self.ctx.params;
        let special = params.special_modulus().ok_or_else(|| {
            CkksError::Configuration(
                "key switching needs at least two moduli (the last one is the special prime)".into(),
            )
        })?;
        let moduli = &params.moduli;

        let parts = (0..params.data_moduli().len())
            .map(|j| {
                let a = self.sample_uniform_ntt(rng, moduli);
                let e = self.sample_error_ntt(rng, moduli);
                let mut b = e.sub(&a.hadamard_mul(&self.secret.s, moduli), moduli);

                let q = moduli[j].value;
                let p_mod_q = special.value % q;
                for (x, &t) in b.limbs[j].iter_mut().zip(&target.limbs[j]) {
                    *x = mod_add(*x, mod_mul(p_mod_q, t, q), q);
                }
                (b, a)
            })
            .collect();
        Ok(KeySwitchKey { parts })
    }

    fn sample_uniform_ntt<R: Rng + ?Sized>(&self, rng: &mut R, moduli: &[Modulus]) -> RnsPoly {
        let n = self.ctx.params.poly_degree;
        // Uniform coefficients stay uniform under the NTT, so sample in place.
        RnsPoly {
            limbs: moduli.iter().map(|m| sample_uniform(rng, n, m.value)).collect(),
            n,
        }
    }

    fn sample_error_ntt<R: Rng + ?Sized>(&self, rng: &mut R, moduli: &[Modulus]) -> RnsPoly {
        let n = self.ctx.params.poly_degree;
        let coeffs = sample_gaussian(rng, n, ERROR_STD_DEV);
        let mut e = RnsPoly::from_signed(&coeffs, moduli);
        forward_poly(&mut e, &self.ctx.ntt_tables[..moduli.len()]);
        e
    }
}

impl KeySwitchKey {
    /// Apply the key to `d` (NTT domain, limbs q_0..q_level).
    ///
    /// Returns (k0, k1) over q_0..q_level with k0 + k1·s ≈ d·s'.
    pub(crate) fn switch(&self, ctx: &CkksContext, d: &RnsPoly, level: usize) -> (RnsPoly, RnsPoly) {
        let params = &ctx.params;
        let n = params.poly_degree;
        let sp = params.num_limbs() - 1;
        let targets: Vec<usize> = (0..=level).chain(std::iter::once(sp)).collect();

        let mut acc0 = RnsPoly::zero(n, targets.len());
        let mut acc1 = RnsPoly::zero(n, targets.len());

        for j in 0..=level {
            let mut dj = d.limbs[j].clone();
            negacyclic_ntt_inverse(&mut dj, &ctx.ntt_tables[j]);
            let (b, a) = &self.parts[j];

            for (slot, &t) in targets.iter().enumerate() {
                let qt = params.moduli[t].value;
                let lifted = if t == j {
                    d.limbs[j].clone()
                } else {
                    let mut v: Vec<u64> = dj.iter().map(|&x| x % qt).collect();
                    negacyclic_ntt_forward(&mut v, &ctx.ntt_tables[t]);
                    v
                };
                for (k, &x) in lifted.iter().enumerate() {
                    acc0.limbs[slot][k] =
                        mod_add(acc0.limbs[slot][k], mod_mul(x, b.limbs[t][k], qt), qt);
                    acc1.limbs[slot][k] =
                        mod_add(acc1.limbs[slot][k], mod_mul(x, a.limbs[t][k], qt), qt);
                }
            }
        }

        (mod_down(ctx, acc0, level), mod_down(ctx, acc1, level))
    }
}

/// Divide a polynomial over q_0..q_level, P by P and drop the P limb.
fn mod_down(ctx: &CkksContext, mut acc: RnsPoly, level: usize) -> RnsPoly {
    let params = &ctx.params;
    let sp = params.num_limbs() - 1;
    let p = params.moduli[sp].value;

    let mut last = match acc.limbs.pop() {
        Some(limb) => limb,
        None => return acc,
    };
    negacyclic_ntt_inverse(&mut last, &ctx.ntt_tables[sp]);
    let centered: Vec<i64> = last.iter().map(|&x| center(x, p)).collect();

    for i in 0..=level {
        let q = params.moduli[i].value;
        let p_inv = mod_inv(p % q, q);
        let mut r: Vec<u64> = centered.iter().map(|&x| reduce_i64(x, q)).collect();
        negacyclic_ntt_forward(&mut r, &ctx.ntt_tables[i]);
        for (x, &y) in acc.limbs[i].iter_mut().zip(&r) {
            *x = mod_mul(mod_sub(*x, y, q), p_inv, q);
        }
    }
    acc
}
