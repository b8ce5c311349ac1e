//! RNS (Residue Number System) modular arithmetic.
//!
//! A polynomial modulo Q = q_0 · ... · q_ℓ is stored as ℓ+1 independent residue
//! vectors, one per prime. Everything except CRT reconstruction works limb by
//! limb on 64-bit integers.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};

use crate::params::Modulus;

/// Modular addition: (a + b) mod q.
/// Assumes a, b < q < 2^63.
#[inline(always)]
pub fn mod_add(a: u64, b: u64, q: u64) -> u64 {
    let sum = a + b;
    if sum >= q {
        sum - q
    } else {
        sum
    }
}

/// Modular subtraction: (a - b) mod q.
/// Assumes a, b < q.
#[inline(always)]
pub fn mod_sub(a: u64, b: u64, q: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        q - b + a
    }
}

/// Modular multiplication: (a * b) mod q using a 128-bit intermediate.
#[inline(always)]
pub fn mod_mul(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

#[inline(always)]
pub fn mod_neg(a: u64, q: u64) -> u64 {
    if a == 0 {
        0
    } else {
        q - a
    }
}

/// Reduce a signed integer into [0, q).
#[inline]
pub fn reduce_i64(x: i64, q: u64) -> u64 {
    let r = (x as i128).rem_euclid(q as i128);
    r as u64
}

/// Map a residue in [0, q) to its centered representative in (-q/2, q/2].
#[inline]
pub fn center(x: u64, q: u64) -> i64 {
    if x > q / 2 {
        -((q - x) as i64)
    } else {
        x as i64
    }
}

/// Modular exponentiation: a^exp mod q.
pub fn mod_pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
    let mut result: u64 = 1;
    base %= q;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, q);
        }
        exp >>= 1;
        base = mod_mul(base, base, q);
    }
    result
}

/// Modular inverse via Fermat's little theorem: a^{q-2} mod q.
/// Requires q prime and a ≠ 0 mod q.
pub fn mod_inv(a: u64, q: u64) -> u64 {
    debug_assert!(a % q != 0, "cannot invert zero");
    mod_pow(a, q - 2, q)
}

/// Find a primitive 2N-th root of unity ψ modulo q (ψ^N ≡ -1).
///
/// Requires q ≡ 1 (mod 2N), which parameter generation guarantees. Returns
/// `None` if no generator candidate yields a primitive root.
pub fn find_primitive_root(n: usize, q: u64) -> Option<u64> {
    let two_n = (2 * n) as u64;
    if q % two_n != 1 {
        return None;
    }
    let exponent = (q - 1) / two_n;
    (2..q)
        .map(|g| mod_pow(g, exponent, q))
        .find(|&psi| mod_pow(psi, n as u64, q) == q - 1)
}

/// Bit-reverse an integer of given bit width.
#[inline]
pub fn bit_reverse(mut x: u32, bits: u32) -> u32 {
    let mut result = 0u32;
    for _ in 0..bits {
        result = (result << 1) | (x & 1);
        x >>= 1;
    }
    result
}

/// An RNS polynomial: one coefficient vector per modulus.
///
/// Whether the limbs hold coefficients or NTT evaluations is tracked by the
/// caller; ciphertexts and keys keep everything in the NTT domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RnsPoly {
    /// limbs[l][i] = coefficient i mod q_l.
    pub limbs: Vec<Vec<u64>>,
    /// Polynomial degree N.
    pub n: usize,
}

impl RnsPoly {
    pub fn zero(n: usize, num_limbs: usize) -> Self {
        Self {
            limbs: vec![vec![0u64; n]; num_limbs],
            n,
        }
    }

    /// Lift small signed coefficients into every limb.
    pub fn from_signed(coeffs: &[i64], moduli: &[Modulus]) -> Self {
        let limbs = moduli
            .iter()
            .map(|m| coeffs.iter().map(|&c| reduce_i64(c, m.value)).collect())
            .collect();
        Self {
            limbs,
            n: coeffs.len(),
        }
    }

    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    pub fn add(&self, other: &Self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.add_assign(other, moduli);
        result
    }

    pub fn add_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        debug_assert_eq!(self.n, other.n);
        for ((a, b), m) in self.limbs.iter_mut().zip(&other.limbs).zip(moduli) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = mod_add(*x, y, m.value);
            }
        }
    }

    pub fn sub(&self, other: &Self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.sub_assign(other, moduli);
        result
    }

    pub fn sub_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        debug_assert_eq!(self.n, other.n);
        for ((a, b), m) in self.limbs.iter_mut().zip(&other.limbs).zip(moduli) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = mod_sub(*x, y, m.value);
            }
        }
    }

    /// Element-wise (Hadamard) product, the NTT-domain polynomial product.
    pub fn hadamard_mul(&self, other: &Self, moduli: &[Modulus]) -> Self {
        debug_assert_eq!(self.n, other.n);
        let limbs = self
            .limbs
            .iter()
            .zip(&other.limbs)
            .zip(moduli)
            .map(|((a, b), m)| {
                a.iter()
                    .zip(b)
                    .map(|(&x, &y)| mod_mul(x, y, m.value))
                    .collect()
            })
            .collect();
        Self { limbs, n: self.n }
    }

    /// self += a ⊙ b.
    pub fn mul_acc(&mut self, a: &Self, b: &Self, moduli: &[Modulus]) {
        for (((acc, x), y), m) in self.limbs.iter_mut().zip(&a.limbs).zip(&b.limbs).zip(moduli) {
            for ((r, &u), &v) in acc.iter_mut().zip(x).zip(y) {
                *r = mod_add(*r, mod_mul(u, v, m.value), m.value);
            }
        }
    }

    pub fn negate(&self, moduli: &[Modulus]) -> Self {
        let limbs = self
            .limbs
            .iter()
            .zip(moduli)
            .map(|(a, m)| a.iter().map(|&x| mod_neg(x, m.value)).collect())
            .collect();
        Self { limbs, n: self.n }
    }

    /// Multiply every limb by a per-limb scalar.
    pub fn scalar_mul(&self, scalars: &[u64], moduli: &[Modulus]) -> Self {
        let limbs = self
            .limbs
            .iter()
            .zip(scalars)
            .zip(moduli)
            .map(|((a, &s), m)| a.iter().map(|&x| mod_mul(x, s, m.value)).collect())
            .collect();
        Self { limbs, n: self.n }
    }

    /// Keep only the first `num_limbs` limbs.
    pub fn truncate(&mut self, num_limbs: usize) {
        self.limbs.truncate(num_limbs);
    }
}

/// CRT reconstruction for a fixed prefix q_0..q_ℓ of the chain.
///
/// x = Σ_i [x_i · (Q/q_i)^{-1}]_{q_i} · (Q/q_i) mod Q, then centered in (-Q/2, Q/2].
#[derive(Debug, Clone)]
pub struct CrtComposer {
    moduli: Vec<Modulus>,
    product: BigUint,
    half: BigUint,
    punctured: Vec<BigUint>,
    punctured_inv: Vec<u64>,
}

impl CrtComposer {
    pub fn new(moduli: &[Modulus]) -> Self {
        let product = moduli
            .iter()
            .fold(BigUint::one(), |acc, m| acc * BigUint::from(m.value));
        let punctured: Vec<BigUint> = moduli
            .iter()
            .map(|m| &product / BigUint::from(m.value))
            .collect();
        let punctured_inv = punctured
            .iter()
            .zip(moduli)
            .map(|(p, m)| {
                let residue = (p % BigUint::from(m.value)).to_u64().unwrap_or(0);
                mod_inv(residue, m.value)
            })
            .collect();
        Self {
            moduli: moduli.to_vec(),
            half: &product >> 1u32,
            product,
            punctured,
            punctured_inv,
        }
    }

    /// Centered integer whose residues are `residues`.
    pub fn compose(&self, residues: &[u64]) -> BigInt {
        if let [m] = self.moduli.as_slice() {
            return BigInt::from(center(residues[0], m.value));
        }
        let mut acc = BigUint::zero();
        for (((&x, m), p), &inv) in residues
            .iter()
            .zip(&self.moduli)
            .zip(&self.punctured)
            .zip(&self.punctured_inv)
        {
            acc += p * mod_mul(x, inv, m.value);
        }
        acc %= &self.product;
        if acc > self.half {
            BigInt::from(acc) - BigInt::from(self.product.clone())
        } else {
            BigInt::from(acc)
        }
    }

    /// Centered coefficients of a coefficient-domain polynomial, as f64.
    pub fn compose_poly(&self, poly: &RnsPoly) -> Vec<f64> {
        let mut residues = vec![0u64; poly.num_limbs()];
        (0..poly.n)
            .map(|i| {
                for (r, limb) in residues.iter_mut().zip(&poly.limbs) {
                    *r = limb[i];
                }
                self.compose(&residues).to_f64().unwrap_or(f64::NAN)
            })
            .collect()
    }
}
