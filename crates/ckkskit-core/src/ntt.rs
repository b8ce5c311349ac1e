//! Number Theoretic Transform (NTT) for negacyclic polynomial arithmetic.
//!
//! All polynomial multiplications in CKKS use NTT:
//!   a · b = iNTT(NTT(a) ⊙ NTT(b))   in Z_q[X]/(X^N+1)
//!
//! The negacyclic twist is merged into the butterflies: the forward transform
//! is Cooley-Tukey over powers of ψ (a primitive 2N-th root) in bit-reversed
//! order, the inverse is Gentleman-Sande over powers of ψ^{-1}. Outputs are in
//! bit-reversed order, which only matters for code that indexes NTT slots
//! directly (nothing outside this module does).
//!
//! Complexity: (N/2) · log₂(N) butterflies per limb.

use crate::error::{CkksError, Result};
use crate::params::Modulus;
use crate::rns::{bit_reverse, find_primitive_root, mod_add, mod_inv, mod_mul, mod_pow, mod_sub, RnsPoly};

/// Pre-computed NTT tables for a specific (N, q) pair.
#[derive(Debug, Clone)]
pub struct NttTables {
    /// psi_rev[k] = ψ^{bitrev(k)}.
    pub psi_rev: Vec<u64>,
    /// psi_inv_rev[k] = ψ^{-bitrev(k)}.
    pub psi_inv_rev: Vec<u64>,
    /// N^{-1} mod q.
    pub n_inv: u64,
    pub q: u64,
    pub log_n: u32,
    pub n: usize,
}

impl NttTables {
    pub fn new(n: usize, q: u64) -> Result<Self> {
        let log_n = n.trailing_zeros();
        if !n.is_power_of_two() {
            return Err(CkksError::Configuration(format!("N={n} is not a power of 2")));
        }

        let psi = find_primitive_root(n, q).ok_or_else(|| {
            CkksError::Configuration(format!("q={q} has no primitive {}-th root of unity", 2 * n))
        })?;
        let psi_inv = mod_inv(psi, q);

        let mut psi_rev = vec![0u64; n];
        let mut psi_inv_rev = vec![0u64; n];
        for i in 0..n {
            let rev = bit_reverse(i as u32, log_n) as usize;
            psi_rev[i] = mod_pow(psi, rev as u64, q);
            psi_inv_rev[i] = mod_pow(psi_inv, rev as u64, q);
        }

        Ok(Self {
            psi_rev,
            psi_inv_rev,
            n_inv: mod_inv(n as u64, q),
            q,
            log_n,
            n,
        })
    }

    /// Tables for every modulus of a chain, in chain order.
    pub fn for_moduli(n: usize, moduli: &[Modulus]) -> Result<Vec<Self>> {
        moduli.iter().map(|m| Self::new(n, m.value)).collect()
    }
}

/// In-place forward negacyclic NTT (Cooley-Tukey, decimation-in-time).
pub fn negacyclic_ntt_forward(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let q = tables.q;
    debug_assert_eq!(a.len(), n);

    let mut t = n;
    let mut m = 1;
    while m < n {
        t >>= 1;
        for i in 0..m {
            let j1 = 2 * i * t;
            let w = tables.psi_rev[m + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = mod_mul(a[j + t], w, q);
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_sub(u, v, q);
            }
        }
        m <<= 1;
    }
}

/// In-place inverse negacyclic NTT (Gentleman-Sande), including the 1/N factor.
pub fn negacyclic_ntt_inverse(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let q = tables.q;
    debug_assert_eq!(a.len(), n);

    let mut t = 1;
    let mut m = n;
    while m > 1 {
        let h = m >> 1;
        let mut j1 = 0;
        for i in 0..h {
            let w = tables.psi_inv_rev[h + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = a[j + t];
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_mul(mod_sub(u, v, q), w, q);
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m = h;
    }

    for coeff in a.iter_mut() {
        *coeff = mod_mul(*coeff, tables.n_inv, q);
    }
}

/// Forward NTT on every limb; limb l uses `tables[l]`.
pub fn forward_poly(poly: &mut RnsPoly, tables: &[NttTables]) {
    for (limb, t) in poly.limbs.iter_mut().zip(tables) {
        negacyclic_ntt_forward(limb, t);
    }
}

/// Inverse NTT on every limb; limb l uses `tables[l]`.
pub fn inverse_poly(poly: &mut RnsPoly, tables: &[NttTables]) {
    for (limb, t) in poly.limbs.iter_mut().zip(tables) {
        negacyclic_ntt_inverse(limb, t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CkksParams, SecurityLevel};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Schoolbook product in Z_q[X]/(X^N+1).
    fn negacyclic_mul(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut c = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let p = mod_mul(a[i], b[j], q);
                if i + j < n {
                    c[i + j] = mod_add(c[i + j], p, q);
                } else {
                    c[i + j - n] = mod_sub(c[i + j - n], p, q);
                }
            }
        }
        c
    }

    #[test]
    fn test_ntt_roundtrip_small() {
        let tables = NttTables::new(4, 17).unwrap();
        let original = vec![1u64, 2, 3, 4];
        let mut a = original.clone();

        negacyclic_ntt_forward(&mut a, &tables);
        assert_ne!(a, original);
        negacyclic_ntt_inverse(&mut a, &tables);
        assert_eq!(a, original);
    }

    #[test]
    fn test_ntt_polynomial_multiply() {
        let n = 8;
        let q = 97u64; // 97 ≡ 1 mod 16
        let tables = NttTables::new(n, q).unwrap();

        // (1 + 2X + 3X^2)(4 + 5X) = 4 + 13X + 22X^2 + 15X^3
        let mut a = vec![1u64, 2, 3, 0, 0, 0, 0, 0];
        let mut b = vec![4u64, 5, 0, 0, 0, 0, 0, 0];
        negacyclic_ntt_forward(&mut a, &tables);
        negacyclic_ntt_forward(&mut b, &tables);

        let mut c: Vec<u64> = a.iter().zip(&b).map(|(&x, &y)| mod_mul(x, y, q)).collect();
        negacyclic_ntt_inverse(&mut c, &tables);
        assert_eq!(c, vec![4u64, 13, 22, 15, 0, 0, 0, 0]);
    }

    #[test]
    fn test_ntt_wraparound_is_negacyclic() {
        let n = 8;
        let q = 97u64;
        let tables = NttTables::new(n, q).unwrap();

        // X^7 · X = X^8 = -1
        let mut a = vec![0u64; n];
        a[7] = 1;
        let mut b = vec![0u64; n];
        b[1] = 1;
        negacyclic_ntt_forward(&mut a, &tables);
        negacyclic_ntt_forward(&mut b, &tables);
        let mut c: Vec<u64> = a.iter().zip(&b).map(|(&x, &y)| mod_mul(x, y, q)).collect();
        negacyclic_ntt_inverse(&mut c, &tables);

        let mut expected = vec![0u64; n];
        expected[0] = q - 1;
        assert_eq!(c, expected);
    }

    #[test]
    fn test_ntt_matches_schoolbook_60bit() {
        let params = CkksParams::new(1024, &[60], SecurityLevel::None).unwrap();
        let q = params.moduli[0].value;
        let n = 64;
        let tables = NttTables::new(n, q).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let a: Vec<u64> = (0..n).map(|_| rng.random_range(0..q)).collect();
        let b: Vec<u64> = (0..n).map(|_| rng.random_range(0..q)).collect();
        let expected = negacyclic_mul(&a, &b, q);

        let (mut fa, mut fb) = (a.clone(), b.clone());
        negacyclic_ntt_forward(&mut fa, &tables);
        negacyclic_ntt_forward(&mut fb, &tables);
        let mut c: Vec<u64> = fa.iter().zip(&fb).map(|(&x, &y)| mod_mul(x, y, q)).collect();
        negacyclic_ntt_inverse(&mut c, &tables);

        assert_eq!(c, expected);
    }

    #[test]
    fn test_tables_reject_unfriendly_modulus() {
        assert!(NttTables::new(8, 13).is_err());
    }
}
