//! CKKS parameter sets.
//!
//! A parameter set fixes the ring dimension N and the RNS moduli chain
//! q_0, q_1, ..., q_{L-1}. Every modulus is an NTT-friendly prime (q ≡ 1 mod 2N)
//! of exactly the requested bit width.
//!
//! With L ≥ 2 the last modulus is the *special prime* P: it only appears inside
//! key switching. Ciphertexts live on the data moduli q_0..q_{L-2}, so a fresh
//! ciphertext sits at level L-2 and each rescale drops one data modulus.
//! With L = 1 there is no special prime and key switching is unavailable.

use std::collections::HashMap;

use primality_test::is_prime;

use crate::error::{CkksError, Result};

/// Widest supported modulus. Products of two residues must fit in u128.
pub const MAX_MODULUS_BITS: u32 = 60;

/// A single RNS modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulus {
    /// The prime modulus q_i.
    pub value: u64,
    /// Bit width of this modulus.
    pub bits: u32,
}

impl Modulus {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            bits: 64 - value.leading_zeros(),
        }
    }
}

/// Security requirement checked when a parameter set is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityLevel {
    /// 128-bit classical security (HomomorphicEncryption.org standard, ternary secret).
    #[default]
    Tc128,
    /// No bound on the modulus. Only meant for tests and experiments.
    None,
}

/// Largest total modulus bit count giving 128-bit security for `poly_degree`.
pub fn max_total_bits(poly_degree: usize) -> Option<u32> {
    match poly_degree {
        1024 => Some(27),
        2048 => Some(54),
        4096 => Some(109),
        8192 => Some(218),
        16384 => Some(438),
        32768 => Some(881),
        _ => None,
    }
}

/// Default 128-bit moduli chain (bit widths) for `poly_degree`.
pub fn default_chain_bits(poly_degree: usize) -> Option<Vec<u32>> {
    let bits = match poly_degree {
        1024 => vec![27],
        2048 => vec![54],
        4096 => vec![36, 36, 37],
        8192 => vec![43, 43, 44, 44, 44],
        16384 => vec![48, 48, 48, 49, 49, 49, 49, 49, 49],
        32768 => {
            let mut bits = vec![55; 15];
            bits.push(56);
            bits
        }
        _ => return None,
    };
    Some(bits)
}

/// Complete CKKS parameter set for a given polynomial degree N.
#[derive(Debug, Clone, PartialEq)]
pub struct CkksParams {
    /// Polynomial degree N (ring dimension). Must be a power of 2.
    pub poly_degree: usize,
    /// Number of SIMD slots = N/2.
    pub num_slots: usize,
    /// log2(N).
    pub log_n: u32,
    /// Full RNS moduli chain, special prime last.
    pub moduli: Vec<Modulus>,
    /// Security requirement the chain was validated against.
    pub security: SecurityLevel,
}

impl CkksParams {
    /// Build and validate a parameter set from modulus bit widths.
    ///
    /// Finds distinct NTT-friendly primes for each width, searching downward
    /// from 2^bits. Fails with [`CkksError::Configuration`] when N is not a
    /// supported power of two, a width is out of range, the primes run out, or
    /// the total exceeds the bound of `security`.
    pub fn new(poly_degree: usize, bit_sizes: &[u32], security: SecurityLevel) -> Result<Self> {
        if !poly_degree.is_power_of_two() || poly_degree < 2 {
            return Err(CkksError::Configuration(format!(
                "ring dimension {poly_degree} is not a power of two"
            )));
        }
        if bit_sizes.is_empty() {
            return Err(CkksError::Configuration(
                "modulus chain must contain at least one prime".into(),
            ));
        }
        if let Some(&bits) = bit_sizes
            .iter()
            .find(|&&b| b < 2 || b > MAX_MODULUS_BITS)
        {
            return Err(CkksError::Configuration(format!(
                "modulus bit size {bits} outside 2..={MAX_MODULUS_BITS}"
            )));
        }

        let total: u32 = bit_sizes.iter().sum();
        if security == SecurityLevel::Tc128 {
            let bound = max_total_bits(poly_degree).ok_or_else(|| {
                CkksError::Configuration(format!(
                    "no 128-bit security bound is known for ring dimension {poly_degree}"
                ))
            })?;
            if total > bound {
                return Err(CkksError::Configuration(format!(
                    "modulus chain uses {total} bits, ring dimension {poly_degree} allows {bound}"
                )));
            }
        }

        let moduli = generate_primes(bit_sizes, 2 * poly_degree as u64)?
            .into_iter()
            .map(Modulus::new)
            .collect();

        Ok(Self {
            poly_degree,
            num_slots: poly_degree / 2,
            log_n: poly_degree.trailing_zeros(),
            moduli,
            security,
        })
    }

    /// The default 128-bit parameter set for `poly_degree`.
    pub fn default_for(poly_degree: usize) -> Result<Self> {
        let bits = default_chain_bits(poly_degree).ok_or_else(|| {
            CkksError::Configuration(format!(
                "no default modulus chain for ring dimension {poly_degree}"
            ))
        })?;
        Self::new(poly_degree, &bits, SecurityLevel::Tc128)
    }

    /// Total number of moduli, special prime included.
    pub fn num_limbs(&self) -> usize {
        self.moduli.len()
    }

    pub fn supports_key_switching(&self) -> bool {
        self.moduli.len() >= 2
    }

    /// Moduli that ciphertexts live on.
    pub fn data_moduli(&self) -> &[Modulus] {
        if self.supports_key_switching() {
            &self.moduli[..self.moduli.len() - 1]
        } else {
            &self.moduli
        }
    }

    pub fn special_modulus(&self) -> Option<&Modulus> {
        if self.supports_key_switching() {
            self.moduli.last()
        } else {
            None
        }
    }

    /// Level of a fresh ciphertext.
    pub fn max_level(&self) -> usize {
        self.data_moduli().len() - 1
    }

    /// Sum of the bit widths of the full chain.
    pub fn total_bits(&self) -> u32 {
        self.moduli.iter().map(|m| m.bits).sum()
    }

    /// Bits of q_0 · q_1 · ... · q_level.
    pub fn data_bits_at(&self, level: usize) -> u32 {
        self.moduli[..=level].iter().map(|m| m.bits).sum()
    }
}

/// Distinct primes q ≡ 1 (mod two_n), one per requested width, in request order.
fn generate_primes(bit_sizes: &[u32], two_n: u64) -> Result<Vec<u64>> {
    // Next candidate to test for each width, walking downward.
    let mut cursors: HashMap<u32, u64> = HashMap::new();

    bit_sizes
        .iter()
        .map(|&bits| {
            let lower = 1u64 << (bits - 1);
            let exhausted = || {
                CkksError::Configuration(format!(
                    "not enough {bits}-bit primes congruent to 1 mod {two_n}"
                ))
            };

            let cursor = match cursors.get(&bits) {
                Some(&c) => c,
                // 2^bits is a multiple of 2N once bits > log2(2N).
                None => (1u64 << bits)
                    .checked_sub(two_n)
                    .map(|c| c + 1)
                    .ok_or_else(exhausted)?,
            };

            let mut candidate = cursor;
            while candidate > lower {
                if is_prime(candidate) {
                    cursors.insert(bits, candidate.saturating_sub(two_n));
                    return Ok(candidate);
                }
                candidate = match candidate.checked_sub(two_n) {
                    Some(c) => c,
                    None => break,
                };
            }
            cursors.insert(bits, 0);
            Err(exhausted())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_params() {
        let p = CkksParams::new(8192, &[60, 40, 40, 60], SecurityLevel::Tc128).unwrap();
        assert_eq!(p.poly_degree, 8192);
        assert_eq!(p.num_slots, 4096);
        assert_eq!(p.log_n, 13);
        assert_eq!(p.num_limbs(), 4);
        assert_eq!(p.max_level(), 2);
        assert_eq!(p.special_modulus().map(|m| m.bits), Some(60));

        let two_n = (2 * p.poly_degree) as u64;
        for (i, m) in p.moduli.iter().enumerate() {
            assert_eq!(m.value % two_n, 1, "Modulus {i} ({}) is not NTT-friendly", m.value);
            assert!(is_prime(m.value), "Modulus {i} ({}) is not prime", m.value);
        }
    }

    #[test]
    fn test_bit_widths_are_exact() {
        let bits = [60, 40, 40, 60];
        let p = CkksParams::new(8192, &bits, SecurityLevel::Tc128).unwrap();
        for (m, &b) in p.moduli.iter().zip(bits.iter()) {
            assert_eq!(m.bits, b, "Modulus {} has {} bits, expected {b}", m.value, m.bits);
        }
    }

    #[test]
    fn test_equal_widths_give_distinct_primes() {
        let p = CkksParams::new(4096, &[36, 36, 36], SecurityLevel::Tc128).unwrap();
        assert_ne!(p.moduli[0], p.moduli[1]);
        assert_ne!(p.moduli[1], p.moduli[2]);
        assert_ne!(p.moduli[0], p.moduli[2]);
    }

    #[test]
    fn test_default_chains_within_bounds() {
        for n in [1024, 2048, 4096, 8192, 16384] {
            let p = CkksParams::default_for(n).unwrap();
            assert!(
                p.total_bits() <= max_total_bits(n).unwrap(),
                "Default chain for N={n} uses {} bits",
                p.total_bits()
            );
        }
    }

    #[test]
    fn test_security_bound_rejected() {
        let err = CkksParams::new(4096, &[60, 40, 40, 60], SecurityLevel::Tc128).unwrap_err();
        assert!(matches!(err, CkksError::Configuration(_)), "got {err:?}");

        // The same chain is accepted when the bound is waived.
        assert!(CkksParams::new(4096, &[60, 40, 40, 60], SecurityLevel::None).is_ok());
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        assert!(CkksParams::new(3000, &[40], SecurityLevel::None).is_err());
        assert!(CkksParams::new(1024, &[], SecurityLevel::None).is_err());
        assert!(CkksParams::new(1024, &[61], SecurityLevel::None).is_err());
        // No 10-bit prime can be congruent to 1 mod 2048.
        assert!(CkksParams::new(1024, &[10], SecurityLevel::None).is_err());
    }

    #[test]
    fn test_single_prime_chain_has_no_special_prime() {
        let p = CkksParams::default_for(2048).unwrap();
        assert!(!p.supports_key_switching());
        assert_eq!(p.data_moduli().len(), 1);
        assert_eq!(p.max_level(), 0);
    }
}
