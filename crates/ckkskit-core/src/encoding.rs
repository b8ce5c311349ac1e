//! CKKS encode/decode via the canonical embedding.
//!
//! Encode: z ∈ R^{N/2} → m(X) = round(Δ · σ^{-1}(z)) ∈ R_Q
//! Decode: m(X) ∈ R_Q → z = σ(m) / Δ ∈ R^{N/2}
//!
//! σ evaluates m at the primitive 2N-th roots of unity. Slot j is bound to the
//! root ζ^{5^j} (and its conjugate ζ^{-5^j}), so the automorphism X → X^{5^r}
//! rotates the slot vector left by r.
//!
//! A single real value is encoded as the constant polynomial round(Δ · v),
//! which places v in every slot.

use std::f64::consts::PI;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive};

use crate::error::{CkksError, Result};
use crate::params::Modulus;
use crate::rns::{reduce_i64, RnsPoly};

/// Pre-computed tables for O(N log N) FFT-based canonical embedding.
///
/// The embedding evaluates m(X) at ζ^{2k+1} for k = 0..N-1, ζ = e^{πi/N}:
///   m(ζ^{2k+1}) = FFT_N( m[j] · ζ^j )[k]
#[derive(Debug, Clone)]
struct FftTables {
    n: usize,
    /// twist_re[j] = cos(πj/N), twist_im[j] = sin(πj/N)
    twist_re: Vec<f64>,
    twist_im: Vec<f64>,
    bit_rev: Vec<usize>,
    /// Per-stage twiddles: e^{-2πik/2^{s+1}}
    twiddle_re: Vec<Vec<f64>>,
    twiddle_im: Vec<Vec<f64>>,
}

impl FftTables {
    fn new(n: usize) -> Self {
        let log_n = n.trailing_zeros();

        let (twist_re, twist_im) = (0..n)
            .map(|j| {
                let angle = PI * j as f64 / n as f64;
                (angle.cos(), angle.sin())
            })
            .unzip();

        let bit_rev = (0..n)
            .map(|i| crate::rns::bit_reverse(i as u32, log_n) as usize)
            .collect();

        let (twiddle_re, twiddle_im) = (0..log_n)
            .map(|s| {
                let half_len = 1usize << s;
                (0..half_len)
                    .map(|k| {
                        let angle = -PI * k as f64 / half_len as f64;
                        (angle.cos(), angle.sin())
                    })
                    .unzip::<f64, f64, Vec<f64>, Vec<f64>>()
            })
            .unzip();

        Self {
            n,
            twist_re,
            twist_im,
            bit_rev,
            twiddle_re,
            twiddle_im,
        }
    }

    /// In-place complex FFT (Cooley-Tukey radix-2 DIT).
    fn fft(&self, re: &mut [f64], im: &mut [f64]) {
        let n = self.n;
        debug_assert_eq!(re.len(), n);
        debug_assert_eq!(im.len(), n);

        for i in 0..n {
            let j = self.bit_rev[i];
            if i < j {
                re.swap(i, j);
                im.swap(i, j);
            }
        }

        for (s, (stage_re, stage_im)) in self.twiddle_re.iter().zip(&self.twiddle_im).enumerate() {
            let half_len = 1 << s;
            for group_start in (0..n).step_by(half_len << 1) {
                for k in 0..half_len {
                    let (w_re, w_im) = (stage_re[k], stage_im[k]);
                    let i0 = group_start + k;
                    let i1 = i0 + half_len;

                    let v_re = w_re * re[i1] - w_im * im[i1];
                    let v_im = w_re * im[i1] + w_im * re[i1];
                    let (u_re, u_im) = (re[i0], im[i0]);
                    re[i0] = u_re + v_re;
                    im[i0] = u_im + v_im;
                    re[i1] = u_re - v_re;
                    im[i1] = u_im - v_im;
                }
            }
        }
    }
}

/// CKKS encoder/decoder for a given ring dimension.
#[derive(Debug, Clone)]
pub struct CkksEncoder {
    n: usize,
    num_slots: usize,
    fft: FftTables,
    /// FFT index of slot j: (5^j mod 2N - 1) / 2.
    slot_index: Vec<usize>,
}

impl CkksEncoder {
    pub fn new(poly_degree: usize) -> Self {
        let n = poly_degree;
        let num_slots = n / 2;
        let two_n = 2 * n as u64;

        let mut slot_index = Vec::with_capacity(num_slots);
        let mut root = 1u64;
        for _ in 0..num_slots {
            slot_index.push(((root - 1) / 2) as usize);
            root = root * 5 % two_n;
        }

        Self {
            n,
            num_slots,
            fft: FftTables::new(n),
            slot_index,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Encode one real value as the constant polynomial round(value · scale).
    pub fn encode_scalar(&self, value: f64, scale: f64, moduli: &[Modulus]) -> Result<RnsPoly> {
        check_scale(scale, moduli)?;
        let mut coeffs = vec![0.0; self.n];
        coeffs[0] = value * scale;
        lift_coefficients(&coeffs, moduli)
    }

    /// Encode up to N/2 real values into the slots. Shorter inputs are zero-padded.
    pub fn encode_slots(&self, values: &[f64], scale: f64, moduli: &[Modulus]) -> Result<RnsPoly> {
        if values.len() > self.num_slots {
            return Err(CkksError::EncodingOverflow(format!(
                "{} values exceed the {} available slots",
                values.len(),
                self.num_slots
            )));
        }
        check_scale(scale, moduli)?;

        let coeffs: Vec<f64> = self
            .inverse_canonical_embedding(values)
            .into_iter()
            .map(|c| c * scale)
            .collect();
        lift_coefficients(&coeffs, moduli)
    }

    /// Slot values of a polynomial given its centered coefficients.
    pub fn decode(&self, coeffs: &[f64], scale: f64) -> Vec<f64> {
        let scaled: Vec<f64> = coeffs.iter().map(|&c| c / scale).collect();
        self.canonical_embedding(&scaled)
    }

    /// σ^{-1}(z): slot values → real polynomial coefficients.
    ///
    /// z̃ is the conjugate-symmetric extension of z over all N roots. Then
    /// m[j] = Re(ζ^{-j} · (1/N) · FFT(z̃)[j]).
    fn inverse_canonical_embedding(&self, z: &[f64]) -> Vec<f64> {
        let n = self.n;
        let mut z_re = vec![0.0f64; n];
        let mut z_im = vec![0.0f64; n];
        for (&k, &v) in self.slot_index.iter().zip(z) {
            z_re[k] = v;
            z_re[n - 1 - k] = v;
        }

        self.fft.fft(&mut z_re, &mut z_im);

        let inv_n = 1.0 / n as f64;
        (0..n)
            .map(|j| (z_re[j] * self.fft.twist_re[j] + z_im[j] * self.fft.twist_im[j]) * inv_n)
            .collect()
    }

    /// σ(m): real polynomial coefficients → slot values.
    ///
    /// FFT(m[j] · ζ^{-j})[k] = conj(m(ζ^{2k+1})), whose real part is the slot value.
    fn canonical_embedding(&self, coeffs: &[f64]) -> Vec<f64> {
        let n = self.n;
        debug_assert_eq!(coeffs.len(), n);

        let mut b_re: Vec<f64> = coeffs
            .iter()
            .zip(&self.fft.twist_re)
            .map(|(&c, &t)| c * t)
            .collect();
        let mut b_im: Vec<f64> = coeffs
            .iter()
            .zip(&self.fft.twist_im)
            .map(|(&c, &t)| -c * t)
            .collect();

        self.fft.fft(&mut b_re, &mut b_im);

        self.slot_index.iter().map(|&k| b_re[k]).collect()
    }
}

/// A scale must be positive, finite, and narrower than the modulus it is encoded under.
pub fn check_scale(scale: f64, moduli: &[Modulus]) -> Result<()> {
    let modulus_bits: u32 = moduli.iter().map(|m| m.bits).sum();
    if !(scale.is_finite() && scale > 0.0) {
        return Err(CkksError::EncodingOverflow(format!("invalid scale {scale}")));
    }
    let scale_bits = scale.log2();
    if scale_bits.floor() + 1.0 >= modulus_bits as f64 {
        return Err(CkksError::ScaleOutOfBounds {
            scale_bits,
            modulus_bits,
        });
    }
    Ok(())
}

/// Round real coefficients and reduce them into every limb.
///
/// Fails when a coefficient is not finite or needs as many bits as the
/// modulus product q_0 · ... · q_ℓ.
fn lift_coefficients(coeffs: &[f64], moduli: &[Modulus]) -> Result<RnsPoly> {
    let modulus_bits: u32 = moduli.iter().map(|m| m.bits).sum();
    let n = coeffs.len();
    let mut poly = RnsPoly::zero(n, moduli.len());

    for (i, &c) in coeffs.iter().enumerate() {
        if !c.is_finite() {
            return Err(CkksError::EncodingOverflow(format!("coefficient {i} is {c}")));
        }
        let rounded = c.round();
        if rounded == 0.0 {
            continue;
        }
        let coeff_bits = rounded.abs().log2().floor() as u32 + 1;
        if coeff_bits >= modulus_bits {
            return Err(CkksError::EncodingOverflow(format!(
                "encoded value needs {coeff_bits} bits, modulus has {modulus_bits}"
            )));
        }

        if rounded.abs() < 9.2e18 {
            let v = rounded as i64;
            for (limb, m) in poly.limbs.iter_mut().zip(moduli) {
                limb[i] = reduce_i64(v, m.value);
            }
        } else {
            let big = BigInt::from_f64(rounded).ok_or_else(|| {
                CkksError::EncodingOverflow(format!("coefficient {i} cannot be represented"))
            })?;
            for (limb, m) in poly.limbs.iter_mut().zip(moduli) {
                let q = BigInt::from(m.value);
                let mut r = &big % &q;
                if r.is_negative() {
                    r += &q;
                }
                limb[i] = r.to_u64().unwrap_or(0);
            }
        }
    }
    Ok(poly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CkksParams, SecurityLevel};
    use crate::rns::CrtComposer;

    const SCALE: f64 = (1u64 << 40) as f64;

    fn setup() -> (CkksParams, CkksEncoder, CrtComposer) {
        let params = CkksParams::new(1024, &[60, 40, 40], SecurityLevel::None).unwrap();
        let encoder = CkksEncoder::new(params.poly_degree);
        let crt = CrtComposer::new(&params.moduli);
        (params, encoder, crt)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let (params, encoder, crt) = setup();
        let z: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let poly = encoder.encode_slots(&z, SCALE, &params.moduli).unwrap();
        let decoded = encoder.decode(&crt.compose_poly(&poly), SCALE);

        for i in 0..z.len() {
            let err = (decoded[i] - z[i]).abs();
            assert!(err < 1e-9, "Slot {i}: decoded={}, expected={}, error={err}", decoded[i], z[i]);
        }
        for (i, v) in decoded.iter().enumerate().skip(z.len()) {
            assert!(v.abs() < 1e-9, "Slot {i}: decoded={v}, expected 0.0");
        }
    }

    #[test]
    fn test_scalar_fills_every_slot() {
        let (params, encoder, crt) = setup();
        let poly = encoder.encode_scalar(-2.75, SCALE, &params.moduli).unwrap();
        let decoded = encoder.decode(&crt.compose_poly(&poly), SCALE);
        assert_eq!(decoded.len(), encoder.num_slots());
        assert!(decoded.iter().all(|v| (v + 2.75).abs() < 1e-9));
    }

    #[test]
    fn test_large_coefficient_uses_bigint_path() {
        let (params, encoder, crt) = setup();
        // Coefficient ≈ 2^100: past i64, still under the 140-bit modulus.
        let value = 1.5e9;
        let poly = encoder.encode_scalar(value, SCALE * SCALE / 1024.0, &params.moduli).unwrap();
        let decoded = encoder.decode(&crt.compose_poly(&poly), SCALE * SCALE / 1024.0);
        assert!((decoded[0] - value).abs() / value < 1e-12, "decoded={}", decoded[0]);
    }

    #[test]
    fn test_encoding_overflow() {
        let (params, encoder, _) = setup();
        let err = encoder.encode_scalar(1e30, SCALE, &params.moduli).unwrap_err();
        assert!(matches!(err, CkksError::EncodingOverflow(_)), "got {err:?}");

        let err = encoder.encode_scalar(f64::NAN, SCALE, &params.moduli).unwrap_err();
        assert!(matches!(err, CkksError::EncodingOverflow(_)), "got {err:?}");

        let too_many = vec![1.0; encoder.num_slots() + 1];
        assert!(encoder.encode_slots(&too_many, SCALE, &params.moduli).is_err());
    }

    #[test]
    fn test_scale_out_of_bounds() {
        let (params, encoder, _) = setup();
        // One 60-bit limb cannot hold a 2^60 scale.
        let err = encoder.encode_scalar(1.0, 2f64.powi(60), &params.moduli[..1]).unwrap_err();
        assert!(matches!(err, CkksError::ScaleOutOfBounds { .. }), "got {err:?}");
    }

    #[test]
    fn test_slot_order_follows_powers_of_five() {
        let encoder = CkksEncoder::new(16);
        // 5^j mod 32 = 1, 5, 25, 29, 17, 21, 9, 13
        assert_eq!(encoder.slot_index, vec![0, 2, 12, 14, 8, 10, 4, 6]);
    }
}
