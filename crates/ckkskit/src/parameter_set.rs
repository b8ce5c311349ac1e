//! Named CKKS configurations.

use std::fmt;

use ckkskit_core::params::{default_chain_bits, CkksParams};
use ckkskit_core::{CkksError, Result, SecurityLevel};

/// A point in the CKKS parameter space.
///
/// An empty `modulus_bit_sizes` means "the default 128-bit chain for this
/// ring dimension".
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub ring_dimension: usize,
    pub modulus_bit_sizes: Vec<u32>,
    pub initial_scale: f64,
    pub security: SecurityLevel,
}

impl ParameterSet {
    /// Scale used by the small presets.
    pub const DEFAULT_SCALE: f64 = 1024.0;

    /// Names accepted by [`ParameterSet::named`].
    pub const PRESET_NAMES: [&'static str; 5] = ["light", "moderate", "heavy", "many-mul", "deep"];

    pub fn new(ring_dimension: usize, modulus_bit_sizes: &[u32], initial_scale: f64) -> Self {
        Self {
            ring_dimension,
            modulus_bit_sizes: modulus_bit_sizes.to_vec(),
            initial_scale,
            security: SecurityLevel::Tc128,
        }
    }

    pub fn with_security(mut self, security: SecurityLevel) -> Self {
        self.security = security;
        self
    }

    pub fn with_scale(mut self, initial_scale: f64) -> Self {
        self.initial_scale = initial_scale;
        self
    }

    /// One 54-bit prime: encrypts and adds, but cannot relinearize or rotate.
    pub fn light() -> Self {
        Self::new(2048, &[54], Self::DEFAULT_SCALE)
    }

    pub fn moderate() -> Self {
        Self::new(4096, &[36, 36, 36], Self::DEFAULT_SCALE)
    }

    /// Two rescales at 2^40.
    pub fn heavy() -> Self {
        Self::new(8192, &[60, 40, 40, 60], 2f64.powi(40))
    }

    pub fn many_mul() -> Self {
        Self::new(8192, &[40, 40, 40, 40, 40], Self::DEFAULT_SCALE)
    }

    /// Three rescales at 2^40.
    pub fn deep() -> Self {
        Self::new(16384, &[60, 40, 40, 40, 60], 2f64.powi(40))
    }

    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "light" => Some(Self::light()),
            "moderate" => Some(Self::moderate()),
            "heavy" => Some(Self::heavy()),
            "many-mul" => Some(Self::many_mul()),
            "deep" => Some(Self::deep()),
            _ => None,
        }
    }

    /// The default chain for `ring_dimension`, with the scale set to the square
    /// root of the chain's last prime.
    pub fn default_for(ring_dimension: usize) -> Result<Self> {
        let params = CkksParams::default_for(ring_dimension)?;
        let last = params
            .moduli
            .last()
            .ok_or_else(|| CkksError::Configuration("empty default chain".into()))?;
        Ok(Self {
            ring_dimension,
            modulus_bit_sizes: Vec::new(),
            initial_scale: (last.value as f64).sqrt(),
            security: SecurityLevel::Tc128,
        })
    }

    /// Bit sizes actually used, resolving the empty chain to the default.
    pub fn resolved_bit_sizes(&self) -> Result<Vec<u32>> {
        if !self.modulus_bit_sizes.is_empty() {
            return Ok(self.modulus_bit_sizes.clone());
        }
        default_chain_bits(self.ring_dimension).ok_or_else(|| {
            CkksError::Configuration(format!(
                "no default modulus chain for ring dimension {}",
                self.ring_dimension
            ))
        })
    }

    /// Validate and generate the prime chain.
    pub fn to_params(&self) -> Result<CkksParams> {
        if !(self.initial_scale.is_finite() && self.initial_scale > 0.0) {
            return Err(CkksError::Configuration(format!(
                "initial scale {} must be positive",
                self.initial_scale
            )));
        }
        CkksParams::new(self.ring_dimension, &self.resolved_bit_sizes()?, self.security)
    }

    /// Number of rescales a fresh ciphertext can undergo.
    pub fn depth(&self) -> usize {
        match self.resolved_bit_sizes() {
            Ok(bits) if bits.len() >= 2 => bits.len() - 2,
            _ => 0,
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={} q=", self.ring_dimension)?;
        if self.modulus_bit_sizes.is_empty() {
            write!(f, "default")?;
        } else {
            write!(f, "{:?}", self.modulus_bit_sizes)?;
        }
        write!(f, " scale=2^{:.2}", self.initial_scale.log2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_resolve_by_name() {
        for name in ParameterSet::PRESET_NAMES {
            assert!(ParameterSet::named(name).is_some(), "preset {name} missing");
        }
        assert_eq!(ParameterSet::named("MANY_MUL"), Some(ParameterSet::many_mul()));
        assert_eq!(ParameterSet::named("unknown"), None);
    }

    #[test]
    fn test_presets_pass_security_bound() {
        for name in ParameterSet::PRESET_NAMES {
            let set = ParameterSet::named(name).unwrap();
            let bits: u32 = set.modulus_bit_sizes.iter().sum();
            let bound = ckkskit_core::params::max_total_bits(set.ring_dimension).unwrap();
            assert!(bits <= bound, "{name}: {bits} bits over {bound}");
        }
    }

    #[test]
    fn test_default_for_uses_square_root_of_last_prime() {
        let set = ParameterSet::default_for(4096).unwrap();
        assert!(set.modulus_bit_sizes.is_empty());
        assert_eq!(set.resolved_bit_sizes().unwrap(), vec![36, 36, 37]);
        // sqrt of a 37-bit prime lies in [2^18, 2^18.5).
        let log = set.initial_scale.log2();
        assert!((18.0..18.5).contains(&log), "scale 2^{log}");
    }

    #[test]
    fn test_over_budget_chain_is_configuration_error() {
        let set = ParameterSet::new(4096, &[60, 40, 40, 60], 2f64.powi(40));
        assert!(matches!(set.to_params(), Err(CkksError::Configuration(_))));
        assert!(set.with_security(SecurityLevel::None).to_params().is_ok());
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let set = ParameterSet::heavy().with_scale(0.0);
        assert!(matches!(set.to_params(), Err(CkksError::Configuration(_))));
    }

    #[test]
    fn test_depth() {
        assert_eq!(ParameterSet::heavy().depth(), 2);
        assert_eq!(ParameterSet::deep().depth(), 3);
        assert_eq!(ParameterSet::light().depth(), 0);
    }
}
