//! A validated CKKS context bundled with its key material.
//!
//! [`SchemeContext`] is built once per [`ParameterSet`] and never mutated
//! afterwards, so a single instance can be shared by reference across
//! worker threads.

use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use ckkskit_core::encoding::check_scale;
use ckkskit_core::{
    CkksContext, CkksParams, GaloisKeys, KeyGenerator, PublicKey, RelinKeys, Result, SecretKey,
};

use crate::config;
use crate::error::Error;
use crate::parameter_set::ParameterSet;

/// Rotation steps keyed when the caller does not ask for others.
pub const DEFAULT_ROTATION_STEPS: [i64; 2] = [1, -1];

/// Parameters, precomputed tables, and secret, public, relinearization and
/// Galois keys.
pub struct SchemeContext {
    parameter_set: ParameterSet,
    ckks: CkksContext,
    secret_key: SecretKey,
    public_key: PublicKey,
    relin_keys: RelinKeys,
    galois_keys: GaloisKeys,
    rotation_steps: Vec<i64>,
}

/// Configures key generation before a [`SchemeContext`] is built.
pub struct SchemeContextBuilder {
    parameter_set: ParameterSet,
    seed: Option<u64>,
    rotation_steps: Vec<i64>,
}

impl SchemeContextBuilder {
    /// Make key generation reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn rotation_steps(mut self, steps: &[i64]) -> Self {
        self.rotation_steps = steps.to_vec();
        self
    }

    pub fn build(self) -> Result<SchemeContext> {
        let params = self.parameter_set.to_params()?;
        let ckks = CkksContext::new(params)?;
        check_scale(
            self.parameter_set.initial_scale,
            ckks.level_moduli(ckks.params.max_level()),
        )?;

        let mut rng = match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_rng(&mut rand::rng()),
        };
        let keygen = KeyGenerator::new(&ckks, &mut rng);
        let public_key = keygen.create_public_key(&mut rng);
        let relin_keys = keygen.create_relin_keys(&mut rng)?;
        let galois_keys = keygen.create_galois_keys(&self.rotation_steps, &mut rng)?;
        let secret_key = keygen.secret_key().clone();

        info!(
            "Scheme context {} ready: {} ({} Galois keys)",
            ckks.id(),
            self.parameter_set,
            galois_keys.len()
        );

        Ok(SchemeContext {
            parameter_set: self.parameter_set,
            ckks,
            secret_key,
            public_key,
            relin_keys,
            galois_keys,
            rotation_steps: self.rotation_steps,
        })
    }
}

impl SchemeContext {
    pub fn builder(parameter_set: ParameterSet) -> SchemeContextBuilder {
        SchemeContextBuilder {
            parameter_set,
            seed: None,
            rotation_steps: DEFAULT_ROTATION_STEPS.to_vec(),
        }
    }

    /// Build with fresh randomness and the default rotation steps.
    pub fn new(parameter_set: ParameterSet) -> Result<Self> {
        Self::builder(parameter_set).build()
    }

    /// [`SchemeContext::new`] on a preset looked up by name.
    pub fn from_preset(name: &str) -> std::result::Result<Self, Error> {
        let set = config::preset(name)?;
        Ok(Self::new(set)?)
    }

    pub fn parameter_set(&self) -> &ParameterSet {
        &self.parameter_set
    }

    pub fn params(&self) -> &CkksParams {
        &self.ckks.params
    }

    pub fn ckks(&self) -> &CkksContext {
        &self.ckks
    }

    pub fn id(&self) -> u64 {
        self.ckks.id()
    }

    pub fn initial_scale(&self) -> f64 {
        self.parameter_set.initial_scale
    }

    /// Level of a fresh ciphertext.
    pub fn max_level(&self) -> usize {
        self.ckks.params.max_level()
    }

    pub fn num_slots(&self) -> usize {
        self.ckks.params.num_slots
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn relin_keys(&self) -> &RelinKeys {
        &self.relin_keys
    }

    pub fn galois_keys(&self) -> &GaloisKeys {
        &self.galois_keys
    }

    pub fn rotation_steps(&self) -> &[i64] {
        &self.rotation_steps
    }
}
