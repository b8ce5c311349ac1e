//! ckkskit-core: RNS-CKKS homomorphic encryption primitives.
//!
//! - Parameter sets with 128-bit security bounds and NTT-friendly prime chains
//! - Encode/Decode (canonical embedding, rotation-compatible slot order)
//! - Public-key encryption, decryption of ciphertexts of any size
//! - ct + ct, ct × ct, ct × pt, relinearization, rescale, modulus switching
//! - Slot rotation through Galois automorphisms
//!
//! Key switching is hybrid RNS with one special prime, the last modulus of
//! the chain.

pub mod error;
pub mod params;
pub mod rns;
pub mod ntt;
pub mod sampling;
pub mod encoding;
pub mod keys;
pub mod ciphertext;
pub mod evaluator;

pub use ciphertext::{Ciphertext, CkksContext, Plaintext};
pub use error::{CkksError, Result};
pub use keys::{GaloisKeys, KeyGenerator, PublicKey, RelinKeys, SecretKey};
pub use params::{CkksParams, Modulus, SecurityLevel};
