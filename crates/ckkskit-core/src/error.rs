//! Error taxonomy shared by every fallible CKKS operation.

use thiserror::Error;

/// Result alias used throughout `ckkskit-core`.
pub type Result<T> = std::result::Result<T, CkksError>;

/// Failures surfaced by parameter validation, encoding, encryption and evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CkksError {
    /// Operands disagree on scale, level, size or owning context.
    #[error("Parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// A rescale or modulus switch was requested below level 0.
    #[error("Modulus chain exhausted at level {level}")]
    ChainExhausted { level: usize },

    /// The value does not fit the modulus at the requested scale.
    #[error("Encoding overflow: {0}")]
    EncodingOverflow(String),

    /// The ciphertext cannot be decrypted by this context.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Invalid parameter set or key configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A scale needs more bits than the modulus at this level provides.
    #[error("Scale out of bounds: 2^{scale_bits:.2} does not fit a {modulus_bits}-bit modulus")]
    ScaleOutOfBounds { scale_bits: f64, modulus_bits: u32 },

    /// No Galois key was generated for this rotation step.
    #[error("Missing Galois key for rotation by {step}")]
    MissingKey { step: i64 },

    /// Operation is only defined for ciphertexts of a different size.
    #[error("Unsupported ciphertext size {size}")]
    UnsupportedSize { size: usize },
}
