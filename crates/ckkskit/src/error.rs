use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error for driver code that mixes configuration and crypto.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ckks(#[from] ckkskit_core::CkksError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_both_sources() {
        let err: Error = ckkskit_core::CkksError::ChainExhausted { level: 0 }.into();
        assert_eq!(err.to_string(), "Modulus chain exhausted at level 0");

        let err: Error = ConfigError::Invalid("empty grid".into()).into();
        assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
    }
}
