//! Error types for hypernode-core.

use thiserror::Error;

/// Errors that can occur when parsing or constructing core primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid amount (overflow, bad format, or negative).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid base58 identity.
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// Invalid content hash encoding.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_amount_display() {
        let err = CoreError::InvalidAmount("overflow".into());
        assert_eq!(err.to_string(), "invalid amount: overflow");
    }

    #[test]
    fn invalid_pubkey_display() {
        let err = CoreError::InvalidPubkey("bad length".into());
        assert!(err.to_string().contains("bad length"));
    }
}
