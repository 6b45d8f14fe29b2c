//! Error types for the secret codec.

use thiserror::Error;

/// Failures of the secret codec.
///
/// Messages never carry plaintext: a decrypted value that fails to parse is
/// reported by the type it should have been, not by its content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The master key could not be parsed or has the wrong length.
    #[error("Invalid master key: {0}")]
    InvalidKey(String),

    /// Sealing a value failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The ciphertext is corrupt, was tampered with, or was sealed under a
    /// different key.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The value decrypted fine but is not a valid `expected`.
    #[error("Decrypted value is not a valid {expected}")]
    Validation { expected: &'static str },
}

impl CryptoError {
    /// Check if this error indicates a decryption failure.
    #[must_use]
    pub fn is_decryption(&self) -> bool {
        matches!(self, CryptoError::Decryption(_))
    }

    /// Check if this error indicates a malformed decrypted value.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, CryptoError::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_type_only() {
        let err = CryptoError::Validation { expected: "u16" };
        assert_eq!(err.to_string(), "Decrypted value is not a valid u16");
        assert!(err.is_validation());
        assert!(!err.is_decryption());
    }
}
