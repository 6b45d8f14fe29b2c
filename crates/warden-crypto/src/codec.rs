//! AES-256-GCM secret codec.
//!
//! Sensitive strings (database credentials, webhook signing secrets) are
//! stored as `base64(nonce || ciphertext || auth_tag)`. The GCM tag makes any
//! corruption, tampering or key mismatch a hard [`CryptoError::Decryption`]
//! instead of garbage plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Length of the AES-256 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Length of the GCM authentication tag in bytes.
const TAG_SIZE: usize = 16;

/// The process-wide master key.
///
/// Loaded once at startup and never rotated in-process. Rotation means
/// re-encrypting every stored value offline.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LENGTH]);

impl MasterKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded key (64 hex characters).
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid hex key: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Parse a base64-encoded key (32 bytes once decoded).
    pub fn from_base64(base64_key: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(base64_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid base64 key: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Parse a key given either as 64 hex characters or as base64.
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        let trimmed = encoded.trim();
        if trimmed.len() == KEY_LENGTH * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::from_hex(trimmed)
        } else {
            Self::from_base64(trimmed)
        }
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Encrypt `plaintext` under `key`, returning the base64 blob for storage.
///
/// Every call draws a fresh nonce, so sealing the same value twice yields
/// different blobs.
pub fn encrypt(plaintext: &str, key: &MasterKey) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&result))
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &str, key: &MasterKey) -> Result<String, CryptoError> {
    let encrypted = BASE64
        .decode(blob)
        .map_err(|e| CryptoError::Decryption(format!("base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption(
            "ciphertext is too short".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;

    let (nonce, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            CryptoError::Decryption("authentication failed (tampered data or wrong key)".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}

/// Codec bound to the master key, shared by reference across the process.
#[derive(Debug, Clone)]
pub struct SecretCodec {
    key: MasterKey,
}

impl SecretCodec {
    /// Create a codec over `key`.
    #[must_use]
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        encrypt(plaintext, &self.key)
    }

    /// Decrypt a stored blob.
    pub fn decrypt(&self, blob: &str) -> Result<String, CryptoError> {
        decrypt(blob, &self.key)
    }
}
