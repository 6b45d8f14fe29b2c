//! Values that only ever exist sealed at rest.

use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::SecretCodec;
use crate::error::CryptoError;

/// A sensitive value held as ciphertext.
///
/// The value is encrypted when the field is built with [`EncryptedField::seal`]
/// and decrypted on every [`EncryptedField::open`]; nothing in between sees
/// the plaintext. Non-string values are sealed through their `Display` form
/// and parsed back with `FromStr`, so a port is stored as `"5432"`.
///
/// ```
/// use warden_crypto::{EncryptedField, MasterKey, SecretCodec};
///
/// let codec = SecretCodec::new(MasterKey::new([1u8; 32]));
/// let port = EncryptedField::seal(&5432u16, &codec).unwrap();
/// assert_ne!(port.ciphertext(), "5432");
/// assert_eq!(port.open(&codec).unwrap(), 5432);
/// ```
pub struct EncryptedField<T> {
    ciphertext: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EncryptedField<T> {
    /// Wrap ciphertext loaded from storage.
    #[must_use]
    pub fn from_ciphertext(ciphertext: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            _marker: PhantomData,
        }
    }

    /// The stored ciphertext.
    #[must_use]
    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    /// Consume the field, returning the ciphertext.
    #[must_use]
    pub fn into_ciphertext(self) -> String {
        self.ciphertext
    }
}

impl<T: Display + FromStr> EncryptedField<T> {
    /// Encrypt `value` into a new field.
    pub fn seal(value: &T, codec: &SecretCodec) -> Result<Self, CryptoError> {
        Ok(Self::from_ciphertext(codec.encrypt(&value.to_string())?))
    }

    /// Decrypt and parse the value.
    ///
    /// Returns [`CryptoError::Decryption`] if the ciphertext does not
    /// authenticate and [`CryptoError::Validation`] if the plaintext does not
    /// parse as `T`.
    pub fn open(&self, codec: &SecretCodec) -> Result<T, CryptoError> {
        let plaintext = codec.decrypt(&self.ciphertext)?;
        plaintext.parse::<T>().map_err(|_| CryptoError::Validation {
            expected: std::any::type_name::<T>(),
        })
    }
}

impl<T> Clone for EncryptedField<T> {
    fn clone(&self) -> Self {
        Self::from_ciphertext(self.ciphertext.clone())
    }
}

impl<T> PartialEq for EncryptedField<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ciphertext == other.ciphertext
    }
}

impl<T> Eq for EncryptedField<T> {}

impl<T> fmt::Debug for EncryptedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptedField([ENCRYPTED])")
    }
}

impl<T> Serialize for EncryptedField<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.ciphertext)
    }
}

impl<'de, T> Deserialize<'de> for EncryptedField<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_ciphertext)
    }
}
